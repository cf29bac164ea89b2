//! A single gene: thirteen signed byte values.

use evotree_core::Direction;
use serde::{Deserialize, Serialize};

pub const VALUE_COUNT: usize = 13;

pub const LIGHT_ABSORPTION: usize = 4;
pub const CONDITION1: usize = 5;
pub const PARAMETER1: usize = 6;
pub const CONDITION2: usize = 7;
pub const PARAMETER2: usize = 8;
/// First slot of the action table, indexed by the two-bit condition outcome.
pub const ACTIONS: usize = 9;

const MIN_ABSORPTION: i32 = 4;
const MAX_ABSORPTION: i32 = 50;

/// Layout: `[0..4)` branch target per direction (up, right, down, left),
/// `[4]` light absorption, `[5..9)` two condition/parameter pairs,
/// `[9..13)` action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gene {
    values: [i8; VALUE_COUNT],
}

impl Gene {
    pub fn new(values: [i8; VALUE_COUNT]) -> Self {
        Self { values }
    }

    /// A gene that branches nowhere and holds zeros elsewhere.
    pub fn barren() -> Self {
        let mut values = [0; VALUE_COUNT];
        values[..4].fill(-1);
        Self { values }
    }

    pub fn values(&self) -> &[i8; VALUE_COUNT] {
        &self.values
    }

    pub fn value(&self, index: usize) -> i8 {
        self.values[index]
    }

    pub fn set_value(&mut self, index: usize, value: i8) {
        self.values[index] = value;
    }

    pub fn branch(&self, dir: Direction) -> i8 {
        self.values[dir.code()]
    }

    /// Gene index the part branches into in `dir`, if the value names an
    /// ordinary gene.
    pub fn branch_target(&self, dir: Direction, sprout_gene_count: usize) -> Option<usize> {
        as_gene_index(self.branch(dir), sprout_gene_count)
    }

    /// Bitmask of directions this gene branches into.
    pub fn branch_mask(&self, sprout_gene_count: usize) -> u8 {
        Direction::ALL
            .iter()
            .filter(|dir| self.branch_target(**dir, sprout_gene_count).is_some())
            .fold(0, |mask, dir| mask | dir.mask())
    }

    pub fn absorption_value(&self) -> i8 {
        self.values[LIGHT_ABSORPTION]
    }

    /// Light absorption of a part grown from this gene.
    pub fn decoded_absorption(&self) -> i32 {
        (MIN_ABSORPTION + (self.absorption_value() as i32).max(0)).min(MAX_ABSORPTION)
    }

    pub fn condition1(&self) -> (i8, i8) {
        (self.values[CONDITION1], self.values[PARAMETER1])
    }

    pub fn condition2(&self) -> (i8, i8) {
        (self.values[CONDITION2], self.values[PARAMETER2])
    }

    /// Action slot for `outcome` (bit 0 = first condition, bit 1 = second).
    pub fn action(&self, outcome: usize) -> i8 {
        self.values[ACTIONS + (outcome & 0b11)]
    }
}

/// Interprets a gene value as an ordinary gene index.
pub fn as_gene_index(value: i8, sprout_gene_count: usize) -> Option<usize> {
    if value >= 0 && (value as usize) < sprout_gene_count {
        Some(value as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_targets() {
        let gene = Gene::new([3, -1, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(gene.branch_target(Direction::Up, 16), Some(3));
        assert_eq!(gene.branch_target(Direction::Right, 16), None);
        assert_eq!(gene.branch_target(Direction::Down, 16), None);
        assert_eq!(gene.branch_target(Direction::Left, 16), Some(0));
        assert_eq!(gene.branch_mask(16), Direction::Up.mask() | Direction::Left.mask());
    }

    #[test]
    fn test_decoded_absorption_bounds() {
        let mut gene = Gene::barren();
        gene.set_value(LIGHT_ABSORPTION, -20);
        assert_eq!(gene.decoded_absorption(), 4);
        gene.set_value(LIGHT_ABSORPTION, 10);
        assert_eq!(gene.decoded_absorption(), 14);
        gene.set_value(LIGHT_ABSORPTION, 100);
        assert_eq!(gene.decoded_absorption(), 50);
    }

    #[test]
    fn test_action_table() {
        let gene = Gene::new([0, 0, 0, 0, 0, -1, 2, -2, 3, 10, 11, 12, 13]);
        assert_eq!(gene.condition1(), (-1, 2));
        assert_eq!(gene.condition2(), (-2, 3));
        assert_eq!(gene.action(0), 10);
        assert_eq!(gene.action(3), 13);
    }

    #[test]
    fn test_barren_gene_has_no_branches() {
        assert_eq!(Gene::barren().branch_mask(16), 0);
    }
}
