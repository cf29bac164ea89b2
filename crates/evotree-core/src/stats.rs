//! Population statistics and per-tree summaries.

use crate::types::{Color, Position};
use serde::{Deserialize, Serialize};

/// Read-only view of one tree, for renderers and logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub id: u64,
    pub generation: u32,
    pub age: i32,
    pub lifetime: i32,
    pub energy: i32,
    /// Number of parts still on the grid, dead ones included
    pub size: usize,
    pub shoots: usize,
    pub max_height: i32,
    pub root: Position,
    pub color: Color,
    pub dead: bool,
}

/// Snapshot of the whole population at one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub turn: u64,
    pub trees: usize,
    pub seeds: usize,
    pub tree_parts: usize,
    pub shoots: usize,
    pub total_tree_energy: i64,
    pub total_seed_energy: i64,
    pub max_generation: u32,
    pub tallest_tree: i32,
}

impl PopulationStats {
    pub fn new(turn: u64) -> Self {
        Self {
            turn,
            ..Default::default()
        }
    }

    pub fn record_tree(&mut self, tree: &TreeSummary) {
        self.trees += 1;
        self.tree_parts += tree.size;
        self.shoots += tree.shoots;
        self.total_tree_energy += tree.energy as i64;
        self.max_generation = self.max_generation.max(tree.generation);
        self.tallest_tree = self.tallest_tree.max(tree.max_height);
    }

    pub fn record_seed(&mut self, generation: u32, energy: i32) {
        self.seeds += 1;
        self.total_seed_energy += energy as i64;
        self.max_generation = self.max_generation.max(generation);
    }

    pub fn mean_tree_size(&self) -> f64 {
        if self.trees == 0 {
            0.0
        } else {
            self.tree_parts as f64 / self.trees as f64
        }
    }
}
