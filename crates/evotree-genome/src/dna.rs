//! DNA: ordinary genes plus one special gene selecting trait genes.

use crate::gene::Gene;
use evotree_core::Color;
use serde::{Deserialize, Serialize};

/// Traits read through the special gene; the discriminant is the value
/// index inside the special gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTrait {
    GerminationLight = 0,
    Color = 1,
    Lifetime = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dna {
    genes: Vec<Gene>,
}

impl Dna {
    /// Builds DNA from ordinary genes followed by the special gene.
    pub fn from_genes(genes: Vec<Gene>) -> Self {
        assert!(genes.len() >= 2, "DNA needs at least one ordinary gene and the special gene");
        Self { genes }
    }

    pub fn sprout_gene_count(&self) -> usize {
        self.genes.len() - 1
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn gene(&self, index: usize) -> &Gene {
        &self.genes[index]
    }

    pub fn gene_mut(&mut self, index: usize) -> &mut Gene {
        &mut self.genes[index]
    }

    pub fn special(&self) -> &Gene {
        &self.genes[self.sprout_gene_count()]
    }

    /// Ordinary gene the special gene points at for `which`.
    pub fn trait_gene(&self, which: SpecialTrait) -> &Gene {
        let index = (self.special().value(which as usize) as i32)
            .rem_euclid(self.sprout_gene_count() as i32);
        &self.genes[index as usize]
    }

    /// Lifetime in turns, within `[min, max)`.
    pub fn lifetime(&self, min: i32, max: i32) -> i32 {
        let sum = self
            .trait_gene(SpecialTrait::Lifetime)
            .values()
            .iter()
            .map(|v| *v as i32)
            .sum();
        fold_into_range(sum, min, max)
    }

    /// Light a seed needs before its germination countdown runs, within `[min, max)`.
    pub fn germination_light(&self, min: i32, max: i32) -> i32 {
        let sum = self.trait_gene(SpecialTrait::GerminationLight).values()[..4]
            .iter()
            .map(|v| *v as i32)
            .sum();
        fold_into_range(sum, min, max)
    }

    /// Display colour; `modulus` is the gene value range used to normalise channels.
    pub fn color(&self, min: f32, max: f32, modulus: i32) -> Color {
        let gene = self.trait_gene(SpecialTrait::Color);
        let mix = gene.value(3) as i32;
        let channel = |c: usize| {
            let raw = ((gene.value(c) as i32) ^ mix).rem_euclid(modulus);
            min + (max - min) * raw as f32 / modulus as f32
        };
        Color::new(channel(0), channel(1), channel(2))
    }
}

fn fold_into_range(sum: i32, min: i32, max: i32) -> i32 {
    (sum - min + 1).rem_euclid(max - min) + min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::VALUE_COUNT;

    fn dna_with(genes: usize, fill: impl Fn(usize) -> [i8; VALUE_COUNT]) -> Dna {
        Dna::from_genes((0..=genes).map(|i| Gene::new(fill(i))).collect())
    }

    #[test]
    fn test_sprout_gene_count() {
        let dna = dna_with(16, |_| [0; VALUE_COUNT]);
        assert_eq!(dna.sprout_gene_count(), 16);
        assert_eq!(dna.genes().len(), 17);
    }

    #[test]
    fn test_special_gene_wraps_indices() {
        let dna = dna_with(4, |i| {
            if i == 4 {
                // trait values 0, 1, 2 point at genes -1 -> 3, 5 -> 1, 2
                let mut values = [0; VALUE_COUNT];
                values[0] = -1;
                values[1] = 5;
                values[2] = 2;
                values
            } else {
                [i as i8; VALUE_COUNT]
            }
        });
        assert_eq!(dna.trait_gene(SpecialTrait::GerminationLight).value(0), 3);
        assert_eq!(dna.trait_gene(SpecialTrait::Color).value(0), 1);
        assert_eq!(dna.trait_gene(SpecialTrait::Lifetime).value(0), 2);
    }

    #[test]
    fn test_lifetime_in_range() {
        let dna = dna_with(3, |i| [(i as i8) * 7 - 5; VALUE_COUNT]);
        let lifetime = dna.lifetime(60, 160);
        assert!((60..160).contains(&lifetime));
    }

    #[test]
    fn test_lifetime_formula() {
        // all-zero DNA: special points at gene 0, sum 0 -> (0 - 10 + 1) mod 20 + 10 = 21
        let dna = dna_with(2, |_| [0; VALUE_COUNT]);
        assert_eq!(dna.lifetime(10, 30), 21);
        assert_eq!(dna.germination_light(2, 12), 11);
    }

    #[test]
    fn test_color_channels_in_range() {
        let dna = dna_with(2, |i| [(i as i8) * 13 - 20; VALUE_COUNT]);
        let color = dna.color(0.2, 0.9, 42);
        for channel in [color.r, color.g, color.b] {
            assert!((0.2..0.9).contains(&channel));
        }
    }
}
