//! Random DNA, mutation and crossover.

use crate::dna::Dna;
use crate::gene::{Gene, VALUE_COUNT};
use evotree_core::GenomeConfig;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

pub struct Mutator {
    config: GenomeConfig,
}

impl Mutator {
    pub fn new(config: GenomeConfig) -> Self {
        Self { config }
    }

    fn random_value(&self, rng: &mut ChaCha8Rng) -> i8 {
        rng.gen_range(self.config.min_gene_value..self.config.max_gene_value)
    }

    pub fn random_gene(&self, rng: &mut ChaCha8Rng) -> Gene {
        let mut values = [0i8; VALUE_COUNT];
        for value in values.iter_mut() {
            *value = self.random_value(rng);
        }
        Gene::new(values)
    }

    /// Fresh DNA with `sprout_gene_count` random genes and a random special gene.
    pub fn random_dna(&self, rng: &mut ChaCha8Rng) -> Dna {
        let genes = (0..=self.config.sprout_gene_count)
            .map(|_| self.random_gene(rng))
            .collect();
        Dna::from_genes(genes)
    }

    /// Replaces one random value in each gene selected with
    /// `mutation_chance`. Returns the number of mutated genes.
    pub fn mutate(&self, dna: &mut Dna, rng: &mut ChaCha8Rng) -> usize {
        let mut mutated = 0;
        for index in 0..dna.genes().len() {
            if rng.gen_bool(self.config.mutation_chance) {
                let slot = rng.gen_range(0..VALUE_COUNT);
                let value = self.random_value(rng);
                dna.gene_mut(index).set_value(slot, value);
                mutated += 1;
                trace!(event = "gene_mutated", gene = index, slot, value);
            }
        }
        mutated
    }

    /// Uniform crossover: every gene is taken from either parent.
    pub fn crossover(&self, parent1: &Dna, parent2: &Dna, rng: &mut ChaCha8Rng) -> Dna {
        debug_assert_eq!(parent1.genes().len(), parent2.genes().len());
        let genes = parent1
            .genes()
            .iter()
            .zip(parent2.genes())
            .map(|(a, b)| if rng.gen::<bool>() { *a } else { *b })
            .collect();
        Dna::from_genes(genes)
    }

    /// DNA for an offspring: crossed with `pollen` when present, copied
    /// otherwise, then mutated.
    pub fn offspring(&self, parent: &Dna, pollen: Option<&Dna>, rng: &mut ChaCha8Rng) -> Dna {
        let mut child = match pollen {
            Some(other) => self.crossover(parent, other, rng),
            None => parent.clone(),
        };
        self.mutate(&mut child, rng);
        child
    }
}
