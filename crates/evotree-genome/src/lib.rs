//! Genome of the evolving trees.
//!
//! A genome ([`Dna`]) is a fixed number of [`Gene`]s plus one special gene.
//! Genes are read as a graph of condition/action rules by the growth
//! interpreter; the opcode tables and the [`GeneticRules`] that switch them
//! on and off live here as well, so the interpreter and the mutator agree
//! on one encoding.

pub mod gene;
pub mod dna;
pub mod opcode;
pub mod rules;
pub mod mutation;

pub use gene::Gene;
pub use dna::{Dna, SpecialTrait};
pub use opcode::{Action, Condition};
pub use rules::GeneticRules;
pub use mutation::Mutator;
