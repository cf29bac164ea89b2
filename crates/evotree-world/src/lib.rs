//! World simulation engine.
//!
//! Trees grow on a 2D cell grid lit from migrating light sources. Every
//! turn the [`Simulation`] propagates light, updates seeds and trees, spreads
//! pollen and keeps the population within bounds.

use slotmap::new_key_type;

pub mod chunks;
pub mod light;
pub mod grid;
pub mod seed;
pub mod tree;
pub mod interpreter;
pub mod simulation;

new_key_type! {
    /// Handle of a tree in the simulation's tree map.
    pub struct TreeKey;
    /// Handle of a part inside its tree's part map.
    pub struct PartKey;
    /// Handle of a seed in the simulation's seed map.
    pub struct SeedKey;
}

pub use chunks::ChunkIndex;
pub use grid::{Cell, CellGrid, CellObject, Occupant};
pub use light::{LightDecorator, LightDistribution};
pub use seed::{Seed, SeedState, SeedUpdate};
pub use interpreter::{walk_genes, Walk};
pub use tree::{IdCounter, PartKind, PollenRelease, Tree, TreeOutcome, TreePart, UpdateContext};
pub use simulation::{ClickOutcome, MouseButton, Simulation};
