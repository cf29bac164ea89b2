//! Core types, configuration and persistence for the EvoTree simulation.

pub mod types;
pub mod config;
pub mod params;
pub mod error;
pub mod stats;

pub use error::{Error, Result};
pub use types::*;
pub use config::*;
pub use params::{ParamValue, WorldParams};
pub use stats::*;
