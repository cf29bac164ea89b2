//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::params::WorldParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Genome shape and mutation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Number of ordinary genes; the special gene comes on top
    pub sprout_gene_count: usize,
    /// Probability that a gene mutates when DNA is passed on
    pub mutation_chance: f64,
    /// Lowest random gene value (inclusive)
    pub min_gene_value: i8,
    /// Highest random gene value (exclusive)
    pub max_gene_value: i8,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            sprout_gene_count: 16,
            mutation_chance: 0.05,
            min_gene_value: -24,
            max_gene_value: 42,
        }
    }
}

/// Tree energy economy and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub min_lifetime: i32,
    pub max_lifetime: i32,
    pub max_energy_per_seed: i32,
    /// Energy paid by every living part each turn
    pub metabolic_cost: i32,
    /// Subtracted from absorption in energy and over-exposure calculations
    pub absorption_shift: i32,
    /// Sprout cost per unit of the new part's light absorption
    pub sprout_cost_per_absorption: i32,
    /// Cost of pushing one seed out of the way, indexed by direction code
    pub push_cost: [i32; 4],
    /// Cost of one step of light absorption change
    pub absorption_change_cost: i32,
    /// Turns a dead part stays on the grid
    pub dead_part_countdown: u32,
    pub min_color: f32,
    pub max_color: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            min_lifetime: 60,
            max_lifetime: 160,
            max_energy_per_seed: 300,
            metabolic_cost: 4,
            absorption_shift: 4,
            sprout_cost_per_absorption: 3,
            push_cost: [4, 2, 1, 2],
            absorption_change_cost: 20,
            dead_part_countdown: 8,
            min_color: 0.2,
            max_color: 0.9,
        }
    }
}

/// Seed energy burn and germination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub waiting_burn: i32,
    pub sprouting_burn: i32,
    pub germination_cost: i32,
    pub min_light_to_sprout: i32,
    pub max_light_to_sprout: i32,
    pub min_germination_delay: u32,
    pub max_germination_delay: u32,
    /// Light absorption of a seed occupying a cell
    pub absorption: i32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            waiting_burn: 1,
            sprouting_burn: 4,
            germination_cost: 10,
            min_light_to_sprout: 2,
            max_light_to_sprout: 12,
            min_germination_delay: 1,
            max_germination_delay: 4,
            absorption: 1000,
        }
    }
}

/// Pollen dispersal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollenConfig {
    /// Probability of pollinating each reachable foreign shoot
    pub chance: f64,
    /// Seed energy per unit of pollen radius
    pub energy_per_radius: i32,
}

impl Default for PollenConfig {
    fn default() -> Self {
        Self {
            chance: 0.3,
            energy_per_radius: 20,
        }
    }
}

/// Migrating light sources on the top row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSourceConfig {
    pub count: i32,
    pub first_column: i32,
    /// Turns between two moves; 0 keeps the sources still
    pub move_delay: u32,
}

impl Default for LightSourceConfig {
    fn default() -> Self {
        Self {
            count: 120,
            first_column: 0,
            move_delay: 10,
        }
    }
}

/// Population bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub initial_seeds: usize,
    pub min_population: usize,
    pub max_seeds: usize,
    pub spawn_energy: i32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_seeds: 40,
            min_population: 10,
            max_seeds: 2000,
            spawn_energy: 200,
        }
    }
}

/// Opcodes switched off for an experiment, by their gene code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub disabled_conditions: Vec<i8>,
    pub disabled_actions: Vec<i8>,
}

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    pub world: WorldParams,
    pub genome: GenomeConfig,
    pub tree: TreeConfig,
    pub seeds: SeedConfig,
    pub pollen: PollenConfig,
    pub light_sources: LightSourceConfig,
    pub population: PopulationConfig,
    pub rules: RulesConfig,
    /// Side of a spatial index chunk, in cells
    pub chunk_size: i32,
    /// Route primary clicks to the lighting probe instead of tree selection
    pub lighting_test: bool,
    pub probe_absorption: i32,
    /// Rate the external clock should drive `advance` at; 0 = unthrottled
    pub turns_per_second: u32,
    /// Turns between two population snapshots in the log
    pub stats_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            world: WorldParams::default(),
            genome: GenomeConfig::default(),
            tree: TreeConfig::default(),
            seeds: SeedConfig::default(),
            pollen: PollenConfig::default(),
            light_sources: LightSourceConfig::default(),
            population: PopulationConfig::default(),
            rules: RulesConfig::default(),
            chunk_size: 8,
            lighting_test: false,
            probe_absorption: 10,
            turns_per_second: 16,
            stats_interval: 100,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&json)?;
        config.validate()?;
        debug!(path = %path.display(), seed = config.seed, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;

        let genome = &self.genome;
        if genome.sprout_gene_count == 0 || genome.sprout_gene_count > i8::MAX as usize {
            return Err(Error::Config(format!(
                "sprout gene count {} must lie in 1..=127",
                genome.sprout_gene_count
            )));
        }
        if genome.min_gene_value >= genome.max_gene_value {
            return Err(Error::Config("empty gene value range".to_string()));
        }
        // also the modulus of the colour channels
        if genome.max_gene_value <= 0 {
            return Err(Error::Config("max gene value must be positive".to_string()));
        }
        check_probability("genome.mutation_chance", genome.mutation_chance)?;
        check_probability("pollen.chance", self.pollen.chance)?;

        if self.tree.min_lifetime >= self.tree.max_lifetime {
            return Err(Error::Config("tree lifetime range is empty".to_string()));
        }
        if self.seeds.min_light_to_sprout >= self.seeds.max_light_to_sprout {
            return Err(Error::Config("seed light range is empty".to_string()));
        }
        if self.seeds.min_germination_delay > self.seeds.max_germination_delay {
            return Err(Error::Config("seed germination delay range is empty".to_string()));
        }
        if self.pollen.energy_per_radius <= 0 {
            return Err(Error::Config("pollen.energy_per_radius must be positive".to_string()));
        }
        if self.chunk_size <= 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        if self.light_sources.count < 0 || self.light_sources.count > self.world.width {
            return Err(Error::Config(format!(
                "{} light sources do not fit a row of {} cells",
                self.light_sources.count, self.world.width
            )));
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} = {} is not a probability", name, value)))
    }
}
