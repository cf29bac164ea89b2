//! The world loop.

use crate::grid::{CellGrid, CellObject};
use crate::light::LightDistribution;
use crate::seed::{Seed, SeedUpdate};
use crate::tree::{IdCounter, PartKind, PollenRelease, Tree, UpdateContext};
use crate::{PartKey, SeedKey, TreeKey};
use evotree_core::{Error, PopulationStats, Position, Result, SimulationConfig, TreeSummary};
use evotree_genome::{GeneticRules, Mutator};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace, warn};

/// Random cells tried per spawned seed before giving up.
const SPAWN_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Ignored,
    ProbePlaced(Position),
    ProbeCleared,
    TreeSelected(TreeKey),
    SelectionCleared,
}

pub struct Simulation {
    grid: CellGrid,
    light: LightDistribution,
    trees: SlotMap<TreeKey, Tree>,
    seeds: SlotMap<SeedKey, Seed>,
    rules: GeneticRules,
    mutator: Mutator,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    ids: IdCounter,
    turn: u64,
    selected_tree: Option<TreeKey>,
    probe: Option<Position>,
    turns_per_second: u32,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let light = LightDistribution::from_params(&config.world)?;
        let world = &config.world;
        let mut grid = CellGrid::new(world.width, world.height, world.cell_size, config.chunk_size);

        let top = world.height - 1;
        for i in 0..config.light_sources.count {
            let x = (config.light_sources.first_column + i).rem_euclid(world.width);
            grid.add_object(Position::new(x, top), CellObject::LightSource, 0);
        }

        let mut sim = Self {
            grid,
            light,
            trees: SlotMap::with_key(),
            seeds: SlotMap::with_key(),
            rules: GeneticRules::from_config(&config.rules),
            mutator: Mutator::new(config.genome.clone()),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            ids: IdCounter::default(),
            turn: 0,
            selected_tree: None,
            probe: None,
            turns_per_second: config.turns_per_second,
            config,
        };
        let spawned = sim.spawn_random_seeds(sim.config.population.initial_seeds);

        info!(
            event = "simulation_created",
            width = sim.grid.width(),
            height = sim.grid.height(),
            light_sources = sim.config.light_sources.count,
            seeds = spawned,
            seed = sim.config.seed,
            "Simulation created"
        );
        Ok(sim)
    }

    /// Runs one turn.
    #[instrument(level = "debug", skip(self), fields(turn = self.turn + 1))]
    pub fn advance(&mut self) {
        self.turn += 1;
        self.light.next_turn();

        let delay = self.config.light_sources.move_delay;
        if delay > 0 && self.turn % delay as u64 == 0 {
            self.migrate_light_source();
        }
        self.grid.update_sun_light(&self.light);

        self.update_seeds();
        self.update_trees();
        self.maintain_population();

        let interval = self.config.stats_interval;
        if interval > 0 && self.turn % interval == 0 {
            let stats = self.stats();
            info!(
                event = "population_snapshot",
                turn = stats.turn,
                trees = stats.trees,
                seeds = stats.seeds,
                tree_parts = stats.tree_parts,
                shoots = stats.shoots,
                tree_energy = stats.total_tree_energy,
                max_generation = stats.max_generation,
                tallest_tree = stats.tallest_tree,
                mean_tree_size = stats.mean_tree_size(),
                "Population snapshot"
            );
        }
    }

    fn migrate_light_source(&mut self) {
        let Some((target, evicted)) = self.grid.migrate_light_source() else {
            return;
        };
        match evicted.map(|o| o.object) {
            Some(CellObject::Seed(key)) => {
                self.seeds.remove(key);
            }
            Some(CellObject::Part { tree, part }) => {
                if let Some(owner) = self.trees.get_mut(tree) {
                    owner.detach_part(tree, part, &self.grid);
                }
            }
            Some(CellObject::Probe) => self.probe = None,
            Some(CellObject::LightSource) | None => {}
        }
        trace!(event = "light_source_moved", x = target.x, evicted = evicted.is_some());
    }

    fn update_seeds(&mut self) {
        let keys: Vec<SeedKey> = self.seeds.keys().collect();
        let mut removed = Vec::new();
        let mut germinated = Vec::new();
        for key in keys {
            let Some(seed) = self.seeds.get_mut(key) else {
                continue;
            };
            match seed.update(&mut self.grid, &self.config) {
                SeedUpdate::Stay => {}
                SeedUpdate::Remove => removed.push(key),
                SeedUpdate::Germinate => germinated.push(key),
            }
        }

        for key in removed {
            self.remove_seed(key);
        }
        for key in germinated {
            self.germinate(key);
        }
    }

    fn germinate(&mut self, key: SeedKey) {
        let Some(seed) = self.remove_seed(key) else {
            return;
        };
        let position = seed.position;
        let energy = seed.energy - self.config.seeds.germination_cost;
        let id = self.ids.next_tree_id();
        let mut tree = Tree::new(id, seed.generation, seed.dna, energy, position, &self.config);
        tree.just_sprouted = true;
        let tree_key = self.trees.insert(tree);
        self.trees[tree_key].add_part(tree_key, None, position, 0, &mut self.grid);
        debug!(
            event = "seed_germinated",
            seed_id = seed.id,
            tree_id = id,
            generation = seed.generation,
            x = position.x,
            energy,
            "Seed germinated"
        );
    }

    /// Takes a seed off the grid and out of the seed map.
    fn remove_seed(&mut self, key: SeedKey) -> Option<Seed> {
        let position = self.seeds.get(key)?.position;
        if self.grid.object_at(position) == Some(CellObject::Seed(key)) {
            self.grid.remove_object(position);
        }
        self.seeds.remove(key)
    }

    fn update_trees(&mut self) {
        let keys: Vec<TreeKey> = self.trees.keys().collect();
        let mut removed = Vec::new();
        for key in keys {
            let Some(tree) = self.trees.get_mut(key) else {
                continue;
            };
            let mut ctx = UpdateContext {
                grid: &mut self.grid,
                seeds: &mut self.seeds,
                rules: &self.rules,
                mutator: &self.mutator,
                config: &self.config,
                rng: &mut self.rng,
                ids: &mut self.ids,
            };
            let outcome = tree.update(key, &mut ctx);
            if let Some(pollen) = outcome.pollen {
                self.spread_pollen(&pollen);
            }
            if outcome.remove {
                removed.push(key);
            }
        }

        for key in removed {
            if let Some(tree) = self.trees.remove(key) {
                debug!(event = "tree_removed", tree_id = tree.id, age = tree.age, "Tree removed");
            }
            if self.selected_tree == Some(key) {
                self.selected_tree = None;
            }
        }
    }

    /// Fills the pollen buffer of foreign shoots on the diamond around each origin.
    fn spread_pollen(&mut self, pollen: &PollenRelease) {
        let r = pollen.radius;
        let mut hits: BTreeSet<(TreeKey, PartKey)> = BTreeSet::new();
        for origin in &pollen.origins {
            let corners = [origin.add(0, r), origin.add(r, 0), origin.add(0, -r), origin.add(-r, 0)];
            for (i, from) in corners.iter().enumerate() {
                hits.extend(self.grid.find_under_line(*from, corners[(i + 1) % corners.len()]));
            }
        }

        let mut pollinated = 0;
        for (tree_key, part_key) in hits {
            if tree_key == pollen.tree {
                continue;
            }
            let Some(part) = self.trees.get_mut(tree_key).and_then(|t| t.part_mut(part_key)) else {
                continue;
            };
            if part.kind != PartKind::Shoot || part.is_buffer_filled() {
                continue;
            }
            if self.rng.gen_bool(self.config.pollen.chance) {
                part.pollen = Some(pollen.dna.clone());
                pollinated += 1;
            }
        }
        trace!(event = "pollen_spread", radius = r, pollinated);
    }

    fn maintain_population(&mut self) {
        let population = self.trees.len() + self.seeds.len();
        let min = self.config.population.min_population;
        if population < min {
            let spawned = self.spawn_random_seeds(min - population);
            debug!(event = "population_refilled", population, spawned, "Spawned random seeds");
        }

        let max = self.config.population.max_seeds;
        if self.seeds.len() > max {
            let mut by_age: Vec<(u64, SeedKey)> = self.seeds.iter().map(|(k, s)| (s.id, k)).collect();
            by_age.sort_unstable();
            let excess = by_age.len() - max;
            for (_, key) in by_age.into_iter().take(excess) {
                self.remove_seed(key);
            }
            debug!(event = "seeds_trimmed", removed = excess, "Removed oldest seeds");
        }
    }

    /// Spawns up to `count` random seeds in empty cells of the upper half,
    /// below the light source row. Returns how many were placed.
    fn spawn_random_seeds(&mut self, count: usize) -> usize {
        let width = self.grid.width();
        let height = self.grid.height();
        let (low, high) = if height > 2 { (height / 2, height - 1) } else { (0, height) };

        for spawned in 0..count {
            let free = (0..SPAWN_ATTEMPTS)
                .map(|_| Position::new(self.rng.gen_range(0..width), self.rng.gen_range(low..high)))
                .find(|pos| self.grid.is_empty(*pos));
            let Some(position) = free else {
                warn!(event = "spawn_failed", spawned, requested = count, "No free cell for a new seed");
                return spawned;
            };
            let dna = self.mutator.random_dna(&mut self.rng);
            let id = self.ids.next_seed_id();
            Seed::new(id, 0, dna, self.config.population.spawn_energy, position, &self.config, &mut self.rng)
                .place(&mut self.seeds, &mut self.grid, self.config.seeds.absorption);
        }
        count
    }

    /// Handles a click at world coordinates.
    pub fn click(&mut self, button: MouseButton, world_x: i32, world_y: i32) -> ClickOutcome {
        let Some(cell) = self.grid.find_cell(world_x, world_y) else {
            return ClickOutcome::Ignored;
        };
        let position = cell.position();
        let object = cell.object();

        if self.config.lighting_test {
            return match (button, object) {
                (MouseButton::Primary, None) => {
                    self.clear_probe();
                    self.grid
                        .add_object(position, CellObject::Probe, self.config.probe_absorption);
                    self.probe = Some(position);
                    ClickOutcome::ProbePlaced(position)
                }
                (MouseButton::Primary, Some(CellObject::Probe)) | (MouseButton::Secondary, _) => {
                    if self.clear_probe() {
                        ClickOutcome::ProbeCleared
                    } else {
                        ClickOutcome::Ignored
                    }
                }
                (MouseButton::Primary, Some(_)) => ClickOutcome::Ignored,
            };
        }

        match (button, object) {
            (MouseButton::Primary, Some(CellObject::Part { tree, .. })) => {
                self.selected_tree = Some(tree);
                ClickOutcome::TreeSelected(tree)
            }
            _ => {
                self.selected_tree = None;
                ClickOutcome::SelectionCleared
            }
        }
    }

    fn clear_probe(&mut self) -> bool {
        let Some(position) = self.probe.take() else {
            return false;
        };
        if self.grid.object_at(position) == Some(CellObject::Probe) {
            self.grid.remove_object(position);
        }
        true
    }

    pub fn set_turns_per_second(&mut self, turns_per_second: u32) {
        self.turns_per_second = turns_per_second;
    }

    pub fn turns_per_second(&self) -> u32 {
        self.turns_per_second
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn light(&self) -> &LightDistribution {
        &self.light
    }

    pub fn trees(&self) -> &SlotMap<TreeKey, Tree> {
        &self.trees
    }

    pub fn seeds(&self) -> &SlotMap<SeedKey, Seed> {
        &self.seeds
    }

    pub fn tree(&self, key: TreeKey) -> Option<&Tree> {
        self.trees.get(key)
    }

    pub fn tree_summary(&self, key: TreeKey) -> Option<TreeSummary> {
        self.trees.get(key).map(Tree::summary)
    }

    pub fn stats(&self) -> PopulationStats {
        let mut stats = PopulationStats::new(self.turn);
        for tree in self.trees.values() {
            stats.record_tree(&tree.summary());
        }
        for seed in self.seeds.values() {
            stats.record_seed(seed.generation, seed.energy);
        }
        stats
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn selected_tree(&self) -> Option<TreeKey> {
        self.selected_tree
    }

    pub fn probe(&self) -> Option<Position> {
        self.probe
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Checks that grid cells and object maps reference each other exactly.
    pub fn verify_integrity(&self) -> Result<()> {
        let mismatch = |what: String| Err(Error::InvalidState(what));

        let mut part_cells = 0;
        for cell in self.grid.cells() {
            let pos = cell.position();
            match cell.object() {
                Some(CellObject::Part { tree, part }) => {
                    let found = self.trees.get(tree).and_then(|t| t.part(part));
                    if found.map(|p| p.position) != Some(pos) {
                        return mismatch(format!("cell {} references a missing tree part", pos));
                    }
                    if self.grid.indexed_part(pos) != Some((tree, part)) {
                        return mismatch(format!("tree part at {} is missing from the chunk index", pos));
                    }
                    part_cells += 1;
                }
                Some(CellObject::Seed(key)) => {
                    if self.seeds.get(key).map(|s| s.position) != Some(pos) {
                        return mismatch(format!("cell {} references a missing seed", pos));
                    }
                }
                Some(CellObject::Probe) => {
                    if self.probe != Some(pos) {
                        return mismatch(format!("stray probe at {}", pos));
                    }
                }
                Some(CellObject::LightSource) | None => {}
            }
        }
        if self.grid.indexed_part_count() != part_cells {
            return mismatch(format!(
                "chunk index holds {} parts, grid holds {}",
                self.grid.indexed_part_count(),
                part_cells
            ));
        }

        for (tree_key, tree) in &self.trees {
            for (part_key, part) in tree.parts() {
                let expected = CellObject::Part { tree: tree_key, part: part_key };
                if self.grid.object_at(part.position) != Some(expected) {
                    return mismatch(format!("tree {} part at {} is not on the grid", tree.id, part.position));
                }
            }
        }
        for (key, seed) in &self.seeds {
            if self.grid.object_at(seed.position) != Some(CellObject::Seed(key)) {
                return mismatch(format!("seed {} at {} is not on the grid", seed.id, seed.position));
            }
        }
        Ok(())
    }
}
