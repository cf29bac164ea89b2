//! Trees and their parts.

use crate::grid::{CellGrid, CellObject};
use crate::interpreter;
use crate::seed::Seed;
use crate::{PartKey, SeedKey, TreeKey};
use evotree_core::{Color, Position, SimulationConfig, TreeSummary};
use evotree_genome::{Dna, GeneticRules, Mutator};
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Shoot,
    Wood,
    Dead,
}

#[derive(Debug, Clone)]
pub struct TreePart {
    pub kind: PartKind,
    pub active_gene: usize,
    pub absorption: i32,
    pub position: Position,
    pub parent: Option<PartKey>,
    pub children: Vec<PartKey>,
    /// DNA received from another tree's pollen
    pub pollen: Option<Dna>,
    /// Turns left on the grid once dead
    pub countdown: u32,
}

impl TreePart {
    pub fn is_buffer_filled(&self) -> bool {
        self.pollen.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.kind != PartKind::Dead
    }
}

/// Monotonic ids for trees and seeds.
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    next_tree: u64,
    next_seed: u64,
}

impl IdCounter {
    pub fn next_tree_id(&mut self) -> u64 {
        self.next_tree += 1;
        self.next_tree
    }

    pub fn next_seed_id(&mut self) -> u64 {
        self.next_seed += 1;
        self.next_seed
    }
}

/// Everything outside the tree that a tree update reads or changes.
pub struct UpdateContext<'a> {
    pub grid: &'a mut CellGrid,
    pub seeds: &'a mut SlotMap<SeedKey, Seed>,
    pub rules: &'a GeneticRules,
    pub mutator: &'a Mutator,
    pub config: &'a SimulationConfig,
    pub rng: &'a mut ChaCha8Rng,
    pub ids: &'a mut IdCounter,
}

/// Pollen spread by a tree that just produced its seeds.
#[derive(Debug, Clone)]
pub struct PollenRelease {
    pub tree: TreeKey,
    pub dna: Dna,
    pub origins: Vec<Position>,
    pub radius: i32,
}

#[derive(Debug, Default)]
pub struct TreeOutcome {
    /// The tree has no parts left
    pub remove: bool,
    pub pollen: Option<PollenRelease>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub id: u64,
    pub generation: u32,
    pub dna: Dna,
    pub lifetime: i32,
    pub age: i32,
    pub energy: i32,
    pub root: Position,
    /// Highest part ever grown, counted from the root
    pub max_height: i32,
    pub color: Color,
    pub dead: bool,
    /// Skips the first update after germination
    pub just_sprouted: bool,
    parts: SlotMap<PartKey, TreePart>,
}

impl Tree {
    /// A tree without parts; the root is added with [`Tree::add_part`].
    pub fn new(
        id: u64,
        generation: u32,
        dna: Dna,
        energy: i32,
        root: Position,
        config: &SimulationConfig,
    ) -> Self {
        let lifetime = dna.lifetime(config.tree.min_lifetime, config.tree.max_lifetime);
        let color = dna.color(
            config.tree.min_color,
            config.tree.max_color,
            config.genome.max_gene_value as i32,
        );
        Self {
            id,
            generation,
            dna,
            lifetime,
            age: 0,
            energy,
            root,
            max_height: 0,
            color,
            dead: false,
            just_sprouted: false,
            parts: SlotMap::with_key(),
        }
    }

    pub fn parts(&self) -> &SlotMap<PartKey, TreePart> {
        &self.parts
    }

    pub fn part(&self, key: PartKey) -> Option<&TreePart> {
        self.parts.get(key)
    }

    pub fn part_mut(&mut self, key: PartKey) -> Option<&mut TreePart> {
        self.parts.get_mut(key)
    }

    /// Parts on the grid, dead ones included.
    pub fn size(&self) -> usize {
        self.parts.len()
    }

    pub fn living_parts(&self) -> usize {
        self.parts.values().filter(|p| p.is_alive()).count()
    }

    pub fn shoot_count(&self) -> usize {
        self.parts
            .values()
            .filter(|p| p.kind == PartKind::Shoot)
            .count()
    }

    pub fn remaining_lifetime(&self) -> i32 {
        self.lifetime - self.age
    }

    pub fn add_part(
        &mut self,
        tree_key: TreeKey,
        parent: Option<PartKey>,
        position: Position,
        gene: usize,
        grid: &mut CellGrid,
    ) -> PartKey {
        let absorption = self.dna.gene(gene).decoded_absorption();
        let key = self.parts.insert(TreePart {
            kind: PartKind::Shoot,
            active_gene: gene,
            absorption,
            position,
            parent,
            children: Vec::new(),
            pollen: None,
            countdown: 0,
        });
        if let Some(parent) = parent.and_then(|p| self.parts.get_mut(p)) {
            parent.children.push(key);
        }
        grid.add_object(position, CellObject::Part { tree: tree_key, part: key }, absorption);
        self.max_height = self.max_height.max(position.y - self.root.y);
        key
    }

    /// Kills a part and everything grown from it.
    pub fn kill_part(&mut self, key: PartKey, countdown: u32) {
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(part) = self.parts.get_mut(key) {
                part.kind = PartKind::Dead;
                part.countdown = countdown;
                stack.extend(part.children.iter().copied());
            }
        }
    }

    pub fn kill_all(&mut self, countdown: u32) {
        for part in self.parts.values_mut() {
            part.kind = PartKind::Dead;
            part.countdown = countdown;
        }
    }

    /// Takes a part off the grid and out of the tree.
    pub fn remove_part(&mut self, tree_key: TreeKey, key: PartKey, grid: &mut CellGrid) -> Option<TreePart> {
        let position = self.parts.get(key)?.position;
        if grid.object_at(position) == Some(CellObject::Part { tree: tree_key, part: key }) {
            grid.remove_object(position);
        }
        self.detach_part(tree_key, key, grid)
    }

    /// Unlinks a part that is no longer on the grid and releases it.
    pub fn detach_part(&mut self, tree_key: TreeKey, key: PartKey, grid: &CellGrid) -> Option<TreePart> {
        let part = self.parts.remove(key)?;
        debug_assert_ne!(
            grid.object_at(part.position),
            Some(CellObject::Part { tree: tree_key, part: key }),
            "part released while its cell still references it"
        );
        if let Some(parent) = part.parent.and_then(|p| self.parts.get_mut(p)) {
            parent.children.retain(|c| *c != key);
        }
        for child in &part.children {
            if let Some(child) = self.parts.get_mut(*child) {
                child.parent = None;
            }
        }
        Some(part)
    }

    /// Energy a living part collects this turn.
    pub fn part_energy(part: &TreePart, grid: &CellGrid, absorption_shift: i32) -> i32 {
        let light = grid.reachable_light(part.position, part.absorption);
        (2 * light.min(part.absorption - absorption_shift)).max(0)
    }

    /// Creates a seed carrying this tree's offspring DNA and puts it on the grid.
    pub fn spawn_seed(
        &self,
        pollen: Option<&Dna>,
        energy: i32,
        position: Position,
        ctx: &mut UpdateContext<'_>,
    ) -> SeedKey {
        let dna = ctx.mutator.offspring(&self.dna, pollen, ctx.rng);
        let id = ctx.ids.next_seed_id();
        let seed = Seed::new(id, self.generation + 1, dna, energy, position, ctx.config, ctx.rng);
        trace!(
            event = "seed_produced",
            tree_id = self.id,
            seed_id = id,
            energy,
            crossed = pollen.is_some(),
            "Seed produced"
        );
        seed.place(ctx.seeds, ctx.grid, ctx.config.seeds.absorption)
    }

    pub fn update(&mut self, key: TreeKey, ctx: &mut UpdateContext<'_>) -> TreeOutcome {
        let mut outcome = TreeOutcome::default();
        if self.parts.is_empty() {
            outcome.remove = true;
            return outcome;
        }
        if self.just_sprouted {
            self.just_sprouted = false;
            return outcome;
        }

        if !self.dead {
            self.age += 1;
            if self.age >= self.lifetime {
                outcome.pollen = self.reproduce(key, ctx);
                self.dead = true;
            } else {
                self.collect_energy(ctx);
                if self.energy <= 0 {
                    debug!(event = "tree_starved", tree_id = self.id, age = self.age, "Tree has no energy and dies");
                    self.kill_all(ctx.config.tree.dead_part_countdown);
                    self.dead = true;
                }
            }
        }

        let part_keys: Vec<PartKey> = self.parts.keys().collect();
        for part in part_keys {
            if self.parts.contains_key(part) && interpreter::update_part(self, key, part, ctx) {
                self.remove_part(key, part, ctx.grid);
            }
        }

        outcome.remove = self.parts.is_empty();
        outcome
    }

    fn collect_energy(&mut self, ctx: &UpdateContext<'_>) {
        let shift = ctx.config.tree.absorption_shift;
        let grid = &*ctx.grid;
        let gained: i32 = self
            .parts
            .values()
            .filter(|p| p.is_alive())
            .map(|p| Self::part_energy(p, grid, shift))
            .sum();
        let upkeep = self.living_parts() as i32 * ctx.config.tree.metabolic_cost;
        self.energy += gained - upkeep;
    }

    /// Turns every shoot into a seed and returns the pollen to spread.
    fn reproduce(&mut self, key: TreeKey, ctx: &mut UpdateContext<'_>) -> Option<PollenRelease> {
        let countdown = ctx.config.tree.dead_part_countdown;
        let shoots: Vec<PartKey> = self
            .parts
            .iter()
            .filter(|(_, p)| p.kind == PartKind::Shoot)
            .map(|(k, _)| k)
            .collect();
        let n = shoots.len() as i32;
        if n == 0 || self.energy < n {
            debug!(
                event = "reproduction_failed",
                tree_id = self.id,
                energy = self.energy,
                shoots = n,
                "Tree dies without seeds"
            );
            self.kill_all(countdown);
            return None;
        }

        let seed_energy = ((self.energy - n) / n + 1).min(ctx.config.tree.max_energy_per_seed);
        let mut positions = Vec::with_capacity(shoots.len());
        for part_key in shoots {
            if let Some(part) = self.remove_part(key, part_key, ctx.grid) {
                self.spawn_seed(part.pollen.as_ref(), seed_energy, part.position, ctx);
                positions.push(part.position);
            }
        }
        self.energy -= seed_energy * n;
        self.kill_all(countdown);

        debug!(
            event = "tree_reproduced",
            tree_id = self.id,
            seeds = n,
            seed_energy,
            generation = self.generation + 1,
            "Tree produced seeds"
        );

        let mut origins: Vec<Position> = Vec::with_capacity(3);
        let extremes = [
            positions.iter().copied().max_by_key(|p| p.y),
            positions.iter().copied().min_by_key(|p| p.x),
            positions.iter().copied().max_by_key(|p| p.x),
        ];
        for origin in extremes.into_iter().flatten() {
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }

        Some(PollenRelease {
            tree: key,
            dna: self.dna.clone(),
            origins,
            radius: seed_energy / ctx.config.pollen.energy_per_radius + 1,
        })
    }

    pub fn summary(&self) -> TreeSummary {
        TreeSummary {
            id: self.id,
            generation: self.generation,
            age: self.age,
            lifetime: self.lifetime,
            energy: self.energy,
            size: self.size(),
            shoots: self.shoot_count(),
            max_height: self.max_height,
            root: self.root,
            color: self.color,
            dead: self.dead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::LightDistribution;
    use evotree_genome::Gene;
    use rand::SeedableRng;

    /// DNA whose genes branch nowhere and whose conditions are always false.
    fn barren_dna(genes: usize) -> Dna {
        let mut gene = Gene::barren();
        gene.set_value(evotree_genome::gene::CONDITION1, -1);
        gene.set_value(evotree_genome::gene::CONDITION2, -1);
        Dna::from_genes(vec![gene; genes + 1])
    }

    struct Fixture {
        grid: CellGrid,
        seeds: SlotMap<SeedKey, Seed>,
        trees: SlotMap<TreeKey, Tree>,
        rules: GeneticRules,
        mutator: Mutator,
        config: SimulationConfig,
        rng: ChaCha8Rng,
        ids: IdCounter,
    }

    impl Fixture {
        fn new(config: SimulationConfig) -> Self {
            Self {
                grid: CellGrid::new(config.world.width, config.world.height, 8, config.chunk_size),
                seeds: SlotMap::with_key(),
                trees: SlotMap::with_key(),
                rules: GeneticRules::all(),
                mutator: Mutator::new(config.genome.clone()),
                config,
                rng: ChaCha8Rng::seed_from_u64(11),
                ids: IdCounter::default(),
            }
        }

        fn update(&mut self, key: TreeKey) -> TreeOutcome {
            let mut ctx = UpdateContext {
                grid: &mut self.grid,
                seeds: &mut self.seeds,
                rules: &self.rules,
                mutator: &self.mutator,
                config: &self.config,
                rng: &mut self.rng,
                ids: &mut self.ids,
            };
            self.trees[key].update(key, &mut ctx)
        }
    }

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.width = 16;
        config.world.height = 8;
        config.genome.mutation_chance = 0.0;
        config.tree.max_energy_per_seed = 30;
        config
    }

    #[test]
    fn test_add_and_remove_parts_keep_links() {
        let mut fx = Fixture::new(small_config());
        let key = fx.trees.insert(Tree::new(1, 0, barren_dna(4), 50, Position::new(3, 0), &fx.config));
        let tree = &mut fx.trees[key];
        let root = tree.add_part(key, None, Position::new(3, 0), 0, &mut fx.grid);
        let child = tree.add_part(key, Some(root), Position::new(3, 1), 0, &mut fx.grid);
        let grandchild = tree.add_part(key, Some(child), Position::new(3, 2), 0, &mut fx.grid);
        assert_eq!(tree.max_height, 2);
        assert_eq!(tree.part(root).unwrap().children, vec![child]);

        tree.remove_part(key, child, &mut fx.grid).unwrap();
        assert!(tree.part(root).unwrap().children.is_empty());
        assert_eq!(tree.part(grandchild).unwrap().parent, None);
        assert!(fx.grid.is_empty(Position::new(3, 1)));
        assert_eq!(tree.size(), 2);
    }

    #[test]
    fn test_kill_part_cascades_to_descendants_only() {
        let mut fx = Fixture::new(small_config());
        let key = fx.trees.insert(Tree::new(1, 0, barren_dna(4), 50, Position::new(3, 0), &fx.config));
        let tree = &mut fx.trees[key];
        let root = tree.add_part(key, None, Position::new(3, 0), 0, &mut fx.grid);
        let a = tree.add_part(key, Some(root), Position::new(3, 1), 0, &mut fx.grid);
        let b = tree.add_part(key, Some(a), Position::new(3, 2), 0, &mut fx.grid);
        let c = tree.add_part(key, Some(root), Position::new(4, 0), 0, &mut fx.grid);

        tree.kill_part(a, 5);
        assert_eq!(tree.part(a).unwrap().kind, PartKind::Dead);
        assert_eq!(tree.part(b).unwrap().kind, PartKind::Dead);
        assert_eq!(tree.part(b).unwrap().countdown, 5);
        assert_eq!(tree.part(root).unwrap().kind, PartKind::Shoot);
        assert_eq!(tree.part(c).unwrap().kind, PartKind::Shoot);
        assert_eq!(tree.living_parts(), 2);
    }

    #[test]
    fn test_reproduction_splits_energy_between_shoots() {
        let mut fx = Fixture::new(small_config());
        let mut tree = Tree::new(7, 3, barren_dna(4), 100, Position::new(5, 0), &fx.config);
        tree.lifetime = 10;
        tree.age = 9;
        let key = fx.trees.insert(tree);

        let tree = &mut fx.trees[key];
        let root = tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);
        tree.part_mut(root).unwrap().kind = PartKind::Wood;
        let shoot_cells = [
            Position::new(5, 1),
            Position::new(4, 0),
            Position::new(6, 0),
            Position::new(5, 2),
        ];
        for pos in shoot_cells {
            tree.add_part(key, Some(root), pos, 0, &mut fx.grid);
        }

        let outcome = fx.update(key);
        assert!(!outcome.remove);
        let pollen = outcome.pollen.expect("reproducing tree releases pollen");
        assert_eq!(pollen.tree, key);
        assert_eq!(pollen.radius, 25 / 20 + 1);
        assert_eq!(pollen.origins, vec![Position::new(5, 2), Position::new(4, 0), Position::new(6, 0)]);

        let tree = &fx.trees[key];
        assert!(tree.dead);
        assert_eq!(tree.energy, 0);
        assert!(tree.parts().values().all(|p| p.kind == PartKind::Dead));

        assert_eq!(fx.seeds.len(), 4);
        for seed in fx.seeds.values() {
            assert_eq!(seed.energy, 25);
            assert_eq!(seed.generation, 4);
            assert_eq!(seed.dna, tree.dna);
            assert!(shoot_cells.contains(&seed.position));
            assert!(matches!(fx.grid.object_at(seed.position), Some(CellObject::Seed(_))));
        }
    }

    #[test]
    fn test_reproduction_uses_pollen() {
        let mut fx = Fixture::new(small_config());
        let own = fx.mutator.random_dna(&mut fx.rng);
        let foreign = fx.mutator.random_dna(&mut fx.rng);
        let mut tree = Tree::new(7, 0, own.clone(), 100, Position::new(5, 0), &fx.config);
        tree.lifetime = 1;
        let key = fx.trees.insert(tree);

        let tree = &mut fx.trees[key];
        let shoot = tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);
        tree.part_mut(shoot).unwrap().pollen = Some(foreign.clone());

        fx.update(key);
        let seed = fx.seeds.values().next().unwrap();
        for (i, gene) in seed.dna.genes().iter().enumerate() {
            assert!(gene == own.gene(i) || gene == foreign.gene(i));
        }
    }

    #[test]
    fn test_no_shoots_no_seeds() {
        let mut fx = Fixture::new(small_config());
        let mut tree = Tree::new(7, 0, barren_dna(4), 100, Position::new(5, 0), &fx.config);
        tree.lifetime = 1;
        let key = fx.trees.insert(tree);
        let tree = &mut fx.trees[key];
        let root = tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);
        tree.part_mut(root).unwrap().kind = PartKind::Wood;

        let outcome = fx.update(key);
        assert!(outcome.pollen.is_none());
        assert!(fx.seeds.is_empty());
        assert!(fx.trees[key].dead);
    }

    #[test]
    fn test_energy_balance_of_a_turn() {
        let mut config = small_config();
        config.tree.min_lifetime = 50;
        config.tree.max_lifetime = 60;
        let mut fx = Fixture::new(config);
        for x in 0..16 {
            fx.grid.add_object(Position::new(x, 7), CellObject::LightSource, 0);
        }

        let mut dna = barren_dna(4);
        dna.gene_mut(0).set_value(evotree_genome::gene::LIGHT_ABSORPTION, 20);
        let key = fx.trees.insert(Tree::new(1, 0, dna, 500, Position::new(5, 0), &fx.config));
        let tree = &mut fx.trees[key];
        let root = tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);
        let a = tree.add_part(key, Some(root), Position::new(5, 1), 0, &mut fx.grid);
        let top = tree.add_part(key, Some(a), Position::new(5, 2), 0, &mut fx.grid);
        tree.kill_part(top, 3);

        let mut params = fx.config.world.clone();
        params.width = 16;
        params.height = 8;
        fx.grid.update_sun_light(&LightDistribution::from_params(&params).unwrap());

        let tree = &fx.trees[key];
        let shift = fx.config.tree.absorption_shift;
        let gained: i32 = tree
            .parts()
            .values()
            .filter(|p| p.is_alive())
            .map(|p| Tree::part_energy(p, &fx.grid, shift))
            .sum();
        let expected = 500 + gained - 2 * fx.config.tree.metabolic_cost;
        assert!(gained > 0);

        fx.update(key);
        assert_eq!(fx.trees[key].energy, expected);
    }

    #[test]
    fn test_starving_tree_dies() {
        let mut fx = Fixture::new(small_config());
        let key = fx.trees.insert(Tree::new(1, 0, barren_dna(4), 3, Position::new(5, 0), &fx.config));
        fx.trees[key].lifetime = 100;
        let tree = &mut fx.trees[key];
        tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);

        fx.update(key);
        let tree = &fx.trees[key];
        assert!(tree.dead);
        assert!(tree.parts().values().all(|p| p.kind == PartKind::Dead));
    }

    #[test]
    fn test_dead_parts_leave_after_countdown() {
        let mut config = small_config();
        config.tree.dead_part_countdown = 2;
        let mut fx = Fixture::new(config);
        let key = fx.trees.insert(Tree::new(1, 0, barren_dna(4), 3, Position::new(5, 0), &fx.config));
        fx.trees[key].lifetime = 100;
        let tree = &mut fx.trees[key];
        tree.add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);

        // starves and ticks the countdown once
        assert!(!fx.update(key).remove);
        assert!(fx.update(key).remove);
        assert!(fx.grid.is_empty(Position::new(5, 0)));
    }

    #[test]
    fn test_just_sprouted_tree_skips_first_update() {
        let mut fx = Fixture::new(small_config());
        let mut tree = Tree::new(1, 0, barren_dna(4), 3, Position::new(5, 0), &fx.config);
        tree.just_sprouted = true;
        let key = fx.trees.insert(tree);
        fx.trees[key].add_part(key, None, Position::new(5, 0), 0, &mut fx.grid);

        fx.update(key);
        assert_eq!(fx.trees[key].age, 0);
        assert!(!fx.trees[key].just_sprouted);
        fx.update(key);
        assert_eq!(fx.trees[key].age, 1);
    }
}
