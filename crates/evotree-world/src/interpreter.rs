//! Growth interpreter: walks a shoot's genes and grows or acts.

use crate::grid::{CellGrid, CellObject};
use crate::tree::{PartKind, Tree, UpdateContext};
use crate::{PartKey, TreeKey};
use evotree_core::{Direction, Position, SimulationConfig};
use evotree_genome::gene::as_gene_index;
use evotree_genome::{Action, Condition, Dna, Gene, GeneticRules};
use tracing::trace;

/// Over-exposure threshold is `(OVEREXPOSURE_BASE - absorption + shift) * 3`.
const OVEREXPOSURE_BASE: i32 = 120;
const BECOME_SEED_COST: i32 = 10;
const DROP_SEED_COST: i32 = 20;
const LIFETIME_PENALTY: i32 = 2;
/// Unit of the tree energy conditions.
const ENERGY_UNIT: i32 = 300;
/// Drop targets, in order of preference.
const DROP_ORDER: [Direction; 4] = [Direction::Down, Direction::Left, Direction::Right, Direction::Up];

/// Result of a gene walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Grow with this gene
    Grow(usize),
    /// Execute an action; the gene becomes active
    Act(usize, Action),
    /// The walk came back to a visited gene; no growth this turn
    Stalled(usize),
}

/// Walks the gene graph from `start`. Each gene is visited at most once, so
/// the walk takes at most `sprout_gene_count` steps. Returns the result and
/// the number of genes visited.
pub fn walk_genes<F>(dna: &Dna, start: usize, rules: &GeneticRules, mut check: F) -> (Walk, usize)
where
    F: FnMut(&Gene, Condition, i8) -> bool,
{
    let n = dna.sprout_gene_count();
    debug_assert!(start < n, "active gene {} out of range", start);
    let mut visited = vec![false; n];
    let mut current = start;
    visited[current] = true;
    let mut steps = 0;

    loop {
        steps += 1;
        let gene = dna.gene(current);
        let c1 = evaluate(rules, gene, gene.condition1(), &mut check);
        let c2 = evaluate(rules, gene, gene.condition2(), &mut check);
        let outcome = c1 as usize | (c2 as usize) << 1;
        if outcome == 0 {
            return (Walk::Grow(current), steps);
        }

        let slot = gene.action(outcome);
        if let Some(next) = as_gene_index(slot, n) {
            if visited[next] {
                return (Walk::Stalled(current), steps);
            }
            visited[next] = true;
            current = next;
            continue;
        }
        return match rules.active_action(slot) {
            Some(action) => (Walk::Act(current, action), steps),
            None => (Walk::Grow(current), steps),
        };
    }
}

fn evaluate<F>(rules: &GeneticRules, gene: &Gene, (code, param): (i8, i8), check: &mut F) -> bool
where
    F: FnMut(&Gene, Condition, i8) -> bool,
{
    rules
        .active_condition(code)
        .is_some_and(|condition| check(gene, condition, param))
}

/// What a shoot sees when its conditions are checked.
struct Surroundings<'a> {
    grid: &'a CellGrid,
    tree: &'a Tree,
    position: Position,
    light: i32,
}

impl Surroundings<'_> {
    fn check(&self, gene: &Gene, condition: Condition, param: i8) -> bool {
        let p = param as i32;
        let tree = self.tree;
        let height = self.position.y - tree.root.y;
        let branch = self.position.wrapped_dx(&tree.root, self.grid.width());
        let size = tree.living_parts() as i32;
        match condition {
            Condition::False => false,
            Condition::True => true,
            Condition::ShootHeightLess => height < p,
            Condition::ShootHeightEquals => height == p,
            Condition::ShootHeightMore => height > p,
            Condition::LightLess => self.light <= p,
            Condition::LightMore => self.light > p,
            Condition::TreeHeightLess => tree.max_height < p,
            Condition::TreeHeightMore => tree.max_height > p,
            Condition::TreeSizeLess => size < 2 * p,
            Condition::TreeSizeMore => size > 2 * p,
            Condition::TreeEnergyLess => tree.energy < ENERGY_UNIT * p,
            Condition::TreeEnergyMore => tree.energy > ENERGY_UNIT * p,
            Condition::BranchLengthLess => branch < p / 2,
            Condition::BranchLengthEquals => branch == p / 2,
            Condition::BranchLengthMore => branch > p / 2,
            Condition::TreeLifetimeLess => tree.remaining_lifetime() < p,
            Condition::TreeLifetimeMore => tree.remaining_lifetime() > p,
            Condition::IsBlockedToSprout => self.is_blocked(gene, p, true),
            Condition::IsNotBlockedToSprout => !self.is_blocked(gene, p, true),
            Condition::IsBlocked => self.is_blocked(gene, p, false),
            Condition::IsNotBlocked => !self.is_blocked(gene, p, false),
        }
    }

    /// Any selected direction has a missing or occupied neighbour.
    fn is_blocked(&self, gene: &Gene, p: i32, only_branches: bool) -> bool {
        let mut mask = p.rem_euclid(16) as u8;
        if only_branches {
            mask &= gene.branch_mask(self.tree.dna.sprout_gene_count());
        }
        Direction::ALL
            .iter()
            .filter(|dir| mask & dir.mask() != 0)
            .any(|dir| match self.grid.neighbor(self.position, *dir) {
                Some(next) => !self.grid.is_empty(next),
                None => true,
            })
    }
}

/// Updates one part. Returns true when a dead part's countdown ran out and
/// the part should be removed.
pub fn update_part(tree: &mut Tree, tree_key: TreeKey, part_key: PartKey, ctx: &mut UpdateContext<'_>) -> bool {
    let Some(part) = tree.part(part_key) else {
        return false;
    };
    match part.kind {
        PartKind::Wood => return false,
        PartKind::Dead => {
            let Some(part) = tree.part_mut(part_key) else {
                return false;
            };
            part.countdown = part.countdown.saturating_sub(1);
            return part.countdown == 0;
        }
        PartKind::Shoot => {}
    }

    let position = part.position;
    let absorption = part.absorption;
    let start = part.active_gene;
    let config: &SimulationConfig = ctx.config;
    let tree_config = &config.tree;

    let light = ctx.grid.reachable_light(position, absorption);
    if light >= (OVEREXPOSURE_BASE - absorption + tree_config.absorption_shift) * 3 {
        trace!(event = "part_overexposed", tree_id = tree.id, light, absorption, "Shoot burnt by light");
        tree.kill_part(part_key, tree_config.dead_part_countdown);
        return false;
    }

    let (walk, _) = {
        let surroundings = Surroundings {
            grid: &*ctx.grid,
            tree: &*tree,
            position,
            light,
        };
        walk_genes(&tree.dna, start, ctx.rules, |gene, condition, param| {
            surroundings.check(gene, condition, param)
        })
    };

    let gene = match walk {
        Walk::Grow(gene) | Walk::Act(gene, _) | Walk::Stalled(gene) => gene,
    };
    if let Some(part) = tree.part_mut(part_key) {
        part.active_gene = gene;
    }

    match walk {
        Walk::Stalled(_) => {}
        Walk::Act(_, action) => execute(tree, tree_key, part_key, action, ctx),
        Walk::Grow(_) => grow(tree, tree_key, part_key, ctx),
    }
    false
}

fn execute(tree: &mut Tree, tree_key: TreeKey, part_key: PartKey, action: Action, ctx: &mut UpdateContext<'_>) {
    let Some(part) = tree.part(part_key) else {
        return;
    };
    let position = part.position;
    let simulation: &SimulationConfig = ctx.config;
    let config = &simulation.tree;
    let shoots = tree.shoot_count().max(1) as i32;
    trace!(event = "action", tree_id = tree.id, action = ?action, "Shoot acts");

    match action {
        Action::DoNothing => {}
        Action::BecomeSeed => {
            let seed_energy = (tree.energy / shoots).min(config.max_energy_per_seed);
            if tree.energy <= BECOME_SEED_COST + seed_energy {
                return;
            }
            tree.energy -= BECOME_SEED_COST + seed_energy;
            if let Some(part) = tree.remove_part(tree_key, part_key, ctx.grid) {
                tree.spawn_seed(part.pollen.as_ref(), seed_energy, position, ctx);
            }
        }
        Action::DropSeed => {
            let seed_energy = (tree.energy / shoots / 2).min(config.max_energy_per_seed);
            if tree.energy <= DROP_SEED_COST + seed_energy {
                return;
            }
            tree.energy -= DROP_SEED_COST + seed_energy;
            let target = DROP_ORDER
                .iter()
                .filter_map(|dir| ctx.grid.neighbor(position, *dir))
                .find(|next| ctx.grid.is_empty(*next));
            if let Some(target) = target {
                let pollen = tree.part_mut(part_key).and_then(|p| p.pollen.take());
                tree.spawn_seed(pollen.as_ref(), seed_energy, target, ctx);
            }
        }
        Action::BecomeWood => {
            if let Some(part) = tree.part_mut(part_key) {
                part.kind = PartKind::Wood;
            }
        }
        Action::DecreaseTreeLifetime => tree.lifetime -= LIFETIME_PENALTY,
        Action::Die => {
            let countdown = config.dead_part_countdown;
            let Some(part) = tree.part_mut(part_key) else {
                return;
            };
            let parent = part.parent;
            let gene = part.active_gene;
            let pollen = part.pollen.take();
            if let Some(parent) = parent.and_then(|p| tree.part_mut(p)) {
                if parent.kind == PartKind::Wood {
                    parent.kind = PartKind::Shoot;
                    parent.active_gene = gene;
                    parent.pollen = pollen;
                }
            }
            tree.kill_part(part_key, countdown);
        }
        Action::IncreaseAbsorption | Action::DecreaseAbsorption => {
            let cost = config.absorption_change_cost;
            if tree.energy <= cost {
                return;
            }
            tree.energy -= cost;
            if let Some(part) = tree.part_mut(part_key) {
                part.absorption = if action == Action::IncreaseAbsorption {
                    part.absorption + 1
                } else {
                    (part.absorption - 1).max(0)
                };
                ctx.grid.set_absorption(position, part.absorption);
            }
        }
    }
}

fn grow(tree: &mut Tree, tree_key: TreeKey, part_key: PartKey, ctx: &mut UpdateContext<'_>) {
    let Some(part) = tree.part(part_key) else {
        return;
    };
    let position = part.position;
    let gene = *tree.dna.gene(part.active_gene);
    let n = tree.dna.sprout_gene_count();

    for dir in Direction::ALL {
        let Some(target) = gene.branch_target(dir, n) else {
            continue;
        };
        let Some(next) = ctx.grid.neighbor(position, dir) else {
            continue;
        };
        if matches!(ctx.grid.object_at(next), Some(CellObject::Seed(_))) {
            push_seeds(tree, next, dir, ctx);
        }
        if ctx.grid.is_empty(next) {
            let cost = ctx.config.tree.sprout_cost_per_absorption * tree.dna.gene(target).decoded_absorption();
            if tree.energy > cost {
                tree.energy -= cost;
                tree.add_part(tree_key, Some(part_key), next, target, ctx.grid);
            }
        }
    }

    if branches_filled(tree_key, position, &gene, n, ctx.grid) {
        if let Some(part) = tree.part_mut(part_key) {
            part.kind = PartKind::Wood;
        }
    }
}

/// Every branching direction holds a part of the same tree. A missing top
/// neighbour blocks; missing bottom neighbours are ignored.
fn branches_filled(tree_key: TreeKey, position: Position, gene: &Gene, n: usize, grid: &CellGrid) -> bool {
    Direction::ALL
        .iter()
        .filter(|dir| gene.branch_target(**dir, n).is_some())
        .all(|dir| match grid.neighbor(position, *dir) {
            Some(next) => matches!(grid.object_at(next), Some(CellObject::Part { tree, .. }) if tree == tree_key),
            None => *dir != Direction::Up,
        })
}

/// Pushes the chain of seeds starting at `first` one cell along `dir`.
fn push_seeds(tree: &mut Tree, first: Position, dir: Direction, ctx: &mut UpdateContext<'_>) {
    let grid = &*ctx.grid;
    let mut chain = vec![first];
    let mut cursor = first;
    loop {
        let Some(next) = grid.neighbor(cursor, dir) else {
            return;
        };
        match grid.object_at(next) {
            None => break,
            Some(CellObject::Seed(_)) if next != first => {
                chain.push(next);
                cursor = next;
            }
            Some(_) => return,
        }
    }

    let cost = ctx.config.tree.push_cost[dir.code()] * chain.len() as i32;
    if tree.energy <= cost {
        return;
    }
    tree.energy -= cost;

    for from in chain.into_iter().rev() {
        let Some(to) = ctx.grid.neighbor(from, dir) else {
            continue;
        };
        let Some(CellObject::Seed(seed_key)) = ctx.grid.object_at(from) else {
            continue;
        };
        ctx.grid.move_object(from, to);
        if let Some(seed) = ctx.seeds.get_mut(seed_key) {
            seed.position = to;
        }
    }
}
