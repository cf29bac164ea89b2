//! Seeds: fall to the floor, wait for light, germinate.

use crate::grid::{CellGrid, CellObject};
use crate::SeedKey;
use evotree_core::{Direction, Position, SimulationConfig};
use evotree_genome::Dna;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;

/// Cells a seed can fall in one turn.
const FALL_PER_TURN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedState {
    Waiting,
    Sprouting,
}

/// What the world should do with a seed after its update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedUpdate {
    Stay,
    Remove,
    Germinate,
}

#[derive(Debug, Clone)]
pub struct Seed {
    pub id: u64,
    pub generation: u32,
    pub dna: Dna,
    pub energy: i32,
    pub position: Position,
    pub state: SeedState,
    /// Light needed before the germination countdown runs
    pub germination_light: i32,
    pub germination_countdown: u32,
}

impl Seed {
    pub fn new(
        id: u64,
        generation: u32,
        dna: Dna,
        energy: i32,
        position: Position,
        config: &SimulationConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let seeds = &config.seeds;
        let germination_light = dna.germination_light(seeds.min_light_to_sprout, seeds.max_light_to_sprout);
        let germination_countdown =
            rng.gen_range(seeds.min_germination_delay..=seeds.max_germination_delay);
        Self {
            id,
            generation,
            dna,
            energy,
            position,
            state: SeedState::Waiting,
            germination_light,
            germination_countdown,
        }
    }

    /// Stores the seed and puts it on the grid.
    pub fn place(self, seeds: &mut SlotMap<SeedKey, Seed>, grid: &mut CellGrid, absorption: i32) -> SeedKey {
        let position = self.position;
        let key = seeds.insert(self);
        grid.add_object(position, CellObject::Seed(key), absorption);
        key
    }

    pub fn update(&mut self, grid: &mut CellGrid, config: &SimulationConfig) -> SeedUpdate {
        let seeds = &config.seeds;
        let light = grid.reachable_light(self.position, seeds.absorption);
        if self.state == SeedState::Waiting && light > 0 {
            self.state = SeedState::Sprouting;
        }

        self.energy -= match self.state {
            SeedState::Waiting => seeds.waiting_burn,
            SeedState::Sprouting => seeds.sprouting_burn,
        };
        if self.energy <= 0 {
            return SeedUpdate::Remove;
        }

        if self.position.y > 0 {
            let mut next = self.position;
            for _ in 0..FALL_PER_TURN {
                match grid.neighbor(next, Direction::Down) {
                    Some(below) if grid.is_empty(below) => next = below,
                    _ => break,
                }
            }
            if next != self.position {
                grid.move_object(self.position, next);
                self.position = next;
            }
            return SeedUpdate::Stay;
        }

        if light < self.germination_light {
            return SeedUpdate::Stay;
        }
        self.germination_countdown = self.germination_countdown.saturating_sub(1);
        if self.germination_countdown == 0
            && self.energy > seeds.germination_cost
            && !self.next_to_tree(grid)
        {
            return SeedUpdate::Germinate;
        }
        SeedUpdate::Stay
    }

    fn next_to_tree(&self, grid: &CellGrid) -> bool {
        [Direction::Left, Direction::Right].iter().any(|dir| {
            grid.neighbor(self.position, *dir)
                .and_then(|pos| grid.object_at(pos))
                .is_some_and(|object| matches!(object, CellObject::Part { .. }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::LightDistribution;
    use crate::{PartKey, TreeKey};
    use evotree_genome::Mutator;
    use rand::SeedableRng;

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.width = 8;
        config.world.height = 12;
        config.seeds.min_germination_delay = 2;
        config.seeds.max_germination_delay = 2;
        config
    }

    fn seed_at(pos: Position, energy: i32, config: &SimulationConfig) -> Seed {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let dna = Mutator::new(config.genome.clone()).random_dna(&mut rng);
        Seed::new(1, 0, dna, energy, pos, config, &mut rng)
    }

    #[test]
    fn test_new_seed_traits() {
        let config = config();
        let seed = seed_at(Position::new(1, 1), 50, &config);
        assert_eq!(seed.state, SeedState::Waiting);
        assert_eq!(seed.germination_countdown, 2);
        assert!((2..12).contains(&seed.germination_light));
    }

    #[test]
    fn test_seed_falls_three_cells_per_turn() {
        let config = config();
        let mut grid = CellGrid::new(8, 12, 4, 4);
        let mut seeds = SlotMap::with_key();
        let key = seed_at(Position::new(3, 10), 100, &config).place(&mut seeds, &mut grid, 1000);

        let mut heights = Vec::new();
        for _ in 0..4 {
            let seed = &mut seeds[key];
            assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Stay);
            heights.push(seed.position.y);
        }
        assert_eq!(heights, vec![7, 4, 1, 0]);
        assert_eq!(grid.object_at(Position::new(3, 0)), Some(CellObject::Seed(key)));
        assert!(grid.is_empty(Position::new(3, 10)));
        assert_eq!(seeds[key].energy, 96);
    }

    #[test]
    fn test_seed_stops_on_obstacle() {
        let config = config();
        let mut grid = CellGrid::new(8, 12, 4, 4);
        grid.add_object(Position::new(3, 5), CellObject::Probe, 10);
        let mut seed = seed_at(Position::new(3, 7), 100, &config);
        grid.add_object(seed.position, CellObject::Probe, 0);

        seed.update(&mut grid, &config);
        assert_eq!(seed.position, Position::new(3, 6));
    }

    #[test]
    fn test_seed_starves() {
        let config = config();
        let mut grid = CellGrid::new(8, 12, 4, 4);
        let mut seed = seed_at(Position::new(3, 0), 1, &config);
        assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Remove);
    }

    fn lit_floor(config: &SimulationConfig) -> CellGrid {
        let mut grid = CellGrid::new(8, 3, 4, 4);
        for x in 0..8 {
            grid.add_object(Position::new(x, 2), CellObject::LightSource, 0);
        }
        let mut params = config.world.clone();
        params.width = 8;
        params.height = 3;
        grid.update_sun_light(&LightDistribution::from_params(&params).unwrap());
        grid
    }

    #[test]
    fn test_seed_germinates_after_countdown() {
        let config = config();
        let mut grid = lit_floor(&config);
        let mut seed = seed_at(Position::new(3, 0), 200, &config);
        seed.germination_light = 2;

        assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Stay);
        assert_eq!(seed.state, SeedState::Sprouting);
        assert_eq!(seed.germination_countdown, 1);
        assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Germinate);
    }

    #[test]
    fn test_seed_does_not_germinate_next_to_tree() {
        let config = config();
        let mut grid = lit_floor(&config);
        let mut trees: SlotMap<TreeKey, ()> = SlotMap::with_key();
        let mut parts: SlotMap<PartKey, ()> = SlotMap::with_key();
        grid.add_object(
            Position::new(4, 0),
            CellObject::Part { tree: trees.insert(()), part: parts.insert(()) },
            10,
        );
        let mut seed = seed_at(Position::new(3, 0), 200, &config);
        seed.germination_light = 2;

        for _ in 0..3 {
            assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Stay);
        }
    }

    #[test]
    fn test_seed_in_the_dark_keeps_waiting() {
        let config = config();
        let mut grid = CellGrid::new(8, 12, 4, 4);
        let mut seed = seed_at(Position::new(3, 0), 200, &config);
        for _ in 0..5 {
            assert_eq!(seed.update(&mut grid, &config), SeedUpdate::Stay);
        }
        assert_eq!(seed.state, SeedState::Waiting);
        assert_eq!(seed.energy, 195);
    }
}
