//! 2D cell grid with light propagation.

use crate::chunks::ChunkIndex;
use crate::light::LightDistribution;
use crate::{PartKey, SeedKey, TreeKey};
use evotree_core::{Direction, Position};
use std::collections::VecDeque;

/// Light received from a neighbour is divided by this, per direction code.
const LIGHT_MODS: [i32; 4] = [1, 2, 4, 2];

/// What occupies a cell. Objects live in their own maps; the grid only
/// holds handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellObject {
    Part { tree: TreeKey, part: PartKey },
    Seed(SeedKey),
    LightSource,
    /// Lighting test occupant placed by clicking.
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub object: CellObject,
    pub absorption: i32,
}

#[derive(Debug, Clone)]
pub struct Cell {
    position: Position,
    light: i32,
    occupant: Option<Occupant>,
}

impl Cell {
    fn new(position: Position) -> Self {
        Self {
            position,
            light: 0,
            occupant: None,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Light that reached the cell, before the occupant absorbs any.
    pub fn raw_light(&self) -> i32 {
        self.light
    }

    /// Light left after the occupant's absorption.
    pub fn sun_light(&self) -> i32 {
        (self.light - self.absorption()).max(0)
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        self.occupant.as_ref()
    }

    pub fn object(&self) -> Option<CellObject> {
        self.occupant.map(|o| o.object)
    }

    pub fn absorption(&self) -> i32 {
        self.occupant.map_or(0, |o| o.absorption)
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    fn holds_light_source(&self) -> bool {
        matches!(self.object(), Some(CellObject::LightSource))
    }
}

/// A grid that wraps horizontally. `y = 0` is the floor.
#[derive(Debug, Clone)]
pub struct CellGrid {
    width: i32,
    height: i32,
    cell_size: i32,
    cells: Vec<Cell>,
    parts: ChunkIndex<(TreeKey, PartKey)>,
    /// Light sources, oldest first.
    light_sources: VecDeque<Position>,
}

impl CellGrid {
    pub fn new(width: i32, height: i32, cell_size: i32, chunk_size: i32) -> Self {
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Cell::new(Position::new(x, y))))
            .collect();
        Self {
            width,
            height,
            cell_size,
            cells,
            parts: ChunkIndex::new(width, height, chunk_size),
            light_sources: VecDeque::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cell_size(&self) -> i32 {
        self.cell_size
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        if self.in_bounds(pos) {
            Some(&self.cells[self.index(pos)])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, pos: Position) -> &mut Cell {
        let index = self.index(pos);
        &mut self.cells[index]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    /// Cell under world coordinates.
    pub fn find_cell(&self, world_x: i32, world_y: i32) -> Option<&Cell> {
        if world_x < 0 || world_y < 0 {
            return None;
        }
        self.cell(Position::new(world_x / self.cell_size, world_y / self.cell_size))
    }

    /// Neighbouring cell position; wraps horizontally, none past the top or floor.
    pub fn neighbor(&self, pos: Position, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.to_delta();
        let y = pos.y + dy;
        if y < 0 || y >= self.height {
            return None;
        }
        Some(Position::new((pos.x + dx).rem_euclid(self.width), y))
    }

    pub fn object_at(&self, pos: Position) -> Option<CellObject> {
        self.cell(pos).and_then(Cell::object)
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(Cell::is_empty)
    }

    pub fn add_object(&mut self, pos: Position, object: CellObject, absorption: i32) {
        debug_assert!(self.is_empty(pos), "cell {} is already occupied", pos);
        self.cell_mut(pos).occupant = Some(Occupant { object, absorption });
        match object {
            CellObject::Part { tree, part } => self.parts.add(pos, (tree, part)),
            CellObject::LightSource => self.light_sources.push_back(pos),
            CellObject::Seed(_) | CellObject::Probe => {}
        }
    }

    pub fn remove_object(&mut self, pos: Position) -> Option<Occupant> {
        if !self.in_bounds(pos) {
            return None;
        }
        let occupant = self.cell_mut(pos).occupant.take()?;
        match occupant.object {
            CellObject::Part { .. } => {
                self.parts.remove(pos);
            }
            CellObject::LightSource => self.light_sources.retain(|p| *p != pos),
            CellObject::Seed(_) | CellObject::Probe => {}
        }
        Some(occupant)
    }

    pub fn move_object(&mut self, from: Position, to: Position) {
        debug_assert!(self.is_empty(to), "cell {} is already occupied", to);
        if let Some(occupant) = self.remove_object(from) {
            self.add_object(to, occupant.object, occupant.absorption);
        }
    }

    pub fn set_absorption(&mut self, pos: Position, absorption: i32) {
        if let Some(occupant) = self.cell_mut(pos).occupant.as_mut() {
            occupant.absorption = absorption;
        }
    }

    pub fn light_sources(&self) -> impl Iterator<Item = Position> + '_ {
        self.light_sources.iter().copied()
    }

    /// Moves the oldest light source one cell to the right of the newest.
    /// Returns the new position and whatever had to leave the target cell.
    pub fn migrate_light_source(&mut self) -> Option<(Position, Option<Occupant>)> {
        let oldest = *self.light_sources.front()?;
        let newest = *self.light_sources.back()?;
        let target = self.neighbor(newest, Direction::Right)?;
        self.remove_object(oldest);
        let evicted = self.remove_object(target);
        self.add_object(target, CellObject::LightSource, 0);
        Some((target, evicted))
    }

    /// Tree part the chunk index holds for `pos`.
    pub fn indexed_part(&self, pos: Position) -> Option<(TreeKey, PartKey)> {
        self.parts.get(pos)
    }

    pub fn indexed_part_count(&self) -> usize {
        self.parts.len()
    }

    /// Tree parts stored in the index chunks crossed by the segment.
    pub fn find_under_line(&self, from: Position, to: Position) -> Vec<(TreeKey, PartKey)> {
        self.parts.find_under_line(from, to)
    }

    /// Light an object at `pos` can use: the best empty neighbour, weakened
    /// by direction, capped at the object's absorption.
    pub fn reachable_light(&self, pos: Position, absorption: i32) -> i32 {
        let best = Direction::ALL
            .iter()
            .filter_map(|dir| {
                let neighbor = self.cell(self.neighbor(pos, *dir)?)?;
                if neighbor.is_empty() {
                    Some(neighbor.sun_light() / LIGHT_MODS[dir.code()])
                } else {
                    None
                }
            })
            .max()
            .unwrap_or(0);
        best.min(absorption)
    }

    /// Recomputes the light of every cell from the light sources.
    pub fn update_sun_light(&mut self, distribution: &LightDistribution) {
        let decay = distribution.light_absorption();
        for cell in &mut self.cells {
            cell.light = 0;
        }

        let mut queue = VecDeque::new();
        let sources: Vec<Position> = self.light_sources.iter().copied().collect();
        for source in sources {
            let light = distribution.light(source.x, source.y).max(0);
            self.cell_mut(source).light = light;
            let hop = (light as f32 * decay) as i32;
            for dir in Direction::ALL {
                let Some(next) = self.neighbor(source, dir) else {
                    continue;
                };
                let cell = self.cell_mut(next);
                if !cell.holds_light_source() && cell.light < hop {
                    cell.light = hop;
                    queue.push_back(next);
                }
            }
        }

        while let Some(pos) = queue.pop_front() {
            let effective = self.cells[self.index(pos)].sun_light();
            let mut light = (effective as f32 * decay) as i32;
            if light == effective {
                light -= 1;
            }
            if light <= 0 {
                continue;
            }
            for dir in Direction::ALL {
                let Some(next) = self.neighbor(pos, dir) else {
                    continue;
                };
                let cell = self.cell_mut(next);
                if !cell.holds_light_source() && cell.light < light {
                    cell.light = light;
                    queue.push_back(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evotree_core::WorldParams;
    use proptest::prelude::*;
    use slotmap::SlotMap;

    fn distribution(width: i32, height: i32, sun_light: i32) -> LightDistribution {
        LightDistribution::from_params(&WorldParams {
            width,
            height,
            sun_light,
            light_absorption_step: 0,
            ..Default::default()
        })
        .unwrap()
    }

    fn lit_grid(width: i32, height: i32, sun_light: i32) -> CellGrid {
        let mut grid = CellGrid::new(width, height, 4, 4);
        for x in 0..width {
            grid.add_object(Position::new(x, height - 1), CellObject::LightSource, 0);
        }
        grid.update_sun_light(&distribution(width, height, sun_light));
        grid
    }

    #[test]
    fn test_neighbor_wraps_horizontally() {
        let grid = CellGrid::new(10, 5, 4, 4);
        let pos = Position::new(0, 0);
        assert_eq!(grid.neighbor(pos, Direction::Left), Some(Position::new(9, 0)));
        assert_eq!(grid.neighbor(pos, Direction::Down), None);
        assert_eq!(grid.neighbor(Position::new(3, 4), Direction::Up), None);
        assert_eq!(grid.neighbor(Position::new(9, 2), Direction::Right), Some(Position::new(0, 2)));
    }

    #[test]
    fn test_find_cell() {
        let grid = CellGrid::new(10, 5, 8, 4);
        assert_eq!(grid.find_cell(17, 9).map(Cell::position), Some(Position::new(2, 1)));
        assert!(grid.find_cell(80, 0).is_none());
        assert!(grid.find_cell(-1, 0).is_none());
    }

    #[test]
    fn test_add_move_remove() {
        let mut seeds: SlotMap<SeedKey, ()> = SlotMap::with_key();
        let seed = seeds.insert(());
        let mut grid = CellGrid::new(10, 5, 4, 4);
        let a = Position::new(2, 2);
        let b = Position::new(2, 1);

        grid.add_object(a, CellObject::Seed(seed), 1000);
        assert_eq!(grid.object_at(a), Some(CellObject::Seed(seed)));
        grid.move_object(a, b);
        assert!(grid.is_empty(a));
        assert_eq!(grid.cell(b).map(Cell::absorption), Some(1000));
        assert_eq!(grid.remove_object(b).map(|o| o.object), Some(CellObject::Seed(seed)));
        assert!(grid.is_empty(b));
    }

    #[test]
    fn test_parts_are_indexed() {
        let mut trees: SlotMap<TreeKey, ()> = SlotMap::with_key();
        let mut parts: SlotMap<PartKey, ()> = SlotMap::with_key();
        let tree = trees.insert(());
        let part = parts.insert(());
        let mut grid = CellGrid::new(16, 8, 4, 4);

        grid.add_object(Position::new(5, 1), CellObject::Part { tree, part }, 10);
        assert_eq!(
            grid.find_under_line(Position::new(0, 1), Position::new(8, 1)),
            vec![(tree, part)]
        );
        grid.move_object(Position::new(5, 1), Position::new(14, 6));
        assert!(grid.find_under_line(Position::new(0, 1), Position::new(8, 1)).is_empty());
        grid.remove_object(Position::new(14, 6));
        assert!(grid.find_under_line(Position::new(0, 6), Position::new(15, 6)).is_empty());
    }

    #[test]
    fn test_light_below_sources() {
        let grid = lit_grid(6, 4, 100);
        // source row keeps its own light, rows below decay by 0.9 per hop
        assert_eq!(grid.cell(Position::new(0, 3)).unwrap().raw_light(), 100);
        assert_eq!(grid.cell(Position::new(0, 2)).unwrap().sun_light(), 90);
        assert_eq!(grid.cell(Position::new(0, 1)).unwrap().sun_light(), 81);
        assert_eq!(grid.cell(Position::new(0, 0)).unwrap().sun_light(), 72);
    }

    #[test]
    fn test_occupant_shades_cells_below() {
        let mut trees: SlotMap<TreeKey, ()> = SlotMap::with_key();
        let mut parts: SlotMap<PartKey, ()> = SlotMap::with_key();
        let mut grid = CellGrid::new(1, 4, 4, 4);
        grid.add_object(Position::new(0, 3), CellObject::LightSource, 0);
        grid.add_object(
            Position::new(0, 2),
            CellObject::Part { tree: trees.insert(()), part: parts.insert(()) },
            50,
        );
        grid.update_sun_light(&distribution(1, 4, 100));

        let shaded = grid.cell(Position::new(0, 2)).unwrap();
        assert_eq!(shaded.raw_light(), 90);
        assert_eq!(shaded.sun_light(), 40);
        assert_eq!(grid.cell(Position::new(0, 1)).unwrap().raw_light(), 36);
    }

    #[test]
    fn test_reachable_light_uses_direction_mods() {
        let grid = lit_grid(6, 4, 100);
        // neighbours of (2, 1): up 90 / 1, sides 81 / 2, down 72 / 4
        assert_eq!(grid.reachable_light(Position::new(2, 1), 1000), 90);
        assert_eq!(grid.reachable_light(Position::new(2, 0), 1000), 81);
        assert_eq!(grid.reachable_light(Position::new(2, 1), 20), 20);
    }

    #[test]
    fn test_migrate_light_source_evicts_target() {
        let mut seeds: SlotMap<SeedKey, ()> = SlotMap::with_key();
        let seed = seeds.insert(());
        let mut grid = CellGrid::new(6, 4, 4, 4);
        for x in 0..3 {
            grid.add_object(Position::new(x, 3), CellObject::LightSource, 0);
        }
        grid.add_object(Position::new(3, 3), CellObject::Seed(seed), 1000);

        let (target, evicted) = grid.migrate_light_source().unwrap();
        assert_eq!(target, Position::new(3, 3));
        assert_eq!(evicted.map(|o| o.object), Some(CellObject::Seed(seed)));
        assert!(grid.is_empty(Position::new(0, 3)));
        let sources: Vec<_> = grid.light_sources().collect();
        assert_eq!(sources, vec![Position::new(1, 3), Position::new(2, 3), Position::new(3, 3)]);
    }

    #[test]
    fn test_migrate_single_source_wraps() {
        let mut grid = CellGrid::new(4, 2, 4, 4);
        grid.add_object(Position::new(3, 1), CellObject::LightSource, 0);
        let (target, evicted) = grid.migrate_light_source().unwrap();
        assert_eq!(target, Position::new(0, 1));
        assert!(evicted.is_none());
        assert_eq!(grid.light_sources().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_light_never_increases_away_from_sources(
            width in 2i32..12,
            height in 2i32..10,
            sun_light in 0i32..200,
            blockers in proptest::collection::vec((0i32..12, 0i32..10, 0i32..60), 0..20),
            sources in proptest::collection::vec(0i32..12, 1..6),
        ) {
            let mut seeds: SlotMap<SeedKey, ()> = SlotMap::with_key();
            let mut grid = CellGrid::new(width, height, 4, 4);
            for x in sources {
                let pos = Position::new(x % width, height - 1);
                if grid.is_empty(pos) {
                    grid.add_object(pos, CellObject::LightSource, 0);
                }
            }
            for (x, y, absorption) in blockers {
                let pos = Position::new(x % width, y % height);
                if grid.is_empty(pos) {
                    grid.add_object(pos, CellObject::Seed(seeds.insert(())), absorption);
                }
            }
            grid.update_sun_light(&distribution(width, height, sun_light));

            for cell in grid.cells() {
                prop_assert!(cell.sun_light() >= 0);
                if cell.holds_light_source() || cell.raw_light() == 0 {
                    continue;
                }
                // every lit cell got its light from a source or a brighter neighbour
                let fed = Direction::ALL.iter().any(|dir| {
                    grid.neighbor(cell.position(), *dir)
                        .and_then(|p| grid.cell(p))
                        .is_some_and(|n| n.holds_light_source() || n.sun_light() > cell.raw_light())
                });
                prop_assert!(fed);
            }
        }
    }
}
