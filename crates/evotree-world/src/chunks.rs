//! Chunked spatial index over grid positions.
//!
//! The grid is cut into square chunks; a query returns every item stored in
//! a chunk the query touches, so callers filter the exact hits themselves.

use evotree_core::Position;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct ChunkIndex<T> {
    width: i32,
    height: i32,
    chunk_size: i32,
    columns: i32,
    chunks: Vec<BTreeMap<Position, T>>,
    len: usize,
}

impl<T: Copy> ChunkIndex<T> {
    pub fn new(width: i32, height: i32, chunk_size: i32) -> Self {
        let chunk_size = chunk_size.max(1);
        let columns = (width + chunk_size - 1) / chunk_size;
        let rows = (height + chunk_size - 1) / chunk_size;
        Self {
            width,
            height,
            chunk_size,
            columns,
            chunks: vec![BTreeMap::new(); (columns * rows).max(0) as usize],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunk holding `pos`; `x` wraps around, `y` outside the grid has none.
    fn chunk_of(&self, pos: Position) -> Option<usize> {
        if pos.y < 0 || pos.y >= self.height {
            return None;
        }
        let x = pos.x.rem_euclid(self.width);
        let column = x / self.chunk_size;
        let row = pos.y / self.chunk_size;
        Some((row * self.columns + column) as usize)
    }

    pub fn add(&mut self, pos: Position, item: T) {
        if let Some(chunk) = self.chunk_of(pos) {
            if self.chunks[chunk].insert(pos, item).is_none() {
                self.len += 1;
            }
        }
    }

    pub fn remove(&mut self, pos: Position) -> Option<T> {
        let chunk = self.chunk_of(pos)?;
        let removed = self.chunks[chunk].remove(&pos);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn get(&self, pos: Position) -> Option<T> {
        let chunk = self.chunk_of(pos)?;
        self.chunks[chunk].get(&pos).copied()
    }

    /// Items in every chunk crossed by the segment `from`-`to`. Coordinates
    /// may lie outside the grid horizontally; rows outside it are skipped.
    pub fn find_under_line(&self, from: Position, to: Position) -> Vec<T> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs());

        let mut seen = BTreeSet::new();
        let mut touched = Vec::new();
        for i in 0..=steps {
            let pos = if steps == 0 {
                from
            } else {
                Position::new(from.x + dx * i / steps, from.y + dy * i / steps)
            };
            if let Some(chunk) = self.chunk_of(pos) {
                if seen.insert(chunk) {
                    touched.push(chunk);
                }
            }
        }

        touched
            .into_iter()
            .flat_map(|chunk| self.chunks[chunk].values().copied())
            .collect()
    }
}
