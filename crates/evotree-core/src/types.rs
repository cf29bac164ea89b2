//! Core type definitions for the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D cell position. `y = 0` is the floor, `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Horizontal distance on a grid that wraps around at `width`.
    pub fn wrapped_dx(&self, other: &Position, width: i32) -> i32 {
        let dx = (self.x - other.x).rem_euclid(width);
        dx.min(width - dx)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four compass directions a tree part can branch into.
///
/// The discriminant is the direction code used by genes and by direction
/// bitmasks (bit `code` set means the direction is selected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn code(self) -> usize {
        self as usize
    }

    pub fn to_delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn mask(self) -> u8 {
        1 << self.code()
    }
}

/// Display colour of a tree, channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_dx() {
        let a = Position::new(1, 0);
        let b = Position::new(9, 0);
        assert_eq!(a.wrapped_dx(&b, 10), 2);
        assert_eq!(b.wrapped_dx(&a, 10), 2);
        assert_eq!(a.wrapped_dx(&Position::new(4, 3), 10), 3);
    }

    #[test]
    fn test_direction_delta() {
        assert_eq!(Direction::Up.to_delta(), (0, 1));
        assert_eq!(Direction::Down.to_delta(), (0, -1));
        assert_eq!(Direction::Right.to_delta(), (1, 0));
        assert_eq!(Direction::Left.to_delta(), (-1, 0));
    }

    #[test]
    fn test_direction_codes_and_masks() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.code(), i);
            assert_eq!(dir.mask(), 1 << i);
        }
    }
}
