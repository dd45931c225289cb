//! Lattice geometry: positions, directions, rotations and tile-space bounds.
//!
//! Every layout coordinate is an integer tile on a fixed lattice. `x` runs
//! east, `z` runs north and `y` is the level (one storey per step). Only the
//! world-space conversion knows about the physical tile size.
//!
//! | Axis | Positive direction |
//! |------|--------------------|
//! | x    | [`Cardinal::East`] |
//! | z    | [`Cardinal::North`] |
//! | y    | one level up       |

use crate::error::LayoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// World units covered by one lattice step.
pub const TILE_SIZE: f32 = 4.0;

/// Integer lattice coordinate of one grid cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Move `distance` unit steps along `direction` on the same level.
    pub fn offset(self, direction: impl Into<Direction>, distance: i32) -> Self {
        let (dx, dz) = direction.into().delta();
        Self {
            x: self.x + dx * distance,
            y: self.y,
            z: self.z + dz * distance,
        }
    }

    /// One step along a cardinal direction.
    pub fn step(self, facing: Cardinal) -> Self {
        self.offset(facing, 1)
    }

    /// Same column, `levels` storeys up (negative goes down).
    pub fn above(self, levels: i32) -> Self {
        Self {
            y: self.y + levels,
            ..self
        }
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    /// Center of the tile in world units.
    pub fn to_world(self) -> [f32; 3] {
        [
            self.x as f32 * TILE_SIZE,
            self.y as f32 * TILE_SIZE,
            self.z as f32 * TILE_SIZE,
        ]
    }

    /// Nearest lattice coordinate to a world-space point.
    pub fn from_world(point: [f32; 3]) -> Self {
        Self {
            x: (point[0] / TILE_SIZE).round() as i32,
            y: (point[1] / TILE_SIZE).round() as i32,
            z: (point[2] / TILE_SIZE).round() as i32,
        }
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ── Directions ──────────────────────────────────────────────────────────

/// One of the four faces of a cell. Doors and walls only ever use these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cardinal {
    North,
    East,
    South,
    West,
}

impl Cardinal {
    /// Clockwise order starting at north. Neighbor lists follow this order.
    pub const ALL: [Cardinal; 4] = [
        Cardinal::North,
        Cardinal::East,
        Cardinal::South,
        Cardinal::West,
    ];

    pub fn opposite(self) -> Self {
        self.rotate_cw().rotate_cw()
    }

    pub fn rotate_cw(self) -> Self {
        match self {
            Cardinal::North => Cardinal::East,
            Cardinal::East => Cardinal::South,
            Cardinal::South => Cardinal::West,
            Cardinal::West => Cardinal::North,
        }
    }

    pub fn rotated(self, rotation: Rotation) -> Self {
        (0..rotation.quarter_turns()).fold(self, |c, _| c.rotate_cw())
    }

    /// `(dx, dz)` of one step.
    pub fn delta(self) -> (i32, i32) {
        Direction::from(self).delta()
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// True for east/west, i.e. travel along the x axis.
    pub fn is_x_axis(self) -> bool {
        matches!(self, Cardinal::East | Cardinal::West)
    }
}

/// Eight-way direction used for neighbor lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// `(dx, dz)` of one step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }

    pub fn is_diagonal(self) -> bool {
        let (dx, dz) = self.delta();
        dx != 0 && dz != 0
    }
}

impl From<Cardinal> for Direction {
    fn from(c: Cardinal) -> Self {
        match c {
            Cardinal::North => Direction::North,
            Cardinal::East => Direction::East,
            Cardinal::South => Direction::South,
            Cardinal::West => Direction::West,
        }
    }
}

impl TryFrom<Direction> for Cardinal {
    type Error = LayoutError;

    fn try_from(d: Direction) -> Result<Self, Self::Error> {
        match d {
            Direction::North => Ok(Cardinal::North),
            Direction::East => Ok(Cardinal::East),
            Direction::South => Ok(Cardinal::South),
            Direction::West => Ok(Cardinal::West),
            other => Err(LayoutError::UnsupportedDirection(other)),
        }
    }
}

// ── Rotation ────────────────────────────────────────────────────────────

/// Clockwise quarter turns applied to a blueprint footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    pub fn degrees(self) -> u16 {
        self.quarter_turns() as u16 * 90
    }

    /// Rotation that turns a north-facing piece to face `facing`.
    pub fn facing(facing: Cardinal) -> Self {
        match facing {
            Cardinal::North => Rotation::R0,
            Cardinal::East => Rotation::R90,
            Cardinal::South => Rotation::R180,
            Cardinal::West => Rotation::R270,
        }
    }

    /// Footprint extent `(width, depth)` after rotating.
    pub fn extent(self, width: i32, depth: i32) -> (i32, i32) {
        if self.quarter_turns() % 2 == 0 {
            (width, depth)
        } else {
            (depth, width)
        }
    }

    /// Rotate a local tile `(x, z)` inside a `width × depth` footprint,
    /// keeping the result anchored at the footprint's min corner.
    pub fn apply(self, x: i32, z: i32, width: i32, depth: i32) -> (i32, i32) {
        let (mut x, mut z, mut w, mut d) = (x, z, width, depth);
        for _ in 0..self.quarter_turns() {
            // one clockwise turn seen from above: north edge becomes east edge
            let (nx, nz) = (z, w - 1 - x);
            x = nx;
            z = nz;
            std::mem::swap(&mut w, &mut d);
        }
        (x, z)
    }
}

// ── Bounds ──────────────────────────────────────────────────────────────

/// Axis-aligned box of whole tiles. `max` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min: Position,
    pub max: Position,
}

impl TileBounds {
    pub fn new(min: Position, width: i32, levels: i32, depth: i32) -> Self {
        Self {
            min,
            max: Position::new(min.x + width, min.y + levels, min.z + depth),
        }
    }

    /// Box covering exactly one tile.
    pub fn single(pos: Position) -> Self {
        Self::new(pos, 1, 1, 1)
    }

    /// Smallest box covering every position. `None` for an empty set.
    pub fn enclosing(positions: &[Position]) -> Option<Self> {
        let first = *positions.first()?;
        let (mut min, mut max) = (first, first);
        for p in positions {
            min = Position::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Position::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some(Self {
            min,
            max: max + Position::new(1, 1, 1),
        })
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn depth(&self) -> i32 {
        self.max.z - self.min.z
    }

    pub fn levels(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min.x
            && p.x < self.max.x
            && p.y >= self.min.y
            && p.y < self.max.y
            && p.z >= self.min.z
            && p.z < self.max.z
    }

    /// Geometric center in tile units.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min.x + self.max.x) as f32 / 2.0,
            (self.min.y + self.max.y) as f32 / 2.0,
            (self.min.z + self.max.z) as f32 / 2.0,
        ]
    }

    /// Overlap test with both boxes shrunk by `epsilon` on every side, so
    /// boxes that merely touch do not count.
    pub fn intersects(&self, other: &TileBounds, epsilon: f32) -> bool {
        let axis = |a_min: i32, a_max: i32, b_min: i32, b_max: i32| {
            (a_min as f32 + epsilon) < (b_max as f32 - epsilon)
                && (b_min as f32 + epsilon) < (a_max as f32 - epsilon)
        };
        axis(self.min.x, self.max.x, other.min.x, other.max.x)
            && axis(self.min.y, self.max.y, other.min.y, other.max.y)
            && axis(self.min.z, self.max.z, other.min.z, other.max.z)
    }

    /// Whether a point (tile units) lies inside the box shrunk by `epsilon`.
    pub fn contains_point(&self, point: [f32; 3], epsilon: f32) -> bool {
        let inside = |v: f32, lo: i32, hi: i32| v > lo as f32 + epsilon && v < hi as f32 - epsilon;
        inside(point[0], self.min.x, self.max.x)
            && inside(point[1], self.min.y, self.max.y)
            && inside(point[2], self.min.z, self.max.z)
    }

    /// Every tile inside the box, level by level.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.min.y..self.max.y).flat_map(move |y| {
            (self.min.x..self.max.x)
                .flat_map(move |x| (self.min.z..self.max.z).map(move |z| Position::new(x, y, z)))
        })
    }
}

/// Bounding-volume test used while placing rooms.
pub trait CollisionPredicate {
    /// True when `candidate` may not be placed next to `placed`.
    fn collides(&self, candidate: &TileBounds, placed: &TileBounds) -> bool;
}

/// Intersection or center containment with both boxes shrunk by `epsilon`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShrunkAabb {
    pub epsilon: f32,
}

impl Default for ShrunkAabb {
    fn default() -> Self {
        Self { epsilon: 0.1 }
    }
}

impl CollisionPredicate for ShrunkAabb {
    fn collides(&self, candidate: &TileBounds, placed: &TileBounds) -> bool {
        candidate.intersects(placed, self.epsilon)
            || candidate.contains_point(placed.center(), self.epsilon)
            || placed.contains_point(candidate.center(), self.epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_cardinals() {
        let p = Position::new(2, 0, 2);
        assert_eq!(p.step(Cardinal::North), Position::new(2, 0, 3));
        assert_eq!(p.step(Cardinal::East), Position::new(3, 0, 2));
        assert_eq!(p.offset(Cardinal::South, 3), Position::new(2, 0, -1));
        assert_eq!(p.offset(Direction::NorthWest, 2), Position::new(0, 0, 4));
    }

    #[test]
    fn test_opposite_and_rotation() {
        for c in Cardinal::ALL {
            assert_eq!(c.opposite().opposite(), c);
            assert_eq!(c.rotated(Rotation::R270).rotate_cw(), c);
        }
        assert_eq!(Cardinal::North.rotated(Rotation::R90), Cardinal::East);
        assert_eq!(Cardinal::West.rotated(Rotation::R180), Cardinal::East);
    }

    #[test]
    fn test_diagonal_is_not_cardinal() {
        assert!(Cardinal::try_from(Direction::NorthEast).is_err());
        assert_eq!(Cardinal::try_from(Direction::West).ok(), Some(Cardinal::West));
    }

    #[test]
    fn test_rotate_footprint_keeps_edges() {
        // 3 wide, 2 deep: the north edge tile (1, 1) should land on the east edge.
        let (x, z) = Rotation::R90.apply(1, 1, 3, 2);
        let (w, _) = Rotation::R90.extent(3, 2);
        assert_eq!(x, w - 1);
        assert!((0..3).contains(&z));
        assert_eq!(Rotation::R0.apply(1, 1, 3, 2), (1, 1));
        // four turns is the identity
        let mut xz = (2, 0);
        let (mut w, mut d) = (3, 2);
        for _ in 0..4 {
            xz = Rotation::R90.apply(xz.0, xz.1, w, d);
            std::mem::swap(&mut w, &mut d);
        }
        assert_eq!(xz, (2, 0));
    }

    #[test]
    fn test_touching_boxes_do_not_collide() {
        let a = TileBounds::new(Position::ORIGIN, 3, 1, 3);
        let b = TileBounds::new(Position::new(3, 0, 0), 2, 1, 2);
        let check = ShrunkAabb::default();
        assert!(!check.collides(&a, &b));
        let c = TileBounds::new(Position::new(2, 0, 1), 2, 1, 2);
        assert!(check.collides(&a, &c));
    }

    #[test]
    fn test_containment_counts_as_collision() {
        let outer = TileBounds::new(Position::ORIGIN, 5, 1, 5);
        let inner = TileBounds::new(Position::new(2, 0, 2), 1, 1, 1);
        assert!(ShrunkAabb::default().collides(&inner, &outer));
        assert!(ShrunkAabb::default().collides(&outer, &inner));
    }

    #[test]
    fn test_different_levels_do_not_collide() {
        let a = TileBounds::new(Position::ORIGIN, 2, 1, 2);
        let b = TileBounds::new(Position::new(0, 1, 0), 2, 1, 2);
        assert!(!ShrunkAabb::default().collides(&a, &b));
    }

    #[test]
    fn test_enclosing_and_positions() {
        let b = TileBounds::enclosing(&[Position::new(1, 0, 1), Position::new(2, 1, 3)]).unwrap();
        assert_eq!(b.width(), 2);
        assert_eq!(b.levels(), 2);
        assert_eq!(b.depth(), 3);
        assert_eq!(b.positions().count(), 12);
        assert!(TileBounds::enclosing(&[]).is_none());
    }

    #[test]
    fn test_world_round_trip() {
        let p = Position::new(-3, 1, 7);
        assert_eq!(Position::from_world(p.to_world()), p);
        assert_eq!(Position::from_world([5.1, 0.0, -1.9]), Position::new(1, 0, 0));
    }
}
