//! Sparse spatial index of claimed lattice cells.
//!
//! Only claimed cells are stored. Reading an unclaimed position yields a
//! default [`CellKind::Empty`] cell and never inserts anything, so
//! `len()` always equals the number of non-empty cells.
//!
//! The grid has a single writer: generation phases run one at a time and
//! pathfinding only ever borrows it immutably.

use crate::geometry::{Cardinal, Direction, Position, TileBounds, TILE_SIZE};
use hecs::Entity;
use std::collections::HashMap;

/// What occupies a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellKind {
    #[default]
    Empty,
    Room,
    Door,
    Hallway,
    Stairway,
}

impl CellKind {
    /// Hallway or stairway cells, i.e. anything a corridor piece owns.
    pub fn is_corridor(self) -> bool {
        matches!(self, CellKind::Hallway | CellKind::Stairway)
    }
}

/// Which of a cell's four faces render a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallVisibility([bool; 4]);

impl WallVisibility {
    pub const NONE: WallVisibility = WallVisibility([false; 4]);
    pub const ALL: WallVisibility = WallVisibility([true; 4]);

    pub fn get(&self, face: Cardinal) -> bool {
        self.0[face.index()]
    }

    pub fn set(&mut self, face: Cardinal, visible: bool) {
        self.0[face.index()] = visible;
    }

    pub fn visible_count(&self) -> usize {
        self.0.iter().filter(|v| **v).count()
    }
}

/// One lattice-aligned unit of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub position: Position,
    pub kind: CellKind,
    /// Weak handle to the owning piece; check liveness against the piece store.
    pub owner: Option<Entity>,
    pub walls: WallVisibility,
}

impl Cell {
    pub fn empty(position: Position) -> Self {
        Self {
            position,
            kind: CellKind::Empty,
            owner: None,
            walls: WallVisibility::NONE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == CellKind::Empty
    }

    pub fn is_door(&self) -> bool {
        self.kind == CellKind::Door
    }
}

/// Sparse map from lattice position to claimed cell.
#[derive(Debug, Default, Clone)]
pub struct Grid {
    cells: HashMap<Position, Cell>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell at `pos`, or a detached empty cell when unclaimed.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells.get(&pos).copied().unwrap_or_else(|| Cell::empty(pos))
    }

    /// Whether `pos` holds a stored (claimed) entry.
    pub fn contains(&self, pos: Position) -> bool {
        self.cells.contains_key(&pos)
    }

    /// Claim `pos`, overwriting any previous entry. Setting
    /// [`CellKind::Empty`] releases the cell instead.
    pub fn set(&mut self, pos: Position, kind: CellKind, owner: Option<Entity>) -> Cell {
        if kind == CellKind::Empty {
            self.cells.remove(&pos);
            return Cell::empty(pos);
        }
        let cell = Cell {
            position: pos,
            kind,
            owner,
            walls: WallVisibility::NONE,
        };
        self.cells.insert(pos, cell);
        cell
    }

    /// Change the kind of a claimed cell, keeping owner and walls.
    /// Returns false when `pos` is unclaimed.
    pub fn set_kind(&mut self, pos: Position, kind: CellKind) -> bool {
        if kind == CellKind::Empty {
            return self.clear(pos);
        }
        match self.cells.get_mut(&pos) {
            Some(cell) => {
                cell.kind = kind;
                true
            }
            None => false,
        }
    }

    pub fn set_owner(&mut self, pos: Position, owner: Entity) -> bool {
        match self.cells.get_mut(&pos) {
            Some(cell) => {
                cell.owner = Some(owner);
                true
            }
            None => false,
        }
    }

    /// Replace the wall visibility of a claimed cell.
    pub fn set_walls(&mut self, pos: Position, walls: WallVisibility) -> bool {
        match self.cells.get_mut(&pos) {
            Some(cell) => {
                cell.walls = walls;
                true
            }
            None => false,
        }
    }

    pub fn set_wall(&mut self, pos: Position, face: Cardinal, visible: bool) -> bool {
        match self.cells.get_mut(&pos) {
            Some(cell) => {
                cell.walls.set(face, visible);
                true
            }
            None => false,
        }
    }

    /// Release `pos`. Returns whether an entry existed.
    pub fn clear(&mut self, pos: Position) -> bool {
        self.cells.remove(&pos).is_some()
    }

    pub fn clear_all(&mut self) {
        self.cells.clear();
    }

    /// The cell `distance` steps away along `direction` on the same level.
    pub fn neighbor(&self, pos: Position, direction: impl Into<Direction>, distance: i32) -> Cell {
        self.get(pos.offset(direction, distance))
    }

    /// The four orthogonal neighbors in north, east, south, west order.
    pub fn neighbors(&self, pos: Position) -> [Cell; 4] {
        Cardinal::ALL.map(|c| self.get(pos.step(c)))
    }

    /// All eight neighbors on the same level, clockwise from north.
    pub fn surrounding(&self, pos: Position) -> [Cell; 8] {
        Direction::ALL.map(|d| self.get(pos.offset(d, 1)))
    }

    /// A position is valid for claiming when nothing occupies it.
    pub fn is_valid(&self, pos: Position) -> bool {
        !self.cells.contains_key(&pos)
    }

    /// Claim every tile of `bounds`. Returns the number of cells written.
    pub fn set_bounds(&mut self, bounds: &TileBounds, kind: CellKind, owner: Option<Entity>) -> usize {
        let mut written = 0;
        for pos in bounds.positions() {
            self.set(pos, kind, owner);
            written += 1;
        }
        written
    }

    /// Release every tile of `bounds`. Returns the number of cells removed.
    pub fn clear_bounds(&mut self, bounds: &TileBounds) -> usize {
        bounds.positions().filter(|p| self.clear(*p)).count()
    }

    /// Release every cell owned by `owner`.
    pub fn clear_owned(&mut self, owner: Entity) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, c| c.owner != Some(owner));
        before - self.cells.len()
    }

    /// Look up the cell under a world-space point. When the nearest tile is
    /// unclaimed, claimed same-level neighbors whose centers lie within
    /// `tolerance` world units are accepted too.
    pub fn find(&self, point: [f32; 3], tolerance: f32) -> Cell {
        let nearest = Position::from_world(point);
        let cell = self.get(nearest);
        if !cell.is_empty() {
            return cell;
        }
        let dist = |p: Position| {
            let w = p.to_world();
            ((w[0] - point[0]).powi(2) + (w[2] - point[2]).powi(2)).sqrt()
        };
        self.surrounding(nearest)
            .into_iter()
            .filter(|c| !c.is_empty() && dist(c.position) <= tolerance.min(TILE_SIZE))
            .min_by(|a, b| dist(a.position).total_cmp(&dist(b.position)))
            .unwrap_or(cell)
    }

    /// Number of claimed cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Positions owned by `owner`, sorted for deterministic iteration.
    pub fn owned_by(&self, owner: Entity) -> Vec<Position> {
        let mut out: Vec<Position> = self
            .cells
            .values()
            .filter(|c| c.owner == Some(owner))
            .map(|c| c.position)
            .collect();
        out.sort();
        out
    }
}
