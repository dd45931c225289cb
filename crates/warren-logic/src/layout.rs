//! The generated layout: grid, door registry, pieces and stair links.
//!
//! Generation phases borrow a [`Layout`] mutably; pathfinders borrow it
//! immutably, so queries can never overlap a generation pass.

use crate::error::LayoutError;
use crate::geometry::{Cardinal, Position};
use crate::grid::{CellKind, Grid};
use crate::pieces::{PieceKind, PieceStore};
use crate::registry::DoorRegistry;
use hecs::Entity;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct Layout {
    pub grid: Grid,
    pub registry: DoorRegistry,
    pub pieces: PieceStore,
    /// Stair entrance ↔ exit, both directions.
    stair_links: HashMap<Position, Position>,
    traps: HashSet<Position>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything. Grid, registry and piece store are empty afterwards.
    pub fn clear(&mut self) {
        self.grid.clear_all();
        self.registry.clear();
        self.pieces.clear();
        self.stair_links.clear();
        self.traps.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.registry.is_empty() && self.pieces.is_empty()
    }

    pub fn rooms(&self) -> Vec<Entity> {
        self.pieces.rooms()
    }

    pub fn corridors(&self) -> Vec<Entity> {
        self.pieces.pieces_of(PieceKind::Hallway)
    }

    /// Run the registry sweep if pieces were removed since the last one.
    pub fn sweep(&mut self) -> usize {
        self.registry.sweep_if_dirty(self.pieces.world())
    }

    // ── Stairs ──────────────────────────────────────────────────────────

    pub fn link_stair(&mut self, entrance: Position, exit: Position) {
        self.stair_links.insert(entrance, exit);
        self.stair_links.insert(exit, entrance);
    }

    /// The other end of a stair starting or ending at `pos`.
    pub fn stair_link(&self, pos: Position) -> Option<Position> {
        self.stair_links.get(&pos).copied()
    }

    pub fn stair_link_count(&self) -> usize {
        self.stair_links.len() / 2
    }

    pub fn mark_trap(&mut self, pos: Position) {
        self.traps.insert(pos);
    }

    pub fn is_trap(&self, pos: Position) -> bool {
        self.traps.contains(&pos)
    }

    pub fn trap_count(&self) -> usize {
        self.traps.len()
    }

    // ── Doors ───────────────────────────────────────────────────────────

    pub fn set_door_locked(&mut self, door: Entity, locked: bool) -> Result<(), LayoutError> {
        if self.registry.get(door).is_none() {
            return Err(LayoutError::UnknownDoor(door));
        }
        self.pieces.set_locked(door, locked)
    }

    /// Whether a walker may pass `door`. Unknown doors are impassable.
    pub fn is_passable(&self, door: Entity) -> bool {
        self.pieces.is_locked(door) == Some(false)
    }

    /// Turn every still-available door back into wall. Returns how many were capped.
    pub fn cap_open_doors(&mut self) -> Result<usize, LayoutError> {
        let open: Vec<_> = self.registry.available().into_iter().copied().collect();
        for pair in &open {
            self.pieces.remove_door(pair.door)?;
            self.registry.remove(pair.door);
            self.grid.set_wall(pair.anchor.cell, pair.anchor.facing, true);
        }
        if !open.is_empty() {
            log::debug!("capped {} open doors", open.len());
        }
        Ok(open.len())
    }

    /// Despawn a piece and release its cells. Door pairs pointing at it are
    /// reopened, pairs it owns are dropped, and the door cells left on the
    /// surviving side turn back into walled room or hallway cells. Removing
    /// a corridor also removes the stairs folded into it.
    pub fn remove_piece(&mut self, piece: Entity) -> Result<(), LayoutError> {
        let mut orphaned: Vec<(Position, Cardinal)> = Vec::new();
        for pair in self.registry.iter() {
            if pair.room_b == Some(piece) {
                orphaned.push((pair.cell_a(), pair.anchor.facing));
            } else if pair.room_a == piece {
                if let Some(b) = pair.room_b.filter(|b| *b != piece) {
                    if self.pieces.contains(b) {
                        orphaned.push((pair.anchor.outside(), pair.anchor.facing.opposite()));
                    }
                }
            }
        }
        let stairs: Vec<Entity> = self
            .pieces
            .pieces_of(PieceKind::Stair)
            .into_iter()
            .filter(|s| self.pieces.parent(*s) == Some(piece))
            .collect();

        self.pieces.remove_piece(piece)?;
        for stair in stairs {
            if let Some(segment) = self.pieces.stair(stair) {
                self.unlink_stair(segment.entrance, segment.exit);
                for cell in segment.cells() {
                    if self.grid.get(cell).owner.map_or(true, |o| o == stair) {
                        self.grid.clear(cell);
                    }
                }
            }
            self.pieces.remove_piece(stair)?;
        }
        self.grid.clear_owned(piece);
        let grid = &self.grid;
        self.traps.retain(|p| !grid.get(*p).is_empty());
        self.registry.mark_dirty();
        self.sweep();

        for (cell, facing) in orphaned {
            let here = self.grid.get(cell);
            if !here.is_door() {
                continue;
            }
            let kind = match here.owner.and_then(|o| self.pieces.kind(o)) {
                Some(PieceKind::Hallway) => CellKind::Hallway,
                _ => CellKind::Room,
            };
            self.grid.set_kind(cell, kind);
            self.grid.set_wall(cell, facing, true);
        }
        Ok(())
    }

    fn unlink_stair(&mut self, entrance: Position, exit: Position) {
        if self.stair_links.get(&entrance) == Some(&exit) {
            self.stair_links.remove(&entrance);
            self.stair_links.remove(&exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::{BlueprintFactory, PieceRequest, PieceShape};
    use crate::registry::DoorAnchor;

    fn spawn_cell_room(layout: &mut Layout, pos: Position) -> Entity {
        let request = PieceRequest {
            kind: PieceKind::Room,
            name: "tile".into(),
            shape: PieceShape::Cells(vec![pos]),
        };
        let construction = layout.pieces.begin_construction(&mut BlueprintFactory, &request);
        let (room, built) = pollster::block_on(construction.await_ready()).unwrap();
        layout.pieces.finish_construction(room, &built).unwrap();
        layout.grid.set(pos, CellKind::Room, Some(room));
        room
    }

    fn joined_pair() -> (Layout, Entity, Entity, Entity) {
        let mut layout = Layout::new();
        let a = spawn_cell_room(&mut layout, Position::ORIGIN);
        let b = spawn_cell_room(&mut layout, Position::new(1, 0, 0));
        let anchor = DoorAnchor {
            cell: Position::ORIGIN,
            facing: Cardinal::East,
        };
        let door = layout.pieces.spawn_door(a, anchor).unwrap();
        layout.registry.add(door, a, anchor, Some(b)).unwrap();
        layout.grid.set_kind(Position::ORIGIN, CellKind::Door);
        layout.grid.set_kind(Position::new(1, 0, 0), CellKind::Door);
        (layout, a, b, door)
    }

    #[test]
    fn test_clear_empties_everything() {
        let (mut layout, ..) = joined_pair();
        layout.link_stair(Position::ORIGIN, Position::new(3, 1, 0));
        assert!(!layout.is_empty());
        layout.clear();
        assert!(layout.is_empty());
        assert_eq!(layout.stair_link_count(), 0);
    }

    #[test]
    fn test_remove_piece_reopens_door() {
        let (mut layout, a, b, door) = joined_pair();
        layout.remove_piece(b).unwrap();
        assert!(layout.registry.get(door).unwrap().is_available());
        assert_eq!(layout.grid.get(Position::ORIGIN).kind, CellKind::Room);
        assert!(layout.grid.get(Position::new(1, 0, 0)).is_empty());
        assert_eq!(layout.rooms(), vec![a]);
    }

    #[test]
    fn test_remove_owner_drops_pair() {
        let (mut layout, a, _, door) = joined_pair();
        layout.remove_piece(a).unwrap();
        assert!(layout.registry.get(door).is_none());
    }

    #[test]
    fn test_remove_owner_walls_far_door_cell() {
        let (mut layout, a, b, _) = joined_pair();
        let far = Position::new(1, 0, 0);
        layout.remove_piece(a).unwrap();
        let cell = layout.grid.get(far);
        assert_eq!(cell.kind, CellKind::Room);
        assert_eq!(cell.owner, Some(b));
        assert!(cell.walls.get(Cardinal::West));
        assert!(layout.grid.get(Position::ORIGIN).is_empty());
        assert!(layout.registry.get_for_room(b).is_empty());
    }

    #[test]
    fn test_lock_and_cap() {
        let (mut layout, a, b, door) = joined_pair();
        assert!(layout.is_passable(door));
        layout.set_door_locked(door, true).unwrap();
        assert!(!layout.is_passable(door));

        let anchor = DoorAnchor {
            cell: Position::ORIGIN,
            facing: Cardinal::North,
        };
        let open = layout.pieces.spawn_door(a, anchor).unwrap();
        layout.registry.add(open, a, anchor, None).unwrap();
        assert_eq!(layout.cap_open_doors().unwrap(), 1);
        assert!(layout.registry.get(open).is_none());
        assert!(layout.grid.get(Position::ORIGIN).walls.get(Cardinal::North));
        assert_eq!(layout.registry.complete_for(b).len(), 1);
    }

    #[test]
    fn test_stair_links_are_symmetric() {
        let mut layout = Layout::new();
        let (lo, hi) = (Position::new(0, 0, 0), Position::new(3, 1, 0));
        layout.link_stair(lo, hi);
        assert_eq!(layout.stair_link(lo), Some(hi));
        assert_eq!(layout.stair_link(hi), Some(lo));
        assert_eq!(layout.stair_link(Position::new(1, 0, 0)), None);
    }
}
