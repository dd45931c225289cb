//! Door connection registry.
//!
//! Every door is recorded as exactly one [`DoorPair`]: the room it belongs
//! to, and the room on the other side once something has been attached.
//! The complete pairs form the room adjacency graph that Tier A
//! pathfinding searches.
//!
//! Pieces can be despawned underneath the registry (corridor merging,
//! capping, external removal). Rather than fixing every call site,
//! [`DoorRegistry::sweep`] drops pairs whose door or owning room no longer
//! exists in the piece world.

use crate::error::LayoutError;
use crate::geometry::{Cardinal, Position};
use hecs::{Entity, World};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Where a door sits: the cell inside its owning room and the face it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorAnchor {
    pub cell: Position,
    pub facing: Cardinal,
}

impl DoorAnchor {
    /// The cell just outside the door.
    pub fn outside(&self) -> Position {
        self.cell.step(self.facing)
    }
}

/// One edge of the room adjacency graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorPair {
    pub door: Entity,
    pub room_a: Entity,
    /// `None` while the door is still available.
    pub room_b: Option<Entity>,
    /// Door cell inside room A and the face it opens towards room B.
    pub anchor: DoorAnchor,
}

impl DoorPair {
    pub fn is_available(&self) -> bool {
        self.room_b.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.room_b.is_some()
    }

    pub fn involves(&self, room: Entity) -> bool {
        self.room_a == room || self.room_b == Some(room)
    }

    /// The room across the door from `room`.
    pub fn other_room(&self, room: Entity) -> Option<Entity> {
        if self.room_a == room {
            self.room_b
        } else if self.room_b == Some(room) {
            Some(self.room_a)
        } else {
            None
        }
    }

    /// Door cell inside room A.
    pub fn cell_a(&self) -> Position {
        self.anchor.cell
    }

    /// Door cell inside room B: the tile across the door.
    pub fn cell_b(&self) -> Option<Position> {
        self.room_b.map(|_| self.anchor.outside())
    }

    /// The door's cell on `room`'s side.
    pub fn cell_in(&self, room: Entity) -> Option<Position> {
        if self.room_a == room {
            Some(self.cell_a())
        } else if self.room_b == Some(room) {
            self.cell_b()
        } else {
            None
        }
    }
}

/// Ledger of every door and the rooms it joins.
#[derive(Debug, Default)]
pub struct DoorRegistry {
    /// Ordered by handle so iteration, and therefore generation, is deterministic.
    pairs: BTreeMap<Entity, DoorPair>,
    dirty: bool,
}

impl DoorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a door. Fails if the door is already known.
    pub fn add(
        &mut self,
        door: Entity,
        room_a: Entity,
        anchor: DoorAnchor,
        room_b: Option<Entity>,
    ) -> Result<&DoorPair, LayoutError> {
        if self.pairs.contains_key(&door) {
            return Err(LayoutError::DuplicateDoor(door));
        }
        let pair = self.pairs.entry(door).or_insert(DoorPair {
            door,
            room_a,
            room_b,
            anchor,
        });
        Ok(pair)
    }

    pub fn get(&self, door: Entity) -> Option<&DoorPair> {
        self.pairs.get(&door)
    }

    /// Every pair touching `room`, on either side.
    pub fn get_for_room(&self, room: Entity) -> Vec<&DoorPair> {
        self.pairs.values().filter(|p| p.involves(room)).collect()
    }

    pub fn available(&self) -> Vec<&DoorPair> {
        self.pairs.values().filter(|p| p.is_available()).collect()
    }

    pub fn available_for(&self, room: Entity) -> Vec<&DoorPair> {
        self.pairs
            .values()
            .filter(|p| p.is_available() && p.room_a == room)
            .collect()
    }

    pub fn complete_for(&self, room: Entity) -> Vec<&DoorPair> {
        self.pairs
            .values()
            .filter(|p| p.is_complete() && p.involves(room))
            .collect()
    }

    /// Complete pairs directly joining `a` and `b`.
    pub fn connections(&self, a: Entity, b: Entity) -> Vec<&DoorPair> {
        self.pairs
            .values()
            .filter(|p| p.other_room(a) == Some(b))
            .collect()
    }

    /// Attach `room_b` to the far side of `door`. Setting the same room
    /// again is a no-op.
    pub fn set_connection(&mut self, door: Entity, room_b: Entity) -> Result<(), LayoutError> {
        let pair = self
            .pairs
            .get_mut(&door)
            .ok_or(LayoutError::UnknownDoor(door))?;
        pair.room_b = Some(room_b);
        Ok(())
    }

    pub fn remove(&mut self, door: Entity) -> Option<DoorPair> {
        self.pairs.remove(&door)
    }

    /// The pair whose door cell, on either side, is `cell`.
    pub fn door_at(&self, cell: Position) -> Option<&DoorPair> {
        self.pairs
            .values()
            .find(|p| p.cell_a() == cell || p.cell_b() == Some(cell))
    }

    pub fn other_room(&self, door: Entity, room: Entity) -> Option<Entity> {
        self.pairs.get(&door).and_then(|p| p.other_room(room))
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DoorPair> {
        self.pairs.values()
    }

    // ── Consistency sweep ───────────────────────────────────────────────

    /// Flag that pieces were despawned and a sweep is due.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_sweep(&self) -> bool {
        self.dirty
    }

    /// Drop pairs whose door or room A no longer exists, and release the far
    /// side of pairs whose room B is gone. Returns the number of pairs dropped.
    pub fn sweep(&mut self, world: &World) -> usize {
        let before = self.pairs.len();
        self.pairs
            .retain(|_, p| world.contains(p.door) && world.contains(p.room_a));
        for pair in self.pairs.values_mut() {
            if pair.room_b.is_some_and(|b| !world.contains(b)) {
                pair.room_b = None;
            }
        }
        self.dirty = false;
        let dropped = before - self.pairs.len();
        if dropped > 0 {
            log::debug!("registry sweep dropped {} dangling door pairs", dropped);
        }
        dropped
    }

    /// Sweep only when something was despawned since the last sweep.
    pub fn sweep_if_dirty(&mut self, world: &World) -> usize {
        if self.dirty {
            self.sweep(world)
        } else {
            0
        }
    }

    // ── Room graph search ───────────────────────────────────────────────

    /// Shortest hop list from `from` to `to` as `(room entered, door crossed)`.
    /// Empty when `from == to`, `None` when disconnected.
    pub fn find_path(&self, from: Entity, to: Entity) -> Option<Vec<(Entity, Entity)>> {
        self.find_path_filtered(from, to, |_| true)
    }

    /// Like [`find_path`](Self::find_path) but only crossing doors accepted by `allow`.
    pub fn find_path_filtered(
        &self,
        from: Entity,
        to: Entity,
        allow: impl Fn(&DoorPair) -> bool,
    ) -> Option<Vec<(Entity, Entity)>> {
        if from == to {
            return Some(vec![]);
        }

        // room → [(neighbor room, door)] in door order
        let mut adj: HashMap<Entity, Vec<(Entity, Entity)>> = HashMap::new();
        for pair in self.pairs.values().filter(|p| allow(p)) {
            if let Some(b) = pair.room_b {
                adj.entry(pair.room_a).or_default().push((b, pair.door));
                adj.entry(b).or_default().push((pair.room_a, pair.door));
            }
        }

        let mut visited = HashSet::new();
        let mut came_from: HashMap<Entity, (Entity, Entity)> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut hops = Vec::new();
                let mut room = to;
                while let Some(&(prev, door)) = came_from.get(&room) {
                    hops.push((room, door));
                    room = prev;
                }
                hops.reverse();
                return Some(hops);
            }
            for &(next, door) in adj.get(&current).map(|v| v.as_slice()).unwrap_or(&[]) {
                if visited.insert(next) {
                    came_from.insert(next, (current, door));
                    queue.push_back(next);
                }
            }
        }

        None
    }
}
