//! Two-tier pathfinding over a generated [`Layout`].
//!
//! **Tier A** searches the room graph: rooms (and corridors) are nodes,
//! passable door pairs are edges. **Tier B** is a best-first cell search
//! ordered by Manhattan distance to the goal. [`Pathfinder::find_path`]
//! stitches them: Tier A picks the rooms, Tier B walks each room from door
//! to door.
//!
//! A cell search only leaves a piece through a door: both cells must be the
//! two door cells of one pair, and the door must be unlocked. Stair links
//! count as ordinary neighbors, and a room spanning several levels can be
//! climbed from the inside. Every search is capped by
//! [`PathfindingConfig::search_budget`], so disconnected layouts fail fast.

use crate::config::PathfindingConfig;
use crate::geometry::{Cardinal, Position};
use crate::grid::Cell;
use crate::layout::Layout;
use crate::pieces::PieceKind;
use crate::queue::PriorityQueue;
use hecs::Entity;
use std::collections::HashMap;

/// One Tier A step: cross `door` and enter `room`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub room: Entity,
    pub door: Entity,
}

/// A door crossing resolved for a walk starting in a known piece.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    near: Position,
    far: Position,
    room: Entity,
}

/// Read-only path queries. Borrowing the layout keeps generation out while
/// a pathfinder is alive.
pub struct Pathfinder<'a> {
    layout: &'a Layout,
    config: &'a PathfindingConfig,
    /// (door cell, door cell across) → door, both orders.
    crossings: HashMap<(Position, Position), Entity>,
}

impl<'a> Pathfinder<'a> {
    pub fn new(layout: &'a Layout, config: &'a PathfindingConfig) -> Self {
        let mut crossings = HashMap::new();
        for pair in layout.registry.iter() {
            if let Some(cell_b) = pair.cell_b() {
                crossings.insert((pair.cell_a(), cell_b), pair.door);
                crossings.insert((cell_b, pair.cell_a()), pair.door);
            }
        }
        Self {
            layout,
            config,
            crossings,
        }
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    /// Ordered cells from `start` to `end`, both included. `None` when
    /// either end is empty or no route exists.
    pub fn find_path(&self, start: Position, end: Position) -> Option<Vec<Cell>> {
        let grid = &self.layout.grid;
        let (first, last) = (grid.get(start), grid.get(end));
        if first.is_empty() || last.is_empty() {
            return None;
        }
        if start == end {
            return Some(vec![first]);
        }
        let (from, to) = (first.owner?, last.owner?);

        let snapped = if from != to && (self.is_corridor(from) || self.is_corridor(to)) {
            self.snapped_path(start, from, end, to)
        } else {
            None
        };
        let path = match snapped {
            Some(path) => path,
            None => self.stitch(start, from, end, to)?,
        };
        Some(path.into_iter().map(|p| grid.get(p)).collect())
    }

    // ── Tier A ──────────────────────────────────────────────────────────

    /// Rooms to walk through from `from` to `to`. Empty when they are the
    /// same room, `None` when every route is disconnected or locked.
    pub fn room_route(&self, from: Entity, to: Entity) -> Option<Vec<Hop>> {
        if from == to {
            return Some(Vec::new());
        }
        let direct = self
            .layout
            .registry
            .connections(from, to)
            .into_iter()
            .find(|p| self.layout.is_passable(p.door));
        if let Some(pair) = direct {
            return Some(vec![Hop {
                room: to,
                door: pair.door,
            }]);
        }
        let hops = self
            .layout
            .registry
            .find_path_filtered(from, to, |p| self.layout.is_passable(p.door))?;
        Some(
            hops.into_iter()
                .map(|(room, door)| Hop { room, door })
                .collect(),
        )
    }

    // ── Tier B ──────────────────────────────────────────────────────────

    /// Best-first cell search. With `scope` set the search never leaves that
    /// piece; without it, it may cross unlocked doors.
    pub fn cell_path(&self, start: Position, end: Position, scope: Option<Entity>) -> Option<Vec<Position>> {
        let grid = &self.layout.grid;
        if grid.get(start).is_empty() || grid.get(end).is_empty() {
            return None;
        }
        if start == end {
            return Some(vec![start]);
        }

        let budget = self.config.search_budget(start.manhattan(end));
        let mut frontier = PriorityQueue::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        frontier.enqueue(start, start.manhattan(end));
        let mut expanded = 0;

        while let Some((current, _)) = frontier.dequeue_min() {
            if current == end {
                let mut path = vec![end];
                let mut pos = end;
                while let Some(&prev) = came_from.get(&pos) {
                    path.push(prev);
                    pos = prev;
                }
                path.reverse();
                return Some(path);
            }
            expanded += 1;
            if expanded > budget {
                log::debug!("cell search {} → {} ran out of budget ({})", start, end, budget);
                return None;
            }
            for next in self.successors(current, scope) {
                if next == start || came_from.contains_key(&next) {
                    continue;
                }
                came_from.insert(next, current);
                frontier.enqueue(next, next.manhattan(end));
            }
        }
        None
    }

    /// Admissible neighbors of `pos`: the four orthogonal cells, the other
    /// end of a stair, and the cells above and below inside a room.
    pub(crate) fn successors(&self, pos: Position, scope: Option<Entity>) -> Vec<Position> {
        let here = self.layout.grid.get(pos);
        let in_room = here
            .owner
            .is_some_and(|o| self.layout.pieces.kind(o) == Some(PieceKind::Room));
        let vertical = in_room.then(|| [pos.above(1), pos.above(-1)]);
        Cardinal::ALL
            .iter()
            .map(|c| pos.step(*c))
            .chain(self.layout.stair_link(pos))
            .chain(vertical.into_iter().flatten())
            .filter(|next| self.admissible(&here, *next, scope))
            .collect()
    }

    fn admissible(&self, here: &Cell, next: Position, scope: Option<Entity>) -> bool {
        let cell = self.layout.grid.get(next);
        if cell.is_empty() || self.is_landlocked(next) {
            return false;
        }
        if cell.owner == here.owner {
            return scope.map_or(true, |s| cell.owner == Some(s));
        }
        if scope.is_some() || !here.is_door() || !cell.is_door() {
            return false;
        }
        self.crossings
            .get(&(here.position, next))
            .is_some_and(|door| self.layout.is_passable(*door))
    }

    /// A cell with nothing around it cannot be part of a walk.
    fn is_landlocked(&self, pos: Position) -> bool {
        self.layout.grid.neighbors(pos).iter().all(|c| c.is_empty())
    }

    // ── Stitching ───────────────────────────────────────────────────────

    /// Tier A for the rooms, Tier B inside each of them.
    fn stitch(&self, start: Position, from: Entity, end: Position, to: Entity) -> Option<Vec<Position>> {
        let hops = self.room_route(from, to)?;
        let mut path = vec![start];
        let mut current = start;
        let mut room = from;
        for hop in hops {
            let pair = self.layout.registry.get(hop.door)?;
            let near = pair.cell_in(room)?;
            let far = pair.cell_in(hop.room)?;
            path.extend(self.cell_path(current, near, Some(room))?.into_iter().skip(1));
            path.push(far);
            current = far;
            room = hop.room;
        }
        path.extend(self.cell_path(current, end, Some(room))?.into_iter().skip(1));
        Some(path)
    }

    /// Route with corridor ends first walked to their best door.
    fn snapped_path(&self, start: Position, from: Entity, end: Position, to: Entity) -> Option<Vec<Position>> {
        let mut head = vec![start];
        let (mut entry, mut entry_room) = (start, from);
        if self.is_corridor(from) {
            let crossing = self.snap(from, start, end)?;
            head = self.cell_path(start, crossing.near, Some(from))?;
            head.push(crossing.far);
            entry = crossing.far;
            entry_room = crossing.room;
        }

        let mut tail = Vec::new();
        let (mut exit, mut exit_room) = (end, to);
        if self.is_corridor(to) {
            let crossing = self.snap(to, end, start)?;
            tail = self.cell_path(crossing.near, end, Some(to))?;
            exit = crossing.far;
            exit_room = crossing.room;
        }

        let middle = self.stitch(entry, entry_room, exit, exit_room)?;
        head.extend(middle.into_iter().skip(1));
        head.extend(tail);
        Some(head)
    }

    /// The unlocked door of `corridor` that is nearest to `pos`, counting
    /// the distance left from the room behind it to `goal`.
    fn snap(&self, corridor: Entity, pos: Position, goal: Position) -> Option<Crossing> {
        self.layout
            .registry
            .complete_for(corridor)
            .into_iter()
            .filter(|p| self.layout.is_passable(p.door))
            .filter_map(|p| {
                Some(Crossing {
                    near: p.cell_in(corridor)?,
                    far: p.cell_in(p.other_room(corridor)?)?,
                    room: p.other_room(corridor)?,
                })
            })
            .min_by_key(|c| pos.manhattan(c.near) + c.far.manhattan(goal))
    }

    fn is_corridor(&self, piece: Entity) -> bool {
        self.layout.pieces.kind(piece) == Some(PieceKind::Hallway)
    }
}
