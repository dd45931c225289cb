//! Corridor routing: join the doors left open after room placement.
//!
//! Routing works on transient maps and only turns them into pieces at the
//! end:
//!
//! 1. **Roots**: one hallway map just outside every available door.
//! 2. **Connections**: every root pair within `max_connection_distance` is
//!    joined by a straight path, one axis then the other. A height
//!    difference is bridged with one-level stairs spliced into the path.
//! 3. **Alleys**: short random dead ends grown from some hallway cells.
//! 4. **Walls**: fully enclosed cells are pruned until nothing changes, then
//!    a face is visible wherever the neighbor is empty.
//! 5. **Traps**: a share of the remaining cells is flagged as traps.
//! 6. **Commit**: stairs are built first, then each connected group of
//!    hallway and stair cells becomes one corridor piece, and every root's
//!    door is connected to that corridor in the registry.
//!
//! An unconnectable pair (too far apart, no room for stairs) is skipped.
//! Leftover doors are not repaired here.

use crate::config::CorridorConfig;
use crate::error::LayoutError;
use crate::geometry::{Cardinal, Position};
use crate::grid::{CellKind, WallVisibility};
use crate::layout::Layout;
use crate::pieces::{PieceFactory, PieceKind, PieceRequest, PieceShape, StairSegment};
use hecs::Entity;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Working record for one hallway cell before commit.
#[derive(Debug, Clone, PartialEq)]
pub struct HallwayMap {
    pub position: Position,
    pub is_root: bool,
    pub is_trap: bool,
    pub walls: WallVisibility,
    /// Doors this root sits in front of.
    pub doors: Vec<Entity>,
}

impl HallwayMap {
    fn new(position: Position) -> Self {
        Self {
            position,
            is_root: false,
            is_trap: false,
            walls: WallVisibility::NONE,
            doors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CorridorStats {
    pub roots: usize,
    /// Pairs joined by an unbroken run of hallway cells.
    pub connections: usize,
    /// Pairs whose straight run was cut by occupied cells.
    pub blocked: usize,
    /// Pairs further apart than the connection limit.
    pub out_of_range: usize,
    /// Pairs with a height difference no stairs could bridge.
    pub abandoned: usize,
    pub stairs: usize,
    pub alley_cells: usize,
    pub pruned: usize,
    pub traps: usize,
    pub hallway_cells: usize,
    pub corridors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Z,
}

impl Axis {
    fn coord(self, p: Position) -> i32 {
        match self {
            Axis::X => p.x,
            Axis::Z => p.z,
        }
    }

    /// Direction of travel from `from` to `to` along this axis.
    fn toward(self, from: Position, to: Position) -> Option<Cardinal> {
        match (self, (self.coord(to) - self.coord(from)).signum()) {
            (Axis::X, 1) => Some(Cardinal::East),
            (Axis::X, -1) => Some(Cardinal::West),
            (Axis::Z, 1) => Some(Cardinal::North),
            (Axis::Z, -1) => Some(Cardinal::South),
            _ => None,
        }
    }

    /// Whether `p` still lies before `to` when travelling along `dir`.
    fn before(self, p: Position, to: Position, dir: Cardinal) -> bool {
        let step = match dir {
            Cardinal::East | Cardinal::North => 1,
            Cardinal::West | Cardinal::South => -1,
        };
        (self.coord(to) - self.coord(p)) * step > 0
    }
}

/// Routes corridors through a [`Layout`] whose rooms are final.
pub struct CorridorRouter<'a, F, R> {
    layout: &'a mut Layout,
    factory: &'a mut F,
    rng: &'a mut R,
    config: &'a CorridorConfig,
    maps: BTreeMap<Position, HallwayMap>,
    roots: Vec<Position>,
    stairs: Vec<StairSegment>,
    stats: CorridorStats,
}

impl<'a, F: PieceFactory, R: Rng> CorridorRouter<'a, F, R> {
    pub fn new(
        layout: &'a mut Layout,
        factory: &'a mut F,
        rng: &'a mut R,
        config: &'a CorridorConfig,
    ) -> Self {
        Self {
            layout,
            factory,
            rng,
            config,
            maps: BTreeMap::new(),
            roots: Vec::new(),
            stairs: Vec::new(),
            stats: CorridorStats::default(),
        }
    }

    pub async fn run(mut self) -> Result<CorridorStats, LayoutError> {
        self.layout.sweep();
        self.create_roots();
        self.connect_roots();
        self.drop_broken_stairs();
        self.grow_alleys();
        self.resolve_walls();
        self.place_traps();
        self.commit().await?;
        log::info!(
            "routed {} corridors: {} roots, {} connections ({} blocked, {} out of range, {} abandoned), {} stairs, {} cells",
            self.stats.corridors,
            self.stats.roots,
            self.stats.connections,
            self.stats.blocked,
            self.stats.out_of_range,
            self.stats.abandoned,
            self.stats.stairs,
            self.stats.hallway_cells
        );
        Ok(self.stats)
    }

    /// Claim `pos` as a hallway cell. False when it is already occupied.
    fn create_map(&mut self, pos: Position) -> bool {
        if !self.layout.grid.is_valid(pos) {
            return false;
        }
        self.layout.grid.set(pos, CellKind::Hallway, None);
        self.maps.insert(pos, HallwayMap::new(pos));
        true
    }

    // ── 1. Roots ────────────────────────────────────────────────────────

    fn create_roots(&mut self) {
        let open: Vec<_> = self.layout.registry.available().into_iter().copied().collect();
        for pair in open {
            let anchor = pair.anchor.outside();
            let shared = self.maps.get(&anchor).is_some_and(|m| m.is_root);
            if !shared && !self.create_map(anchor) {
                log::warn!("door at {} is blocked, no root", pair.anchor.cell);
                continue;
            }
            if let Some(map) = self.maps.get_mut(&anchor) {
                map.is_root = true;
                map.doors.push(pair.door);
            }
            if !shared {
                self.roots.push(anchor);
            }
        }
        self.stats.roots = self.roots.len();
    }

    // ── 2. Connections ──────────────────────────────────────────────────

    fn connect_roots(&mut self) {
        let roots = self.roots.clone();
        for i in 0..roots.len() {
            for j in ((i + 1)..roots.len()).rev() {
                self.connect(roots[i], roots[j]);
            }
        }
    }

    fn connect(&mut self, a: Position, b: Position) {
        if a.manhattan(b) > self.config.max_connection_distance {
            self.stats.out_of_range += 1;
            return;
        }
        let climb = b.y - a.y;
        if climb.abs() > self.config.max_stair_steps {
            log::warn!("{} → {} needs {} levels of stairs", a, b, climb.abs());
            self.stats.abandoned += 1;
            return;
        }

        // Take X first when its first step is open, otherwise Z first.
        let x_first = match Axis::X.toward(a, b) {
            Some(dir) => a.z == b.z || self.layout.grid.is_valid(a.step(dir)),
            None => false,
        };
        let legs = if x_first {
            [Axis::X, Axis::Z]
        } else {
            [Axis::Z, Axis::X]
        };

        let stairs = if climb == 0 {
            Vec::new()
        } else {
            match self.plan_stairs(a, b, legs, climb) {
                Some(stairs) => stairs,
                None => {
                    log::warn!("no stair opening between {} and {}", a, b);
                    self.stats.abandoned += 1;
                    return;
                }
            }
        };

        let mut curr = a;
        let mut blocked = 0;
        for axis in legs {
            let Some(dir) = axis.toward(curr, b) else {
                continue;
            };
            while axis.before(curr, b, dir) {
                if let Some(stair) = stairs.iter().find(|s| s.entrance == curr) {
                    curr = stair.exit;
                } else {
                    curr = curr.step(dir);
                }
                if !self.create_map(curr) && !self.layout.grid.get(curr).kind.is_corridor() {
                    blocked += 1;
                }
            }
        }
        self.stairs.extend(stairs);
        if blocked > 0 {
            log::debug!("{} → {} runs through {} occupied cells", a, b, blocked);
            self.stats.blocked += 1;
        } else {
            self.stats.connections += 1;
        }
    }

    /// Walk the legs as the path will and reserve one stair per level of
    /// `climb`. Nothing stays reserved when the walk runs out of openings.
    fn plan_stairs(
        &mut self,
        a: Position,
        b: Position,
        legs: [Axis; 2],
        climb: i32,
    ) -> Option<Vec<StairSegment>> {
        let sign = climb.signum();
        let mut remaining = climb.abs();
        let mut found = Vec::new();
        let mut curr = a;
        let mut spacing = false;

        for axis in legs {
            let Some(dir) = axis.toward(curr, b) else {
                continue;
            };
            while remaining > 0 && axis.before(curr, b, dir) {
                curr = curr.step(dir);
                if spacing {
                    // leave one flat cell between consecutive stairs
                    spacing = false;
                    continue;
                }
                // the exit must not land beyond the target
                if axis.before(b, curr.offset(dir, 2), dir) {
                    continue;
                }
                if let Some(stair) = self.vertical_opening(curr, dir, sign) {
                    for cell in stair.cells() {
                        self.layout.grid.set(cell, CellKind::Stairway, None);
                    }
                    curr = stair.exit;
                    found.push(stair);
                    remaining -= 1;
                    spacing = true;
                }
            }
        }

        if remaining > 0 {
            for stair in &found {
                for cell in stair.cells() {
                    self.layout.grid.clear(cell);
                }
            }
            return None;
        }
        Some(found)
    }

    /// A stair starting at `pos` and running along `dir` needs `pos` and the
    /// next cell free on both the current level and the level it moves to.
    fn vertical_opening(&self, pos: Position, dir: Cardinal, sign: i32) -> Option<StairSegment> {
        let grid = &self.layout.grid;
        let next = pos.step(dir);
        let footprint = [pos, next, pos.above(sign), next.above(sign)];
        if !footprint.iter().all(|p| grid.is_valid(*p)) {
            return None;
        }
        let entrance = pos.step(dir.opposite());
        let exit = next.step(dir).above(sign);
        let passable = |p: Position| grid.is_valid(p) || grid.get(p).kind == CellKind::Hallway;
        if !passable(entrance) || !passable(exit) {
            return None;
        }
        let (treads, headroom) = if sign > 0 {
            ([pos, next], [pos.above(1), next.above(1)])
        } else {
            ([pos.above(-1), next.above(-1)], [pos, next])
        };
        Some(StairSegment {
            treads,
            headroom,
            entrance,
            exit,
            travel: dir,
        })
    }

    /// Stairs whose entrance or exit did not end up as a hallway cell lead
    /// nowhere; release them.
    fn drop_broken_stairs(&mut self) {
        let stairs = std::mem::take(&mut self.stairs);
        for stair in stairs {
            let ok = self.maps.contains_key(&stair.entrance) && self.maps.contains_key(&stair.exit);
            if ok {
                self.stairs.push(stair);
            } else {
                log::debug!("dropping stair {} → {}", stair.entrance, stair.exit);
                for cell in stair.cells() {
                    self.layout.grid.clear(cell);
                }
            }
        }
        self.stats.stairs = self.stairs.len();
    }

    // ── 3. Alleys ───────────────────────────────────────────────────────

    fn grow_alleys(&mut self) {
        let (lo, hi) = (
            self.config.alley_min_len,
            self.config.alley_max_len.max(self.config.alley_min_len),
        );
        let seeds: Vec<Position> = self.maps.keys().copied().collect();
        for seed in seeds {
            if self.rng.gen::<f64>() >= self.config.alley_chance {
                continue;
            }
            let length = self.rng.gen_range(lo..=hi);
            let mut curr = seed;
            for _ in 0..length {
                let open: Vec<Cardinal> = Cardinal::ALL
                    .into_iter()
                    .filter(|c| self.layout.grid.is_valid(curr.step(*c)))
                    .collect();
                let Some(&dir) = open.choose(&mut *self.rng) else {
                    break;
                };
                curr = curr.step(dir);
                self.create_map(curr);
                self.stats.alley_cells += 1;
            }
        }
    }

    // ── 4. Walls ────────────────────────────────────────────────────────

    fn resolve_walls(&mut self) {
        let anchored: HashSet<Position> = self
            .stairs
            .iter()
            .flat_map(|s| [s.entrance, s.exit])
            .collect();
        loop {
            let mut removed = false;
            let candidates: Vec<Position> = self
                .maps
                .values()
                .filter(|m| !m.is_root && !anchored.contains(&m.position))
                .map(|m| m.position)
                .collect();
            for pos in candidates {
                let enclosed = self
                    .layout
                    .grid
                    .surrounding(pos)
                    .iter()
                    .all(|c| !c.is_empty());
                if enclosed {
                    self.layout.grid.clear(pos);
                    self.maps.remove(&pos);
                    self.stats.pruned += 1;
                    removed = true;
                }
            }
            if !removed {
                break;
            }
        }

        let grid = &self.layout.grid;
        for map in self.maps.values_mut() {
            for face in Cardinal::ALL {
                map.walls
                    .set(face, grid.get(map.position.step(face)).is_empty());
            }
        }
    }

    // ── 5. Traps ────────────────────────────────────────────────────────

    fn place_traps(&mut self) {
        let eligible: Vec<Position> = self
            .maps
            .values()
            .filter(|m| !m.is_root)
            .map(|m| m.position)
            .collect();
        let mut remaining = (self.maps.len() as f64 * self.config.trap_ratio) as usize;
        let mut failures = remaining * self.config.trap_retry_multiplier as usize;
        while remaining > 0 && failures > 0 {
            let Some(&pos) = eligible.choose(&mut *self.rng) else {
                break;
            };
            match self.maps.get_mut(&pos) {
                Some(map) if !map.is_trap => {
                    map.is_trap = true;
                    remaining -= 1;
                    self.stats.traps += 1;
                }
                _ => failures -= 1,
            }
        }
    }

    // ── 6. Commit ───────────────────────────────────────────────────────

    async fn commit(&mut self) -> Result<(), LayoutError> {
        let mut stair_pieces = Vec::new();
        for (i, stair) in self.stairs.iter().enumerate() {
            let request = PieceRequest {
                kind: PieceKind::Stair,
                name: format!("stair-{}", i),
                shape: PieceShape::Cells(stair.cells().to_vec()),
            };
            let construction = self.layout.pieces.begin_construction(&mut *self.factory, &request);
            let (piece, built) = construction.await_ready().await?;
            self.layout.pieces.finish_construction(piece, &built)?;
            self.layout.pieces.set_stair(piece, *stair)?;
            for cell in stair.cells() {
                self.layout.grid.set(cell, CellKind::Stairway, Some(piece));
            }
            self.layout.link_stair(stair.entrance, stair.exit);
            stair_pieces.push((piece, *stair));
        }

        for map in self.maps.values() {
            self.layout.grid.set_walls(map.position, map.walls);
            if map.is_trap {
                self.layout.mark_trap(map.position);
            }
        }
        for (_, stair) in &stair_pieces {
            for cell in stair.cells() {
                let mut walls = WallVisibility::NONE;
                for face in Cardinal::ALL {
                    walls.set(face, self.layout.grid.get(cell.step(face)).is_empty());
                }
                self.layout.grid.set_walls(cell, walls);
            }
        }

        for (n, group) in self.connected_groups().into_iter().enumerate() {
            let request = PieceRequest {
                kind: PieceKind::Hallway,
                name: format!("corridor-{}", n),
                shape: PieceShape::Cells(group.clone()),
            };
            let construction = self.layout.pieces.begin_construction(&mut *self.factory, &request);
            let (corridor, built) = construction.await_ready().await?;
            self.layout.pieces.finish_construction(corridor, &built)?;
            for cell in &group {
                self.layout.grid.set_owner(*cell, corridor);
            }
            for (piece, stair) in &stair_pieces {
                if group.contains(&stair.entrance) {
                    self.layout.pieces.attach(*piece, corridor)?;
                }
            }
            let doors: Vec<(Entity, Position)> = group
                .iter()
                .filter_map(|cell| self.maps.get(cell))
                .flat_map(|map| map.doors.iter().map(move |door| (*door, map.position)))
                .collect();
            for (door, root) in doors {
                self.connect_door(door, corridor, root)?;
            }
            self.stats.corridors += 1;
        }
        self.stats.hallway_cells = self.maps.len();
        Ok(())
    }

    /// Join a root back to the door it grew from.
    fn connect_door(&mut self, door: Entity, corridor: Entity, root: Position) -> Result<(), LayoutError> {
        let anchor = self
            .layout
            .registry
            .get(door)
            .map(|p| p.anchor)
            .ok_or(LayoutError::UnknownDoor(door))?;
        self.layout.registry.set_connection(door, corridor)?;
        let grid = &mut self.layout.grid;
        grid.set_kind(anchor.cell, CellKind::Door);
        grid.set_kind(root, CellKind::Door);
        grid.set_wall(anchor.cell, anchor.facing, false);
        grid.set_wall(root, anchor.facing.opposite(), false);
        Ok(())
    }

    /// Hallway and stair cells grouped by 4-adjacency and stair links,
    /// each group sorted, groups ordered by their first cell.
    fn connected_groups(&self) -> Vec<Vec<Position>> {
        let cells: BTreeSet<Position> = self
            .maps
            .keys()
            .copied()
            .chain(self.stairs.iter().flat_map(|s| s.cells()))
            .collect();
        let mut visited = HashSet::new();
        let mut groups = Vec::new();
        for &start in &cells {
            if !visited.insert(start) {
                continue;
            }
            let mut group = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(pos) = queue.pop_front() {
                let linked = self.layout.stair_link(pos);
                let next = Cardinal::ALL.map(|c| pos.step(c));
                for n in next.into_iter().chain(linked) {
                    if cells.contains(&n) && visited.insert(n) {
                        group.push(n);
                        queue.push_back(n);
                    }
                }
            }
            group.sort();
            groups.push(group);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::BlueprintFactory;
    use crate::registry::DoorAnchor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet() -> CorridorConfig {
        CorridorConfig {
            alley_chance: 0.0,
            trap_ratio: 0.0,
            ..Default::default()
        }
    }

    /// A one-tile room at `pos` with an open door facing `facing`.
    fn tile_room(layout: &mut Layout, pos: Position, facing: Cardinal) -> (Entity, Entity) {
        let request = PieceRequest {
            kind: PieceKind::Room,
            name: "tile".into(),
            shape: PieceShape::Cells(vec![pos]),
        };
        let construction = layout.pieces.begin_construction(&mut BlueprintFactory, &request);
        let (room, built) = pollster::block_on(construction.await_ready()).unwrap();
        layout.pieces.finish_construction(room, &built).unwrap();
        layout.grid.set(pos, CellKind::Room, Some(room));
        let anchor = DoorAnchor { cell: pos, facing };
        let door = layout.pieces.spawn_door(room, anchor).unwrap();
        layout.registry.add(door, room, anchor, None).unwrap();
        (room, door)
    }

    fn route(layout: &mut Layout, config: &CorridorConfig, seed: u64) -> CorridorStats {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut factory = BlueprintFactory;
        pollster::block_on(CorridorRouter::new(layout, &mut factory, &mut rng, config).run()).unwrap()
    }

    #[test]
    fn test_straight_connection_joins_rooms() {
        let mut layout = Layout::new();
        let (a, da) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        let (b, db) = tile_room(&mut layout, Position::new(6, 0, 0), Cardinal::West);
        let stats = route(&mut layout, &quiet(), 1);
        assert_eq!(stats.roots, 2);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.corridors, 1);
        // cells 1..=5 on the x axis
        assert_eq!(stats.hallway_cells, 5);
        let corridor = layout.corridors()[0];
        assert_eq!(layout.registry.other_room(da, a), Some(corridor));
        assert_eq!(layout.registry.other_room(db, b), Some(corridor));
        assert_eq!(layout.registry.find_path(a, b).map(|h| h.len()), Some(2));
        assert_eq!(layout.grid.get(Position::new(1, 0, 0)).kind, CellKind::Door);
        assert_eq!(layout.grid.get(Position::new(3, 0, 0)).kind, CellKind::Hallway);
        assert_eq!(layout.grid.get(Position::new(3, 0, 0)).owner, Some(corridor));
    }

    #[test]
    fn test_far_roots_stay_apart() {
        let mut layout = Layout::new();
        let (a, _) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        let (b, _) = tile_room(&mut layout, Position::new(41, 0, 0), Cardinal::West);
        let stats = route(&mut layout, &quiet(), 1);
        assert_eq!(stats.out_of_range, 1);
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.hallway_cells, 2);
        assert_eq!(stats.corridors, 2);
        assert!(layout.registry.find_path(a, b).is_none());
    }

    #[test]
    fn test_l_shaped_path() {
        let mut layout = Layout::new();
        let (a, _) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::North);
        let (b, _) = tile_room(&mut layout, Position::new(4, 0, 5), Cardinal::West);
        let stats = route(&mut layout, &quiet(), 2);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.corridors, 1);
        assert!(layout.registry.find_path(a, b).is_some());
    }

    #[test]
    fn test_stairs_bridge_one_level() {
        let mut layout = Layout::new();
        let (a, _) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        let (b, _) = tile_room(&mut layout, Position::new(9, 1, 0), Cardinal::West);
        let stats = route(&mut layout, &quiet(), 3);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.stairs, 1);
        assert_eq!(layout.stair_link_count(), 1);
        assert_eq!(stats.corridors, 1);
        assert!(layout.registry.find_path(a, b).is_some());
        let stair = layout.pieces.pieces_of(PieceKind::Stair)[0];
        let segment = layout.pieces.stair(stair).unwrap();
        assert_eq!(segment.entrance.y, 0);
        assert_eq!(segment.exit.y, 1);
        assert_eq!(layout.pieces.parent(stair), Some(layout.corridors()[0]));
        for cell in segment.cells() {
            assert_eq!(layout.grid.get(cell).kind, CellKind::Stairway);
        }
    }

    #[test]
    fn test_stair_without_exit_is_released() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        tile_room(&mut layout, Position::new(9, 1, 0), Cardinal::West);
        let config = quiet();
        let mut rng = StdRng::seed_from_u64(3);
        let mut factory = BlueprintFactory;
        let mut router = CorridorRouter::new(&mut layout, &mut factory, &mut rng, &config);
        router.create_roots();
        router.connect_roots();
        assert_eq!(router.stairs.len(), 1);
        let stair = router.stairs[0];
        router.maps.remove(&stair.exit);
        router.layout.grid.clear(stair.exit);

        router.drop_broken_stairs();
        assert_eq!(router.stats.stairs, 0);
        assert!(router.stairs.is_empty());
        for cell in stair.cells() {
            assert!(router.layout.grid.get(cell).is_empty(), "{} still reserved", cell);
        }
    }

    #[test]
    fn test_removing_corridor_takes_its_stairs() {
        let mut layout = Layout::new();
        let (a, _) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        let (b, _) = tile_room(&mut layout, Position::new(9, 1, 0), Cardinal::West);
        route(&mut layout, &quiet(), 3);
        let corridor = layout.corridors()[0];

        layout.remove_piece(corridor).unwrap();
        assert!(layout.pieces.pieces_of(PieceKind::Stair).is_empty());
        assert_eq!(layout.stair_link_count(), 0);
        assert_eq!(layout.grid.iter().filter(|c| c.kind.is_corridor()).count(), 0);
        assert_eq!(layout.grid.len(), 2);
        for room in [a, b] {
            assert_eq!(layout.registry.available_for(room).len(), 1);
        }
        let door_cell = layout.grid.get(Position::new(0, 0, 0));
        assert_eq!(door_cell.kind, CellKind::Room);
        assert!(door_cell.walls.get(Cardinal::East));
    }

    #[test]
    fn test_run_through_room_is_not_a_connection() {
        let mut layout = Layout::new();
        let (a, _) = tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        let (b, _) = tile_room(&mut layout, Position::new(6, 0, 0), Cardinal::West);
        layout.grid.set(Position::new(3, 0, 0), CellKind::Room, None);
        let stats = route(&mut layout, &quiet(), 1);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.hallway_cells, 4);
        assert_eq!(stats.corridors, 2);
        assert!(layout.registry.find_path(a, b).is_none());
    }

    #[test]
    fn test_climb_beyond_limit_is_abandoned() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        tile_room(&mut layout, Position::new(9, 3, 0), Cardinal::West);
        let config = CorridorConfig {
            max_stair_steps: 2,
            ..quiet()
        };
        let stats = route(&mut layout, &config, 4);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.stairs, 0);
        assert_eq!(layout.grid.iter().filter(|c| c.kind == CellKind::Stairway).count(), 0);
    }

    #[test]
    fn test_no_stair_room_abandons() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        tile_room(&mut layout, Position::new(3, 1, 0), Cardinal::West);
        // 1 and 2 on the x axis: a stair at x=1 would exit at x=3, inside the room
        let stats = route(&mut layout, &quiet(), 5);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.connections, 0);
    }

    #[test]
    fn test_enclosed_cells_pruned_and_walls_set() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        tile_room(&mut layout, Position::new(6, 0, 0), Cardinal::West);
        let config = CorridorConfig {
            alley_chance: 1.0,
            alley_min_len: 10,
            alley_max_len: 10,
            trap_ratio: 0.0,
            ..Default::default()
        };
        route(&mut layout, &config, 6);
        for cell in layout.grid.iter().filter(|c| c.kind == CellKind::Hallway) {
            let enclosed = layout.grid.surrounding(cell.position).iter().all(|n| !n.is_empty());
            assert!(!enclosed, "{} should have been pruned", cell.position);
            for face in Cardinal::ALL {
                let open = layout.grid.get(cell.position.step(face)).is_empty();
                assert_eq!(cell.walls.get(face), open);
            }
        }
    }

    #[test]
    fn test_traps_are_capped() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        tile_room(&mut layout, Position::new(11, 0, 0), Cardinal::West);
        let config = CorridorConfig {
            alley_chance: 0.0,
            trap_ratio: 0.4,
            ..Default::default()
        };
        let stats = route(&mut layout, &config, 7);
        assert!(stats.traps <= (stats.hallway_cells as f64 * 0.4) as usize);
        assert_eq!(layout.trap_count(), stats.traps);
        assert!(stats.traps > 0);
    }

    #[test]
    fn test_blocked_door_gets_no_root() {
        let mut layout = Layout::new();
        tile_room(&mut layout, Position::new(0, 0, 0), Cardinal::East);
        layout.grid.set(Position::new(1, 0, 0), CellKind::Room, None);
        let stats = route(&mut layout, &quiet(), 8);
        assert_eq!(stats.roots, 0);
        assert_eq!(layout.registry.available().len(), 1);
    }
}
