//! Room placement: grow a connected set of rooms from a root.
//!
//! Each step picks a placed room with an open door, proposes a blueprint
//! rotated so one of its doors faces back through that opening, and tests
//! the proposal's bounds against every room placed so far. Only a
//! proposal that passes is built and written to the grid and registry, so
//! a collision never leaves anything behind.
//!
//! # Budget
//!
//! The target room count is drawn from `min_rooms..=max_rooms`. Every failed
//! attempt spends one retry from a budget of `retry_multiplier × target`.
//! Running out of retries, or out of rooms with usable doors, ends placement
//! early with a partial layout; it is logged, never fatal.

use crate::blueprint::{Blueprint, Catalog};
use crate::config::PlacementConfig;
use crate::error::LayoutError;
use crate::geometry::{
    Cardinal, CollisionPredicate, Position, Rotation, ShrunkAabb, TileBounds,
};
use crate::grid::{CellKind, WallVisibility};
use crate::layout::Layout;
use crate::pieces::{PieceFactory, PieceKind, PieceRequest, PieceShape, PlacementState};
use crate::registry::DoorPair;
use hecs::Entity;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// Result of a placement run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    /// Placed rooms in placement order; the first is the root.
    pub rooms: Vec<Entity>,
    pub stats: PlacementStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlacementStats {
    pub target: usize,
    pub placed: usize,
    pub failed_attempts: usize,
    /// Placement stopped before reaching `target`.
    pub exhausted: bool,
}

/// A candidate room that has not touched shared state yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal<'a> {
    pub blueprint: &'a Blueprint,
    pub origin: Position,
    pub rotation: Rotation,
    pub bounds: TileBounds,
}

struct PlacedRoom {
    room: Entity,
    bounds: TileBounds,
    blueprint: String,
}

/// Grows rooms into a [`Layout`].
pub struct RoomPlacer<'a, F, R> {
    layout: &'a mut Layout,
    factory: &'a mut F,
    rng: &'a mut R,
    config: &'a PlacementConfig,
    catalog: &'a Catalog,
    collision: Box<dyn CollisionPredicate + 'a>,
    placed: Vec<PlacedRoom>,
    exhausted_rooms: HashSet<Entity>,
    exhausted_doors: HashSet<Entity>,
    used_specials: HashSet<String>,
}

impl<'a, F: PieceFactory, R: Rng> RoomPlacer<'a, F, R> {
    pub fn new(
        layout: &'a mut Layout,
        factory: &'a mut F,
        rng: &'a mut R,
        config: &'a PlacementConfig,
        catalog: &'a Catalog,
    ) -> Self {
        Self {
            layout,
            factory,
            rng,
            config,
            catalog,
            collision: Box::new(ShrunkAabb {
                epsilon: config.collision_epsilon,
            }),
            placed: Vec::new(),
            exhausted_rooms: HashSet::new(),
            exhausted_doors: HashSet::new(),
            used_specials: HashSet::new(),
        }
    }

    /// Replace the default shrunk-AABB collision test.
    pub fn with_collision(mut self, collision: impl CollisionPredicate + 'a) -> Self {
        self.collision = Box::new(collision);
        self
    }

    /// Place the root and grow until the target count or the retry budget is reached.
    pub async fn run(mut self) -> Result<PlacementOutcome, LayoutError> {
        let catalog = self.catalog;
        if catalog.generic().next().is_none() {
            return Err(LayoutError::EmptyCatalog);
        }
        let (min, max) = (self.config.min_rooms, self.config.max_rooms.max(self.config.min_rooms));
        let target = self.rng.gen_range(min..=max) as usize;
        let mut retries = target * self.config.retry_multiplier as usize;
        let mut stats = PlacementStats {
            target,
            ..Default::default()
        };

        let root_blueprint = match &self.config.root_blueprint {
            Some(name) => catalog
                .get(name)
                .ok_or_else(|| LayoutError::UnknownBlueprint(name.clone()))?,
            None => self.pick_generic(None)?,
        };
        if root_blueprint.doors.is_empty() {
            return Err(LayoutError::NoDoorSlots(root_blueprint.name.clone()));
        }
        let root = self
            .commit(root_blueprint, Position::ORIGIN, Rotation::R0, None)
            .await?;
        log::debug!("root room '{}' placed", root_blueprint.name);

        // Extend a random number of the root's doors before growing elsewhere.
        let root_doors = self.layout.registry.available_for(root).len();
        let mut fill = if root_doors > 0 {
            self.rng.gen_range(1..=root_doors)
        } else {
            0
        };
        while fill > 0
            && self.placed.len() < target
            && retries > 0
            && !self.exhausted_rooms.contains(&root)
        {
            if self.extend(root).await? {
                fill -= 1;
            } else {
                retries -= 1;
                stats.failed_attempts += 1;
            }
        }

        while self.placed.len() < target {
            self.layout.sweep();
            if retries == 0 {
                log::error!(
                    "room placement retry budget exhausted: {} of {} rooms placed",
                    self.placed.len(),
                    target
                );
                stats.exhausted = true;
                break;
            }
            let open = self.open_rooms();
            let Some(&room) = open.choose(&mut *self.rng) else {
                log::error!(
                    "ran out of rooms with available doors: {} of {} rooms placed",
                    self.placed.len(),
                    target
                );
                stats.exhausted = true;
                break;
            };
            if !self.extend(room).await? {
                retries -= 1;
                stats.failed_attempts += 1;
            }
        }

        let rooms: Vec<Entity> = self.placed.iter().map(|p| p.room).collect();
        for room in &rooms {
            self.layout.pieces.set_placement(*room, PlacementState::Finalized)?;
        }
        stats.placed = rooms.len();
        log::info!(
            "placed {}/{} rooms ({} failed attempts)",
            stats.placed,
            stats.target,
            stats.failed_attempts
        );
        Ok(PlacementOutcome { rooms, stats })
    }

    /// Placed rooms that still have a usable door.
    fn open_rooms(&mut self) -> Vec<Entity> {
        let mut open = Vec::new();
        for placed in &self.placed {
            if self.exhausted_rooms.contains(&placed.room) {
                continue;
            }
            let usable = self
                .layout
                .registry
                .available_for(placed.room)
                .iter()
                .any(|p| !self.exhausted_doors.contains(&p.door));
            if usable {
                open.push(placed.room);
            }
        }
        open
    }

    /// Try to attach one new room to `room`. False when nothing was placed.
    async fn extend(&mut self, room: Entity) -> Result<bool, LayoutError> {
        let doors: Vec<DoorPair> = self
            .layout
            .registry
            .available_for(room)
            .into_iter()
            .filter(|p| !self.exhausted_doors.contains(&p.door))
            .copied()
            .collect();
        let Some(&target) = doors.choose(&mut *self.rng) else {
            self.exhausted_rooms.insert(room);
            return Ok(false);
        };

        let source = self
            .placed
            .iter()
            .find(|p| p.room == room)
            .map(|p| (p.bounds, p.blueprint.clone()))
            .ok_or(LayoutError::UnknownPiece(room))?;
        let blueprint = self.pick_blueprint(&source.1)?;

        let proposal = match propose(blueprint, &source.0, &target) {
            Some(p) if !self.collides(&p.bounds) => p,
            _ => {
                log::debug!(
                    "'{}' does not fit at door {}",
                    blueprint.name,
                    target.anchor.cell
                );
                if doors.len() == 1 {
                    self.exhausted_doors.insert(target.door);
                    self.exhausted_rooms.insert(room);
                }
                return Ok(false);
            }
        };

        self.commit(
            proposal.blueprint,
            proposal.origin,
            proposal.rotation,
            Some(target),
        )
        .await?;
        Ok(true)
    }

    fn collides(&self, bounds: &TileBounds) -> bool {
        self.placed
            .iter()
            .any(|p| self.collision.collides(bounds, &p.bounds))
    }

    /// Build the room and write it into the layout. `link` is the source
    /// door the new room attaches to; its matching door merges into that pair.
    async fn commit(
        &mut self,
        blueprint: &Blueprint,
        origin: Position,
        rotation: Rotation,
        link: Option<DoorPair>,
    ) -> Result<Entity, LayoutError> {
        let request = PieceRequest {
            kind: PieceKind::Room,
            name: blueprint.name.clone(),
            shape: PieceShape::Blueprint {
                blueprint: blueprint.clone(),
                origin,
                rotation,
            },
        };
        let construction = self.layout.pieces.begin_construction(&mut *self.factory, &request);
        let piece = construction.piece();
        let (room, built) = match construction.await_ready().await {
            Ok(done) => done,
            Err(e) => {
                let _ = self.layout.pieces.remove_piece(piece);
                return Err(e);
            }
        };
        self.layout.pieces.finish_construction(room, &built)?;

        let grid = &mut self.layout.grid;
        let footprint: HashSet<Position> = built.cells.iter().copied().collect();
        for &cell in &built.cells {
            grid.set(cell, CellKind::Room, Some(room));
            let mut walls = WallVisibility::NONE;
            for face in Cardinal::ALL {
                walls.set(face, !footprint.contains(&cell.step(face)));
            }
            grid.set_walls(cell, walls);
        }

        let joined = link.map(|pair| pair.anchor.outside());
        for anchor in &built.doors {
            if Some(anchor.cell) == joined {
                continue;
            }
            let door = self.layout.pieces.spawn_door(room, *anchor)?;
            self.layout.registry.add(door, room, *anchor, None)?;
        }

        if let Some(pair) = link {
            self.layout.registry.set_connection(pair.door, room)?;
            let (near, far) = (pair.anchor.cell, pair.anchor.outside());
            let grid = &mut self.layout.grid;
            grid.set_kind(near, CellKind::Door);
            grid.set_kind(far, CellKind::Door);
            grid.set_wall(near, pair.anchor.facing, false);
            grid.set_wall(far, pair.anchor.facing.opposite(), false);
        }

        self.layout.pieces.set_placement(room, PlacementState::Placed)?;
        self.placed.push(PlacedRoom {
            room,
            bounds: built.bounds,
            blueprint: blueprint.name.clone(),
        });
        Ok(room)
    }

    /// A special with probability `special_chance`, otherwise a generic
    /// blueprint other than the source room's when possible.
    fn pick_blueprint(&mut self, source: &str) -> Result<&'a Blueprint, LayoutError> {
        let catalog = self.catalog;
        let unused: Vec<&'a Blueprint> = catalog
            .specials()
            .filter(|b| !self.used_specials.contains(&b.name))
            .collect();
        if !unused.is_empty() && self.rng.gen::<f64>() < self.config.special_chance {
            if let Some(&special) = unused.choose(&mut *self.rng) {
                self.used_specials.insert(special.name.clone());
                if self.used_specials.len() >= catalog.specials().count() {
                    self.used_specials.clear();
                }
                return Ok(special);
            }
        }
        self.pick_generic(Some(source))
    }

    fn pick_generic(&mut self, avoid: Option<&str>) -> Result<&'a Blueprint, LayoutError> {
        let catalog = self.catalog;
        let generic: Vec<&'a Blueprint> = catalog.generic().collect();
        let varied: Vec<&'a Blueprint> = generic
            .iter()
            .copied()
            .filter(|b| Some(b.name.as_str()) != avoid)
            .collect();
        let pool = if varied.is_empty() { &generic } else { &varied };
        pool.choose(&mut *self.rng)
            .copied()
            .ok_or(LayoutError::EmptyCatalog)
    }
}

/// Fit `blueprint` against the open door `target` of a room occupying `source`.
///
/// Among all rotations, the door slots that end up facing back through the
/// opening are compared by distance to the target door with the candidate
/// laid over the source room; the closest wins, first rotation on ties.
/// The candidate is then pushed out past the source's extent along the
/// door's facing so the two door cells touch. `None` when no slot can face
/// the opening.
pub fn propose<'b>(
    blueprint: &'b Blueprint,
    source: &TileBounds,
    target: &DoorPair,
) -> Option<Proposal<'b>> {
    let want = target.anchor.facing.opposite();
    let mut best: Option<(i32, Rotation, Position)> = None;
    for rotation in Rotation::ALL {
        for slot in &blueprint.doors {
            let (local, facing) = blueprint.rotated_slot(slot, rotation);
            if facing != want {
                continue;
            }
            let distance = (source.min + local).manhattan(target.anchor.cell);
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, rotation, local));
            }
        }
    }
    let (_, rotation, local) = best?;

    let (width, depth) = blueprint.extent(rotation);
    let outside = target.anchor.outside();
    let y = outside.y - local.y;
    let origin = match target.anchor.facing {
        Cardinal::North => Position::new(outside.x - local.x, y, source.max.z),
        Cardinal::South => Position::new(outside.x - local.x, y, source.min.z - depth),
        Cardinal::East => Position::new(source.max.x, y, outside.z - local.z),
        Cardinal::West => Position::new(source.min.x - width, y, outside.z - local.z),
    };
    Some(Proposal {
        blueprint,
        origin,
        rotation,
        bounds: blueprint.bounds_at(origin, rotation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::DoorSlot;
    use crate::pieces::BlueprintFactory;
    use crate::registry::DoorAnchor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run_placement(config: &PlacementConfig, catalog: &Catalog, seed: u64) -> (Layout, PlacementOutcome) {
        let mut layout = Layout::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut factory = BlueprintFactory;
        let outcome = pollster::block_on(
            RoomPlacer::new(&mut layout, &mut factory, &mut rng, config, catalog).run(),
        )
        .unwrap();
        (layout, outcome)
    }

    fn fixed(min: u32, max: u32) -> PlacementConfig {
        PlacementConfig {
            min_rooms: min,
            max_rooms: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_room_keeps_doors_open() {
        let config = PlacementConfig {
            root_blueprint: Some("hub".into()),
            ..fixed(1, 1)
        };
        let (layout, outcome) = run_placement(&config, &Catalog::builtin(), 1);
        assert_eq!(outcome.rooms.len(), 1);
        assert!(!outcome.stats.exhausted);
        assert_eq!(layout.registry.available_for(outcome.rooms[0]).len(), 4);
        assert_eq!(layout.grid.len(), 9);
        assert_eq!(
            layout.pieces.placement(outcome.rooms[0]),
            Some(PlacementState::Finalized)
        );
    }

    #[test]
    fn test_no_overlaps_across_seeds() {
        let catalog = Catalog::builtin();
        let check = ShrunkAabb::default();
        for seed in 0..20 {
            let (layout, outcome) = run_placement(&fixed(6, 12), &catalog, seed);
            let bounds: Vec<TileBounds> = outcome
                .rooms
                .iter()
                .map(|r| layout.pieces.bounds(*r).unwrap())
                .collect();
            for i in 0..bounds.len() {
                for j in (i + 1)..bounds.len() {
                    assert!(
                        !check.collides(&bounds[i], &bounds[j]),
                        "seed {}: rooms {} and {} overlap",
                        seed,
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn test_rooms_connected_through_facing_doors() {
        let (layout, outcome) = run_placement(&fixed(8, 8), &Catalog::builtin(), 7);
        for pair in layout.registry.iter().filter(|p| p.is_complete()) {
            let near = layout.grid.get(pair.cell_a());
            let far = layout.grid.get(pair.anchor.outside());
            assert_eq!(near.kind, CellKind::Door);
            assert_eq!(far.kind, CellKind::Door);
            assert_eq!(near.owner, Some(pair.room_a));
            assert_eq!(far.owner, pair.room_b);
        }
        // every room but the root was attached through a pair
        let root = outcome.rooms[0];
        for room in &outcome.rooms[1..] {
            assert!(layout.registry.find_path(root, *room).is_some());
        }
    }

    #[test]
    fn test_exhaustion_returns_partial_layout() {
        // a single-door closet can only ever attach one room
        let catalog = Catalog::new(vec![Blueprint::new(
            "closet",
            1,
            1,
            vec![DoorSlot::new(0, 0, 0, Cardinal::South)],
        )]);
        let (_, outcome) = run_placement(&fixed(5, 5), &catalog, 3);
        assert!(outcome.stats.exhausted);
        assert_eq!(outcome.rooms.len(), 2);
    }

    #[test]
    fn test_propose_places_door_cells_face_to_face() {
        let mut world = hecs::World::new();
        let source = TileBounds::new(Position::ORIGIN, 3, 1, 3);
        let gallery = Blueprint::new(
            "gallery",
            5,
            2,
            vec![DoorSlot::new(0, 0, 0, Cardinal::West), DoorSlot::new(4, 0, 1, Cardinal::East)],
        );
        for facing in Cardinal::ALL {
            let cell = match facing {
                Cardinal::North => Position::new(1, 0, 2),
                Cardinal::East => Position::new(2, 0, 1),
                Cardinal::South => Position::new(1, 0, 0),
                Cardinal::West => Position::new(0, 0, 1),
            };
            let target = DoorPair {
                door: world.spawn(()),
                room_a: world.spawn(()),
                room_b: None,
                anchor: DoorAnchor { cell, facing },
            };
            let proposal = propose(&gallery, &source, &target).unwrap();
            assert!(!ShrunkAabb::default().collides(&proposal.bounds, &source));
            let doors = gallery.door_anchors(proposal.origin, proposal.rotation);
            let joined = doors
                .iter()
                .find(|d| d.cell == target.anchor.outside())
                .expect("a door lands on the outside cell");
            assert_eq!(joined.facing, facing.opposite());
        }
    }
}
