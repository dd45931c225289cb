//! Pieces (rooms, hallways, stair segments) and their two-phase construction.
//!
//! Pieces and doors are entities in a [`hecs::World`]. Grid cells and door
//! pairs hold their [`Entity`] handles as weak references: a despawned piece
//! simply stops being `contains`-able and the registry sweep cleans up.
//!
//! # Construction
//!
//! The layout core never builds geometry itself. It hands a
//! [`PieceRequest`] to a [`PieceFactory`] and awaits the returned handle:
//!
//! ```text
//! begin_construction(request)  →  Started
//!        … factory works, possibly yielding …
//! await_ready()                →  Finished, geometry readable
//! ```
//!
//! Reading doors or cells of a piece that has not finished returns
//! [`LayoutError::PieceNotReady`].

use crate::blueprint::Blueprint;
use crate::error::LayoutError;
use crate::geometry::{Cardinal, Position, Rotation, TileBounds};
use crate::registry::DoorAnchor;
use hecs::{Entity, World};
use std::future::{ready, Future, Ready};

// ── Components ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Room,
    /// A merged corridor: connected hallway and stair cells.
    Hallway,
    Stair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub kind: PieceKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionState {
    Started,
    Finished,
}

/// Room lifecycle during placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementState {
    #[default]
    Uninitialized,
    Placed,
    Finalized,
}

/// Geometry reported by the factory. Present only once finished.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceGeometry {
    pub bounds: TileBounds,
    pub cells: Vec<Position>,
    pub rotation: Rotation,
}

/// Doors owned by a piece, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PieceDoors(pub Vec<Entity>);

/// A door on a piece's boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorFixture {
    pub owner: Entity,
    pub anchor: DoorAnchor,
    pub locked: bool,
}

/// A one-level stair. `treads` are on the lower level, `headroom` above
/// them; walkers enter at `entrance` and leave at `exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StairSegment {
    pub treads: [Position; 2],
    pub headroom: [Position; 2],
    pub entrance: Position,
    pub exit: Position,
    /// Direction of travel from entrance to exit.
    pub travel: Cardinal,
}

impl StairSegment {
    pub fn cells(&self) -> [Position; 4] {
        [
            self.treads[0],
            self.treads[1],
            self.headroom[0],
            self.headroom[1],
        ]
    }

    /// Facing used when rendering: stairs always climb towards `rotation`.
    pub fn rotation(&self) -> Rotation {
        if self.exit.y > self.entrance.y {
            Rotation::facing(self.travel)
        } else {
            Rotation::facing(self.travel.opposite())
        }
    }
}

/// Marks a stair piece as belonging to a merged corridor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartOf(pub Entity);

// ── Factory seam ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PieceShape {
    Blueprint {
        blueprint: Blueprint,
        origin: Position,
        rotation: Rotation,
    },
    Cells(Vec<Position>),
}

/// What the core asks the factory to instantiate.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceRequest {
    pub kind: PieceKind,
    pub name: String,
    pub shape: PieceShape,
}

/// The factory's answer: final bounds, cells and door anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPiece {
    pub bounds: TileBounds,
    pub cells: Vec<Position>,
    pub doors: Vec<DoorAnchor>,
    pub rotation: Rotation,
}

/// Instantiates pieces outside the layout core, e.g. in a renderer.
pub trait PieceFactory {
    type Handle: Future<Output = Result<BuiltPiece, LayoutError>>;

    fn begin_construction(&mut self, request: &PieceRequest) -> Self::Handle;
}

/// In-process factory that derives geometry straight from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlueprintFactory;

impl PieceFactory for BlueprintFactory {
    type Handle = Ready<Result<BuiltPiece, LayoutError>>;

    fn begin_construction(&mut self, request: &PieceRequest) -> Self::Handle {
        ready(build_geometry(request))
    }
}

/// Geometry implied by a request, as a factory without its own data would report it.
pub fn build_geometry(request: &PieceRequest) -> Result<BuiltPiece, LayoutError> {
    match &request.shape {
        PieceShape::Blueprint {
            blueprint,
            origin,
            rotation,
        } => {
            let bounds = blueprint.bounds_at(*origin, *rotation);
            Ok(BuiltPiece {
                bounds,
                cells: bounds.positions().collect(),
                doors: blueprint.door_anchors(*origin, *rotation),
                rotation: *rotation,
            })
        }
        PieceShape::Cells(cells) => {
            let bounds = TileBounds::enclosing(cells)
                .ok_or_else(|| LayoutError::EmptyPiece(request.name.clone()))?;
            Ok(BuiltPiece {
                bounds,
                cells: cells.clone(),
                doors: Vec::new(),
                rotation: Rotation::R0,
            })
        }
    }
}

/// A piece whose construction has begun.
#[must_use = "construction must be awaited before the piece is used"]
pub struct Construction<H> {
    piece: Entity,
    handle: H,
}

impl<H> Construction<H>
where
    H: Future<Output = Result<BuiltPiece, LayoutError>>,
{
    pub fn piece(&self) -> Entity {
        self.piece
    }

    /// Wait for the factory to finish.
    pub async fn await_ready(self) -> Result<(Entity, BuiltPiece), LayoutError> {
        let built = self.handle.await?;
        Ok((self.piece, built))
    }
}

// ── Store ───────────────────────────────────────────────────────────────

/// All pieces and doors of a layout.
#[derive(Default)]
pub struct PieceStore {
    world: World,
}

impl PieceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    pub fn clear(&mut self) {
        self.world.clear();
    }

    /// Spawn the piece in `Started` state and hand the request to `factory`.
    pub fn begin_construction<F: PieceFactory>(
        &mut self,
        factory: &mut F,
        request: &PieceRequest,
    ) -> Construction<F::Handle> {
        let piece = self.world.spawn((
            Piece {
                kind: request.kind,
                name: request.name.clone(),
            },
            ConstructionState::Started,
        ));
        if request.kind == PieceKind::Room {
            let _ = self.world.insert_one(piece, PlacementState::Uninitialized);
        }
        Construction {
            piece,
            handle: factory.begin_construction(request),
        }
    }

    /// Record the factory's geometry and flip the piece to `Finished`.
    pub fn finish_construction(&mut self, piece: Entity, built: &BuiltPiece) -> Result<(), LayoutError> {
        self.world
            .insert(
                piece,
                (
                    PieceGeometry {
                        bounds: built.bounds,
                        cells: built.cells.clone(),
                        rotation: built.rotation,
                    },
                    ConstructionState::Finished,
                ),
            )
            .map_err(|_| LayoutError::UnknownPiece(piece))
    }

    pub fn is_finished(&self, piece: Entity) -> bool {
        self.world
            .get::<&ConstructionState>(piece)
            .map(|s| *s == ConstructionState::Finished)
            .unwrap_or(false)
    }

    fn ensure_ready(&self, piece: Entity) -> Result<(), LayoutError> {
        if !self.world.contains(piece) {
            Err(LayoutError::UnknownPiece(piece))
        } else if !self.is_finished(piece) {
            Err(LayoutError::PieceNotReady(piece))
        } else {
            Ok(())
        }
    }

    pub fn geometry(&self, piece: Entity) -> Result<PieceGeometry, LayoutError> {
        self.ensure_ready(piece)?;
        self.world
            .get::<&PieceGeometry>(piece)
            .map(|g| (*g).clone())
            .map_err(|_| LayoutError::PieceNotReady(piece))
    }

    pub fn bounds(&self, piece: Entity) -> Result<TileBounds, LayoutError> {
        self.geometry(piece).map(|g| g.bounds)
    }

    pub fn cells(&self, piece: Entity) -> Result<Vec<Position>, LayoutError> {
        self.geometry(piece).map(|g| g.cells)
    }

    pub fn doors(&self, piece: Entity) -> Result<Vec<Entity>, LayoutError> {
        self.ensure_ready(piece)?;
        Ok(self
            .world
            .get::<&PieceDoors>(piece)
            .map(|d| d.0.clone())
            .unwrap_or_default())
    }

    pub fn kind(&self, piece: Entity) -> Option<PieceKind> {
        self.world.get::<&Piece>(piece).ok().map(|p| p.kind)
    }

    pub fn name(&self, piece: Entity) -> Option<String> {
        self.world.get::<&Piece>(piece).ok().map(|p| p.name.clone())
    }

    pub fn placement(&self, piece: Entity) -> Option<PlacementState> {
        self.world.get::<&PlacementState>(piece).ok().map(|s| *s)
    }

    pub fn set_placement(&mut self, piece: Entity, state: PlacementState) -> Result<(), LayoutError> {
        self.world
            .insert_one(piece, state)
            .map_err(|_| LayoutError::UnknownPiece(piece))
    }

    /// Pieces of one kind, ordered by handle.
    pub fn pieces_of(&self, kind: PieceKind) -> Vec<Entity> {
        let mut out: Vec<Entity> = self
            .world
            .query::<&Piece>()
            .iter()
            .filter(|(_, p)| p.kind == kind)
            .map(|(e, _)| e)
            .collect();
        out.sort();
        out
    }

    pub fn rooms(&self) -> Vec<Entity> {
        self.pieces_of(PieceKind::Room)
    }

    // ── Doors ───────────────────────────────────────────────────────────

    /// Spawn a door fixture owned by `owner`.
    pub fn spawn_door(&mut self, owner: Entity, anchor: DoorAnchor) -> Result<Entity, LayoutError> {
        if !self.world.contains(owner) {
            return Err(LayoutError::UnknownPiece(owner));
        }
        let door = self.world.spawn((DoorFixture {
            owner,
            anchor,
            locked: false,
        },));
        let pushed = match self.world.get::<&mut PieceDoors>(owner) {
            Ok(mut doors) => {
                doors.0.push(door);
                true
            }
            Err(_) => false,
        };
        if !pushed {
            self.world
                .insert_one(owner, PieceDoors(vec![door]))
                .map_err(|_| LayoutError::UnknownPiece(owner))?;
        }
        Ok(door)
    }

    pub fn door(&self, door: Entity) -> Option<DoorFixture> {
        self.world.get::<&DoorFixture>(door).ok().map(|d| *d)
    }

    pub fn is_locked(&self, door: Entity) -> Option<bool> {
        self.door(door).map(|d| d.locked)
    }

    pub fn set_locked(&mut self, door: Entity, locked: bool) -> Result<(), LayoutError> {
        let mut fixture = self
            .world
            .get::<&mut DoorFixture>(door)
            .map_err(|_| LayoutError::UnknownDoor(door))?;
        fixture.locked = locked;
        Ok(())
    }

    /// Despawn a door and detach it from its owner.
    pub fn remove_door(&mut self, door: Entity) -> Result<(), LayoutError> {
        let owner = self
            .door(door)
            .map(|d| d.owner)
            .ok_or(LayoutError::UnknownDoor(door))?;
        if let Ok(mut doors) = self.world.get::<&mut PieceDoors>(owner) {
            doors.0.retain(|d| *d != door);
        }
        self.world
            .despawn(door)
            .map_err(|_| LayoutError::UnknownDoor(door))
    }

    /// Despawn a piece together with its doors. Returns the removed doors.
    pub fn remove_piece(&mut self, piece: Entity) -> Result<Vec<Entity>, LayoutError> {
        let doors = self
            .world
            .get::<&PieceDoors>(piece)
            .map(|d| d.0.clone())
            .unwrap_or_default();
        self.world
            .despawn(piece)
            .map_err(|_| LayoutError::UnknownPiece(piece))?;
        for door in &doors {
            let _ = self.world.despawn(*door);
        }
        Ok(doors)
    }

    // ── Stairs ──────────────────────────────────────────────────────────

    pub fn set_stair(&mut self, piece: Entity, segment: StairSegment) -> Result<(), LayoutError> {
        self.world
            .insert_one(piece, segment)
            .map_err(|_| LayoutError::UnknownPiece(piece))
    }

    pub fn stair(&self, piece: Entity) -> Option<StairSegment> {
        self.world.get::<&StairSegment>(piece).ok().map(|s| *s)
    }

    /// Fold a stair piece into the corridor it belongs to.
    pub fn attach(&mut self, stair: Entity, corridor: Entity) -> Result<(), LayoutError> {
        self.world
            .insert_one(stair, PartOf(corridor))
            .map_err(|_| LayoutError::UnknownPiece(stair))
    }

    pub fn parent(&self, piece: Entity) -> Option<Entity> {
        self.world.get::<&PartOf>(piece).ok().map(|p| p.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::DoorSlot;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Resolves after yielding a fixed number of times.
    struct YieldThen<T> {
        remaining: u32,
        value: Option<T>,
    }

    impl<T: Unpin> Future for YieldThen<T> {
        type Output = T;
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
            if self.remaining > 0 {
                self.remaining -= 1;
                cx.waker().wake_by_ref();
                Poll::Pending
            } else {
                Poll::Ready(self.value.take().expect("polled after completion"))
            }
        }
    }

    struct SlowFactory;

    impl PieceFactory for SlowFactory {
        type Handle = YieldThen<Result<BuiltPiece, LayoutError>>;
        fn begin_construction(&mut self, request: &PieceRequest) -> Self::Handle {
            YieldThen {
                remaining: 3,
                value: Some(build_geometry(request)),
            }
        }
    }

    fn room_request() -> PieceRequest {
        PieceRequest {
            kind: PieceKind::Room,
            name: "chamber".into(),
            shape: PieceShape::Blueprint {
                blueprint: Blueprint::new(
                    "chamber",
                    2,
                    3,
                    vec![DoorSlot::new(0, 0, 0, Cardinal::South)],
                ),
                origin: Position::new(4, 0, 4),
                rotation: Rotation::R0,
            },
        }
    }

    #[test]
    fn test_geometry_unreadable_until_finished() {
        let mut store = PieceStore::new();
        let construction = store.begin_construction(&mut SlowFactory, &room_request());
        let piece = construction.piece();
        assert_eq!(store.cells(piece), Err(LayoutError::PieceNotReady(piece)));
        assert_eq!(store.placement(piece), Some(PlacementState::Uninitialized));

        let (piece, built) = pollster::block_on(construction.await_ready()).unwrap();
        assert!(!store.is_finished(piece));
        store.finish_construction(piece, &built).unwrap();
        assert!(store.is_finished(piece));
        assert_eq!(store.cells(piece).unwrap().len(), 6);
        assert_eq!(store.bounds(piece).unwrap().min, Position::new(4, 0, 4));
    }

    #[test]
    fn test_doors_and_locks() {
        let mut store = PieceStore::new();
        let construction = store.begin_construction(&mut BlueprintFactory, &room_request());
        let (piece, built) = pollster::block_on(construction.await_ready()).unwrap();
        store.finish_construction(piece, &built).unwrap();
        let door = store.spawn_door(piece, built.doors[0]).unwrap();
        assert_eq!(store.doors(piece).unwrap(), vec![door]);
        assert_eq!(store.is_locked(door), Some(false));
        store.set_locked(door, true).unwrap();
        assert_eq!(store.is_locked(door), Some(true));
        store.remove_door(door).unwrap();
        assert!(store.doors(piece).unwrap().is_empty());
        assert_eq!(store.set_locked(door, false), Err(LayoutError::UnknownDoor(door)));
    }

    #[test]
    fn test_remove_piece_takes_doors() {
        let mut store = PieceStore::new();
        let construction = store.begin_construction(&mut BlueprintFactory, &room_request());
        let (piece, built) = pollster::block_on(construction.await_ready()).unwrap();
        store.finish_construction(piece, &built).unwrap();
        let door = store.spawn_door(piece, built.doors[0]).unwrap();
        assert_eq!(store.remove_piece(piece).unwrap(), vec![door]);
        assert!(!store.contains(door));
        assert!(store.is_empty());
        assert_eq!(store.doors(piece), Err(LayoutError::UnknownPiece(piece)));
    }

    #[test]
    fn test_cell_pieces() {
        let request = PieceRequest {
            kind: PieceKind::Hallway,
            name: "corridor".into(),
            shape: PieceShape::Cells(vec![Position::new(0, 0, 0), Position::new(0, 0, 1)]),
        };
        let built = build_geometry(&request).unwrap();
        assert_eq!(built.bounds.depth(), 2);
        assert!(built.doors.is_empty());
        let empty = PieceRequest {
            shape: PieceShape::Cells(vec![]),
            ..request
        };
        assert!(matches!(build_geometry(&empty), Err(LayoutError::EmptyPiece(_))));
    }

    #[test]
    fn test_stair_rotation_climbs() {
        let up = StairSegment {
            treads: [Position::new(1, 0, 0), Position::new(2, 0, 0)],
            headroom: [Position::new(1, 1, 0), Position::new(2, 1, 0)],
            entrance: Position::new(0, 0, 0),
            exit: Position::new(3, 1, 0),
            travel: Cardinal::East,
        };
        assert_eq!(up.rotation(), Rotation::R90);
        let down = StairSegment {
            entrance: up.exit,
            exit: up.entrance,
            travel: Cardinal::West,
            ..up
        };
        assert_eq!(down.rotation(), Rotation::R90);
    }
}
