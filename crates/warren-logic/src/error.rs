//! Error types for layout generation.
//!
//! Only programmer errors surface as [`LayoutError`]. Expected generation
//! failures (a colliding candidate, an unreachable root pair, no route)
//! are reported as `None`, `false` or report counters instead.

use crate::config::ConfigError;
use crate::geometry::Direction;
use hecs::Entity;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A door handle was registered twice.
    #[error("door {0:?} is already registered")]
    DuplicateDoor(Entity),

    /// A door handle the registry has never seen.
    #[error("door {0:?} is not registered")]
    UnknownDoor(Entity),

    /// A piece handle that does not exist in the piece store.
    #[error("piece {0:?} does not exist")]
    UnknownPiece(Entity),

    /// Doors or cells were read before construction signalled finished.
    #[error("piece {0:?} has not finished construction")]
    PieceNotReady(Entity),

    /// A factory was asked for a piece with no cells.
    #[error("piece '{0}' has no cells")]
    EmptyPiece(String),

    /// A diagonal was passed where only a cardinal direction is meaningful.
    #[error("direction {0:?} is not a cardinal direction")]
    UnsupportedDirection(Direction),

    /// No blueprints to place.
    #[error("room catalog is empty")]
    EmptyCatalog,

    #[error("no blueprint named '{0}' in the catalog")]
    UnknownBlueprint(String),

    /// A blueprint without door slots cannot attach to anything.
    #[error("blueprint '{0}' has no door slots")]
    NoDoorSlots(String),

    #[error("invalid configuration: {}", summarize(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error("failed to parse configuration: {0}")]
    Json(String),
}

fn summarize(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        LayoutError::Json(e.to_string())
    }
}
