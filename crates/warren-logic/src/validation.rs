//! Structural validation for generated layouts.
//!
//! Pure checks over a finished [`Layout`]. Each returns the problems it
//! found; nothing is repaired. Unreachable rooms and doors left open are
//! warnings, since a run may legitimately end partially connected.

use crate::geometry::{CollisionPredicate, ShrunkAabb};
use crate::grid::CellKind;
use crate::layout::Layout;
use crate::pieces::PieceKind;
use std::collections::{HashMap, HashSet, VecDeque};

/// A layout validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl ValidationError {
    fn error(category: &'static str, message: String) -> Self {
        Self {
            category,
            severity: Severity::Error,
            message,
        }
    }

    fn warning(category: &'static str, message: String) -> Self {
        Self {
            category,
            severity: Severity::Warning,
            message,
        }
    }
}

// ── A. Rooms ────────────────────────────────────────────────────────────

/// No two rooms may intersect or contain one another. Every pair is checked.
pub fn check_room_overlaps(layout: &Layout, epsilon: f32) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let collision = ShrunkAabb { epsilon };
    let rooms: Vec<_> = layout
        .rooms()
        .into_iter()
        .filter_map(|r| layout.pieces.bounds(r).ok().map(|b| (r, b)))
        .collect();
    for i in 0..rooms.len() {
        for j in (i + 1)..rooms.len() {
            let (a, ba) = rooms[i];
            let (b, bb) = rooms[j];
            if collision.collides(&ba, &bb) {
                errors.push(ValidationError::error(
                    "room_overlap",
                    format!("Rooms #{} and #{} overlap", a.id(), b.id()),
                ));
            }
        }
    }
    errors
}

/// Every cell a piece claims must be in the grid and owned by it.
pub fn check_piece_cells(layout: &Layout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for kind in [PieceKind::Room, PieceKind::Hallway] {
        for piece in layout.pieces.pieces_of(kind) {
            let Ok(cells) = layout.pieces.cells(piece) else {
                errors.push(ValidationError::error(
                    "piece_cells",
                    format!("{:?} #{} never finished construction", kind, piece.id()),
                ));
                continue;
            };
            for pos in cells {
                let cell = layout.grid.get(pos);
                if cell.owner != Some(piece) {
                    errors.push(ValidationError::error(
                        "piece_cells",
                        format!("{:?} #{} does not own its cell {}", kind, piece.id(), pos),
                    ));
                }
            }
        }
    }
    errors
}

// ── B. Grid ─────────────────────────────────────────────────────────────

/// Stored cells are never Empty, owners exist, stairs lead somewhere.
pub fn check_grid(layout: &Layout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for cell in layout.grid.iter() {
        if cell.kind == CellKind::Empty {
            errors.push(ValidationError::error(
                "grid",
                format!("Empty cell stored at {}", cell.position),
            ));
        }
        match cell.owner {
            Some(owner) if !layout.pieces.contains(owner) => {
                errors.push(ValidationError::error(
                    "grid",
                    format!("Cell {} owned by despawned piece #{}", cell.position, owner.id()),
                ));
            }
            None => errors.push(ValidationError::error(
                "grid",
                format!("Cell {} has no owner", cell.position),
            )),
            _ => {}
        }
        if let Some(other) = layout.stair_link(cell.position) {
            if layout.grid.get(other).is_empty() {
                errors.push(ValidationError::error(
                    "grid",
                    format!("Stair from {} ends in empty cell {}", cell.position, other),
                ));
            }
        }
    }
    errors
}

// ── C. Doors ────────────────────────────────────────────────────────────

/// Door pairs reference live pieces, and completed pairs sit on two door
/// cells belonging to the rooms they join.
pub fn check_doors(layout: &Layout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut crossings = HashSet::new();
    for pair in layout.registry.iter() {
        if layout.pieces.door(pair.door).is_none() {
            errors.push(ValidationError::error(
                "door_validity",
                format!("Door #{} has no fixture", pair.door.id()),
            ));
        }
        if !layout.pieces.contains(pair.room_a) {
            errors.push(ValidationError::error(
                "door_validity",
                format!("Door #{} belongs to a missing room", pair.door.id()),
            ));
        }
        let Some(room_b) = pair.room_b else {
            continue;
        };
        if !layout.pieces.contains(room_b) {
            errors.push(ValidationError::error(
                "door_validity",
                format!("Door #{} leads to a missing piece", pair.door.id()),
            ));
            continue;
        }
        let sides = [(pair.cell_a(), pair.room_a), (pair.anchor.outside(), room_b)];
        for (pos, owner) in sides {
            let cell = layout.grid.get(pos);
            if !cell.is_door() || cell.owner != Some(owner) {
                errors.push(ValidationError::error(
                    "door_validity",
                    format!(
                        "Door #{}: cell {} should be a door cell of #{}",
                        pair.door.id(),
                        pos,
                        owner.id()
                    ),
                ));
            }
        }
        let key = if pair.cell_a() < pair.anchor.outside() {
            (pair.cell_a(), pair.anchor.outside())
        } else {
            (pair.anchor.outside(), pair.cell_a())
        };
        if !crossings.insert(key) {
            errors.push(ValidationError::warning(
                "door_validity",
                format!("Door #{} duplicates another crossing at {}", pair.door.id(), pair.cell_a()),
            ));
        }
    }
    errors
}

// ── D. Connectivity ─────────────────────────────────────────────────────

/// Rooms not reachable from the first room, and doors left open.
pub fn check_connectivity(layout: &Layout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let rooms = layout.rooms();
    let Some(&start) = rooms.first() else {
        return errors;
    };

    let mut adj: HashMap<_, Vec<_>> = HashMap::new();
    for pair in layout.registry.iter() {
        if let Some(b) = pair.room_b {
            adj.entry(pair.room_a).or_default().push(b);
            adj.entry(b).or_default().push(pair.room_a);
        }
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for &next in adj.get(&current).map(|v| v.as_slice()).unwrap_or(&[]) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let unreached: Vec<_> = rooms.iter().filter(|r| !visited.contains(*r)).collect();
    if let Some(first) = unreached.first() {
        errors.push(ValidationError::warning(
            "connectivity",
            format!(
                "{} of {} rooms unreachable (e.g. room #{})",
                unreached.len(),
                rooms.len(),
                first.id()
            ),
        ));
    }
    let open = layout.registry.available().len();
    if open > 0 {
        errors.push(ValidationError::warning(
            "connectivity",
            format!("{} doors lead nowhere", open),
        ));
    }
    errors
}

// ── Master validation ───────────────────────────────────────────────────

/// Run every check and return the combined results.
pub fn validate_layout(layout: &Layout, epsilon: f32) -> Vec<ValidationError> {
    let mut all = Vec::new();
    all.extend(check_room_overlaps(layout, epsilon));
    all.extend(check_piece_cells(layout));
    all.extend(check_grid(layout));
    all.extend(check_doors(layout));
    all.extend(check_connectivity(layout));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Cardinal, Position};
    use crate::pathfinding::tests::{join, row, spawn_piece};

    fn errors(found: &[ValidationError]) -> usize {
        found.iter().filter(|e| e.severity == Severity::Error).count()
    }

    #[test]
    fn test_clean_pair_passes() {
        let mut layout = Layout::new();
        let a = spawn_piece(&mut layout, PieceKind::Room, &row(0, 3, 0));
        let b = spawn_piece(&mut layout, PieceKind::Room, &row(3, 6, 0));
        join(&mut layout, a, Position::new(2, 0, 0), Cardinal::East, b);
        assert!(validate_layout(&layout, 0.1).is_empty());
    }

    #[test]
    fn test_overlap_detected() {
        let mut layout = Layout::new();
        spawn_piece(&mut layout, PieceKind::Room, &row(0, 3, 0));
        // second room claims overlapping cells
        spawn_piece(&mut layout, PieceKind::Room, &row(2, 5, 0));
        let found = check_room_overlaps(&layout, 0.1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, "room_overlap");
        assert_eq!(errors(&check_piece_cells(&layout)), 1);
    }

    #[test]
    fn test_unreached_room_is_warning() {
        let mut layout = Layout::new();
        spawn_piece(&mut layout, PieceKind::Room, &row(0, 2, 0));
        spawn_piece(&mut layout, PieceKind::Room, &row(5, 7, 0));
        let found = check_connectivity(&layout);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Warning);
    }

    #[test]
    fn test_broken_door_cell() {
        let mut layout = Layout::new();
        let a = spawn_piece(&mut layout, PieceKind::Room, &row(0, 3, 0));
        let b = spawn_piece(&mut layout, PieceKind::Room, &row(3, 6, 0));
        join(&mut layout, a, Position::new(2, 0, 0), Cardinal::East, b);
        layout.grid.set_kind(Position::new(3, 0, 0), CellKind::Room);
        let found = check_doors(&layout);
        assert_eq!(errors(&found), 1);
    }

    #[test]
    fn test_dangling_stair() {
        let mut layout = Layout::new();
        spawn_piece(&mut layout, PieceKind::Hallway, &row(0, 2, 0));
        layout.link_stair(Position::new(1, 0, 0), Position::new(3, 1, 0));
        assert_eq!(errors(&check_grid(&layout)), 1);
    }
}
