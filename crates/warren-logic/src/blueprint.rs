//! Room blueprints: footprints and door slots the placement engine attaches.
//!
//! A blueprint describes a rectangular room of `width × depth` tiles over
//! `levels` storeys, in local coordinates with its min corner at the
//! origin. Door slots sit on the footprint perimeter and face outward.
//! Blueprints can be rotated in quarter turns before placement.

use crate::config::ConfigError;
use crate::geometry::{Cardinal, Position, Rotation, TileBounds};
use crate::registry::DoorAnchor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A door opening in local blueprint coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSlot {
    pub x: i32,
    #[serde(default)]
    pub level: i32,
    pub z: i32,
    pub facing: Cardinal,
}

impl DoorSlot {
    pub const fn new(x: i32, level: i32, z: i32, facing: Cardinal) -> Self {
        Self { x, level, z, facing }
    }
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub width: i32,
    pub depth: i32,
    #[serde(default = "one")]
    pub levels: i32,
    pub doors: Vec<DoorSlot>,
    /// Special rooms are rare and not repeated until every special was used.
    #[serde(default)]
    pub special: bool,
}

impl Blueprint {
    pub fn new(name: &str, width: i32, depth: i32, doors: Vec<DoorSlot>) -> Self {
        Self {
            name: name.to_string(),
            width,
            depth,
            levels: 1,
            doors,
            special: false,
        }
    }

    pub fn with_levels(mut self, levels: i32) -> Self {
        self.levels = levels;
        self
    }

    pub fn into_special(mut self) -> Self {
        self.special = true;
        self
    }

    /// `(width, depth)` after `rotation`.
    pub fn extent(&self, rotation: Rotation) -> (i32, i32) {
        rotation.extent(self.width, self.depth)
    }

    /// A slot's local tile and facing after `rotation`.
    pub fn rotated_slot(&self, slot: &DoorSlot, rotation: Rotation) -> (Position, Cardinal) {
        let (x, z) = rotation.apply(slot.x, slot.z, self.width, self.depth);
        (Position::new(x, slot.level, z), slot.facing.rotated(rotation))
    }

    /// Bounds when the rotated footprint's min corner sits at `origin`.
    pub fn bounds_at(&self, origin: Position, rotation: Rotation) -> TileBounds {
        let (w, d) = self.extent(rotation);
        TileBounds::new(origin, w, self.levels, d)
    }

    /// World-space door anchors when placed at `origin`.
    pub fn door_anchors(&self, origin: Position, rotation: Rotation) -> Vec<DoorAnchor> {
        self.doors
            .iter()
            .map(|slot| {
                let (local, facing) = self.rotated_slot(slot, rotation);
                DoorAnchor {
                    cell: origin + local,
                    facing,
                }
            })
            .collect()
    }

    /// Structural problems with this blueprint.
    pub fn check(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let bad = |reason: String| ConfigError::InvalidBlueprint {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            errors.push(bad("empty name".into()));
        }
        if self.width < 1 || self.depth < 1 || self.levels < 1 {
            errors.push(bad(format!(
                "non-positive size {}×{}×{}",
                self.width, self.levels, self.depth
            )));
            return errors;
        }
        if self.doors.is_empty() {
            errors.push(bad("no door slots".into()));
        }
        let mut seen = HashSet::new();
        for slot in &self.doors {
            if !self.slot_on_perimeter(slot) {
                errors.push(bad(format!(
                    "door at ({}, {}, {}) facing {:?} is not on the matching edge",
                    slot.x, slot.level, slot.z, slot.facing
                )));
            }
            if !seen.insert((slot.x, slot.level, slot.z, slot.facing)) {
                errors.push(bad(format!(
                    "duplicate door at ({}, {}, {})",
                    slot.x, slot.level, slot.z
                )));
            }
        }
        errors
    }

    fn slot_on_perimeter(&self, slot: &DoorSlot) -> bool {
        let in_range = (0..self.width).contains(&slot.x)
            && (0..self.depth).contains(&slot.z)
            && (0..self.levels).contains(&slot.level);
        in_range
            && match slot.facing {
                Cardinal::North => slot.z == self.depth - 1,
                Cardinal::South => slot.z == 0,
                Cardinal::East => slot.x == self.width - 1,
                Cardinal::West => slot.x == 0,
            }
    }
}

/// The rooms available to a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    blueprints: Vec<Blueprint>,
}

impl Catalog {
    pub fn new(blueprints: Vec<Blueprint>) -> Self {
        Self { blueprints }
    }

    /// The built-in room set.
    pub fn builtin() -> Self {
        Self::new(builtin())
    }

    pub fn get(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.iter().find(|b| b.name == name)
    }

    pub fn all(&self) -> &[Blueprint] {
        &self.blueprints
    }

    pub fn generic(&self) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.iter().filter(|b| !b.special)
    }

    pub fn specials(&self) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.iter().filter(|b| b.special)
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}

/// Built-in blueprints: a mix of sizes, a two-storey tower whose upper door
/// forces stairs, and two specials.
pub fn builtin() -> Vec<Blueprint> {
    use Cardinal::*;
    vec![
        Blueprint::new(
            "hub",
            3,
            3,
            vec![
                DoorSlot::new(1, 0, 2, North),
                DoorSlot::new(2, 0, 1, East),
                DoorSlot::new(1, 0, 0, South),
                DoorSlot::new(0, 0, 1, West),
            ],
        ),
        Blueprint::new(
            "chamber",
            2,
            2,
            vec![DoorSlot::new(0, 0, 1, North), DoorSlot::new(1, 0, 0, South)],
        ),
        Blueprint::new(
            "gallery",
            5,
            2,
            vec![
                DoorSlot::new(0, 0, 0, West),
                DoorSlot::new(4, 0, 1, East),
                DoorSlot::new(2, 0, 1, North),
            ],
        ),
        Blueprint::new(
            "corner",
            2,
            2,
            vec![DoorSlot::new(0, 0, 0, South), DoorSlot::new(1, 0, 1, East)],
        ),
        Blueprint::new("closet", 1, 1, vec![DoorSlot::new(0, 0, 0, South)]),
        Blueprint::new(
            "tower",
            2,
            2,
            vec![DoorSlot::new(0, 0, 0, South), DoorSlot::new(1, 1, 1, North)],
        )
        .with_levels(2),
        Blueprint::new("vault", 3, 3, vec![DoorSlot::new(1, 0, 0, South)]).into_special(),
        Blueprint::new(
            "shrine",
            2,
            3,
            vec![DoorSlot::new(0, 0, 1, West), DoorSlot::new(1, 0, 1, East)],
        )
        .into_special(),
    ]
}
