//! Generation configuration.
//!
//! Every section has sensible defaults, so a config file only needs the
//! values it changes:
//!
//! ```
//! use warren_logic::config::GenerationConfig;
//!
//! let config = GenerationConfig::from_json(r#"{ "seed": 7, "placement": { "max_rooms": 6 } }"#).unwrap();
//! assert_eq!(config.seed, Some(7));
//! assert_eq!(config.placement.max_rooms, 6);
//! assert_eq!(config.placement.min_rooms, 4);
//! ```

use crate::blueprint::{Blueprint, Catalog};
use crate::error::LayoutError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A single configuration problem. [`GenerationConfig::validate`] reports all of them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("room range {min}..={max} is empty or starts at zero")]
    InvalidRoomRange { min: u32, max: u32 },

    #[error("{field} must be within 0..=1, got {value}")]
    InvalidProbability { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    #[error("alley length range {min}..={max} is empty")]
    InvalidAlleyRange { min: u32, max: u32 },

    #[error("blueprint '{name}': {reason}")]
    InvalidBlueprint { name: String, reason: String },

    #[error("blueprint name '{0}' is used more than once")]
    DuplicateBlueprint(String),

    #[error("root blueprint '{0}' is not in the catalog")]
    UnknownRoot(String),

    /// Every blueprint is special, so ordinary growth has nothing to use.
    #[error("catalog has no non-special blueprints")]
    NoGenericBlueprint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub min_rooms: u32,
    pub max_rooms: u32,
    /// Blueprint for the first room. Random generic blueprint when unset.
    pub root_blueprint: Option<String>,
    /// Chance that an attachment uses a special blueprint.
    pub special_chance: f64,
    /// Failed attempts allowed per target room before giving up.
    pub retry_multiplier: u32,
    /// Shrink applied to both boxes in the collision test, in tiles.
    pub collision_epsilon: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_rooms: 4,
            max_rooms: 10,
            root_blueprint: None,
            special_chance: 0.1,
            retry_multiplier: 3,
            collision_epsilon: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    pub enabled: bool,
    /// Root pairs further apart than this (Manhattan, tiles) are never joined.
    pub max_connection_distance: i32,
    /// Most levels a single connection may climb or descend.
    pub max_stair_steps: i32,
    pub alley_chance: f64,
    pub alley_min_len: u32,
    pub alley_max_len: u32,
    pub trap_ratio: f64,
    pub trap_retry_multiplier: u32,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_connection_distance: 12,
            max_stair_steps: 6,
            alley_chance: 0.4,
            alley_min_len: 3,
            alley_max_len: 10,
            trap_ratio: 0.4,
            trap_retry_multiplier: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Slack added to the start→goal Manhattan distance.
    pub buffer_tiles: i32,
    /// Expanded-cell budget per tile of buffered distance.
    pub expansion_factor: i32,
    /// Extra A* cost for stepping onto a trap cell.
    pub trap_penalty: u32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            buffer_tiles: 8,
            expansion_factor: 16,
            trap_penalty: 0,
        }
    }
}

impl PathfindingConfig {
    /// Most cells a single search may expand between `distance`-apart points.
    pub fn search_budget(&self, distance: i32) -> usize {
        ((distance.max(0) + self.buffer_tiles) * self.expansion_factor).max(1) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GenerationConfig {
    /// Fixed seed for reproducible layouts. Entropy-seeded when unset.
    pub seed: Option<u64>,
    pub placement: PlacementConfig,
    pub corridors: CorridorConfig,
    pub pathfinding: PathfindingConfig,
    /// Wall off doors still open after routing.
    pub cap_open_doors: bool,
    /// Custom room set. The built-in catalog is used when empty.
    pub catalog: Vec<Blueprint>,
}

impl GenerationConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let config: GenerationConfig = serde_json::from_str(json)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(LayoutError::InvalidConfig(errors))
        }
    }

    pub fn catalog(&self) -> Catalog {
        if self.catalog.is_empty() {
            Catalog::builtin()
        } else {
            Catalog::new(self.catalog.clone())
        }
    }

    /// Every problem with this config; empty when valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let p = &self.placement;
        let c = &self.corridors;

        if p.min_rooms == 0 || p.min_rooms > p.max_rooms {
            errors.push(ConfigError::InvalidRoomRange {
                min: p.min_rooms,
                max: p.max_rooms,
            });
        }
        for (field, value) in [
            ("special_chance", p.special_chance),
            ("alley_chance", c.alley_chance),
            ("trap_ratio", c.trap_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::InvalidProbability { field, value });
            }
        }
        for (field, value) in [
            ("retry_multiplier", p.retry_multiplier as i64),
            ("max_connection_distance", c.max_connection_distance as i64),
            ("max_stair_steps", c.max_stair_steps as i64),
            ("expansion_factor", self.pathfinding.expansion_factor as i64),
        ] {
            if value <= 0 {
                errors.push(ConfigError::NotPositive { field, value });
            }
        }
        if c.alley_min_len > c.alley_max_len {
            errors.push(ConfigError::InvalidAlleyRange {
                min: c.alley_min_len,
                max: c.alley_max_len,
            });
        }

        let catalog = self.catalog();
        let mut names = HashSet::new();
        for bp in catalog.all() {
            errors.extend(bp.check());
            if !names.insert(bp.name.as_str()) {
                errors.push(ConfigError::DuplicateBlueprint(bp.name.clone()));
            }
        }
        if catalog.generic().next().is_none() {
            errors.push(ConfigError::NoGenericBlueprint);
        }
        if let Some(root) = &p.root_blueprint {
            if catalog.get(root).is_none() {
                errors.push(ConfigError::UnknownRoot(root.clone()));
            }
        }

        errors
    }
}
