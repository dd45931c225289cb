//! Pure layout synthesis and pathfinding for Warren.
//!
//! This crate grows a connected set of rooms on an integer lattice, routes
//! corridors (with stairs) between the doors left open, and answers path
//! queries over the result. Nothing here renders, stores or networks; pieces
//! are built through the [`pieces::PieceFactory`] seam so an engine can back
//! them with real geometry.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | A* routes with cost bookkeeping for live agents |
//! | [`blueprint`] | Room footprints, door slots, rotation, built-in catalog |
//! | [`config`] | Generation config with defaults, JSON loading, validation |
//! | [`corridors`] | Hallway routing between open doors: stairs, alleys, traps |
//! | [`error`] | `LayoutError` for programmer errors |
//! | [`generator`] | `MazeGenerator` driving every phase, begin/reset |
//! | [`geometry`] | Lattice positions, directions, rotations, tile bounds, collision |
//! | [`grid`] | Sparse cell grid with kinds, owners, wall visibility |
//! | [`layout`] | Grid + door registry + pieces + stair links of one layout |
//! | [`pathfinding`] | Room-graph search, cell search, stitching, corridor snapping |
//! | [`pieces`] | Piece/door/stair components on an ECS world, two-phase construction |
//! | [`placement`] | Room placement by door-to-door attachment |
//! | [`queue`] | Min-priority queue with priority updates |
//! | [`registry`] | Door pairs, availability, room-graph BFS, dangling-pair sweep |
//! | [`validation`] | Structural checks (overlaps, grid, doors, connectivity) |
//!
//! # Example
//!
//! ```
//! use warren_logic::config::GenerationConfig;
//! use warren_logic::generator::MazeGenerator;
//!
//! let config = GenerationConfig { seed: Some(7), ..Default::default() };
//! let mut generator = MazeGenerator::new(config).unwrap();
//! let report = generator.generate_blocking().unwrap();
//! assert!(report.rooms() >= 1);
//! ```

pub mod agent;
pub mod blueprint;
pub mod config;
pub mod corridors;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod grid;
pub mod layout;
pub mod pathfinding;
pub mod pieces;
pub mod placement;
pub mod queue;
pub mod registry;
pub mod validation;

pub use error::LayoutError;
