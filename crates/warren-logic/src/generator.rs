//! Top-level generation driver.
//!
//! [`MazeGenerator`] owns the layout and runs the phases in order: room
//! placement, corridor routing, registry sweep, and optionally capping the
//! doors nothing connected to. [`reset`](MazeGenerator::reset) wipes the
//! layout so the next run starts from nothing.

use crate::agent::AgentPathfinder;
use crate::blueprint::Catalog;
use crate::config::GenerationConfig;
use crate::corridors::{CorridorRouter, CorridorStats};
use crate::error::LayoutError;
use crate::layout::Layout;
use crate::pathfinding::Pathfinder;
use crate::pieces::{BlueprintFactory, PieceFactory};
use crate::placement::{PlacementStats, RoomPlacer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

/// What one generation run produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GenerationReport {
    pub seed: Option<u64>,
    pub placement: PlacementStats,
    /// `None` when routing was disabled or there was nothing to join.
    pub corridors: Option<CorridorStats>,
    pub swept_pairs: usize,
    pub capped_doors: usize,
    /// Doors still leading nowhere at the end of the run.
    pub open_doors: usize,
}

impl GenerationReport {
    pub fn rooms(&self) -> usize {
        self.placement.placed
    }
}

pub struct MazeGenerator<F = BlueprintFactory> {
    config: GenerationConfig,
    catalog: Catalog,
    factory: F,
    rng: StdRng,
    layout: Layout,
}

impl MazeGenerator<BlueprintFactory> {
    pub fn new(config: GenerationConfig) -> Result<Self, LayoutError> {
        Self::with_factory(config, BlueprintFactory)
    }
}

impl<F: PieceFactory> MazeGenerator<F> {
    /// Generator that builds pieces through `factory`.
    pub fn with_factory(config: GenerationConfig, factory: F) -> Result<Self, LayoutError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(LayoutError::InvalidConfig(errors));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            catalog: config.catalog(),
            config,
            factory,
            rng,
            layout: Layout::new(),
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Mutable access between runs, e.g. to lock doors.
    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    pub fn into_layout(self) -> Layout {
        self.layout
    }

    /// Restart the random sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Clear grid, registry and pieces.
    pub fn reset(&mut self) {
        self.layout.clear();
        log::debug!("layout reset");
    }

    /// Run every phase. A layout left over from an earlier run is reset first.
    pub async fn generate(&mut self) -> Result<GenerationReport, LayoutError> {
        if !self.layout.is_empty() {
            self.reset();
        }
        let mut report = GenerationReport {
            seed: self.config.seed,
            ..Default::default()
        };

        let outcome = RoomPlacer::new(
            &mut self.layout,
            &mut self.factory,
            &mut self.rng,
            &self.config.placement,
            &self.catalog,
        )
        .run()
        .await?;
        report.placement = outcome.stats;

        if !self.config.corridors.enabled {
            log::debug!("corridor routing disabled");
        } else if outcome.rooms.len() < 2 {
            log::info!("single room, no corridors to route");
        } else {
            let stats = CorridorRouter::new(
                &mut self.layout,
                &mut self.factory,
                &mut self.rng,
                &self.config.corridors,
            )
            .run()
            .await?;
            report.corridors = Some(stats);
        }

        self.layout.registry.mark_dirty();
        report.swept_pairs = self.layout.sweep();
        if self.config.cap_open_doors {
            report.capped_doors = self.layout.cap_open_doors()?;
        }
        report.open_doors = self.layout.registry.available().len();

        log::info!(
            "generated {} rooms, {} corridors, {} cells, {} open doors",
            report.rooms(),
            report.corridors.map_or(0, |c| c.corridors),
            self.layout.grid.len(),
            report.open_doors
        );
        Ok(report)
    }

    /// [`generate`](Self::generate) driven to completion on this thread.
    pub fn generate_blocking(&mut self) -> Result<GenerationReport, LayoutError> {
        pollster::block_on(self.generate())
    }

    pub fn pathfinder(&self) -> Pathfinder<'_> {
        Pathfinder::new(&self.layout, &self.config.pathfinding)
    }

    pub fn agent(&self) -> AgentPathfinder<'_> {
        AgentPathfinder::new(&self.layout, &self.config.pathfinding)
    }
}
