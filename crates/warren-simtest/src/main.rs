//! Warren Headless Generation Harness
//!
//! Generates layouts across a sweep of seeds and validates the results:
//! structural checks, reset behavior and path queries. Runs entirely
//! in-process with the in-memory piece factory.
//!
//! Usage:
//!   cargo run -p warren-simtest
//!   cargo run -p warren-simtest -- --verbose --seeds 100
//!
//! Set `RUST_LOG=debug` for per-phase generation logs.

use serde::Serialize;
use warren_logic::agent::AgentPathfinder;
use warren_logic::config::{GenerationConfig, PathfindingConfig};
use warren_logic::generator::{GenerationReport, MazeGenerator};
use warren_logic::geometry::Position;
use warren_logic::grid::Cell;
use warren_logic::layout::Layout;
use warren_logic::validation::{self, Severity};

// ── Generation config (same JSON a host would ship) ─────────────────────
const CONFIG_JSON: &str = include_str!("../../../data/warren_config.json");

const DEFAULT_SEEDS: u64 = 40;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

/// Per-seed line printed with `--verbose`.
#[derive(Serialize)]
struct SeedSummary {
    seed: u64,
    cells: usize,
    warnings: usize,
    report: GenerationReport,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let seeds = args
        .iter()
        .position(|a| a == "--seeds")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEEDS);
    println!("=== Warren Generation Harness ===\n");

    let mut results = Vec::new();

    // 1. Config and catalog
    let config = match GenerationConfig::from_json(CONFIG_JSON) {
        Ok(config) => {
            results.push(TestResult {
                name: "config_parses".into(),
                passed: true,
                detail: format!("{} blueprints", config.catalog().all().len()),
            });
            config
        }
        Err(e) => {
            results.push(TestResult {
                name: "config_parses".into(),
                passed: false,
                detail: e.to_string(),
            });
            GenerationConfig::default()
        }
    };

    // 2. Seed sweep with structural validation
    results.extend(validate_seed_sweep(&config, seeds, verbose));

    // 3. Reset behavior
    results.extend(validate_reset(&config));

    // 4. Path queries on generated layouts
    results.extend(validate_pathfinding(&config, seeds.min(10)));

    // 5. Degenerate configs
    results.extend(validate_single_room(&config));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn generator_for(config: &GenerationConfig, seed: u64) -> Option<MazeGenerator> {
    let mut config = config.clone();
    config.seed = Some(seed);
    MazeGenerator::new(config).ok()
}

// ── 2. Seed sweep ───────────────────────────────────────────────────────

fn validate_seed_sweep(config: &GenerationConfig, seeds: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Seed sweep ({} seeds) ---", seeds);
    let mut results = Vec::new();
    let mut total_rooms = 0;
    let mut total_corridors = 0;
    let mut total_warnings = 0;

    for seed in 0..seeds {
        let Some(mut generator) = generator_for(config, seed) else {
            results.push(TestResult {
                name: format!("seed_{}_config", seed),
                passed: false,
                detail: "generator rejected config".into(),
            });
            continue;
        };
        let report = match generator.generate_blocking() {
            Ok(report) => report,
            Err(e) => {
                results.push(TestResult {
                    name: format!("seed_{}_generate", seed),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let layout = generator.layout();
        let found = validation::validate_layout(layout, config.placement.collision_epsilon);
        let errors: Vec<_> = found
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .collect();
        let warnings = found.len() - errors.len();
        total_rooms += report.rooms();
        total_corridors += report.corridors.map_or(0, |c| c.corridors);
        total_warnings += warnings;

        if verbose {
            let summary = SeedSummary {
                seed,
                cells: layout.grid.len(),
                warnings,
                report: report.clone(),
            };
            if let Ok(line) = serde_json::to_string(&summary) {
                println!("  {}", line);
            }
        }

        if !errors.is_empty() {
            results.push(TestResult {
                name: format!("seed_{}_valid", seed),
                passed: false,
                detail: format!(
                    "{} errors, first: [{}] {}",
                    errors.len(),
                    errors[0].category,
                    errors[0].message
                ),
            });
        }

        let in_range = report.rooms() <= config.placement.max_rooms as usize
            && (report.placement.exhausted || report.rooms() >= config.placement.min_rooms as usize);
        if !in_range {
            results.push(TestResult {
                name: format!("seed_{}_room_count", seed),
                passed: false,
                detail: format!("{} rooms, target {}", report.rooms(), report.placement.target),
            });
        }
    }

    let failures = results.len();
    results.push(TestResult {
        name: "sweep_valid_layouts".into(),
        passed: failures == 0,
        detail: format!(
            "{} seeds, {} rooms, {} corridors, {} warnings",
            seeds, total_rooms, total_corridors, total_warnings
        ),
    });
    results
}

// ── 3. Reset ────────────────────────────────────────────────────────────

fn validate_reset(config: &GenerationConfig) -> Vec<TestResult> {
    println!("--- Reset ---");
    let mut results = Vec::new();
    let Some(mut generator) = generator_for(config, 99) else {
        return results;
    };

    let mut cleared = true;
    let mut regenerated = true;
    for _ in 0..3 {
        regenerated &= generator.generate_blocking().is_ok() && !generator.layout().is_empty();
        generator.reset();
        let layout = generator.layout();
        cleared &= layout.grid.is_empty() && layout.registry.is_empty() && layout.pieces.is_empty();
    }
    results.push(TestResult {
        name: "reset_clears_layout".into(),
        passed: cleared,
        detail: "grid, registry and pieces empty after every reset".into(),
    });
    results.push(TestResult {
        name: "generate_after_reset".into(),
        passed: regenerated,
        detail: "3 generate/reset cycles".into(),
    });

    let before = generator.layout().grid.len();
    let probe = generator.layout().grid.get(Position::new(1000, 0, 1000));
    results.push(TestResult {
        name: "read_does_not_materialize".into(),
        passed: probe.is_empty() && generator.layout().grid.len() == before,
        detail: "reading an empty position stores nothing".into(),
    });
    results
}

// ── 4. Pathfinding ──────────────────────────────────────────────────────

/// First non-door cell of every room, in room order.
fn room_probes(layout: &Layout) -> Vec<Position> {
    layout
        .rooms()
        .into_iter()
        .filter_map(|room| {
            layout
                .grid
                .owned_by(room)
                .into_iter()
                .find(|p| !layout.grid.get(*p).is_door())
        })
        .collect()
}

fn is_walk(path: &[Cell], layout: &Layout) -> bool {
    path.windows(2).all(|w| {
        let (p, q) = (w[0].position, w[1].position);
        p.manhattan(q) == 1 || layout.stair_link(p) == Some(q)
    })
}

fn validate_pathfinding(config: &GenerationConfig, seeds: u64) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();
    let mut queries = 0;
    let mut found = 0;
    let mut broken = Vec::new();
    let mut costlier = Vec::new();

    for seed in 0..seeds {
        let Some(mut generator) = generator_for(config, seed) else {
            continue;
        };
        if generator.generate_blocking().is_err() {
            continue;
        }
        let layout = generator.layout();
        let finder = generator.pathfinder();
        // A* searches the whole layout in one go, so give it more room than a single leg
        let wide = PathfindingConfig {
            expansion_factor: config.pathfinding.expansion_factor * 4,
            ..config.pathfinding.clone()
        };
        let agent = AgentPathfinder::new(layout, &wide);
        let probes = room_probes(layout);
        let Some(&origin) = probes.first() else {
            continue;
        };

        for &target in &probes {
            queries += 1;
            let Some(path) = finder.find_path(origin, target) else {
                continue;
            };
            found += 1;
            let ends_ok = path.first().map(|c| c.position) == Some(origin)
                && path.last().map(|c| c.position) == Some(target);
            if !ends_ok || !is_walk(&path, layout) {
                broken.push(format!("seed {} {}→{}", seed, origin, target));
            }
            // the agent route must exist wherever the stitched one does
            match agent.route(origin, target) {
                Some(route) if is_walk(&route.cells, layout) => {}
                _ => costlier.push(format!("seed {} {}→{}", seed, origin, target)),
            }
        }

        let same = finder.find_path(origin, origin);
        if same.map(|p| p.len()) != Some(1) {
            broken.push(format!("seed {} same-cell query", seed));
        }
    }

    results.push(TestResult {
        name: "paths_are_walks".into(),
        passed: broken.is_empty(),
        detail: if broken.is_empty() {
            format!("{}/{} room queries routed", found, queries)
        } else {
            format!("{} broken, e.g. {}", broken.len(), broken[0])
        },
    });
    results.push(TestResult {
        name: "agent_matches_stitched".into(),
        passed: costlier.is_empty(),
        detail: if costlier.is_empty() {
            "A* found every stitched route".into()
        } else {
            format!("{} mismatches, e.g. {}", costlier.len(), costlier[0])
        },
    });
    results
}

// ── 5. Single room ──────────────────────────────────────────────────────

fn validate_single_room(config: &GenerationConfig) -> Vec<TestResult> {
    println!("--- Single room ---");
    let mut results = Vec::new();
    let mut config = config.clone();
    config.placement.min_rooms = 1;
    config.placement.max_rooms = 1;
    let Some(mut generator) = generator_for(&config, 1) else {
        return results;
    };
    let report = generator.generate_blocking().ok();
    let layout = generator.layout();
    let open = layout
        .rooms()
        .first()
        .map(|r| layout.registry.available_for(*r).len())
        .unwrap_or(0);
    results.push(TestResult {
        name: "single_room_no_corridor".into(),
        passed: report.as_ref().map(|r| r.rooms()) == Some(1)
            && layout.corridors().is_empty()
            && open > 0,
        detail: format!("{} open doors kept", open),
    });
    results
}
