use anyhow::{Context, Result};
use battleshapi_client::autopilot::run_autopilot_cycle;
use battleshapi_client::board::Board;
use battleshapi_client::sandbox::{basic_hull, Sandbox};
use battleshapi_client::spatial::SpatialIndex;
use battleshapi_client::{Position, TargetStore};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Run only this layout.
    #[arg(long, value_enum)]
    layout: Option<Layout>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    ships: Option<usize>,
    #[arg(long)]
    turns: Option<u32>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

/// How targets are handed out at the start of a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
enum Layout {
    /// Every ship gets its own free cell near the board center.
    Rally,
    /// Every ship wants the same cell.
    Pileup,
    /// Every ship heads for the point mirrored through the center.
    Mirror,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    layout: Layout,
    seed: u64,
    ships: usize,
    rivals: usize,
    size: i32,
    units: i32,
    max_turns: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    layout: Layout,
    seed: u64,
    ships: usize,
    turns: u32,
    moves: usize,
    arrivals: usize,
    stalls: usize,
    #[serde(rename = "allArrived")]
    all_arrived: bool,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: i64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: i64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "arrivalRate")]
    arrival_rate: f64,
    #[serde(rename = "layoutCounts")]
    layout_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, started_at_ms));

    let mut results = Vec::new();
    for scenario in &scenarios {
        info!(%match_id, scenario = %scenario.name, seed = scenario.seed, ships = scenario.ships, "scenario started");
        let result = run_scenario(scenario)
            .await
            .with_context(|| format!("scenario {} failed", scenario.name))?;
        for anomaly in &result.anomalies {
            warn!(%match_id, scenario = %scenario.name, %anomaly, "anomaly detected");
        }
        info!(
            %match_id,
            scenario = %scenario.name,
            turns = result.turns,
            arrivals = result.arrivals,
            stalls = result.stalls,
            "scenario finished"
        );
        println!("{}", serde_json::to_string(&result)?);
        results.push(result);
    }

    let summary = build_run_summary(match_id.clone(), started_at_ms, now_ms(), results);
    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary)
            .with_context(|| format!("could not write summary to {}", path.display()))?;
    }
    info!(
        %match_id,
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        arrival_rate = summary.arrival_rate,
        "run finished"
    );

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_scenario(scenario: &Scenario) -> Result<ScenarioResultLine> {
    let started = Instant::now();
    let size = scenario.size;
    let hull = basic_hull(scenario.units);
    let mut world = Sandbox::new(size, size, scenario.seed)
        .with_player("me", true, Position::new(0, 0))
        .with_player("rival", false, Position::new(size, size));
    let fleet = world.scatter_ships("me", &hull, scenario.ships)?;
    world.scatter_ships("rival", &hull, scenario.rivals)?;

    let mut targets = TargetStore::in_memory();
    assign_targets(scenario.layout, &world.snapshot(), &mut targets, &fleet);

    let mut result = ScenarioResultLine {
        scenario: scenario.name.clone(),
        layout: scenario.layout,
        seed: scenario.seed,
        ships: fleet.len(),
        turns: 0,
        moves: 0,
        arrivals: 0,
        stalls: 0,
        all_arrived: false,
        duration_ms: 0,
        anomalies: Vec::new(),
    };
    let mut seen = HashSet::new();

    for turn in 1..=scenario.max_turns {
        let mut board = world.snapshot();
        board.reconcile(&mut targets);
        let before: HashMap<String, Position> = board
            .my_ships()
            .map(|ship| (ship.id.clone(), Position::new(ship.x, ship.y)))
            .collect();

        let report = run_autopilot_cycle(&mut board, &mut targets, &mut world).await?;
        result.turns = turn;
        result.moves += report.moved.len();
        result.arrivals += report.arrived.len();
        result.stalls += report.stalled.len();

        for anomaly in collect_anomalies(&world.snapshot(), &before, scenario.units) {
            if seen.insert(anomaly.clone()) {
                result.anomalies.push(format!("turn {turn}: {anomaly}"));
            }
        }

        world.end_turn();
        if targets.iter().all(|target| !target.has_target()) {
            result.all_arrived = true;
            break;
        }
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    Ok(result)
}

fn assign_targets(layout: Layout, board: &Board, targets: &mut TargetStore, fleet: &[String]) {
    let center = board.width / 2;
    let spots: Vec<Position> = match layout {
        Layout::Rally => {
            let index = SpatialIndex::new(board, targets);
            index.n_free_positions_in_radius(center, center, board.width / 3, fleet.len())
        }
        Layout::Pileup => vec![Position::new(center, center); fleet.len()],
        Layout::Mirror => fleet
            .iter()
            .filter_map(|ship_id| board.ship(ship_id))
            .map(|ship| Position::new(board.width - ship.x, board.height - ship.y))
            .collect(),
    };
    for (ship_id, spot) in fleet.iter().zip(spots) {
        targets.set_target(ship_id, spot.x, spot.y);
    }
}

/// Checks the world after a cycle: no stacked ships, nothing off the board,
/// no ship moved further than one turn's budget.
fn collect_anomalies(board: &Board, before: &HashMap<String, Position>, units: i32) -> Vec<String> {
    let mut anomalies = Vec::new();
    let mut cells = HashSet::new();
    for ship in board.ships() {
        if !cells.insert((ship.x, ship.y)) {
            anomalies.push(format!("two ships share ({}, {})", ship.x, ship.y));
        }
        if !board.in_bounds(ship.x, ship.y) {
            anomalies.push(format!("{} left the board", ship.id));
        }
        if let Some(start) = before.get(&ship.id) {
            if start.distance(ship.x, ship.y) > units {
                anomalies.push(format!("{} moved past its budget", ship.id));
            }
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli.seed.unwrap_or_else(|| now_ms().unsigned_abs());
    let ships = cli.ships.unwrap_or(6).clamp(1, 64);
    let max_turns = cli.turns.unwrap_or(40).clamp(1, 500);
    let layouts = match cli.layout {
        Some(layout) => vec![layout],
        None => vec![Layout::Rally, Layout::Pileup, Layout::Mirror],
    };
    layouts
        .into_iter()
        .enumerate()
        .map(|(idx, layout)| Scenario {
            name: format!("{}-{}", layout_key(layout), ships),
            layout,
            seed: seed.wrapping_add(idx as u64),
            ships,
            rivals: ships / 2,
            size: 20,
            units: 3,
            max_turns,
        })
        .collect()
}

fn layout_key(layout: Layout) -> &'static str {
    match layout {
        Layout::Rally => "rally",
        Layout::Pileup => "pileup",
        Layout::Mirror => "mirror",
    }
}

fn default_match_id(seed: u64, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: i64,
    finished_at_ms: i64,
    scenarios: Vec<ScenarioResultLine>,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let anomaly_count = scenarios.iter().map(|result| result.anomalies.len()).sum();
    let arrived = scenarios.iter().filter(|result| result.all_arrived).count();
    let arrival_rate = if scenario_count == 0 {
        0.0
    } else {
        arrived as f64 / scenario_count as f64
    };
    let mut layout_counts = BTreeMap::new();
    for result in &scenarios {
        *layout_counts
            .entry(layout_key(result.layout).to_string())
            .or_insert(0) += 1;
    }
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        arrival_rate,
        layout_counts,
        scenarios,
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)
}
