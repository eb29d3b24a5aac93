use std::fmt::Write as _;
use std::time::Duration;

use tracing::{info, warn};

use crate::cli::config::{OutputFormat, SolverKind, SolverSettings};
use crate::driver::session::{DriverConfig, DriverSession};
use crate::encoder::grid::render;
use crate::encoder::spatial::encode;
use crate::error::NavError;
use crate::graph::persist::{LoadReport, load_graph};
use crate::graph::state_graph::StateGraph;
use crate::planner::path_planner::{PathPlanner, RouteStrategy};
use crate::planner::solver::{BfsGridSolver, GridSolver, HttpGridSolver};
use crate::sequencer::plan::{Plan, plan_via};
use crate::sequencer::runner::{AbortHandle, StopPolicy};
use crate::session::navigation::{NavigationSession, SessionConfig};
use crate::state::state_model::StateId;
use crate::trace::writer::NavTrace;

// ============================================================================
// plan subcommand
// ============================================================================

/// Print a plan and return whether the target is reachable.
pub fn cmd_plan(
    graph_path: &str,
    from: &str,
    via: &[String],
    to: &str,
    format: OutputFormat,
    planner: &PathPlanner,
) -> Result<bool, Box<dyn std::error::Error>> {
    let graph = load_reported(graph_path)?;
    let waypoints: Vec<StateId> = via
        .iter()
        .map(|s| StateId::from(s.as_str()))
        .chain(std::iter::once(StateId::from(to)))
        .collect();
    let plan = plan_via(&graph, planner, &StateId::from(from), &waypoints);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print!("{}", format_plan(&plan)),
    }

    Ok(plan.reachable)
}

// ============================================================================
// encode subcommand
// ============================================================================

pub fn cmd_encode(
    graph_path: &str,
    current: &str,
    target: &str,
    codes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let graph = load_reported(graph_path)?;
    let grid = encode(&graph, &StateId::from(current), &StateId::from(target))?;

    println!("{}x{} grid, {} states", grid.width, grid.height, grid.cell_of.len());
    if codes {
        for row in &grid.rows {
            let line: Vec<String> = row.iter().map(|t| t.code().to_string()).collect();
            println!("{}", line.join(" "));
        }
    } else {
        print!("{}", render(&grid));
    }

    for (cell, id) in &grid.state_at {
        let label = graph.get_state(id).map(|s| s.label.as_str()).unwrap_or("");
        println!("  ({}, {}) {} {}", cell.0, cell.1, id, label);
    }
    Ok(())
}

// ============================================================================
// inspect subcommand
// ============================================================================

pub fn cmd_inspect(graph_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (graph, report) = load_graph(graph_path)?;
    print!("{}", format_inspection(&graph, &report));
    Ok(())
}

pub fn format_inspection(graph: &StateGraph, report: &LoadReport) -> String {
    let mut out = String::new();
    let meta = graph.metadata();
    let _ = writeln!(
        out,
        "Graph v{}: {} states, {} transitions (exploration {})",
        meta.version,
        graph.len(),
        graph.transition_count(),
        if meta.exploration_complete { "complete" } else { "in progress" }
    );

    for state in graph.states() {
        let _ = writeln!(
            out,
            "  {} \"{}\" ({} elements)",
            state.id,
            state.label,
            state.elements.len()
        );
        for (t, to) in graph.neighbors(&state.id) {
            let _ = writeln!(out, "    -> {} via {} (x{})", to, t.action, t.observed_count);
        }
    }

    if report.reversed_edges > 0 {
        let _ = writeln!(out, "Bidirectional: {} reverse edges added", report.reversed_edges);
    }
    if !report.is_clean() {
        let _ = writeln!(
            out,
            "Repairs: {} duplicate states merged, {} dangling edges dropped, {} duplicate edges merged, {} counts repaired",
            report.duplicate_states.len(),
            report.dropped_edges.len(),
            report.merged_edges,
            report.repaired_counts
        );
    }
    out
}

// ============================================================================
// navigate subcommand
// ============================================================================

pub struct NavigateArgs<'a> {
    pub graph_path: &'a str,
    pub target: &'a str,
    pub driver: &'a str,
    pub driver_args: &'a [String],
    pub continue_on_failure: bool,
    pub save: bool,
    pub trace: Option<&'a str>,
    pub driver_config: DriverConfig,
}

/// Drive the target to `args.target` and return whether it arrived.
pub fn cmd_navigate(
    args: &NavigateArgs,
    planner: PathPlanner,
    mut config: SessionConfig,
    verbose: u8,
) -> Result<bool, Box<dyn std::error::Error>> {
    let graph = load_reported(args.graph_path)?;
    if args.continue_on_failure {
        config.execution.stop_policy = StopPolicy::ContinueOnFailure;
    }

    let tracer = args.trace.map(NavTrace::create).unwrap_or_else(NavTrace::disabled);
    let mut session = NavigationSession::new(planner, config)
        .with_graph(graph)
        .with_tracer(tracer);
    let mut driver = DriverSession::launch_with(args.driver, args.driver_args, args.driver_config.clone())?;

    let start = session.observe(&mut driver)?;
    let target = StateId::from(args.target);
    if verbose > 0 {
        eprintln!("Starting at {}, navigating to {}", start, target);
    }

    let outcome = session.navigate_to(&target, &mut driver, &AbortHandle::new(), |i, total, action| {
        if verbose > 0 {
            eprintln!("  [{}/{}] {}", i + 1, total, action);
        }
    })?;
    driver.quit();

    print!("{}", format_plan(&outcome.plan));
    println!(
        "Executed {}/{} actions; {}",
        outcome.report.completed,
        outcome.report.total,
        if outcome.arrived { "arrived" } else { "did not arrive" }
    );
    for failure in &outcome.report.failures {
        println!("  action {} failed: {}", failure.index + 1, failure.reason);
    }

    if args.save {
        session.save(args.graph_path)?;
        info!(path = args.graph_path, "graph saved");
    }

    Ok(outcome.arrived)
}

// ============================================================================
// Helpers
// ============================================================================

/// Build the planner from resolved solver settings.
pub fn build_planner(settings: &SolverSettings) -> Result<PathPlanner, NavError> {
    let solver: Option<Box<dyn GridSolver>> = match settings.kind {
        SolverKind::Bfs => Some(Box::new(BfsGridSolver)),
        SolverKind::Http => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| NavError::Solver {
                solver: "http".into(),
                reason: "no endpoint configured".into(),
            })?;
            Some(Box::new(HttpGridSolver::new(endpoint)))
        }
        SolverKind::None => None,
    };
    Ok(PathPlanner::new(solver).with_solver_timeout(Duration::from_millis(settings.timeout_ms)))
}

pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    if !plan.reachable {
        let _ = writeln!(
            out,
            "Unreachable: {}",
            plan.error.as_deref().unwrap_or("no route")
        );
        return out;
    }

    let path: Vec<&str> = plan.states.iter().map(|s| s.as_str()).collect();
    let _ = writeln!(out, "Route ({}): {}", strategy_name(&plan.strategy), path.join(" -> "));
    for (i, action) in plan.actions.iter().enumerate() {
        let derived = if plan.derived_hops.contains(&i) { " (derived)" } else { "" };
        let _ = writeln!(out, "  {}. {}{}", i + 1, action, derived);
    }
    out
}

fn strategy_name(strategy: &RouteStrategy) -> String {
    match strategy {
        RouteStrategy::Trivial => "already there".into(),
        RouteStrategy::Grid { solver } => format!("grid/{}", solver),
        RouteStrategy::GraphFallback => "graph search".into(),
        RouteStrategy::Exhausted => "exhausted".into(),
        RouteStrategy::Waypoints { legs } => {
            let names: Vec<String> = legs.iter().map(strategy_name).collect();
            format!("{} legs: {}", legs.len(), names.join(", "))
        }
    }
}

fn load_reported(path: &str) -> Result<StateGraph, NavError> {
    let (graph, report) = load_graph(path)?;
    if !report.is_clean() {
        warn!(path, ?report, "graph repaired on load");
    }
    Ok(graph)
}
