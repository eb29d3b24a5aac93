use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::encoder::grid::{Cell, GridEncoding, is_adjacent};
use crate::encoder::spatial::encode;
use crate::error::{NavError, NavResult};
use crate::graph::state_graph::{NodeIndex, StateGraph};
use crate::planner::solver::GridSolver;
use crate::state::state_model::StateId;

/// Default time budget for the grid solver.
pub const DEFAULT_SOLVER_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Route model
// ============================================================================

/// How a route was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Current state already is the target
    Trivial,
    /// Found by the grid solver and confirmed against the graph
    Grid { solver: String },
    /// Breadth-first search over recorded transitions
    GraphFallback,
    /// Nothing found
    Exhausted,
    /// Several legs chained through intermediate states, one strategy per leg
    Waypoints { legs: Vec<RouteStrategy> },
}

/// Ordered state sequence from current to target, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub reachable: bool,
    pub states: Vec<StateId>,
    /// Grid cells walked by the solver (empty unless `strategy` is `Grid`)
    pub cells: Vec<Cell>,
    pub strategy: RouteStrategy,
    pub reason: Option<String>,
}

impl Route {
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            reachable: false,
            states: Vec::new(),
            cells: Vec::new(),
            strategy: RouteStrategy::Exhausted,
            reason: Some(reason.into()),
        }
    }

    /// Number of hops (transitions) along the route.
    pub fn hops(&self) -> usize {
        self.states.len().saturating_sub(1)
    }
}

// ============================================================================
// PathPlanner
// ============================================================================

/// Finds routes between states: grid solver first, then a breadth-first
/// search over the raw graph whenever the grid attempt does not yield a
/// route the graph confirms.
pub struct PathPlanner {
    solver: Option<Box<dyn GridSolver>>,
    solver_timeout: Duration,
}

impl PathPlanner {
    pub fn new(solver: Option<Box<dyn GridSolver>>) -> Self {
        Self {
            solver,
            solver_timeout: Duration::from_millis(DEFAULT_SOLVER_TIMEOUT_MS),
        }
    }

    /// Planner without a grid solver; every route comes from graph search.
    pub fn graph_only() -> Self {
        Self::new(None)
    }

    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn solver_name(&self) -> Option<&str> {
        self.solver.as_ref().map(|s| s.name())
    }

    /// Find a route from `current` to `target`.
    ///
    /// Never fails: an unknown endpoint or an exhausted search is reported as
    /// `reachable: false` with a reason.
    pub fn find_route(&self, graph: &StateGraph, current: &StateId, target: &StateId) -> Route {
        if !graph.contains(current) {
            return Route::unreachable(format!("current state '{}' is not in the graph", current));
        }
        if !graph.contains(target) {
            return Route::unreachable(format!("target state '{}' is not in the graph", target));
        }
        if current == target {
            return Route {
                reachable: true,
                states: vec![current.clone()],
                cells: Vec::new(),
                strategy: RouteStrategy::Trivial,
                reason: None,
            };
        }

        match self.grid_route(graph, current, target) {
            Ok(route) => {
                info!(from = %current, to = %target, hops = route.hops(), "grid route found");
                return route;
            }
            Err(e @ NavError::EncodingInconsistency(_)) => {
                warn!(from = %current, to = %target, error = %e, "grid route rejected, falling back to graph search");
            }
            Err(e) => {
                debug!(from = %current, to = %target, error = %e, "grid route unavailable, falling back to graph search");
            }
        }

        match graph_bfs(graph, current, target) {
            Some(states) => {
                info!(from = %current, to = %target, hops = states.len() - 1, "graph route found");
                Route {
                    reachable: true,
                    states,
                    cells: Vec::new(),
                    strategy: RouteStrategy::GraphFallback,
                    reason: None,
                }
            }
            None => {
                info!(from = %current, to = %target, "target unreachable");
                Route::unreachable(format!(
                    "no recorded transitions lead from '{}' to '{}'",
                    current, target
                ))
            }
        }
    }

    fn grid_route(&self, graph: &StateGraph, current: &StateId, target: &StateId) -> NavResult<Route> {
        let solver = self.solver.as_ref().ok_or_else(|| NavError::Solver {
            solver: "none".into(),
            reason: "no grid solver configured".into(),
        })?;
        let solver_failure = |reason: String| NavError::Solver {
            solver: solver.name().to_string(),
            reason,
        };

        let grid = encode(graph, current, target)?;
        let outcome = solver.solve(&grid, self.solver_timeout)?;

        let budget_ms = self.solver_timeout.as_millis() as u64;
        if outcome.time_ms > budget_ms {
            return Err(solver_failure(format!(
                "took {}ms, budget {}ms",
                outcome.time_ms, budget_ms
            )));
        }
        if !outcome.success || outcome.path.is_empty() {
            return Err(solver_failure("reported no path".into()));
        }
        validate_grid_path(&grid, &outcome.path).map_err(solver_failure)?;

        let states = decode_path(&grid, &outcome.path);
        check_backed_by_graph(graph, &states, current, target)?;

        Ok(Route {
            reachable: true,
            states,
            cells: outcome.path,
            strategy: RouteStrategy::Grid {
                solver: solver.name().to_string(),
            },
            reason: None,
        })
    }
}

// ============================================================================
// Path checks and decoding
// ============================================================================

/// Check that `path` walks from CURRENT to TARGET through passable cells in
/// 4-adjacent steps.
pub fn validate_grid_path(grid: &GridEncoding, path: &[Cell]) -> Result<(), String> {
    match (path.first(), path.last()) {
        (Some(&first), Some(&last)) => {
            if first != grid.current {
                return Err(format!("path starts at {:?}, not at CURRENT {:?}", first, grid.current));
            }
            if last != grid.target {
                return Err(format!("path ends at {:?}, not at TARGET {:?}", last, grid.target));
            }
        }
        _ => return Err("empty path".into()),
    }

    for (i, &cell) in path.iter().enumerate() {
        if !grid.in_bounds(cell) || !grid.token(cell).is_passable() {
            return Err(format!("step {} at {:?} is a wall", i, cell));
        }
        if i > 0 && !is_adjacent(path[i - 1], cell) {
            return Err(format!("step {} jumps from {:?} to {:?}", i, path[i - 1], cell));
        }
    }
    Ok(())
}

/// Map grid cells back to states, dropping corridor/padding cells and
/// collapsing consecutive repeats.
pub fn decode_path(grid: &GridEncoding, path: &[Cell]) -> Vec<StateId> {
    let mut states: Vec<StateId> = Vec::new();
    for cell in path {
        if let Some(id) = grid.state_at.get(cell) {
            if states.last() != Some(id) {
                states.push(id.clone());
            }
        }
    }
    states
}

fn check_backed_by_graph(
    graph: &StateGraph,
    states: &[StateId],
    current: &StateId,
    target: &StateId,
) -> NavResult<()> {
    if states.first() != Some(current) || states.last() != Some(target) {
        return Err(NavError::EncodingInconsistency(format!(
            "decoded path {:?} does not run from '{}' to '{}'",
            states, current, target
        )));
    }

    for hop in states.windows(2) {
        if graph.find_transition(&hop[0], &hop[1]).is_none() {
            return Err(NavError::EncodingInconsistency(format!(
                "grid connects '{}' to '{}' but no transition was recorded",
                hop[0], hop[1]
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Raw-graph search
// ============================================================================

/// Shortest state sequence over recorded transitions, visiting neighbors in
/// insertion order. `None` when `target` cannot be reached.
pub fn graph_bfs(graph: &StateGraph, from: &StateId, target: &StateId) -> Option<Vec<StateId>> {
    let start = graph.index_of(from)?;
    let goal = graph.index_of(target)?;

    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::from([(start, start)]);
    let mut queue = VecDeque::from([start]);

    while let Some(ix) = queue.pop_front() {
        if ix == goal {
            let mut path = vec![ix];
            let mut at = ix;
            while at != start {
                at = parent[&at];
                path.push(at);
            }
            path.reverse();
            return Some(
                path.into_iter()
                    .filter_map(|i| graph.state_at(i).map(|s| s.id.clone()))
                    .collect(),
            );
        }

        let id = &graph.state_at(ix)?.id;
        for (t, _) in graph.neighbors(id) {
            if !parent.contains_key(&t.to) {
                parent.insert(t.to, ix);
                queue.push_back(t.to);
            }
        }
    }

    None
}
