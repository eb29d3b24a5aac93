use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::grid::{Cell, GridEncoding};
use crate::error::{NavError, NavResult};

// ============================================================================
// GridSolver trait: pluggable path search over the token grid
// ============================================================================

/// Answer of a grid solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub path: Vec<Cell>,
    pub success: bool,
    pub time_ms: u64,
}

/// Shortest-path search that works purely on the token grid.
pub trait GridSolver {
    fn name(&self) -> &str;

    fn solve(&self, grid: &GridEncoding, timeout: Duration) -> NavResult<SolverOutcome>;
}

// ============================================================================
// Local BFS solver
// ============================================================================

/// 4-directional breadth-first search over non-WALL cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct BfsGridSolver;

impl GridSolver for BfsGridSolver {
    fn name(&self) -> &str {
        "bfs"
    }

    fn solve(&self, grid: &GridEncoding, _timeout: Duration) -> NavResult<SolverOutcome> {
        let started = Instant::now();
        let path = bfs_grid_path(grid);
        let time_ms = started.elapsed().as_millis() as u64;
        debug!(len = path.len(), time_ms, "bfs grid solve");

        Ok(SolverOutcome {
            success: !path.is_empty(),
            path,
            time_ms,
        })
    }
}

/// Shortest CURRENT → TARGET route through passable cells, or empty.
pub fn bfs_grid_path(grid: &GridEncoding) -> Vec<Cell> {
    let start = grid.current;
    let goal = grid.target;
    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut parent: HashMap<Cell, Cell> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    parent.insert(start, start);

    while let Some(cell) = queue.pop_front() {
        if cell == goal {
            let mut path = vec![goal];
            let mut at = goal;
            while at != start {
                at = parent[&at];
                path.push(at);
            }
            path.reverse();
            return path;
        }

        for next in grid.passable_neighbors(cell) {
            if !parent.contains_key(&next) {
                parent.insert(next, cell);
                queue.push_back(next);
            }
        }
    }

    Vec::new()
}

// ============================================================================
// Remote solver over HTTP
// ============================================================================

/// Grid solver hosted by a remote inference service.
///
/// Posts `{grid, width, height}` and expects `{path, success, inferenceTimeMs}`.
pub struct HttpGridSolver {
    pub endpoint: String,
}

#[derive(Serialize)]
struct SolveRequest<'a> {
    grid: &'a [u8],
    width: usize,
    height: usize,
}

#[derive(Deserialize)]
struct SolveResponse {
    #[serde(default)]
    path: Vec<Cell>,
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "inferenceTimeMs")]
    inference_time_ms: Option<u64>,
}

impl HttpGridSolver {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    fn failure(&self, reason: impl ToString) -> NavError {
        NavError::Solver {
            solver: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl GridSolver for HttpGridSolver {
    fn name(&self) -> &str {
        "http"
    }

    fn solve(&self, grid: &GridEncoding, timeout: Duration) -> NavResult<SolverOutcome> {
        let started = Instant::now();
        let codes = grid.to_codes();
        let request = SolveRequest {
            grid: &codes,
            width: grid.width,
            height: grid.height,
        };

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .map_err(|e| self.failure(e))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("HTTP {}", response.status())));
        }

        let body: SolveResponse = response.json().map_err(|e| self.failure(e))?;
        let elapsed = started.elapsed().as_millis() as u64;
        debug!(
            endpoint = %self.endpoint,
            success = body.success,
            inference_ms = ?body.inference_time_ms,
            round_trip_ms = elapsed,
            "remote grid solve"
        );

        // time_ms is the full round trip
        Ok(SolverOutcome {
            path: body.path,
            success: body.success,
            time_ms: elapsed,
        })
    }
}
