use std::collections::BTreeMap;

use tracing::debug;

use crate::encoder::grid::{Cell, GridEncoding, Token, is_adjacent};
use crate::error::{NavError, NavResult};
use crate::graph::state_graph::{NodeIndex, StateGraph};
use crate::state::state_model::StateId;

/// Encode `graph` into a square token grid with `current` and `target` marked.
///
/// Side length is `ceil(sqrt(N)) + 2`: states fill the interior row by row
/// in insertion order, surrounded by a one-cell wall border. Every
/// transition between non-adjacent cells gets an L-shaped corridor. The
/// output depends only on the graph and the (current, target) pair.
pub fn encode(graph: &StateGraph, current: &StateId, target: &StateId) -> NavResult<GridEncoding> {
    let current_ix = graph
        .index_of(current)
        .ok_or_else(|| NavError::UnknownState(current.to_string()))?;
    let target_ix = graph
        .index_of(target)
        .ok_or_else(|| NavError::UnknownState(target.to_string()))?;

    let inner = interior_side(graph.len());
    let side = inner + 2;
    let mut rows = vec![vec![Token::Wall; side]; side];
    let mut state_at = BTreeMap::new();
    let mut cell_of = BTreeMap::new();

    for (i, state) in graph.states().iter().enumerate() {
        let cell = placement(NodeIndex(i), inner);
        rows[cell.0][cell.1] = Token::Walkable;
        state_at.insert(cell, state.id.clone());
        cell_of.insert(state.id.clone(), cell);
    }

    let mut carved = 0;
    for t in graph.transitions() {
        let a = placement(t.from, inner);
        let b = placement(t.to, inner);
        if a == b || is_adjacent(a, b) {
            continue;
        }
        carved += carve_corridor(&mut rows, a, b);
    }

    let current_cell = placement(current_ix, inner);
    let target_cell = placement(target_ix, inner);
    rows[current_cell.0][current_cell.1] = Token::Current;
    // Target wins when current == target.
    rows[target_cell.0][target_cell.1] = Token::Target;

    debug!(
        side,
        states = graph.len(),
        transitions = graph.transition_count(),
        carved,
        "encoded graph"
    );

    let flat = rows.iter().flatten().copied().collect();
    Ok(GridEncoding {
        width: side,
        height: side,
        rows,
        flat,
        state_at,
        cell_of,
        current: current_cell,
        target: target_cell,
    })
}

/// Side of the interior square: `ceil(sqrt(n))`, at least 1.
pub fn interior_side(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side.max(1)
}

/// Interior cell assigned to the state at `ix`.
pub fn placement(ix: NodeIndex, inner: usize) -> Cell {
    (1 + ix.0 / inner, 1 + ix.0 % inner)
}

/// Carve an L-shaped corridor from `a` to `b`: down/up the column of `a` to
/// the row of `b`, then along that row to `b`. Only WALL cells are turned
/// WALKABLE; placed states keep their token. Returns the number of carved
/// cells.
fn carve_corridor(rows: &mut [Vec<Token>], a: Cell, b: Cell) -> usize {
    let mut carved = 0;
    let mut open = |r: usize, c: usize| {
        if rows[r][c] == Token::Wall {
            rows[r][c] = Token::Walkable;
            carved += 1;
        }
    };

    let (r_lo, r_hi) = (a.0.min(b.0), a.0.max(b.0));
    for r in r_lo..=r_hi {
        open(r, a.1);
    }

    let (c_lo, c_hi) = (a.1.min(b.1), a.1.max(b.1));
    for c in c_lo..=c_hi {
        open(b.0, c);
    }

    carved
}
