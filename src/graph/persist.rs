use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NavError, NavResult};
use crate::graph::action::Action;
use crate::graph::state_graph::{GRAPH_FORMAT_VERSION, GraphMetadata, StateGraph};
use crate::state::state_model::{State, StateId};

// ============================================================================
// Persisted record
// ============================================================================

/// Serializable form of a `StateGraph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    #[serde(default)]
    pub nodes: Vec<State>,
    #[serde(default)]
    pub edges: Vec<TransitionRecord>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from: StateId,
    pub to: StateId,
    pub action: Action,
    #[serde(default = "default_count")]
    pub observed_count: u32,
    /// The same action also leads back from `to` to `from`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bidirectional: bool,
}

fn default_count() -> u32 {
    1
}

/// What the loader had to repair to accept a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Node ids that appeared more than once (later copies merged into the first)
    pub duplicate_states: Vec<StateId>,
    /// Edges dropped because an endpoint is not a known state
    pub dropped_edges: Vec<(StateId, StateId)>,
    /// Edges repeated in the record, folded into one with summed counts
    pub merged_edges: usize,
    /// Edges whose observed count was zero and has been raised to one
    pub repaired_counts: usize,
    /// Reverse transitions expanded from bidirectional edges
    pub reversed_edges: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_states.is_empty()
            && self.dropped_edges.is_empty()
            && self.merged_edges == 0
            && self.repaired_counts == 0
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl StateGraph {
    /// Snapshot the graph into its persisted form.
    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            nodes: self.states.clone(),
            edges: self
                .transitions
                .iter()
                .map(|t| TransitionRecord {
                    from: self.states[t.from.0].id.clone(),
                    to: self.states[t.to.0].id.clone(),
                    action: t.action.clone(),
                    observed_count: t.observed_count,
                    bidirectional: false,
                })
                .collect(),
            metadata: self.metadata.clone(),
        }
    }

    /// Rebuild a graph from a persisted record, repairing what can be
    /// repaired. Rejects records written by an unsupported format version.
    ///
    /// A bidirectional edge becomes two directed transitions sharing its
    /// action and count; saving writes both out explicitly.
    pub fn from_record(record: GraphRecord) -> NavResult<(StateGraph, LoadReport)> {
        check_version(&record.metadata.version)?;

        let mut graph = StateGraph::new();
        let mut report = LoadReport::default();

        graph.metadata = GraphMetadata {
            version: GRAPH_FORMAT_VERSION.to_string(),
            ..record.metadata
        };

        for state in record.nodes {
            match graph.index_of(&state.id) {
                Some(ix) => {
                    warn!(state = %state.id, "duplicate state in persisted graph, merging");
                    report.duplicate_states.push(state.id.clone());
                    graph.states[ix.0].merge_elements(state.elements);
                }
                None => {
                    graph.push_state(state);
                }
            }
        }

        for edge in record.edges {
            let (Some(from), Some(to)) = (graph.index_of(&edge.from), graph.index_of(&edge.to))
            else {
                warn!(from = %edge.from, to = %edge.to, "edge references a missing state, dropping");
                report.dropped_edges.push((edge.from, edge.to));
                continue;
            };

            let count = if edge.observed_count == 0 {
                report.repaired_counts += 1;
                1
            } else {
                edge.observed_count
            };

            let reverse = (edge.bidirectional && from != to).then(|| edge.action.clone());

            let before = graph.transitions.len();
            graph.record_by_index(from, to, edge.action, count);
            if graph.transitions.len() == before {
                report.merged_edges += 1;
            }

            if let Some(action) = reverse {
                graph.record_by_index(to, from, action, count);
                report.reversed_edges += 1;
            }
        }

        Ok((graph, report))
    }
}

fn check_version(version: &str) -> NavResult<()> {
    let major = version.split('.').next().unwrap_or("");
    let supported = GRAPH_FORMAT_VERSION.split('.').next().unwrap_or("");
    if major == supported {
        Ok(())
    } else {
        Err(NavError::Persist(format!(
            "unsupported graph format version '{}' (expected {}.x)",
            version, supported
        )))
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Parse a persisted graph from JSON text.
pub fn parse_graph(json: &str) -> NavResult<(StateGraph, LoadReport)> {
    let record: GraphRecord =
        serde_json::from_str(json).map_err(|e| NavError::json("persisted graph", e))?;
    StateGraph::from_record(record)
}

/// Load a persisted graph from a JSON file.
pub fn load_graph(path: impl AsRef<Path>) -> NavResult<(StateGraph, LoadReport)> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| NavError::io(format!("reading {}", path.display()), e))?;
    let (graph, report) = parse_graph(&content)?;

    info!(
        path = %path.display(),
        states = graph.len(),
        transitions = graph.transition_count(),
        clean = report.is_clean(),
        "loaded graph"
    );
    Ok((graph, report))
}

/// Write the graph as pretty JSON.
pub fn save_graph(graph: &StateGraph, path: impl AsRef<Path>) -> NavResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&graph.to_record())
        .map_err(|e| NavError::json("serializing graph", e))?;
    std::fs::write(path, json).map_err(|e| NavError::io(format!("writing {}", path.display()), e))
}
