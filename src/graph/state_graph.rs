use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NavError, NavResult};
use crate::graph::action::Action;
use crate::state::identity::IdentifiedSnapshot;
use crate::state::state_model::{Element, Fingerprint, State, StateId};

pub const GRAPH_FORMAT_VERSION: &str = "1.0.0";

// ============================================================================
// Graph data model
// ============================================================================

/// Dense position of a state inside the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Directed, action-triggered edge between two states.
///
/// Replaying the same (from, to, action) observation increments
/// `observed_count` instead of adding an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub action: Action,
    pub observed_count: u32,
}

impl Transition {
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub version: String,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub exploration_complete: bool,
}

/// Append-only model of discovered states and the transitions between them.
///
/// States live in a dense arena indexed by `NodeIndex`; iteration order is
/// insertion order, which keeps encoding and search reproducible. All
/// writes go through `upsert_state` / `record_transition`.
#[derive(Debug, Clone)]
pub struct StateGraph {
    pub(super) states: Vec<State>,
    pub(super) index: HashMap<StateId, NodeIndex>,
    pub(super) transitions: Vec<Transition>,
    pub(super) edge_index: HashMap<(NodeIndex, NodeIndex, Action), usize>,
    pub(super) outgoing: Vec<Vec<usize>>,
    pub(super) metadata: GraphMetadata,
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            states: Vec::new(),
            index: HashMap::new(),
            transitions: Vec::new(),
            edge_index: HashMap::new(),
            outgoing: Vec::new(),
            metadata: GraphMetadata {
                version: GRAPH_FORMAT_VERSION.to_string(),
                created_at: now,
                updated_at: now,
                exploration_complete: false,
            },
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert the state for `fingerprint`, or merge newly seen elements into
    /// the existing one. The first-seen label is kept.
    pub fn upsert_state(
        &mut self,
        fingerprint: &Fingerprint,
        label: &str,
        elements: Vec<Element>,
    ) -> StateId {
        self.upsert_with_id(StateId::compose(fingerprint, None), None, label, elements)
    }

    /// Like `upsert_state`, for configurations that share a fingerprint and
    /// differ only by sub-identity (open tab, modal).
    pub fn upsert_substate(
        &mut self,
        fingerprint: &Fingerprint,
        sub_identity: &str,
        label: &str,
        elements: Vec<Element>,
    ) -> StateId {
        let id = StateId::compose(fingerprint, Some(sub_identity));
        let sub = (id.as_str() != fingerprint.as_str()).then(|| sub_identity.trim().to_string());
        self.upsert_with_id(id, sub, label, elements)
    }

    /// Upsert straight from the identity stage output.
    pub fn upsert_identified(&mut self, identified: &IdentifiedSnapshot) -> StateId {
        let snapshot = &identified.snapshot;
        let label = if !snapshot.title.is_empty() {
            snapshot.title.clone()
        } else if !snapshot.route.is_empty() {
            snapshot.route.clone()
        } else {
            identified.fingerprint.0.clone()
        };

        match &snapshot.sub_identity {
            Some(sub) => self.upsert_substate(
                &identified.fingerprint,
                sub,
                &label,
                snapshot.elements.clone(),
            ),
            None => self.upsert_state(&identified.fingerprint, &label, snapshot.elements.clone()),
        }
    }

    /// Insert or increment the (from, to, action) edge. Returns the edge's
    /// observed count after recording.
    pub fn record_transition(
        &mut self,
        from: &StateId,
        to: &StateId,
        action: Action,
    ) -> NavResult<u32> {
        let from_ix = self.require(from)?;
        let to_ix = self.require(to)?;
        let count = self.record_by_index(from_ix, to_ix, action, 1);
        self.touch();
        Ok(count)
    }

    /// Flag the graph as fully explored.
    pub fn mark_exploration_complete(&mut self) {
        self.metadata.exploration_complete = true;
        self.touch();
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_state(&self, id: &StateId) -> Option<&State> {
        self.index.get(id).map(|ix| &self.states[ix.0])
    }

    pub fn contains(&self, id: &StateId) -> bool {
        self.index.contains_key(id)
    }

    pub fn index_of(&self, id: &StateId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn state_at(&self, ix: NodeIndex) -> Option<&State> {
        self.states.get(ix.0)
    }

    /// Outgoing transitions of `id` with their destination, in the order the
    /// transitions were first recorded. Unknown ids have no neighbors.
    pub fn neighbors(&self, id: &StateId) -> Vec<(&Transition, &StateId)> {
        let Some(ix) = self.index_of(id) else {
            return Vec::new();
        };
        self.outgoing[ix.0]
            .iter()
            .map(|&edge| {
                let t = &self.transitions[edge];
                (t, &self.states[t.to.0].id)
            })
            .collect()
    }

    /// First recorded transition from `from` to `to`.
    pub fn find_transition(&self, from: &StateId, to: &StateId) -> Option<&Transition> {
        let to_ix = self.index_of(to)?;
        self.neighbors(from)
            .into_iter()
            .map(|(t, _)| t)
            .find(|t| t.to == to_ix)
    }

    /// States in insertion order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Transitions in insertion order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    // ------------------------------------------------------------------
    // Internals (shared with the persistence loader)
    // ------------------------------------------------------------------

    fn upsert_with_id(
        &mut self,
        id: StateId,
        sub_identity: Option<String>,
        label: &str,
        elements: Vec<Element>,
    ) -> StateId {
        match self.index.get(&id).copied() {
            Some(ix) => {
                let added = self.states[ix.0].merge_elements(elements);
                if added > 0 {
                    debug!(state = %id, added, "merged newly observed elements");
                }
            }
            None => {
                let mut state = State {
                    id: id.clone(),
                    label: label.to_string(),
                    sub_identity,
                    elements: Vec::new(),
                    discovered_at: now_ms(),
                };
                state.merge_elements(elements);
                debug!(state = %id, label, "discovered state");
                self.push_state(state);
            }
        }
        self.touch();
        id
    }

    pub(super) fn push_state(&mut self, state: State) -> NodeIndex {
        let ix = NodeIndex(self.states.len());
        self.index.insert(state.id.clone(), ix);
        self.states.push(state);
        self.outgoing.push(Vec::new());
        ix
    }

    pub(super) fn record_by_index(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        action: Action,
        count: u32,
    ) -> u32 {
        let key = (from, to, action);
        if let Some(&edge) = self.edge_index.get(&key) {
            let t = &mut self.transitions[edge];
            t.observed_count = t.observed_count.saturating_add(count);
            return t.observed_count;
        }

        let edge = self.transitions.len();
        let (from, to, action) = key.clone();
        self.transitions.push(Transition {
            from,
            to,
            action,
            observed_count: count,
        });
        self.edge_index.insert(key, edge);
        self.outgoing[from.0].push(edge);
        count
    }

    fn require(&self, id: &StateId) -> NavResult<NodeIndex> {
        self.index_of(id)
            .ok_or_else(|| NavError::UnknownState(id.to_string()))
    }

    fn touch(&mut self) {
        self.metadata.updated_at = now_ms().max(self.metadata.updated_at);
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
