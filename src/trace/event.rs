use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::graph::action::Action;
use crate::planner::path_planner::RouteStrategy;
use crate::state::state_model::StateId;

/// One line of the navigation trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub timestamp_ms: u64,
    /// Position in the session, starting at 1
    pub step: u64,
    #[serde(flatten)]
    pub event: NavEvent,
}

impl TraceRecord {
    pub fn now(step: u64, event: NavEvent) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            step,
            event,
        }
    }
}

/// What happened at a step, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NavEvent {
    /// The target was captured and identified, or capture failed
    Observe {
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<StateId>,
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    Plan {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<StateId>,
        target: StateId,
        reachable: bool,
        strategy: RouteStrategy,
        actions: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Action {
        index: usize,
        action: Action,
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    Abort { completed: usize, total: usize },

    Arrive {
        target: StateId,
        arrived: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_state: Option<StateId>,
        completed: usize,
        total: usize,
    },
}
