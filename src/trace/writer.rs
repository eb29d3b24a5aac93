use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::error::NavError;
use crate::graph::action::Action;
use crate::sequencer::plan::Plan;
use crate::sequencer::runner::ExecutionReport;
use crate::state::state_model::StateId;
use crate::trace::event::{NavEvent, TraceRecord};

/// Appends navigation events to a JSONL file, numbering them by step.
///
/// Every event is flushed as it is written so an interrupted run still
/// leaves whole lines. Write problems are logged and otherwise ignored;
/// tracing never fails a navigation.
pub struct NavTrace {
    sink: Option<Mutex<BufWriter<File>>>,
    steps: AtomicU64,
}

impl NavTrace {
    pub fn create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(Mutex::new(BufWriter::new(file))),
                steps: AtomicU64::new(0),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file, tracing disabled");
                Self::disabled()
            }
        }
    }

    /// Trace that drops every event.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            steps: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Number of events written so far.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn observed(&self, state: &StateId) {
        self.emit(NavEvent::Observe {
            state: Some(state.clone()),
            outcome: "ok".into(),
            detail: None,
        });
    }

    pub fn observe_failed(&self, error: &NavError) {
        self.emit(NavEvent::Observe {
            state: None,
            outcome: error.kind().into(),
            detail: Some(error.to_string()),
        });
    }

    pub fn planned(&self, from: Option<&StateId>, target: &StateId, plan: &Plan) {
        self.emit(NavEvent::Plan {
            from: from.cloned(),
            target: target.clone(),
            reachable: plan.reachable,
            strategy: plan.strategy.clone(),
            actions: plan.actions.len(),
            error: plan.error.clone(),
        });
    }

    pub fn action_finished(&self, index: usize, action: &Action, result: &Result<(), NavError>) {
        let (outcome, detail) = match result {
            Ok(()) => ("ok".to_string(), None),
            Err(e) => (e.kind().to_string(), Some(e.to_string())),
        };
        self.emit(NavEvent::Action {
            index,
            action: action.clone(),
            outcome,
            detail,
        });
    }

    pub fn aborted(&self, completed: usize, total: usize) {
        self.emit(NavEvent::Abort { completed, total });
    }

    pub fn arrival(&self, target: &StateId, final_state: Option<&StateId>, report: &ExecutionReport) {
        self.emit(NavEvent::Arrive {
            target: target.clone(),
            arrived: final_state == Some(target),
            final_state: final_state.cloned(),
            completed: report.completed,
            total: report.total,
        });
    }

    fn emit(&self, event: NavEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut out = match sink.lock() {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "trace writer lock poisoned");
                return;
            }
        };

        // Step numbers follow write order
        let step = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        let record = TraceRecord::now(step, event);
        let written = serde_json::to_writer(&mut *out, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());
        if let Err(e) = written {
            warn!(step, error = %e, "failed to write trace event");
        }
    }
}
