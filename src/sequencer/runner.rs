use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::NavError;
use crate::graph::action::{Action, ActionKind};
use crate::sequencer::executor::{ActionExecutor, ExecutorCommand};
use crate::trace::writer::NavTrace;

pub const DEFAULT_ACTIONABLE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_INTER_ACTION_DELAY_MS: u64 = 250;

// ============================================================================
// Execution configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    #[default]
    StopOnFirstFailure,
    ContinueOnFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Bounded wait for a locator to become actionable
    pub actionable_timeout: Duration,

    /// Bounded wait for the target to settle after each action
    pub settle_timeout: Duration,

    /// Pause between consecutive actions
    pub inter_action_delay: Duration,

    /// Extra dispatch attempts after the executor rejects an action
    pub max_retries: u32,

    pub stop_policy: StopPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            actionable_timeout: Duration::from_millis(DEFAULT_ACTIONABLE_TIMEOUT_MS),
            settle_timeout: Duration::from_millis(DEFAULT_SETTLE_TIMEOUT_MS),
            inter_action_delay: Duration::from_millis(DEFAULT_INTER_ACTION_DELAY_MS),
            max_retries: 0,
            stop_policy: StopPolicy::StopOnFirstFailure,
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag that aborts a running plan before its next action.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Execution report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub index: usize,
    pub action: Action,
    /// Tag from `NavError::kind`
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExecutionReport {
    pub total: usize,
    /// Actions that ran to completion
    pub completed: usize,
    pub failures: Vec<ActionFailure>,
    pub aborted: bool,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        !self.aborted && self.failures.is_empty() && self.completed == self.total
    }

    pub fn first_failure(&self) -> Option<&ActionFailure> {
        self.failures.first()
    }
}

// ============================================================================
// PlanRunner
// ============================================================================

/// Executes actions strictly in order against an `ActionExecutor`,
/// enforcing the wait / dispatch / settle / delay contract for each one.
pub struct PlanRunner<'a> {
    config: ExecutionConfig,
    abort: AbortHandle,
    tracer: Option<&'a NavTrace>,
}

impl<'a> PlanRunner<'a> {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            abort: AbortHandle::new(),
            tracer: None,
        }
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_tracer(mut self, tracer: &'a NavTrace) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run `actions` in order.
    ///
    /// `progress` is told `(index, total, action)` before each action. The
    /// abort flag is checked between actions only; an action already
    /// dispatched is left to the executor.
    pub fn run<E, F>(&self, actions: &[Action], executor: &mut E, mut progress: F) -> ExecutionReport
    where
        E: ActionExecutor + ?Sized,
        F: FnMut(usize, usize, &Action),
    {
        let total = actions.len();
        let mut report = ExecutionReport {
            total,
            ..Default::default()
        };

        for (index, action) in actions.iter().enumerate() {
            if self.abort.is_aborted() {
                info!(completed = report.completed, total, "plan aborted");
                if let Some(tracer) = self.tracer {
                    tracer.aborted(report.completed, total);
                }
                report.aborted = true;
                break;
            }

            progress(index, total, action);

            let result = self.run_action(action, executor);
            if let Some(tracer) = self.tracer {
                tracer.action_finished(index, action, &result);
            }
            match result {
                Ok(()) => report.completed += 1,
                Err(e) => {
                    warn!(index, action = %action, error = %e, "action failed");
                    report.failures.push(ActionFailure {
                        index,
                        action: action.clone(),
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    });
                    if self.config.stop_policy == StopPolicy::StopOnFirstFailure {
                        break;
                    }
                }
            }

            if index + 1 < total && !self.config.inter_action_delay.is_zero() {
                std::thread::sleep(self.config.inter_action_delay);
            }
        }

        report
    }

    /// Wait for the locator, dispatch (with retries), then wait for the
    /// target to settle.
    pub fn run_action<E>(&self, action: &Action, executor: &mut E) -> Result<(), NavError>
    where
        E: ActionExecutor + ?Sized,
    {
        if action.kind != ActionKind::Navigate
            && !executor.wait_for_actionable(&action.locator, self.config.actionable_timeout)
        {
            return Err(NavError::ActionTimeout {
                locator: action.locator.clone(),
                timeout_ms: self.config.actionable_timeout.as_millis() as u64,
            });
        }

        let commands = ExecutorCommand::for_action(action);
        let mut attempt = 0;
        loop {
            match dispatch(&commands, executor) {
                Ok(()) => break,
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(action = %action, attempt, error = %e, "retrying action");
                }
                Err(e) => return Err(e),
            }
        }

        if !executor.wait_for_settle(self.config.settle_timeout) {
            warn!(
                action = %action,
                timeout_ms = self.config.settle_timeout.as_millis() as u64,
                "target did not settle"
            );
        }
        Ok(())
    }
}

fn dispatch<E>(commands: &[ExecutorCommand], executor: &mut E) -> Result<(), NavError>
where
    E: ActionExecutor + ?Sized,
{
    for command in commands {
        let response = executor.execute(command);
        if !response.ok {
            return Err(NavError::ActionRejected(format!(
                "{}: {}",
                command.name(),
                response.reason.unwrap_or_else(|| "no reason given".into())
            )));
        }
    }
    Ok(())
}
