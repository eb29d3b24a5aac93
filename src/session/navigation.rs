use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{NavError, NavResult};
use crate::graph::action::Action;
use crate::graph::persist::save_graph;
use crate::graph::state_graph::StateGraph;
use crate::perception::source::{PerceptionSource, capture_within};
use crate::planner::path_planner::PathPlanner;
use crate::sequencer::executor::ActionExecutor;
use crate::sequencer::plan::{Plan, plan_navigation};
use crate::sequencer::runner::{AbortHandle, ExecutionConfig, ExecutionReport, PlanRunner};
use crate::state::identity::identify;
use crate::state::state_model::StateId;
use crate::trace::writer::NavTrace;

pub const DEFAULT_PERCEPTION_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub execution: ExecutionConfig,
    pub perception_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            perception_timeout: Duration::from_millis(DEFAULT_PERCEPTION_TIMEOUT_MS),
        }
    }
}

/// Result of one `navigate_to` request.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationOutcome {
    pub plan: Plan,
    pub report: ExecutionReport,
    /// Whether the state observed after execution is the target
    pub arrived: bool,
    pub final_state: Option<StateId>,
}

/// Owns the graph for one navigation session and drives the
/// observe → plan → execute pipeline against a target.
///
/// The target is reached through a driver passed into each call, which lets
/// one object serve as both perception source and executor.
pub struct NavigationSession {
    graph: StateGraph,
    planner: PathPlanner,
    config: SessionConfig,
    current: Option<StateId>,
    tracer: NavTrace,
}

impl NavigationSession {
    pub fn new(planner: PathPlanner, config: SessionConfig) -> Self {
        Self {
            graph: StateGraph::new(),
            planner,
            config,
            current: None,
            tracer: NavTrace::disabled(),
        }
    }

    /// Continue from a previously discovered graph.
    pub fn with_graph(mut self, graph: StateGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_tracer(mut self, tracer: NavTrace) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn current(&self) -> Option<&StateId> {
        self.current.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mark_exploration_complete(&mut self) {
        self.graph.mark_exploration_complete();
    }

    pub fn save(&self, path: impl AsRef<Path>) -> NavResult<()> {
        save_graph(&self.graph, path)
    }

    /// Capture the target, identify it and upsert it as the current state.
    ///
    /// Nothing is committed when capture or identification fails.
    pub fn observe<P>(&mut self, perception: &mut P) -> NavResult<StateId>
    where
        P: PerceptionSource + ?Sized,
    {
        let identified = capture_within(perception, self.config.perception_timeout)
            .and_then(|raw| identify(&raw));

        let identified = match identified {
            Ok(identified) => identified,
            Err(e) => {
                warn!(error = %e, "observation failed");
                self.tracer.observe_failed(&e);
                return Err(e);
            }
        };

        let id = self.graph.upsert_identified(&identified);
        info!(state = %id, states = self.graph.len(), "observed state");
        self.tracer.observed(&id);
        self.current = Some(id.clone());
        Ok(id)
    }

    /// Execute `action`, observe the result and record the transition from
    /// the previous current state.
    pub fn record_step<D>(&mut self, action: Action, driver: &mut D) -> NavResult<StateId>
    where
        D: PerceptionSource + ActionExecutor + ?Sized,
    {
        let from = self.require_current()?;

        let runner = PlanRunner::new(self.config.execution.clone()).with_tracer(&self.tracer);
        runner.run_action(&action, driver)?;

        let to = self.observe(driver)?;
        let count = self.graph.record_transition(&from, &to, action)?;
        info!(from = %from, to = %to, observed = count, "recorded transition");
        Ok(to)
    }

    /// Plan from the current state to `target` without executing anything.
    pub fn plan_to(&self, target: &StateId) -> NavResult<Plan> {
        let current = self.require_current()?;
        Ok(plan_navigation(&self.graph, &self.planner, &current, target))
    }

    /// Plan, run the plan and observe where the target ended up.
    ///
    /// An unreachable target is returned as an outcome with an empty report.
    pub fn navigate_to<D, F>(
        &mut self,
        target: &StateId,
        driver: &mut D,
        abort: &AbortHandle,
        progress: F,
    ) -> NavResult<NavigationOutcome>
    where
        D: PerceptionSource + ActionExecutor + ?Sized,
        F: FnMut(usize, usize, &Action),
    {
        let plan = self.plan_to(target)?;
        self.tracer.planned(self.current.as_ref(), target, &plan);

        if !plan.reachable {
            info!(target = %target, reason = ?plan.error, "target unreachable");
            return Ok(NavigationOutcome {
                plan,
                report: ExecutionReport::default(),
                arrived: false,
                final_state: self.current.clone(),
            });
        }

        let report = PlanRunner::new(self.config.execution.clone())
            .with_abort(abort.clone())
            .with_tracer(&self.tracer)
            .run(&plan.actions, driver, progress);

        let final_state = match self.observe(driver) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not observe state after navigation");
                None
            }
        };
        let arrived = final_state.as_ref() == Some(target);

        self.tracer.arrival(target, final_state.as_ref(), &report);
        info!(target = %target, arrived, completed = report.completed, total = report.total, "navigation finished");

        Ok(NavigationOutcome {
            plan,
            report,
            arrived,
            final_state,
        })
    }

    fn require_current(&self) -> NavResult<StateId> {
        self.current
            .clone()
            .ok_or_else(|| NavError::UnknownState("no current state, observe first".into()))
    }

}
