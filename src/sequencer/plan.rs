use serde::Serialize;
use tracing::debug;

use crate::graph::action::Action;
use crate::graph::state_graph::StateGraph;
use crate::planner::path_planner::{PathPlanner, Route, RouteStrategy};
use crate::state::state_model::StateId;

/// Ordered actions plus the state path they realize. Built fresh for every
/// navigation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub reachable: bool,
    pub states: Vec<StateId>,
    pub actions: Vec<Action>,
    /// Hop indices whose action was re-derived rather than recorded
    pub derived_hops: Vec<usize>,
    pub strategy: RouteStrategy,
    pub error: Option<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Plan a route with `planner` and turn it into actions.
pub fn plan_navigation(
    graph: &StateGraph,
    planner: &PathPlanner,
    current: &StateId,
    target: &StateId,
) -> Plan {
    let route = planner.find_route(graph, current, target);
    build_plan(graph, &route)
}

/// Plan from `current` through each of `waypoints` in order; the last
/// waypoint is the destination.
///
/// Legs between equal states are skipped. The first unreachable leg makes
/// the whole plan unreachable and its error names that leg.
pub fn plan_via(
    graph: &StateGraph,
    planner: &PathPlanner,
    current: &StateId,
    waypoints: &[StateId],
) -> Plan {
    let mut plan = Plan {
        reachable: true,
        states: vec![current.clone()],
        actions: Vec::new(),
        derived_hops: Vec::new(),
        strategy: RouteStrategy::Trivial,
        error: None,
    };
    let mut legs = Vec::new();

    let mut from = current;
    for (i, to) in waypoints.iter().enumerate() {
        if from == to {
            continue;
        }

        let leg = plan_navigation(graph, planner, from, to);
        if !leg.reachable {
            let reason = leg.error.unwrap_or_else(|| "target unreachable".to_string());
            debug!(leg = i + 1, %from, %to, %reason, "waypoint leg unreachable");
            return Plan {
                reachable: false,
                states: Vec::new(),
                actions: Vec::new(),
                derived_hops: Vec::new(),
                strategy: RouteStrategy::Exhausted,
                error: Some(format!("leg {} ({} -> {}): {}", i + 1, from, to, reason)),
            };
        }

        let offset = plan.actions.len();
        plan.derived_hops.extend(leg.derived_hops.iter().map(|hop| hop + offset));
        plan.actions.extend(leg.actions);
        plan.states.extend(leg.states.into_iter().skip(1));
        legs.push(leg.strategy);
        from = to;
    }

    plan.strategy = match legs.len() {
        0 => RouteStrategy::Trivial,
        1 => legs.remove(0),
        _ => RouteStrategy::Waypoints { legs },
    };
    plan
}

/// Walk consecutive state pairs of `route`, emitting each hop's recorded
/// action (first recorded wins) or a re-derived one.
pub fn build_plan(graph: &StateGraph, route: &Route) -> Plan {
    if !route.reachable {
        return Plan {
            reachable: false,
            states: Vec::new(),
            actions: Vec::new(),
            derived_hops: Vec::new(),
            strategy: route.strategy.clone(),
            error: Some(
                route
                    .reason
                    .clone()
                    .unwrap_or_else(|| "target unreachable".to_string()),
            ),
        };
    }

    let mut actions = Vec::with_capacity(route.hops());
    let mut derived_hops = Vec::new();

    for (hop, pair) in route.states.windows(2).enumerate() {
        match graph.find_transition(&pair[0], &pair[1]) {
            Some(t) => actions.push(t.action.clone()),
            None => {
                let action = derive_action(graph, &pair[1]);
                debug!(hop, from = %pair[0], to = %pair[1], action = %action, "re-derived action");
                actions.push(action);
                derived_hops.push(hop);
            }
        }
    }

    Plan {
        reachable: true,
        states: route.states.clone(),
        actions,
        derived_hops,
        strategy: route.strategy.clone(),
        error: None,
    }
}

/// Best guess at how to reach `to` when no transition was recorded: click
/// its first visible clickable element, otherwise click by its label.
pub fn derive_action(graph: &StateGraph, to: &StateId) -> Action {
    let Some(state) = graph.get_state(to) else {
        return Action::click(format!("text={}", to));
    };

    state
        .elements
        .iter()
        .find(|e| e.visible && e.kind.is_clickable())
        .map(|e| {
            let action = Action::click(e.locator.clone());
            if e.label.is_empty() {
                action
            } else {
                action.with_label(e.label.clone())
            }
        })
        .unwrap_or_else(|| Action::click(format!("text={}", state.label)).with_label(state.label.clone()))
}
