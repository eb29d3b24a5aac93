use std::time::Duration;

use serde_json::json;

use screen_navigation::{
    encoder::grid::{Cell, GridEncoding},
    error::{NavError, NavResult},
    graph::{action::Action, state_graph::StateGraph},
    perception::snapshot::{RawElement, RawSnapshot},
    planner::solver::{GridSolver, SolverOutcome},
    state::state_model::{Element, ElementKind, Fingerprint, StateId},
};

pub fn fp(s: &str) -> Fingerprint {
    Fingerprint(s.to_string())
}

pub fn sid(s: &str) -> StateId {
    StateId::from(s)
}

pub fn element(id: &str, kind: ElementKind, label: &str) -> Element {
    Element {
        id: id.to_string(),
        locator: format!("#{}", id),
        kind,
        label: label.to_string(),
        visible: true,
        bounds: None,
    }
}

pub fn button(id: &str, label: &str) -> Element {
    element(id, ElementKind::Button, label)
}

/// Graph with states named after `names`, no transitions.
pub fn graph_of(names: &[&str]) -> StateGraph {
    let mut graph = StateGraph::new();
    for name in names {
        graph.upsert_state(&fp(name), &name.to_uppercase(), Vec::new());
    }
    graph
}

/// A → B (click "#next"), B → C (click "#submit").
pub fn abc_graph() -> StateGraph {
    let mut graph = graph_of(&["a", "b", "c"]);
    graph
        .record_transition(&sid("a"), &sid("b"), Action::click("#next"))
        .unwrap();
    graph
        .record_transition(&sid("b"), &sid("c"), Action::click("#submit"))
        .unwrap();
    graph
}

/// `s0 → s1 → … → s{n-1}`, each hop clicking `#go-{i}`.
pub fn chain_graph(n: usize) -> StateGraph {
    let names: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut graph = graph_of(&refs);
    for i in 1..n {
        graph
            .record_transition(
                &sid(&names[i - 1]),
                &sid(&names[i]),
                Action::click(format!("#go-{}", i)),
            )
            .unwrap();
    }
    graph
}

pub fn raw_element(id: &str, kind: ElementKind, label: &str) -> RawElement {
    RawElement {
        id: Some(id.to_string()),
        locator: format!("#{}", id),
        kind,
        label: Some(label.to_string()),
        visible: true,
        bounds: None,
    }
}

/// Login-like screen with a small tree and two elements.
pub fn login_snapshot() -> RawSnapshot {
    RawSnapshot {
        route: Some("https://app.test/login".into()),
        title: Some("Sign in".into()),
        sub_identity: None,
        tree: json!({
            "tag": "main",
            "class": "page login",
            "children": [
                { "tag": "form", "id": "login-form", "children": [
                    { "tag": "input", "name": "email" },
                    { "tag": "button", "class": "primary" }
                ]}
            ]
        }),
        elements: vec![
            raw_element("email", ElementKind::Input, "Email"),
            raw_element("sign-in", ElementKind::Button, "Sign in"),
        ],
    }
}

/// Screen at `route` with one button per label.
pub fn screen(route: &str, buttons: &[&str]) -> RawSnapshot {
    RawSnapshot {
        route: Some(route.to_string()),
        title: Some(route.trim_start_matches('/').to_string()),
        sub_identity: None,
        tree: json!({ "tag": "body", "children": buttons.iter().map(|b| json!({ "tag": "button", "text": b })).collect::<Vec<_>>() }),
        elements: buttons
            .iter()
            .map(|b| raw_element(&b.to_lowercase(), ElementKind::Button, b))
            .collect(),
    }
}

// ============================================================================
// Grid solvers with scripted behavior
// ============================================================================

/// Solver that is never available.
pub struct FailingSolver;

impl GridSolver for FailingSolver {
    fn name(&self) -> &str {
        "failing"
    }

    fn solve(&self, _grid: &GridEncoding, _timeout: Duration) -> NavResult<SolverOutcome> {
        Err(NavError::Solver {
            solver: "failing".into(),
            reason: "offline".into(),
        })
    }
}

/// Solver that answers with a fixed outcome.
pub struct ScriptedSolver(pub SolverOutcome);

impl ScriptedSolver {
    pub fn path(path: Vec<Cell>) -> Self {
        ScriptedSolver(SolverOutcome {
            path,
            success: true,
            time_ms: 1,
        })
    }
}

impl GridSolver for ScriptedSolver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn solve(&self, _grid: &GridEncoding, _timeout: Duration) -> NavResult<SolverOutcome> {
        Ok(self.0.clone())
    }
}
