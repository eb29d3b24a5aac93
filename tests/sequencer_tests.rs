use std::time::Duration;

use screen_navigation::{
    graph::action::{Action, ActionKind},
    planner::path_planner::{PathPlanner, Route, RouteStrategy},
    sequencer::{
        executor::ExecutorCommand,
        plan::{build_plan, derive_action, plan_navigation, plan_via},
        runner::{AbortHandle, ExecutionConfig, PlanRunner, StopPolicy},
    },
    state::state_model::ElementKind,
    trace::writer::NavTrace,
};

use crate::common::{
    fixtures::{abc_graph, button, element, fp, graph_of, sid},
    target::MockExecutor,
};

mod common;

fn fast_config() -> ExecutionConfig {
    ExecutionConfig {
        actionable_timeout: Duration::from_millis(10),
        settle_timeout: Duration::from_millis(10),
        inter_action_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn three_clicks() -> Vec<Action> {
    vec![
        Action::click("#one"),
        Action::click("#two"),
        Action::click("#three"),
    ]
}

// =========================================================================
// Plan building
// =========================================================================

#[test]
fn abc_plan_clicks_next_then_submit() {
    let plan = plan_navigation(&abc_graph(), &PathPlanner::graph_only(), &sid("a"), &sid("c"));

    assert!(plan.reachable);
    assert_eq!(plan.states, vec![sid("a"), sid("b"), sid("c")]);
    assert_eq!(
        plan.actions,
        vec![Action::click("#next"), Action::click("#submit")]
    );
    assert!(plan.derived_hops.is_empty());
    assert!(plan.error.is_none());
}

#[test]
fn plan_to_unknown_state_is_unreachable() {
    let plan = plan_navigation(&abc_graph(), &PathPlanner::graph_only(), &sid("a"), &sid("z"));

    assert!(!plan.reachable);
    assert!(plan.actions.is_empty());
    assert!(plan.states.is_empty());
    assert!(!plan.error.unwrap().is_empty());
}

#[test]
fn trivial_plan_has_no_actions() {
    let plan = plan_navigation(&abc_graph(), &PathPlanner::graph_only(), &sid("a"), &sid("a"));

    assert!(plan.reachable);
    assert!(plan.is_empty());
    assert_eq!(plan.strategy, RouteStrategy::Trivial);
}

#[test]
fn hop_without_transition_is_re_derived() {
    let mut hidden = element("hidden", ElementKind::Button, "Hidden");
    hidden.visible = false;
    let mut graph = graph_of(&["a"]);
    graph.upsert_state(
        &fp("b"),
        "Details",
        vec![hidden, element("name", ElementKind::Input, "Name"), button("open", "Open")],
    );
    let route = Route {
        reachable: true,
        states: vec![sid("a"), sid("b")],
        cells: Vec::new(),
        strategy: RouteStrategy::GraphFallback,
        reason: None,
    };

    let plan = build_plan(&graph, &route);
    assert_eq!(plan.derived_hops, vec![0]);
    assert_eq!(plan.actions[0].locator, "#open");
    assert_eq!(plan.actions[0].label.as_deref(), Some("Open"));
}

#[test]
fn derived_action_falls_back_to_label() {
    let graph = graph_of(&["a", "b"]);
    let action = derive_action(&graph, &sid("b"));

    assert_eq!(action.kind, ActionKind::Click);
    assert_eq!(action.locator, "text=B");
}

// =========================================================================
// Waypoint plans
// =========================================================================

#[test]
fn waypoints_chain_legs_in_order() {
    let plan = plan_via(
        &abc_graph(),
        &PathPlanner::graph_only(),
        &sid("a"),
        &[sid("b"), sid("c")],
    );

    assert!(plan.reachable);
    assert_eq!(plan.states, vec![sid("a"), sid("b"), sid("c")]);
    assert_eq!(
        plan.actions,
        vec![Action::click("#next"), Action::click("#submit")]
    );
    assert_eq!(
        plan.strategy,
        RouteStrategy::Waypoints {
            legs: vec![RouteStrategy::GraphFallback, RouteStrategy::GraphFallback]
        }
    );
}

#[test]
fn repeated_waypoints_are_skipped() {
    let plan = plan_via(
        &abc_graph(),
        &PathPlanner::graph_only(),
        &sid("a"),
        &[sid("a"), sid("b"), sid("b"), sid("c")],
    );

    assert_eq!(plan.states, vec![sid("a"), sid("b"), sid("c")]);
    assert_eq!(plan.actions.len(), 2);
    assert!(matches!(plan.strategy, RouteStrategy::Waypoints { ref legs } if legs.len() == 2));
}

#[test]
fn single_waypoint_matches_a_direct_plan() {
    let graph = abc_graph();
    let planner = PathPlanner::graph_only();

    let via = plan_via(&graph, &planner, &sid("a"), &[sid("c")]);
    let direct = plan_navigation(&graph, &planner, &sid("a"), &sid("c"));
    assert_eq!(via, direct);
}

#[test]
fn no_waypoints_is_trivial() {
    let plan = plan_via(&abc_graph(), &PathPlanner::graph_only(), &sid("b"), &[]);

    assert!(plan.reachable);
    assert!(plan.is_empty());
    assert_eq!(plan.states, vec![sid("b")]);
    assert_eq!(plan.strategy, RouteStrategy::Trivial);
}

#[test]
fn unreachable_leg_is_named() {
    let plan = plan_via(
        &abc_graph(),
        &PathPlanner::graph_only(),
        &sid("a"),
        &[sid("b"), sid("z"), sid("c")],
    );

    assert!(!plan.reachable);
    assert!(plan.actions.is_empty());
    assert_eq!(plan.strategy, RouteStrategy::Exhausted);
    assert!(plan.error.unwrap().starts_with("leg 2 (b -> z):"));
}

#[test]
fn backtracking_waypoint_needs_a_reverse_transition() {
    let planner = PathPlanner::graph_only();
    let mut graph = abc_graph();
    let stuck = plan_via(&graph, &planner, &sid("a"), &[sid("c"), sid("b")]);
    assert!(stuck.error.unwrap().starts_with("leg 2 (c -> b):"));

    graph
        .record_transition(&sid("c"), &sid("b"), Action::click("#back"))
        .unwrap();
    let plan = plan_via(&graph, &planner, &sid("a"), &[sid("c"), sid("b")]);
    assert_eq!(plan.states, vec![sid("a"), sid("b"), sid("c"), sid("b")]);
    assert_eq!(plan.actions.last(), Some(&Action::click("#back")));
}

// =========================================================================
// Dispatch per action kind
// =========================================================================

#[test]
fn dispatch_table() {
    assert_eq!(
        ExecutorCommand::for_action(&Action::click("#a")),
        vec![ExecutorCommand::Click { locator: "#a".into() }]
    );
    assert_eq!(
        ExecutorCommand::for_action(&Action::input("#q", "rust")),
        vec![ExecutorCommand::SetValue { locator: "#q".into(), value: "rust".into() }]
    );
    assert_eq!(
        ExecutorCommand::for_action(&Action::submit("#form").with_value("hello")),
        vec![
            ExecutorCommand::SetValue { locator: "#form".into(), value: "hello".into() },
            ExecutorCommand::Submit { locator: "#form".into() },
        ]
    );
    assert_eq!(
        ExecutorCommand::for_action(&Action::submit("#form")),
        vec![ExecutorCommand::Submit { locator: "#form".into() }]
    );
    assert_eq!(
        ExecutorCommand::for_action(&Action::select("#country", "NL")),
        vec![ExecutorCommand::SelectOption { locator: "#country".into(), option: "NL".into() }]
    );
    assert_eq!(
        ExecutorCommand::for_action(&Action::navigate("/home")),
        vec![ExecutorCommand::Navigate { url: "/home".into() }]
    );
}

#[test]
fn commands_serialize_with_cmd_tag() {
    let json = serde_json::to_value(ExecutorCommand::SetValue {
        locator: "#q".into(),
        value: "x".into(),
    })
    .unwrap();
    assert_eq!(json["cmd"], "set_value");
    assert_eq!(json["locator"], "#q");
}

// =========================================================================
// Execution contract
// =========================================================================

#[test]
fn runs_all_actions_in_order() {
    let mut executor = MockExecutor::new();
    let report = PlanRunner::new(fast_config()).run(&three_clicks(), &mut executor, |_, _, _| {});

    assert!(report.succeeded());
    assert_eq!(report.completed, 3);
    assert_eq!(executor.dispatched_locators(), vec!["#one", "#two", "#three"]);
    assert_eq!(executor.waited_for, vec!["#one", "#two", "#three"]);
    assert_eq!(executor.settle_waits, 3);
}

#[test]
fn stops_on_first_failure_by_default() {
    let mut executor = MockExecutor::new().unavailable("#two");
    let report = PlanRunner::new(fast_config()).run(&three_clicks(), &mut executor, |_, _, _| {});

    assert!(!report.succeeded());
    assert_eq!(report.completed, 1);
    assert_eq!(report.failures.len(), 1);
    let failure = report.first_failure().unwrap();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.kind, "action_timeout");
    assert!(failure.reason.contains("#two"));
    assert_eq!(executor.dispatched_locators(), vec!["#one"]);
}

#[test]
fn continue_on_failure_runs_the_rest() {
    let config = ExecutionConfig {
        stop_policy: StopPolicy::ContinueOnFailure,
        ..fast_config()
    };
    let mut executor = MockExecutor::new().reject("#two", u32::MAX);
    let report = PlanRunner::new(config).run(&three_clicks(), &mut executor, |_, _, _| {});

    assert_eq!(report.completed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "action_rejected");
    assert!(report.failures[0].reason.contains("disabled"));
    assert_eq!(executor.dispatched_locators(), vec!["#one", "#two", "#three"]);
}

#[test]
fn rejected_actions_are_retried() {
    let config = ExecutionConfig {
        max_retries: 2,
        ..fast_config()
    };
    let mut executor = MockExecutor::new().reject("#one", 2);
    let report = PlanRunner::new(config).run(&[Action::click("#one")], &mut executor, |_, _, _| {});

    assert!(report.succeeded());
    assert_eq!(executor.dispatched.len(), 3);
}

#[test]
fn retries_are_bounded() {
    let config = ExecutionConfig {
        max_retries: 1,
        ..fast_config()
    };
    let mut executor = MockExecutor::new().reject("#one", 5);
    let report = PlanRunner::new(config).run(&[Action::click("#one")], &mut executor, |_, _, _| {});

    assert_eq!(report.completed, 0);
    assert_eq!(executor.dispatched.len(), 2);
}

#[test]
fn navigate_skips_the_actionable_wait() {
    let mut executor = MockExecutor::new().unavailable("/home");
    let report = PlanRunner::new(fast_config()).run(
        &[Action::navigate("/home")],
        &mut executor,
        |_, _, _| {},
    );

    assert!(report.succeeded());
    assert!(executor.waited_for.is_empty());
}

#[test]
fn settle_timeout_is_not_a_failure() {
    let mut executor = MockExecutor {
        never_settles: true,
        ..Default::default()
    };
    let report = PlanRunner::new(fast_config()).run(&three_clicks(), &mut executor, |_, _, _| {});

    assert!(report.succeeded());
}

#[test]
fn progress_is_reported_before_each_action() {
    let mut seen = Vec::new();
    let mut executor = MockExecutor::new().unavailable("#three");
    PlanRunner::new(fast_config()).run(&three_clicks(), &mut executor, |i, total, action| {
        seen.push((i, total, action.locator.clone()));
    });

    assert_eq!(
        seen,
        vec![
            (0, 3, "#one".to_string()),
            (1, 3, "#two".to_string()),
            (2, 3, "#three".to_string()),
        ]
    );
}

#[test]
fn abort_between_actions_reports_completed_count() {
    let abort = AbortHandle::new();
    let trigger = abort.clone();
    let mut executor = MockExecutor::new();

    let report = PlanRunner::new(fast_config())
        .with_abort(abort)
        .run(&three_clicks(), &mut executor, |i, _, _| {
            if i == 1 {
                trigger.abort();
            }
        });

    // the action whose progress callback fired still runs
    assert!(report.aborted);
    assert!(!report.succeeded());
    assert_eq!(report.completed, 2);
    assert_eq!(executor.dispatched.len(), 2);
}

#[test]
fn abort_before_start_runs_nothing() {
    let abort = AbortHandle::new();
    abort.abort();
    let mut executor = MockExecutor::new();
    let report = PlanRunner::new(fast_config())
        .with_abort(abort)
        .run(&three_clicks(), &mut executor, |_, _, _| {});

    assert!(report.aborted);
    assert_eq!(report.completed, 0);
    assert!(executor.dispatched.is_empty());
}

#[test]
fn empty_plan_succeeds() {
    let mut executor = MockExecutor::new();
    let report = PlanRunner::new(fast_config()).run(&[], &mut executor, |_, _, _| {});
    assert!(report.succeeded());
    assert_eq!(report.total, 0);
}

#[test]
fn inter_action_delay_is_applied_between_actions() {
    let config = ExecutionConfig {
        inter_action_delay: Duration::from_millis(20),
        ..fast_config()
    };
    let mut executor = MockExecutor::new();
    let started = std::time::Instant::now();
    PlanRunner::new(config).run(&three_clicks(), &mut executor, |_, _, _| {});

    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[test]
fn default_config_values() {
    let config = ExecutionConfig::default();
    assert_eq!(config.actionable_timeout, Duration::from_millis(5000));
    assert_eq!(config.settle_timeout, Duration::from_millis(500));
    assert_eq!(config.inter_action_delay, Duration::from_millis(250));
    assert_eq!(config.max_retries, 0);
    assert_eq!(config.stop_policy, StopPolicy::StopOnFirstFailure);
}

#[test]
fn runner_writes_trace_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let tracer = NavTrace::create(&path);
    let mut executor = MockExecutor::new().unavailable("#two");

    PlanRunner::new(fast_config())
        .with_tracer(&tracer)
        .run(&three_clicks(), &mut executor, |_, _, _| {});

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(tracer.steps(), 2);
    assert_eq!(lines[0]["event"], "action");
    assert_eq!(lines[0]["step"], 1);
    assert_eq!(lines[0]["index"], 0);
    assert_eq!(lines[0]["outcome"], "ok");
    assert!(lines[0].get("detail").is_none());
    assert_eq!(lines[1]["index"], 1);
    assert_eq!(lines[1]["outcome"], "action_timeout");
    assert_eq!(lines[1]["action"]["locator"], "#two");
    assert!(lines[1]["detail"].as_str().unwrap().contains("#two"));
}

#[test]
fn abort_is_traced_with_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let tracer = NavTrace::create(&path);
    let abort = AbortHandle::new();
    abort.abort();

    PlanRunner::new(fast_config())
        .with_abort(abort)
        .with_tracer(&tracer)
        .run(&three_clicks(), &mut MockExecutor::new(), |_, _, _| {});

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event"], "abort");
    assert_eq!(lines[0]["completed"], 0);
    assert_eq!(lines[0]["total"], 3);
}

#[test]
fn trace_appends_across_writers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    for _ in 0..2 {
        let tracer = NavTrace::create(&path);
        PlanRunner::new(fast_config())
            .with_tracer(&tracer)
            .run(&three_clicks()[..1], &mut MockExecutor::new(), |_, _, _| {});
    }

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["step"], 1);
    assert_eq!(lines[1]["step"], 1);
}

#[test]
fn unopenable_trace_is_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let tracer = NavTrace::create(dir.path().join("missing").join("trace.jsonl"));
    assert!(!tracer.is_enabled());

    PlanRunner::new(fast_config())
        .with_tracer(&tracer)
        .run(&three_clicks(), &mut MockExecutor::new(), |_, _, _| {});
    assert_eq!(tracer.steps(), 0);
}

fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
