use std::collections::{HashMap, HashSet};
use std::time::Duration;

use screen_navigation::{
    error::{NavError, NavResult},
    perception::{snapshot::RawSnapshot, source::PerceptionSource},
    sequencer::executor::{ActionExecutor, ExecutorCommand, ExecutorResponse},
};

pub fn command_locator(command: &ExecutorCommand) -> &str {
    match command {
        ExecutorCommand::Click { locator }
        | ExecutorCommand::SetValue { locator, .. }
        | ExecutorCommand::Submit { locator }
        | ExecutorCommand::SelectOption { locator, .. } => locator,
        ExecutorCommand::Navigate { url } => url,
    }
}

// ============================================================================
// MockExecutor: records everything, fails on request
// ============================================================================

#[derive(Debug, Default)]
pub struct MockExecutor {
    pub dispatched: Vec<ExecutorCommand>,
    pub waited_for: Vec<String>,
    pub settle_waits: usize,

    /// Locators that never become actionable
    pub unavailable: HashSet<String>,
    /// Locator → number of times its commands are still rejected
    pub rejections: HashMap<String, u32>,
    /// Settle waits time out
    pub never_settles: bool,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable(mut self, locator: &str) -> Self {
        self.unavailable.insert(locator.to_string());
        self
    }

    pub fn reject(mut self, locator: &str, times: u32) -> Self {
        self.rejections.insert(locator.to_string(), times);
        self
    }

    pub fn dispatched_locators(&self) -> Vec<&str> {
        self.dispatched.iter().map(command_locator).collect()
    }
}

impl ActionExecutor for MockExecutor {
    fn wait_for_actionable(&mut self, locator: &str, _timeout: Duration) -> bool {
        self.waited_for.push(locator.to_string());
        !self.unavailable.contains(locator)
    }

    fn execute(&mut self, command: &ExecutorCommand) -> ExecutorResponse {
        self.dispatched.push(command.clone());
        let locator = command_locator(command).to_string();
        match self.rejections.get_mut(&locator) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                ExecutorResponse::rejected(format!("{} is disabled", locator))
            }
            _ => ExecutorResponse::ok(),
        }
    }

    fn wait_for_settle(&mut self, _timeout: Duration) -> bool {
        self.settle_waits += 1;
        !self.never_settles
    }
}

// ============================================================================
// SimulatedTarget: screens connected by clickable links
// ============================================================================

/// In-memory application: a set of named screens and the locators that move
/// between them. Serves as both perception source and executor.
#[derive(Debug, Default)]
pub struct SimulatedTarget {
    screens: HashMap<String, RawSnapshot>,
    links: HashMap<(String, String), String>,
    pub current: String,
    pub executed: Vec<ExecutorCommand>,
    pub captures: usize,
    pub perception_down: bool,
}

impl SimulatedTarget {
    pub fn new(start: &str) -> Self {
        Self {
            current: start.to_string(),
            ..Default::default()
        }
    }

    pub fn screen(mut self, name: &str, snapshot: RawSnapshot) -> Self {
        self.screens.insert(name.to_string(), snapshot);
        self
    }

    /// Clicking `locator` on `from` shows `to`.
    pub fn link(mut self, from: &str, locator: &str, to: &str) -> Self {
        self.links
            .insert((from.to_string(), locator.to_string()), to.to_string());
        self
    }
}

impl PerceptionSource for SimulatedTarget {
    fn capture(&mut self, _timeout: Duration) -> NavResult<RawSnapshot> {
        self.captures += 1;
        if self.perception_down {
            return Err(NavError::Perception("target unreachable".into()));
        }
        self.screens
            .get(&self.current)
            .cloned()
            .ok_or_else(|| NavError::Perception(format!("no screen '{}'", self.current)))
    }
}

impl ActionExecutor for SimulatedTarget {
    fn wait_for_actionable(&mut self, locator: &str, _timeout: Duration) -> bool {
        self.links
            .contains_key(&(self.current.clone(), locator.to_string()))
    }

    fn execute(&mut self, command: &ExecutorCommand) -> ExecutorResponse {
        self.executed.push(command.clone());
        match command {
            ExecutorCommand::Click { locator } => {
                match self.links.get(&(self.current.clone(), locator.clone())) {
                    Some(next) => {
                        self.current = next.clone();
                        ExecutorResponse::ok()
                    }
                    None => ExecutorResponse::rejected(format!("nothing at {}", locator)),
                }
            }
            ExecutorCommand::Navigate { url } if self.screens.contains_key(url) => {
                self.current = url.clone();
                ExecutorResponse::ok()
            }
            ExecutorCommand::Navigate { url } => {
                ExecutorResponse::rejected(format!("unknown url {}", url))
            }
            _ => ExecutorResponse::ok(),
        }
    }

    fn wait_for_settle(&mut self, _timeout: Duration) -> bool {
        true
    }
}
