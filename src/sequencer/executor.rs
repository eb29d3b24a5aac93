use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::action::{Action, ActionKind};

/// Primitive command the executor understands. One `Action` expands into
/// one or two of these depending on its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ExecutorCommand {
    Click { locator: String },
    SetValue { locator: String, value: String },
    Submit { locator: String },
    SelectOption { locator: String, option: String },
    Navigate { url: String },
}

impl ExecutorCommand {
    /// Dispatch table per action kind.
    ///
    /// click → Click; input → SetValue; submit → SetValue (when a value is
    /// given) then Submit; select → SelectOption; navigate → Navigate.
    pub fn for_action(action: &Action) -> Vec<ExecutorCommand> {
        let locator = action.locator.clone();
        let value = action.value.clone().unwrap_or_default();

        match action.kind {
            ActionKind::Click => vec![ExecutorCommand::Click { locator }],
            ActionKind::Input => vec![ExecutorCommand::SetValue { locator, value }],
            ActionKind::Submit => {
                let mut commands = Vec::with_capacity(2);
                if action.value.is_some() {
                    commands.push(ExecutorCommand::SetValue {
                        locator: locator.clone(),
                        value,
                    });
                }
                commands.push(ExecutorCommand::Submit { locator });
                commands
            }
            ActionKind::Select => vec![ExecutorCommand::SelectOption {
                locator,
                option: value,
            }],
            ActionKind::Navigate => vec![ExecutorCommand::Navigate { url: locator }],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutorCommand::Click { .. } => "click",
            ExecutorCommand::SetValue { .. } => "set_value",
            ExecutorCommand::Submit { .. } => "submit",
            ExecutorCommand::SelectOption { .. } => "select_option",
            ExecutorCommand::Navigate { .. } => "navigate",
        }
    }
}

/// Executor's verdict on one command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecutorResponse {
    pub ok: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExecutorResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Contract of the collaborator that actually touches the target
/// application. It runs one command at a time; the waits must return once
/// their timeout has elapsed.
pub trait ActionExecutor {
    /// Wait until `locator` can be acted on. `false` when the timeout elapsed.
    fn wait_for_actionable(&mut self, locator: &str, timeout: Duration) -> bool;

    fn execute(&mut self, command: &ExecutorCommand) -> ExecutorResponse;

    /// Wait for the target to stop changing. `false` when the timeout elapsed.
    fn wait_for_settle(&mut self, timeout: Duration) -> bool;
}
