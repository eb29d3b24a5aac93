use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Input,
    Submit,
    Select,
    Navigate,
}

/// Abstract instruction for the action executor. Pure data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,

    /// Locator understood by the executor (CSS selector, accessibility id,
    /// or a URL for `Navigate`)
    pub locator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            value: None,
            label: None,
        }
    }

    pub fn click(locator: impl Into<String>) -> Self {
        Self::new(ActionKind::Click, locator)
    }

    pub fn input(locator: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ActionKind::Input, locator).with_value(value)
    }

    pub fn submit(locator: impl Into<String>) -> Self {
        Self::new(ActionKind::Submit, locator)
    }

    pub fn select(locator: impl Into<String>, option: impl Into<String>) -> Self {
        Self::new(ActionKind::Select, locator).with_value(option)
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(ActionKind::Navigate, url)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Submit => "submit",
            ActionKind::Select => "select",
            ActionKind::Navigate => "navigate",
        };
        write!(f, "{} \"{}\"", kind, self.locator)?;
        if let Some(value) = &self.value {
            write!(f, " = \"{}\"", value)?;
        }
        Ok(())
    }
}
