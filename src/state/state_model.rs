use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-width (16 lowercase hex chars) identity of a normalized snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a `State` inside the graph.
///
/// Usually the bare fingerprint; when a sub-identity disambiguates two
/// configurations sharing one fingerprint (an open tab, a modal) it is
/// appended as `<fingerprint>#<sub>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub String);

impl StateId {
    pub fn new(id: impl Into<String>) -> Self {
        StateId(id.into())
    }

    pub fn compose(fingerprint: &Fingerprint, sub_identity: Option<&str>) -> Self {
        match sub_identity {
            Some(sub) if !sub.trim().is_empty() => {
                StateId(format!("{}#{}", fingerprint.0, sub.trim()))
            }
            _ => StateId(fingerprint.0.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        StateId(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Link,
    Input,
    Select,
    Checkbox,
    Tab,
    Row,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Link => "link",
            ElementKind::Input => "input",
            ElementKind::Select => "select",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Tab => "tab",
            ElementKind::Row => "row",
        }
    }

    /// Kinds that are reached by a plain click.
    pub fn is_clickable(&self) -> bool {
        matches!(
            self,
            ElementKind::Button
                | ElementKind::Link
                | ElementKind::Tab
                | ElementKind::Row
                | ElementKind::Checkbox
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One interactive affordance of a state. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub locator: String,
    pub kind: ElementKind,
    pub label: String,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

/// Canonical configuration of the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: StateId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_identity: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
    pub discovered_at: u64,
}

impl State {
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Append elements whose id has not been seen yet. Returns how many were added.
    pub(crate) fn merge_elements(&mut self, incoming: Vec<Element>) -> usize {
        let mut added = 0;
        for el in incoming {
            if self.element(&el.id).is_none() {
                self.elements.push(el);
                added += 1;
            }
        }
        added
    }
}
