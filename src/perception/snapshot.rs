use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::state_model::{Bounds, ElementKind};

/// Structural snapshot as delivered by a perception source, before any
/// volatile data has been stripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Route or location of the target (URL, activity name, screen path)
    #[serde(default)]
    pub route: Option<String>,

    /// Human-readable title, used as the state label on first discovery
    #[serde(default)]
    pub title: Option<String>,

    /// Sub-identity when the structure alone is ambiguous (open tab, modal)
    #[serde(default, rename = "subIdentity")]
    pub sub_identity: Option<String>,

    /// Serialized structural tree of the target
    #[serde(default)]
    pub tree: Value,

    /// Visible/enabled interactive elements
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    #[serde(default)]
    pub id: Option<String>,
    pub locator: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

fn default_visible() -> bool {
    true
}
