use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{NavError, NavResult};
use crate::perception::snapshot::{RawElement, RawSnapshot};
use crate::state::state_model::Element;

/// Words that mark a key as volatile (timestamps, session material, nonces).
const VOLATILE_KEY_WORDS: &[&str] = &[
    "timestamp", "time", "date", "ts", "token", "session", "nonce", "csrf", "uuid", "expires",
];

/// Subtrees carrying payload rather than structure.
const PAYLOAD_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Interaction classes that flip while the structure stays the same.
const TRANSIENT_CLASSES: &[&str] = &[
    "hover",
    "focus",
    "focused",
    "focus-visible",
    "focus-within",
    "active",
    "pressed",
    "ripple",
    "animating",
    "transitioning",
];

const TAG_KEYS: &[&str] = &["tag", "tagName", "nodeName"];
const CLASS_KEYS: &[&str] = &["class", "className"];

/// Snapshot with every volatile field removed, ready for hashing.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSnapshot {
    pub route: String,
    pub title: String,
    pub sub_identity: Option<String>,
    pub tree: Value,
    pub node_count: usize,
    pub max_depth: usize,
    pub elements: Vec<Element>,
}

/// Strip volatile data from a raw snapshot.
///
/// Fails when there is nothing stable left to identify the target by: a
/// scalar tree root, or an empty tree with neither route nor elements.
pub fn normalize_snapshot(raw: &RawSnapshot) -> NavResult<NormalizedSnapshot> {
    if !matches!(raw.tree, Value::Null | Value::Object(_) | Value::Array(_)) {
        return Err(NavError::Identity(
            "snapshot tree root must be an object or an array".into(),
        ));
    }

    let route = normalize_route(raw.route.as_deref());
    if raw.tree.is_null() && route.is_empty() && raw.elements.is_empty() {
        return Err(NavError::Identity(
            "empty snapshot (no tree, route or elements)".into(),
        ));
    }

    let mut stats = TreeStats::default();
    let tree = strip_value(&raw.tree, 0, &mut stats).unwrap_or(Value::Null);

    // Repeated explicit ids collapse; repeated derived ids are numbered by
    // occurrence so every identical row still counts.
    let mut elements: Vec<Element> = Vec::with_capacity(raw.elements.len());
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for raw_el in &raw.elements {
        let mut el = normalize_element(raw_el);
        if explicit_id(raw_el).is_some() {
            if elements.iter().any(|e| e.id == el.id) {
                continue;
            }
        } else {
            let seen = occurrences.entry(el.id.clone()).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                el.id = format!("{}:{}", el.id, seen);
            }
        }
        elements.push(el);
    }

    Ok(NormalizedSnapshot {
        route,
        title: raw.title.as_deref().map(normalize_label).unwrap_or_default(),
        sub_identity: raw
            .sub_identity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        tree,
        node_count: stats.nodes,
        max_depth: stats.max_depth,
        elements,
    })
}

/// Route without query string, fragment or trailing slash.
pub fn normalize_route(raw: Option<&str>) -> String {
    let route = raw.unwrap_or("").trim();
    let end = route.find(['?', '#']).unwrap_or(route.len());
    let route = &route[..end];

    if route.len() > 1 && route.ends_with('/') && !route.ends_with("://") {
        route.trim_end_matches('/').to_string()
    } else {
        route.to_string()
    }
}

/// Collapse whitespace. Case is kept: `Delete` and `DELETE` are different
/// labels.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True for keys such as `updatedAt`, `session_id`, `csrf-token`.
pub fn is_volatile_key(key: &str) -> bool {
    let words = key_words(key);
    // `createdAt`, `last_seen_at`
    let is_instant = words.len() > 1 && words.last().is_some_and(|w| w == "at");
    is_instant
        || words
            .iter()
            .any(|w| VOLATILE_KEY_WORDS.contains(&w.as_str()))
}

/// Heuristic for per-instance generated identifiers (`a3f9c2e1b7`,
/// `:r1f3:`). Short or mostly alphabetic values are kept.
pub fn is_random_identifier(value: &str) -> bool {
    let value = value.trim();
    if value.len() < 6 {
        return false;
    }

    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let hexish = value
        .chars()
        .all(|c| c.is_ascii_hexdigit() || c == '-' || c == '_');
    if hexish && digits > 0 && value.len() >= 8 {
        return true;
    }

    let non_alpha_ratio = value
        .chars()
        .filter(|c| !c.is_alphabetic())
        .count() as f32
        / value.len() as f32;

    non_alpha_ratio > 0.5
}

pub fn is_transient_class(class: &str) -> bool {
    let class = class.to_lowercase();
    TRANSIENT_CLASSES.contains(&class.as_str())
        || class.starts_with("is-hover")
        || class.starts_with("is-focus")
        || class.ends_with(":hover")
        || class.ends_with(":focus")
}

/// Stable id for an element the perception source did not name (or named
/// with a generated identifier).
pub fn element_identity(raw: &RawElement, label: &str) -> String {
    match explicit_id(raw) {
        Some(id) => id.to_string(),
        None => {
            let digest = text_fingerprint(&format!(
                "{}|{}|{}",
                raw.kind.as_str(),
                label,
                raw.locator.trim()
            ));
            format!("{}:{}", raw.kind.as_str(), &digest[..12])
        }
    }
}

/// The element's own id, unless it is missing, blank or generated.
fn explicit_id(raw: &RawElement) -> Option<&str> {
    raw.id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty() && !is_random_identifier(id))
}

pub fn text_fingerprint(text: &str) -> String {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_element(raw: &RawElement) -> Element {
    let label = normalize_label(raw.label.as_deref().unwrap_or(""));
    Element {
        id: element_identity(raw, &label),
        locator: raw.locator.trim().to_string(),
        kind: raw.kind,
        label,
        visible: raw.visible,
        bounds: raw.bounds,
    }
}

#[derive(Default)]
struct TreeStats {
    nodes: usize,
    max_depth: usize,
}

fn strip_value(value: &Value, depth: usize, stats: &mut TreeStats) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if is_payload_node(map) {
                return None;
            }

            let depth = depth + 1;
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);

            let mut out = Map::new();
            for (key, child) in map {
                if is_volatile_key(key) {
                    continue;
                }
                if CLASS_KEYS.contains(&key.as_str()) {
                    if let Value::String(classes) = child {
                        out.insert(key.clone(), Value::String(strip_classes(classes)));
                        continue;
                    }
                }
                if is_identifier_key(key) {
                    if let Value::String(id) = child {
                        if is_random_identifier(id) {
                            continue;
                        }
                    }
                }
                if let Some(stripped) = strip_value(child, depth, stats) {
                    out.insert(key.clone(), stripped);
                }
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| strip_value(item, depth, stats))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn is_payload_node(map: &Map<String, Value>) -> bool {
    TAG_KEYS.iter().any(|k| {
        map.get(*k)
            .and_then(Value::as_str)
            .map(|tag| PAYLOAD_TAGS.contains(&tag.to_lowercase().as_str()))
            .unwrap_or(false)
    })
}

fn is_identifier_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower == "id" || lower == "key" || lower.ends_with("id") || lower.ends_with("-key")
}

fn strip_classes(classes: &str) -> String {
    let mut kept: Vec<&str> = classes
        .split_whitespace()
        .filter(|c| !is_transient_class(c))
        .collect();
    kept.sort_unstable();
    kept.join(" ")
}

/// Split `updatedAt`, `session_id`, `csrf-token` into lowercase words.
fn key_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
