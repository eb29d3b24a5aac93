use crate::error::NavResult;
use crate::perception::snapshot::RawSnapshot;
use crate::state::normalize::{NormalizedSnapshot, normalize_snapshot};
use crate::state::state_model::{Fingerprint, StateId};

/// Output of identifying one raw snapshot.
#[derive(Debug, Clone)]
pub struct IdentifiedSnapshot {
    pub fingerprint: Fingerprint,
    pub state_id: StateId,
    pub snapshot: NormalizedSnapshot,
}

/// Normalize and fingerprint a raw snapshot.
///
/// Fails instead of guessing when the snapshot cannot be normalized.
pub fn identify(raw: &RawSnapshot) -> NavResult<IdentifiedSnapshot> {
    let snapshot = normalize_snapshot(raw)?;
    let fingerprint = fingerprint(&snapshot);
    let state_id = StateId::compose(&fingerprint, snapshot.sub_identity.as_deref());

    Ok(IdentifiedSnapshot {
        fingerprint,
        state_id,
        snapshot,
    })
}

/// Deterministic 16-char hex fingerprint of a normalized snapshot.
pub fn fingerprint(snapshot: &NormalizedSnapshot) -> Fingerprint {
    let signals = structural_signals(snapshot);
    Fingerprint(format!(
        "{:08x}{:08x}",
        rolling_hash(&signals),
        fnv1a_hash(&signals)
    ))
}

/// Stable signals the fingerprint is computed from: route, tree shape,
/// ordered element kinds and labels.
pub fn structural_signals(snapshot: &NormalizedSnapshot) -> String {
    let kinds: Vec<&str> = snapshot.elements.iter().map(|e| e.kind.as_str()).collect();
    let labels: Vec<&str> = snapshot.elements.iter().map(|e| e.label.as_str()).collect();

    format!(
        "{}|{}|{}|{}|{}",
        snapshot.route,
        snapshot.node_count,
        snapshot.max_depth,
        kinds.join(","),
        labels.join("\u{1f}")
    )
}

fn rolling_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
}

fn fnv1a_hash(input: &str) -> u32 {
    input.bytes().fold(0x811c_9dc5u32, |h, b| {
        (h ^ b as u32).wrapping_mul(0x0100_0193)
    })
}
