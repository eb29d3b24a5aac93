use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{NavError, NavResult};
use crate::perception::snapshot::RawSnapshot;

/// Collaborator that reports what the target currently looks like.
pub trait PerceptionSource {
    /// Capture one snapshot. Must give up once `timeout` has elapsed.
    fn capture(&mut self, timeout: Duration) -> NavResult<RawSnapshot>;
}

/// Run `source.capture` and turn an overrun into a perception failure, so a
/// slow source that eventually answers is still treated as failed.
pub fn capture_within<S>(source: &mut S, timeout: Duration) -> NavResult<RawSnapshot>
where
    S: PerceptionSource + ?Sized,
{
    let started = Instant::now();
    let snapshot = source.capture(timeout)?;
    let elapsed = started.elapsed();
    if elapsed > timeout {
        return Err(NavError::Perception(format!(
            "capture took {}ms, timeout {}ms",
            elapsed.as_millis(),
            timeout.as_millis()
        )));
    }
    Ok(snapshot)
}

/// Replays a fixed queue of snapshots (or failures). Used for offline
/// replays and tests.
#[derive(Debug, Default)]
pub struct ScriptedPerception {
    queue: VecDeque<NavResult<RawSnapshot>>,
    captured: usize,
}

impl ScriptedPerception {
    pub fn new(snapshots: impl IntoIterator<Item = RawSnapshot>) -> Self {
        Self {
            queue: snapshots.into_iter().map(Ok).collect(),
            captured: 0,
        }
    }

    pub fn push(&mut self, snapshot: RawSnapshot) {
        self.queue.push_back(Ok(snapshot));
    }

    /// Queue a failure for the next capture.
    pub fn push_failure(&mut self, reason: impl Into<String>) {
        self.queue
            .push_back(Err(NavError::Perception(reason.into())));
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn captured(&self) -> usize {
        self.captured
    }
}

impl PerceptionSource for ScriptedPerception {
    fn capture(&mut self, _timeout: Duration) -> NavResult<RawSnapshot> {
        self.captured += 1;
        self.queue
            .pop_front()
            .unwrap_or_else(|| Err(NavError::Perception("no snapshots left".into())))
    }
}
