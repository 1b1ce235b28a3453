//! Time-windowed deduplication of message keys.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Remembers keys for a fixed window measured from their first admission.
///
/// A key admitted at `t` rejects repeats until `t + window` inclusive; a
/// repeat does not extend the window. Expired keys are pruned lazily in
/// insertion order, so memory is bounded by the keys seen within one window.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    seen: HashMap<String, Instant>,
    order: VecDeque<(String, Instant)>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` if `key` should be delivered at `now`.
    pub fn admit(&mut self, key: &str, now: Instant) -> bool {
        self.prune(now);
        if self.seen.contains_key(key) {
            return false;
        }
        self.seen.insert(key.to_string(), now);
        self.order.push_back((key.to_string(), now));
        true
    }

    /// Keys currently suppressing repeats.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some((key, first)) = self.order.front() {
            if now.saturating_duration_since(*first) <= self.window {
                break;
            }
            if self.seen.get(key) == Some(first) {
                self.seen.remove(key);
            }
            self.order.pop_front();
        }
    }
}
