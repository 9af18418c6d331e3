//! Per-key trailing-edge debouncing on the logical clock.
//!
//! Each key has at most one pending value. Scheduling a key again replaces
//! its value and restarts its window, so a burst of signals for one key
//! settles into its last value. Keys never delay one another.

use crate::clock::Millis;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Pending<V> {
    due: Millis,
    seq: u64,
    value: V,
}

#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    window: Millis,
    timers: BTreeMap<K, Pending<V>>,
    next_seq: u64,
}

impl<K: Ord + Clone, V> Debouncer<K, V> {
    pub fn new(window: Millis) -> Self {
        Self {
            window,
            timers: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn window(&self) -> Millis {
        self.window
    }

    /// Start or restart the timer for `key`.
    pub fn schedule(&mut self, key: K, value: V, now: Millis) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(
            key,
            Pending {
                due: now.saturating_add(self.window),
                seq,
                value,
            },
        );
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.timers.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.timers.len()
    }

    /// Earliest due time among pending timers.
    pub fn next_due(&self) -> Option<Millis> {
        self.timers.values().map(|p| p.due).min()
    }

    /// Remove and return every value due at `now`, ordered by due time and
    /// then by scheduling order.
    pub fn fire_due(&mut self, now: Millis) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .timers
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut fired: Vec<(Millis, u64, K, V)> = due
            .into_iter()
            .filter_map(|k| {
                let p = self.timers.remove(&k)?;
                Some((p.due, p.seq, k, p.value))
            })
            .collect();
        fired.sort_by_key(|(due, seq, _, _)| (*due, *seq));
        fired.into_iter().map(|(_, _, k, v)| (k, v)).collect()
    }
}
