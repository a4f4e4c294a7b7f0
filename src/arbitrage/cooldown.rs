//! src/arbitrage/cooldown.rs - Time-indexed path cooldowns and sender ignores
//!
//! Both maps are owned by the engine instance and passed explicitly; there is
//! no module-level state, so independent loops (one per chain) can coexist in
//! a process and tests inject their own instances.

use log::debug;
use rustc_hash::FxHashMap;

/// Tracks which paths are cooling down. A traded path is penalized twice as
/// long as its conflicts by default (10 vs 5 ticks): the reserves it just
/// moved are more stale for itself than for routes that merely overlap it.
#[derive(Debug)]
pub struct CooldownTracker {
    /// Path identity -> first tick at which the path is active again.
    entries: FxHashMap<String, u64>,
    self_ticks: u64,
    conflict_ticks: u64,
}

impl CooldownTracker {
    pub fn new(self_ticks: u64, conflict_ticks: u64) -> Self {
        CooldownTracker {
            entries: FxHashMap::default(),
            self_ticks,
            conflict_ticks,
        }
    }

    /// Records a trade on `path_id` at `tick`, cooling the path itself and
    /// everything in its conflict set. An already-cooling entry keeps
    /// whichever expiry is later.
    pub fn place<'a, I>(&mut self, path_id: &str, conflicts: I, tick: u64)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.extend_entry(path_id, tick + self.self_ticks);
        for conflict in conflicts {
            self.extend_entry(conflict, tick + self.conflict_ticks);
        }
    }

    fn extend_entry(&mut self, id: &str, expiry: u64) {
        let entry = self.entries.entry(id.to_string()).or_insert(expiry);
        if *entry < expiry {
            *entry = expiry;
        }
    }

    /// Whether the path is still cooling at `tick`.
    pub fn is_cooling(&self, id: &str, tick: u64) -> bool {
        self.entries.get(id).is_some_and(|expiry| tick < *expiry)
    }

    /// Drops expired entries; called once per tick.
    pub fn purge(&mut self, tick: u64) {
        let before = self.entries.len();
        self.entries.retain(|_, expiry| tick < *expiry);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("Cooldowns expired for {} paths", dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mempool senders suppressed as spam/adversarial, with the same tick-TTL
/// lifecycle as cooldowns.
#[derive(Debug)]
pub struct IgnoredAddresses {
    entries: FxHashMap<String, u64>,
    ttl_ticks: u64,
}

impl IgnoredAddresses {
    pub fn new(ttl_ticks: u64) -> Self {
        IgnoredAddresses {
            entries: FxHashMap::default(),
            ttl_ticks,
        }
    }

    pub fn insert(&mut self, address: &str, tick: u64) {
        self.entries.insert(address.to_string(), tick + self.ttl_ticks);
    }

    pub fn contains(&self, address: &str, tick: u64) -> bool {
        self.entries.get(address).is_some_and(|expiry| tick < *expiry)
    }

    pub fn purge(&mut self, tick: u64) {
        self.entries.retain(|_, expiry| tick < *expiry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traded_path_cools_longer_than_conflicts() {
        let mut tracker = CooldownTracker::new(10, 5);
        let conflicts = vec!["q".to_string(), "r".to_string()];
        tracker.place("p", &conflicts, 100);

        for tick in 100..105 {
            assert!(tracker.is_cooling("p", tick));
            assert!(tracker.is_cooling("q", tick));
            assert!(tracker.is_cooling("r", tick));
        }
        // Conflicts reactivate at T+5, the traded path only at T+10.
        assert!(!tracker.is_cooling("q", 105));
        assert!(!tracker.is_cooling("r", 105));
        assert!(tracker.is_cooling("p", 109));
        assert!(!tracker.is_cooling("p", 110));
    }

    #[test]
    fn longer_expiry_wins_on_overlap() {
        let mut tracker = CooldownTracker::new(10, 5);
        tracker.place("p", &vec!["q".to_string()], 100);
        // q traded on its own shortly after: full self cooldown applies.
        tracker.place("q", &vec![], 102);
        assert!(tracker.is_cooling("q", 111));
        assert!(!tracker.is_cooling("q", 112));
        // A later conflict hit must not shorten it.
        tracker.place("p", &vec!["q".to_string()], 103);
        assert!(tracker.is_cooling("q", 111));
    }

    #[test]
    fn purge_drops_expired_entries() {
        let mut tracker = CooldownTracker::new(10, 5);
        tracker.place("p", &vec!["q".to_string()], 0);
        tracker.purge(5);
        assert_eq!(tracker.len(), 1);
        tracker.purge(10);
        assert!(tracker.is_empty());
    }

    #[test]
    fn ignored_addresses_expire() {
        let mut ignored = IgnoredAddresses::new(20);
        ignored.insert("juno1spam", 7);
        assert!(ignored.contains("juno1spam", 26));
        assert!(!ignored.contains("juno1spam", 27));
        ignored.purge(27);
        assert_eq!(ignored.len(), 0);
    }
}
