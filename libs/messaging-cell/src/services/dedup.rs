use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Remembers recently relayed message ids so webhook redeliveries are
/// relayed once. Lives for the process only.
pub struct MessageDeduplicator {
    seen: DashMap<String, Instant>,
    ttl: Duration,
}

impl MessageDeduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    /// `true` the first time `id` is seen within the TTL window.
    pub fn check_and_mark(&self, id: &str) -> bool {
        if id.is_empty() {
            return true;
        }

        self.purge_expired();
        let now = Instant::now();

        match self.seen.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) >= self.ttl {
                    entry.insert(now);
                    true
                } else {
                    debug!("Duplicate message {}", id);
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Lets a redelivery through again after a failed relay.
    pub fn forget(&self, id: &str) {
        self.seen.remove(id);
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.seen.retain(|_, first_seen| first_seen.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn second_sighting_is_a_duplicate() {
        let dedup = MessageDeduplicator::new(Duration::from_secs(60));
        assert!(dedup.check_and_mark("wa:1"));
        assert!(!dedup.check_and_mark("wa:1"));
        assert!(dedup.check_and_mark("wa:2"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn empty_ids_are_never_deduplicated() {
        let dedup = MessageDeduplicator::new(Duration::from_secs(60));
        assert!(dedup.check_and_mark(""));
        assert!(dedup.check_and_mark(""));
        assert!(dedup.is_empty());
    }

    #[test]
    fn expired_entries_are_forgotten() {
        let dedup = MessageDeduplicator::new(Duration::from_millis(0));
        assert!(dedup.check_and_mark("cw:9"));
        assert!(dedup.check_and_mark("cw:9"));
    }

    #[test]
    fn concurrent_marking_admits_one_winner() {
        let dedup = Arc::new(MessageDeduplicator::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                std::thread::spawn(move || dedup.check_and_mark("wa:race"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|first| *first)
            .count();
        assert_eq!(winners, 1);
    }
}
