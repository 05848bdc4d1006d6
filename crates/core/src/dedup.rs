use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub const DEFAULT_DEDUP_TTL_SECS: u64 = 30;

/// Short-lived memory of inbound message ids.
///
/// Webhook providers re-deliver events on slow acknowledgements; the first
/// `seen` call for an id returns `false` and marks it, every later call within
/// the TTL returns `true`. Expired ids are swept from inside `seen`, at most
/// once per TTL window, so no background timer is needed.
#[derive(Debug)]
pub struct DedupGuard {
    entries: DashMap<String, Instant>,
    ttl: Duration,
    last_sweep: Mutex<Option<Instant>>,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_DEDUP_TTL_SECS))
    }
}

impl DedupGuard {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl, last_sweep: Mutex::new(None) }
    }

    pub fn seen(&self, id: &str) -> bool {
        self.seen_at(id, Instant::now())
    }

    pub fn seen_at(&self, id: &str, now: Instant) -> bool {
        self.sweep_if_due(now);

        // The entry guard holds the shard lock, so concurrent callers for the
        // same id observe exactly one first sighting.
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.ttl {
                    true
                } else {
                    entry.insert(now);
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_if_due(&self, now: Instant) {
        let Ok(mut last_sweep) = self.last_sweep.lock() else {
            return;
        };
        let due = last_sweep.map_or(true, |at| now.saturating_duration_since(at) >= self.ttl);
        if !due {
            return;
        }
        *last_sweep = Some(now);
        drop(last_sweep);

        let ttl = self.ttl;
        self.entries.retain(|_, marked_at| now.saturating_duration_since(*marked_at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::DedupGuard;

    #[test]
    fn second_sighting_within_ttl_is_a_duplicate() {
        let guard = DedupGuard::new(Duration::from_secs(30));
        let start = Instant::now();

        assert!(!guard.seen_at("wamid-1", start));
        assert!(guard.seen_at("wamid-1", start + Duration::from_secs(1)));
        assert!(!guard.seen_at("wamid-2", start + Duration::from_secs(1)));
    }

    #[test]
    fn id_is_fresh_again_after_ttl_window() {
        let guard = DedupGuard::new(Duration::from_secs(30));
        let start = Instant::now();

        assert!(!guard.seen_at("wamid-1", start));
        assert!(!guard.seen_at("wamid-1", start + Duration::from_secs(31)));
        assert!(guard.seen_at("wamid-1", start + Duration::from_secs(32)));
    }

    #[test]
    fn expired_entries_are_swept_on_access() {
        let guard = DedupGuard::new(Duration::from_secs(30));
        let start = Instant::now();
        for index in 0..50 {
            guard.seen_at(&format!("old-{index}"), start);
        }
        assert_eq!(guard.len(), 50);

        guard.seen_at("new", start + Duration::from_secs(60));

        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn concurrent_sightings_of_same_id_yield_one_first_delivery() {
        let guard = Arc::new(DedupGuard::default());
        let handles = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.seen("wamid-race"))
            })
            .collect::<Vec<_>>();

        let first_deliveries = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread should not panic"))
            .filter(|duplicate| !duplicate)
            .count();

        assert_eq!(first_deliveries, 1);
    }
}
