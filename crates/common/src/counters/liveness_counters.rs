use crate::domain::{CountersSink, LivenessCounter};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide liveness counters keyed by (counter, application).
///
/// Constructed once at startup and shared by handle with every connection.
/// Counters only ever increase; no cross-counter snapshot is consistent.
#[derive(Debug, Default)]
pub struct LivenessCounters {
    counts: DashMap<(LivenessCounter, String), AtomicU64>,
}

/// A point-in-time reading of one counter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CounterReading {
    pub application_name: String,
    pub counter: LivenessCounter,
    pub value: u64,
}

impl LivenessCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: LivenessCounter, application_name: &str) -> u64 {
        self.counts
            .get(&(counter, application_name.to_string()))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All counters, sorted by application then counter
    pub fn snapshot(&self) -> Vec<CounterReading> {
        let mut readings: Vec<CounterReading> = self
            .counts
            .iter()
            .map(|entry| {
                let (counter, application_name) = entry.key();
                CounterReading {
                    application_name: application_name.clone(),
                    counter: *counter,
                    value: entry.value().load(Ordering::Relaxed),
                }
            })
            .collect();
        readings.sort();
        readings
    }
}

impl CountersSink for LivenessCounters {
    fn increment(&self, counter: LivenessCounter, application_name: &str, n: u64) {
        // Fast path avoids allocating the key once the counter exists
        if let Some(existing) = self.counts.get(&(counter, application_name.to_string())) {
            existing.fetch_add(n, Ordering::Relaxed);
            return;
        }
        self.counts
            .entry((counter, application_name.to_string()))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_get() {
        let counters = LivenessCounters::new();
        counters.increment(LivenessCounter::PayloadReceived, "netatmo", 1);
        counters.increment(LivenessCounter::PayloadReceived, "netatmo", 2);
        counters.increment(LivenessCounter::PushFail, "netatmo", 1);

        assert_eq!(counters.get(LivenessCounter::PayloadReceived, "netatmo"), 3);
        assert_eq!(counters.get(LivenessCounter::PushFail, "netatmo"), 1);
        assert_eq!(counters.get(LivenessCounter::Timeout, "netatmo"), 0);
    }

    #[test]
    fn test_applications_are_separate_namespaces() {
        let counters = LivenessCounters::new();
        counters.increment(LivenessCounter::Timeout, "tts", 1);
        assert_eq!(counters.get(LivenessCounter::Timeout, "tts"), 1);
        assert_eq!(counters.get(LivenessCounter::Timeout, "netatmo"), 0);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let counters = LivenessCounters::new();
        counters.increment(LivenessCounter::PushFail, "b-app", 1);
        counters.increment(LivenessCounter::PayloadReceived, "a-app", 4);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].application_name, "a-app");
        assert_eq!(snapshot[0].value, 4);
        assert_eq!(snapshot[1].counter, LivenessCounter::PushFail);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(LivenessCounters::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.increment(LivenessCounter::PayloadReceived, "shared", 1);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counters.get(LivenessCounter::PayloadReceived, "shared"), 8000);
    }
}
