//! Metrics collection module
//!
//! Tracks search volume, attempt counts, failure categories and query times.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of query times kept for the rolling average
const RESPONSE_TIME_WINDOW: usize = 100;

/// Process-wide search metrics
pub struct Metrics {
    /// Total tool invocations
    total_searches: AtomicU64,
    /// Calls that returned a result
    successes: AtomicU64,
    /// HTTP attempts sent upstream
    attempts: AtomicU64,
    /// Failures by error category
    failures: RwLock<HashMap<&'static str, u64>>,
    /// Query times of recent successes, in ms
    response_times: RwLock<Vec<u64>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            response_times: RwLock::new(Vec::new()),
        }
    }

    /// Increment total search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed search
    pub fn record_success(&self, query_time_ms: u64, attempts: u32) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(attempts as u64, Ordering::Relaxed);

        let mut times = write(&self.response_times);
        if times.len() >= RESPONSE_TIME_WINDOW {
            times.remove(0);
        }
        times.push(query_time_ms);
    }

    /// Record a failed search by category
    pub fn record_failure(&self, category: &'static str, attempts: Option<u32>) {
        if let Some(n) = attempts {
            self.attempts.fetch_add(n as u64, Ordering::Relaxed);
        }
        *write(&self.failures).entry(category).or_insert(0) += 1;
    }

    pub fn get_total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    pub fn get_successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn get_failures(&self, category: &str) -> u64 {
        read(&self.failures).get(category).copied().unwrap_or(0)
    }

    /// Average query time over the rolling window
    pub fn get_avg_response_time(&self) -> Option<u64> {
        let times = read(&self.response_times);
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<u64>() / times.len() as u64)
        }
    }

    /// Percentage of finished searches that succeeded
    pub fn get_reliability(&self) -> f64 {
        let successes = self.get_successes();
        let failures: u64 = read(&self.failures).values().sum();
        let total = successes + failures;
        if total == 0 {
            100.0
        } else {
            (successes as f64 / total as f64) * 100.0
        }
    }

    /// Point-in-time copy for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_searches: self.get_total_searches(),
            successes: self.get_successes(),
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: read(&self.failures)
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            avg_response_time_ms: self.get_avg_response_time(),
            reliability: self.get_reliability(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of [`Metrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub successes: u64,
    pub attempts: u64,
    pub failures: HashMap<String, u64>,
    pub avg_response_time_ms: Option<u64>,
    pub reliability: f64,
}

// Counters stay usable even if a writer panicked mid-update.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.record_success(100, 1);
        metrics.inc_search();
        metrics.record_success(300, 3);

        assert_eq!(metrics.get_total_searches(), 2);
        assert_eq!(metrics.get_avg_response_time(), Some(200));
        assert_eq!(metrics.get_reliability(), 100.0);
        assert_eq!(metrics.snapshot().attempts, 4);
    }

    #[test]
    fn test_failures_by_category() {
        let metrics = Metrics::new();
        metrics.record_success(10, 1);
        metrics.record_failure("RateLimitError", Some(3));
        metrics.record_failure("RateLimitError", Some(3));
        metrics.record_failure("AuthenticationError", None);

        assert_eq!(metrics.get_failures("RateLimitError"), 2);
        assert_eq!(metrics.get_failures("ParseError"), 0);
        assert_eq!(metrics.get_reliability(), 25.0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 7);
        assert_eq!(snapshot.failures.get("AuthenticationError"), Some(&1));
    }

    #[test]
    fn test_response_time_window() {
        let metrics = Metrics::new();
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_success(1000, 1);
        }
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_success(10, 1);
        }
        assert_eq!(metrics.get_avg_response_time(), Some(10));
    }
}
