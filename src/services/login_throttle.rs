//! Brute-force protection for the admin login.
//!
//! Failures are counted per client key inside a window that opens on the
//! first failure. Reaching `max_attempts` blocks the key until the window
//! closes. A successful login clears the record.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct LoginAttemptRecord {
    failures: u32,
    lockout_until: Instant,
}

#[derive(Debug)]
pub struct LoginThrottle {
    max_attempts: u32,
    window: Duration,
    records: Mutex<HashMap<String, LoginAttemptRecord>>,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn can_attempt(&self, client: &str) -> bool {
        let now = Instant::now();
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        match records.get(client) {
            Some(record) if now < record.lockout_until => record.failures < self.max_attempts,
            _ => true,
        }
    }

    pub fn record_attempt(&self, client: &str, success: bool) {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        if success {
            records.remove(client);
        } else {
            self.count_failure(&mut records, client, now);
        }
    }

    /// Admits one login attempt, counting it as a failure up front.
    ///
    /// The lockout check and the count share one critical section, so
    /// concurrent attempts from one client cannot all slip past the limit.
    /// Clear the record with `record_attempt(client, true)` once the
    /// attempt succeeds.
    pub fn try_begin(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(record) = records.get(client)
            && now < record.lockout_until
            && record.failures >= self.max_attempts
        {
            return false;
        }

        self.count_failure(&mut records, client, now);
        true
    }

    fn count_failure(
        &self,
        records: &mut HashMap<String, LoginAttemptRecord>,
        client: &str,
        now: Instant,
    ) {
        records
            .entry(client.to_string())
            .and_modify(|record| {
                if now >= record.lockout_until {
                    *record = LoginAttemptRecord {
                        failures: 1,
                        lockout_until: now + self.window,
                    };
                } else {
                    record.failures = record.failures.saturating_add(1);
                }
            })
            .or_insert(LoginAttemptRecord {
                failures: 1,
                lockout_until: now + self.window,
            });
    }

    /// Time left before a locked-out client may try again. Zero when not locked out.
    pub fn remaining_lockout(&self, client: &str) -> Duration {
        let now = Instant::now();
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        match records.get(client) {
            Some(record) if record.failures >= self.max_attempts => {
                record.lockout_until.saturating_duration_since(now)
            }
            _ => Duration::ZERO,
        }
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| now < record.lockout_until);
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    #[tokio::test(start_paused = true)]
    async fn five_failures_lock_out_the_sixth() {
        let throttle = LoginThrottle::new(5, WINDOW);

        for _ in 0..5 {
            assert!(throttle.can_attempt("10.0.0.1"));
            throttle.record_attempt("10.0.0.1", false);
        }

        assert!(!throttle.can_attempt("10.0.0.1"));
        assert_eq!(throttle.remaining_lockout("10.0.0.1"), WINDOW);
        assert!(throttle.can_attempt("10.0.0.2"));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(
            throttle.remaining_lockout("10.0.0.1"),
            WINDOW - Duration::from_secs(60)
        );

        tokio::time::advance(WINDOW).await;
        assert!(throttle.can_attempt("10.0.0.1"));
        assert_eq!(throttle.remaining_lockout("10.0.0.1"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_failures() {
        let throttle = LoginThrottle::new(5, WINDOW);

        for _ in 0..4 {
            throttle.record_attempt("client", false);
        }
        throttle.record_attempt("client", true);

        for _ in 0..4 {
            throttle.record_attempt("client", false);
        }
        assert!(throttle.can_attempt("client"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_window_starts_fresh_count() {
        let throttle = LoginThrottle::new(2, WINDOW);

        throttle.record_attempt("client", false);
        tokio::time::advance(WINDOW).await;
        throttle.record_attempt("client", false);
        assert!(throttle.can_attempt("client"));

        throttle.record_attempt("client", false);
        assert!(!throttle.can_attempt("client"));
    }

    #[tokio::test(start_paused = true)]
    async fn try_begin_counts_until_locked_and_success_clears() {
        let throttle = LoginThrottle::new(3, WINDOW);

        assert!(throttle.try_begin("client"));
        assert!(throttle.try_begin("client"));
        throttle.record_attempt("client", true);

        for _ in 0..3 {
            assert!(throttle.try_begin("client"));
        }
        assert!(!throttle.try_begin("client"));
        assert!(!throttle.can_attempt("client"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_attempts_respect_the_limit() {
        let throttle = Arc::new(LoginThrottle::new(5, WINDOW));
        let barrier = Arc::new(tokio::sync::Barrier::new(32));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    throttle.try_begin("attacker")
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5);
        assert!(!throttle.can_attempt("attacker"));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_closed_windows() {
        let throttle = LoginThrottle::new(5, WINDOW);
        throttle.record_attempt("a", false);
        tokio::time::advance(WINDOW).await;
        assert_eq!(throttle.purge_expired(), 1);
    }
}
