//! Login attempt throttling guard
//!
//! Tracks failed login attempts per identity and locks an identity out once
//! too many consecutive failures accumulate within the lockout window. The
//! guard wraps the credential check itself: callers hand it a deferred
//! verification future and get back a classified outcome.
//!
//! Behavior per identity:
//! - Failures older than the lockout window are forgiven before counting.
//! - Reaching the attempt limit trips the lockout: the record is cleared,
//!   the tripping caller pays the penalty delay, and `Locked` is returned.
//!   The penalty is one-shot; the next attempt starts from a clean record.
//! - A successful verification clears the record immediately.
//!
//! The attempt map is guarded by a single async mutex with short critical
//! sections. The lock is never held across the verification future or the
//! penalty sleep, so concurrent attempts for other identities are unaffected.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ThrottleConfig;

/// Time source for the guard.
///
/// Production code uses [`SystemClock`]; tests inject a manually advanced
/// clock so window expiry can be exercised without real waiting.
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of a guarded login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials verified; any failure record was cleared
    Authenticated,
    /// Credentials rejected; `attempts` is the failure count including this one
    Rejected {
        /// Consecutive failures recorded for this identity
        attempts: u32,
    },
    /// The attempt limit was reached; the penalty delay has already been paid
    Locked,
}

/// Per-identity failure record
struct AttemptRecord {
    failures: u32,
    last_failure: DateTime<Utc>,
}

/// Login throttle guard.
///
/// One instance is shared by all login handlers. State is in-process only;
/// a restart forgives all recorded failures.
pub struct LoginGuard {
    attempts: Mutex<HashMap<String, AttemptRecord>>,
    max_attempts: u32,
    lockout_window: Duration,
    penalty_delay: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl LoginGuard {
    /// Create a guard from throttle configuration, using the system clock
    pub fn new(config: &ThrottleConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a guard with an injected clock
    pub fn with_clock(config: &ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts: config.max_attempts,
            lockout_window: Duration::seconds(config.lockout_window_secs as i64),
            penalty_delay: std::time::Duration::from_secs(config.penalty_delay_secs),
            clock,
        }
    }

    /// Run a login attempt through the guard.
    ///
    /// `verify` performs the actual credential check and must fold every
    /// failure mode (unknown identity, wrong password, suspended account)
    /// into `false` so that outcomes reveal nothing about account existence.
    /// It is only awaited when the identity is not currently locked out, and
    /// no internal lock is held while it runs.
    ///
    /// A `Locked` return means the penalty delay has already elapsed; the
    /// failure record was cleared when the lockout tripped.
    pub async fn check_and_record<F>(&self, identity: &str, verify: F) -> LoginOutcome
    where
        F: Future<Output = bool>,
    {
        let identity = identity.to_lowercase();

        {
            let mut attempts = self.attempts.lock().await;
            if let Some(record) = attempts.get_mut(&identity) {
                let now = self.clock.now();
                if now - record.last_failure > self.lockout_window {
                    // Failures outside the window are forgiven
                    record.failures = 0;
                }
                // Records clear the moment they trip, so an in-map record
                // normally sits below the limit; this handles one observed
                // at the limit all the same.
                if record.failures >= self.max_attempts {
                    attempts.remove(&identity);
                    drop(attempts);
                    tracing::warn!(identity = %identity, "login locked out, applying penalty delay");
                    tokio::time::sleep(self.penalty_delay).await;
                    return LoginOutcome::Locked;
                }
            }
        }

        let verified = verify.await;

        let mut attempts = self.attempts.lock().await;
        if verified {
            attempts.remove(&identity);
            tracing::info!(identity = %identity, "login authenticated");
            return LoginOutcome::Authenticated;
        }

        let now = self.clock.now();
        let record = attempts.entry(identity.clone()).or_insert(AttemptRecord {
            failures: 0,
            last_failure: now,
        });
        record.failures += 1;
        record.last_failure = now;
        let count = record.failures;

        if count >= self.max_attempts {
            attempts.remove(&identity);
            drop(attempts);
            tracing::warn!(
                identity = %identity,
                attempts = count,
                "login attempt limit reached, applying penalty delay"
            );
            tokio::time::sleep(self.penalty_delay).await;
            return LoginOutcome::Locked;
        }

        drop(attempts);
        tracing::info!(identity = %identity, attempts = count, "login rejected");
        LoginOutcome::Rejected { attempts: count }
    }

    /// Current failure count for an identity (0 when no record exists)
    pub async fn failure_count(&self, identity: &str) -> u32 {
        let attempts = self.attempts.lock().await;
        attempts
            .get(&identity.to_lowercase())
            .map(|r| r.failures)
            .unwrap_or(0)
    }

    /// Evict records whose last failure is older than the lockout window.
    ///
    /// Returns the number of evicted records. A background task should call
    /// this periodically so abandoned identities do not accumulate.
    pub async fn sweep_stale(&self) -> usize {
        let now = self.clock.now();
        let mut attempts = self.attempts.lock().await;
        let before = attempts.len();
        attempts.retain(|_, record| now - record.last_failure <= self.lockout_window);
        let evicted = before - attempts.len();
        if evicted > 0 {
            tracing::debug!(evicted, "swept stale login attempt records");
        }
        evicted
    }

    /// Number of identities currently carrying a failure record
    pub async fn tracked_identities(&self) -> usize {
        self.attempts.lock().await.len()
    }
}
