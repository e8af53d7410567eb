//! Bounded retry policy for transient connection failures.
//!
//! The policy is a pure decision function: given how an error was classified and
//! how many attempts have been made, it says whether to try again and how long to
//! wait first. [`retry_async`] drives an async operation through that decision.

use crate::error::DbResult;
use sqlx::mysql::MySqlDatabaseError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of attempts (including the first one).
pub const MAX_RETRIES: u32 = 3;

/// Delay before the second attempt.
pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for any single backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(10);

/// Growth factor applied to the delay after each failed attempt.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// MySQL client error numbers that indicate a dropped or confused connection.
///
/// - 2006: server has gone away
/// - 2013: lost connection during query
/// - 2014: commands out of sync
/// - 2055: lost connection
pub const TRANSIENT_MYSQL_ERRORS: &[u16] = &[2006, 2013, 2014, 2055];

/// Retry eligibility of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Decide whether to retry after `attempts` failed attempts.
    pub fn decide(&self, class: ErrorClass, attempts: u32) -> RetryDecision {
        match class {
            ErrorClass::Fatal => RetryDecision::GiveUp,
            ErrorClass::Transient if attempts >= self.max_attempts => RetryDecision::GiveUp,
            ErrorClass::Transient => RetryDecision::RetryAfter(self.delay_for(attempts)),
        }
    }
}

/// Bookkeeping for one retried call. Never outlives the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    pub attempts: u32,
    pub elapsed_delay: Duration,
    pub last_class: Option<ErrorClass>,
}

/// Result of [`retry_async`] together with the attempt bookkeeping.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: DbResult<T>,
    pub state: RetryState,
}

/// Run `op` until it succeeds, fails fatally, or the attempt budget is spent.
///
/// The closure receives the 1-based attempt number. Only the calling task
/// sleeps between attempts.
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut state = RetryState::default();
    loop {
        state.attempts += 1;
        let err = match op(state.attempts).await {
            Ok(value) => {
                debug!(operation, attempts = state.attempts, "Operation succeeded");
                return RetryOutcome {
                    result: Ok(value),
                    state,
                };
            }
            Err(err) => err,
        };

        let class = err.class();
        state.last_class = Some(class);

        match policy.decide(class, state.attempts) {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    operation,
                    attempt = state.attempts,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                state.elapsed_delay += delay;
            }
            RetryDecision::GiveUp => {
                warn!(
                    operation,
                    attempts = state.attempts,
                    class = ?class,
                    error = %err,
                    "Giving up"
                );
                return RetryOutcome {
                    result: Err(err),
                    state,
                };
            }
        }
    }
}

/// MySQL error number carried by a driver error, if any.
pub fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}

/// Classify a driver error for retry eligibility.
///
/// Database errors are transient only when their MySQL number is in
/// [`TRANSIENT_MYSQL_ERRORS`]. Failures that carry no database error code at all
/// (socket I/O, protocol desync, pool acquire timeout, crashed worker) form the
/// catch-all retryable bucket.
pub fn classify_sqlx_error(err: &sqlx::Error) -> ErrorClass {
    match err {
        sqlx::Error::Database(_) => match mysql_error_number(err) {
            Some(number) if TRANSIENT_MYSQL_ERRORS.contains(&number) => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}
