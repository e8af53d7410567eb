//! Per-caller, per-operation sliding-window throttling.

use crate::error::{DbError, DbResult};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_MAX_REQUESTS: usize = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding window limiter keyed by `caller:operation`.
///
/// Timestamps older than the window are pruned lazily on each check.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit the call and record it, or deny once the window is full.
    pub async fn check(&self, caller: &str, operation: &str) -> DbResult<()> {
        let key = format!("{}:{}", caller, operation);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key).or_default();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) < self.window {
                break;
            }
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_requests {
            warn!(caller, operation, limit = self.max_requests, "Rate limit exceeded");
            return Err(DbError::rate_limit_exceeded(
                caller,
                operation,
                self.max_requests,
                self.window.as_secs(),
            ));
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Number of `caller:operation` keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Drop keys whose every timestamp has left the window. Returns how many.
    pub async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Purged idle rate limit windows");
        }
        removed
    }
}
