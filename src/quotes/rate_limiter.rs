//! Rate Limiter Module
//!
//! Fixed-window ceiling on outbound upstream calls. The window counter lives
//! in the shared `KvStore`, so every handler draws from the same quota.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::MAX_RATE_WINDOW_SECS;
use crate::error::{QuoteError, Result};
use crate::store::KvStore;

/// Store key holding the current window counter.
pub const RATE_LIMIT_KEY: &str = "quotes_rate_limit";

/// Calls counted in one window.
///
/// `count` is only meaningful while `window` is the current window index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub window: u64,
    pub count: u64,
}

/// Outcome of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Quota exhausted; the current window ends after this long.
    RetryAfter(Duration),
}

// == Rate Limiter ==
/// Fixed-window limiter over a store-persisted counter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    rate_limit: u64,
    window_secs: u64,
}

impl RateLimiter {
    // == Constructor ==
    /// Creates a limiter allowing `rate_limit` calls per `window_secs`.
    ///
    /// # Arguments
    /// * `store` - Shared store holding the window counter
    /// * `clock` - Time source for window boundaries and waits
    /// * `rate_limit` - Calls allowed per window, at least 1
    /// * `window_secs` - Window length, between 1 and `MAX_RATE_WINDOW_SECS`
    ///
    /// Values outside those ranges are a configuration error.
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        rate_limit: u64,
        window_secs: u64,
    ) -> Result<Self> {
        if rate_limit == 0 {
            return Err(QuoteError::Config("rate_limit must be at least 1".to_string()));
        }
        if window_secs == 0 || window_secs > MAX_RATE_WINDOW_SECS {
            return Err(QuoteError::Config(format!(
                "rate_window must be between 1 and {} seconds",
                MAX_RATE_WINDOW_SECS
            )));
        }
        Ok(Self {
            store,
            clock,
            rate_limit,
            window_secs,
        })
    }

    /// Calls allowed per window.
    pub fn rate_limit(&self) -> u64 {
        self.rate_limit
    }

    /// Window length in seconds.
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    // == Gate ==
    /// Charges one call against the current window, sleeping until the next
    /// window starts when the quota is already spent.
    pub async fn gate(&self) -> Result<()> {
        let mut state = self.charge().await?;

        // Over quota: pay the wait inline, then open the new window with this call
        if state.count > self.rate_limit {
            let wait = self.time_to_next_window(state.window);
            info!(
                "Rate limit of {} calls per {}s reached, waiting {}s",
                self.rate_limit,
                self.window_secs,
                wait.as_secs()
            );
            self.clock.sleep(wait).await;

            state = RateWindow {
                window: self.current_window(),
                count: 1,
            };
        }

        self.save(state).await
    }

    // == Try Acquire ==
    /// Like `gate`, but reports the wait instead of sleeping.
    ///
    /// A refused attempt is not charged.
    pub async fn try_acquire(&self) -> Result<Admission> {
        let state = self.charge().await?;

        if state.count > self.rate_limit {
            let wait = self.time_to_next_window(state.window);
            debug!("Rate limit reached, retry after {}s", wait.as_secs());
            return Ok(Admission::RetryAfter(wait));
        }

        self.save(state).await?;
        Ok(Admission::Granted)
    }

    // == Record ==
    /// Charges one call that has already been made, never refusing.
    ///
    /// The count may end above the quota; the next `gate` or `try_acquire`
    /// in this window then waits or is refused.
    pub async fn record(&self) -> Result<()> {
        let state = self.charge().await?;
        if state.count > self.rate_limit {
            debug!(
                "Recorded call {} against a quota of {}",
                state.count, self.rate_limit
            );
        }
        self.save(state).await
    }

    /// Reads the window, resets it if stale, and counts one more call.
    async fn charge(&self) -> Result<RateWindow> {
        let current = self.current_window();
        let stored = match self.store.get(RATE_LIMIT_KEY).await? {
            Some(value) => Some(serde_json::from_value::<RateWindow>(value)?),
            None => None,
        };

        let mut state = match stored {
            Some(state) if state.window == current => state,
            _ => RateWindow {
                window: current,
                count: 0,
            },
        };
        state.count += 1;
        Ok(state)
    }

    async fn save(&self, state: RateWindow) -> Result<()> {
        let value: Value = serde_json::to_value(state)?;
        self.store
            .put(RATE_LIMIT_KEY, value, self.window_secs)
            .await
    }

    fn window_ms(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }

    fn current_window(&self) -> u64 {
        self.clock.now_ms() / self.window_ms()
    }

    /// Whole seconds from now until `window` ends, rounded up.
    fn time_to_next_window(&self, window: u64) -> Duration {
        let window_end_ms = window.saturating_add(1).saturating_mul(self.window_ms());
        let remaining_ms = window_end_ms.saturating_sub(self.clock.now_ms());
        Duration::from_secs(remaining_ms.div_ceil(1000))
    }
}
