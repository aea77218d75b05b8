//! Remote quota tracking
//!
//! After every response the remote reports how many calls are left in the
//! current window and when the window resets. When the quota is gone the
//! client sleeps until the reset instead of letting the caller burst into
//! errors.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

/// Rate limit information from response headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum number of requests allowed in the window
    pub limit: Option<i64>,

    /// Remaining requests in the current window
    pub remaining: Option<i64>,

    /// Unix timestamp (seconds) when the window resets
    pub reset: Option<i64>,
}

/// What to do about the quota before handing control back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Quota left, or no usable headers
    Proceed,
    /// Quota exhausted, window resets after this long
    Sleep(Duration),
    /// Quota exhausted but the reset time already passed this long ago
    Stale(Duration),
}

impl RateLimitInfo {
    /// Parse rate limit info from response headers.
    ///
    /// Accepts both `x-rate-limit-*` and the older `x-ratelimit-*` names.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_i64(headers, "x-rate-limit-limit", "x-ratelimit-limit"),
            remaining: header_i64(headers, "x-rate-limit-remaining", "x-ratelimit-remaining"),
            reset: header_i64(headers, "x-rate-limit-reset", "x-ratelimit-reset"),
        }
    }

    /// Check if we're rate limited (remaining < 1)
    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining, Some(r) if r < 1)
    }

    /// Decide whether the caller has to wait, relative to `now`
    pub fn backoff_at(&self, now: SystemTime) -> Backoff {
        let (Some(reset), true) = (self.reset, self.is_exhausted()) else {
            return Backoff::Proceed;
        };
        if reset <= 0 {
            return Backoff::Proceed;
        }
        let reset_at = UNIX_EPOCH + Duration::from_secs(reset as u64);
        match reset_at.duration_since(now) {
            Ok(wait) if !wait.is_zero() => Backoff::Sleep(wait),
            Ok(_) => Backoff::Stale(Duration::ZERO),
            Err(e) => Backoff::Stale(e.duration()),
        }
    }
}

/// Block until the remote quota resets, if it is exhausted
pub async fn wait_for_quota(info: &RateLimitInfo) {
    tracing::debug!(
        limit = ?info.limit,
        remaining = ?info.remaining,
        reset = ?info.reset,
        "Rate limit status"
    );

    match info.backoff_at(SystemTime::now()) {
        Backoff::Proceed => {}
        Backoff::Sleep(wait) => {
            tracing::warn!(sleep_secs = wait.as_secs_f64(), "API limits exceeded, sleeping until reset");
            tokio::time::sleep(wait).await;
        }
        Backoff::Stale(ago) => {
            tracing::warn!(
                reset = ?info.reset,
                expired_secs = ago.as_secs(),
                "Rate limited but reset is in the past, proceeding"
            );
        }
    }
}

fn header_i64(headers: &HeaderMap, name: &str, legacy: &str) -> Option<i64> {
    headers
        .get(name)
        .or_else(|| headers.get(legacy))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
