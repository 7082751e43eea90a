//! Retry policy.
//!
//! [`RetryPolicy`] is plain data: which methods and statuses may be retried,
//! how many times, and how long to wait in between. The retry loop that uses
//! it lives in the crate-private `execute` module.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime};

use crate::{Error, ErrorKind, Method, Response};

/// Custom backoff: receives the 1-based retry count, returns the delay.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

pub(crate) static DEFAULT_POLICY: LazyLock<RetryPolicy> = LazyLock::new(RetryPolicy::default);

const DEFAULT_LIMIT: u32 = 2;
const BASE_DELAY: Duration = Duration::from_millis(300);
const PAYLOAD_TOO_LARGE: u16 = 413;

/// Retry policy for failed attempts.
///
/// By default, retries twice (three attempts in total):
/// - methods `GET`, `PUT`, `HEAD`, `DELETE`, `OPTIONS`, `TRACE`
/// - statuses 408, 413, 429, 500, 502, 503, 504
/// - transport errors (connection, TLS)
///
/// Timeouts and cancellations are never retried.
///
/// The delay before retry `n` is `0.3s * 2^(n-1)`, capped by
/// [`backoff_limit`](Self::backoff_limit). For statuses in
/// [`after_status_codes`](Self::after_status_codes), a well-formed
/// `Retry-After` header wins over the computed value.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use kyte::{Method, RetryPolicy};
///
/// let policy = RetryPolicy::default()
///     .limit(5)
///     .methods([Method::Get, Method::Post])
///     .backoff_limit(Duration::from_secs(10));
/// assert_eq!(policy.retry_limit(), 5);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    limit: u32,
    methods: BTreeSet<Method>,
    status_codes: BTreeSet<u16>,
    after_status_codes: BTreeSet<u16>,
    max_retry_after: Option<Duration>,
    backoff_limit: Option<Duration>,
    delay: Option<DelayFn>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("limit", &self.limit)
            .field("methods", &self.methods)
            .field("status_codes", &self.status_codes)
            .field("after_status_codes", &self.after_status_codes)
            .field("max_retry_after", &self.max_retry_after)
            .field("backoff_limit", &self.backoff_limit)
            .field("custom_delay", &self.delay.is_some())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            methods: [
                Method::Get,
                Method::Put,
                Method::Head,
                Method::Delete,
                Method::Options,
                Method::Trace,
            ]
            .into_iter()
            .collect(),
            status_codes: [408, 413, 429, 500, 502, 503, 504].into_iter().collect(),
            after_status_codes: [413, 429, 503].into_iter().collect(),
            max_retry_after: None,
            backoff_limit: None,
            delay: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default().limit(0)
    }

    /// Maximum number of retries after the first attempt.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Total number of attempts, first one included. `0` is treated as `1`.
    #[must_use]
    pub fn max_attempts(self, attempts: u32) -> Self {
        self.limit(attempts.saturating_sub(1))
    }

    /// Methods eligible for retry.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Statuses eligible for retry.
    #[must_use]
    pub fn status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.status_codes = codes.into_iter().collect();
        self
    }

    /// Statuses for which a `Retry-After` header is honored.
    #[must_use]
    pub fn after_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.after_status_codes = codes.into_iter().collect();
        self
    }

    /// Upper bound applied to a server-provided `Retry-After` delay.
    #[must_use]
    pub const fn max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = Some(max);
        self
    }

    /// Upper bound applied to the computed backoff delay.
    #[must_use]
    pub const fn backoff_limit(mut self, max: Duration) -> Self {
        self.backoff_limit = Some(max);
        self
    }

    /// Replace the exponential backoff with a custom function of the retry count.
    #[must_use]
    pub fn delay(mut self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Configured number of retries.
    #[must_use]
    pub const fn retry_limit(&self) -> u32 {
        self.limit
    }

    /// Whether requests with this method may be retried.
    #[must_use]
    pub fn allows_method(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Whether this status may be retried.
    #[must_use]
    pub fn allows_status(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    /// Computed delay before the given 1-based retry.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let delay = match &self.delay {
            Some(delay) => delay(retry_count),
            None => {
                let factor = 2_u32.saturating_pow(retry_count.saturating_sub(1));
                BASE_DELAY.saturating_mul(factor)
            }
        };
        match self.backoff_limit {
            Some(limit) => delay.min(limit),
            None => delay,
        }
    }

    /// Delay before retrying after this response, or `None` when the response
    /// must not be retried. Method and retry budget are checked by the caller.
    pub(crate) fn response_delay(
        &self,
        response: &Response,
        retry_count: u32,
        now: SystemTime,
    ) -> Option<Duration> {
        let status = response.status();
        if !self.allows_status(status) {
            return None;
        }
        if self.after_status_codes.contains(&status)
            && let Some(after) = parse_retry_after(response, now)
        {
            return Some(match self.max_retry_after {
                Some(max) => after.min(max),
                None => after,
            });
        }
        if status == PAYLOAD_TOO_LARGE {
            return None;
        }
        Some(self.backoff(retry_count))
    }

    /// Delay before retrying after a failed exchange, or `None` when the
    /// error must not be retried.
    pub(crate) fn error_delay(&self, error: &Error, retry_count: u32) -> Option<Duration> {
        (error.kind() == ErrorKind::Transport).then(|| self.backoff(retry_count))
    }
}

/// `Retry-After` as delta-seconds or an HTTP date. Dates in the past yield zero.
pub(crate) fn parse_retry_after(response: &Response, now: SystemTime) -> Option<Duration> {
    let raw = response.header("retry-after")?.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(raw).ok()?;
    Some(date.duration_since(now).unwrap_or(Duration::ZERO))
}
