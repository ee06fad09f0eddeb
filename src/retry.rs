//! Retry policy for transient AFLUX request failures.
//!
//! The policy is a configuration struct the client consults after each
//! failed attempt: bounded attempt count, exponential backoff with jitter,
//! a fixed status-code forcelist, and `Retry-After` header honoring. The
//! policy decides; the client sleeps and re-issues the GET.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::constants::HTTP_STATUS_FORCELIST;
use crate::error::AfluxError;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Maximum delay accepted from a Retry-After header (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so the first
        /// retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// `max_retries` bounds the retries issued after the initial attempt, so a
/// policy with `max_retries = 3` allows four attempts in total. Connect
/// failures, read failures and forcelist statuses all draw from the same
/// budget.
///
/// # Delay calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// A parseable `Retry-After` header takes precedence over the computed
/// backoff, capped at one hour.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    max_retries: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f32,
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom retry budget, using defaults for the
    /// backoff settings.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Returns the configured retry budget.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Determines whether to retry after a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `error` - The failure from the attempt that just ran
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[must_use]
    pub fn should_retry(&self, error: &AfluxError, attempt: u32) -> RetryDecision {
        if !is_retryable(error) {
            return RetryDecision::DoNotRetry {
                reason: "failure is not retryable".to_string(),
            };
        }

        if attempt > self.max_retries {
            debug!(attempt, max_retries = self.max_retries, "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({}) exhausted", self.max_retries),
            };
        }

        // A server-mandated Retry-After wins over computed backoff.
        let delay =
            retry_after_delay(error).unwrap_or_else(|| self.calculate_delay(attempt));

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the backoff delay for a retry attempt, with jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt is 1-indexed; the first retry waits one base delay.
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);

        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let capped = Duration::from_millis(capped_ms as u64);
        capped + calculate_jitter()
    }
}

/// Generates random jitter between 0 and [`MAX_JITTER`].
///
/// Jitter avoids synchronized retry storms when several clients fail at
/// the same moment.
fn calculate_jitter() -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Returns true when a failure is eligible for automatic retry.
///
/// Retryable: connect/read transport errors, timeouts, and HTTP statuses
/// in the forcelist. Everything else (non-forcelist statuses, decode
/// failures, invalid arguments) surfaces immediately.
fn is_retryable(error: &AfluxError) -> bool {
    match error {
        AfluxError::HttpStatus { status, .. } => HTTP_STATUS_FORCELIST.contains(status),
        AfluxError::Network { .. } | AfluxError::Timeout { .. } => true,
        AfluxError::InvalidArgument { .. }
        | AfluxError::Decode { .. }
        | AfluxError::Session { .. } => false,
    }
}

/// Extracts a usable delay from the Retry-After header of an HTTP status
/// failure, when one was captured.
fn retry_after_delay(error: &AfluxError) -> Option<Duration> {
    match error {
        AfluxError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Parses a Retry-After header value into a `Duration`.
///
/// Accepts integer seconds (the common form) or an RFC 7231 HTTP-date.
/// Values are capped at one hour; negative or unparsable values yield
/// `None`.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        if let Ok(duration) = datetime.duration_since(now) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            return Some(duration);
        }
        // Date in the past: retry immediately.
        return Some(Duration::ZERO);
    }

    debug!(header_value, "unparsable Retry-After value, ignoring");
    None
}
