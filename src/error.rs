//! Error types for AFLUX client operations.
//!
//! All errors are synchronous and surface directly to the caller. Variants
//! carry the request context (URL, status) the underlying errors lack.

use thiserror::Error;

/// Errors that can occur while talking to the AFLUX API.
#[derive(Debug, Error)]
pub enum AfluxError {
    /// Caller-supplied input was rejected before any network call.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The server returned a non-success status after any configured
    /// retries were exhausted.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if the server sent one.
        retry_after: Option<String>,
    },

    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The transport gave up waiting for the server.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A response that must be JSON could not be parsed, or did not have
    /// the shape the operation requires.
    #[error("failed to decode response from {url}: {detail}")]
    Decode {
        /// The URL whose response was unusable.
        url: String,
        /// What went wrong while decoding.
        detail: String,
    },

    /// The HTTP session could not be constructed.
    #[error("failed to build HTTP session: {source}")]
    Session {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl AfluxError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error carrying a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            detail: detail.into(),
        }
    }
}

// Note on From trait implementations:
// There is intentionally no `From<reqwest::Error>` because every variant
// needs the request URL for a useful message, and the source error does not
// carry one. The helper constructors above are the pattern callers use.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let error = AfluxError::invalid_argument("chunk_size must be greater than 0");
        let msg = error.to_string();
        assert!(msg.contains("invalid argument"), "got: {msg}");
        assert!(msg.contains("chunk_size"), "got: {msg}");
    }

    #[test]
    fn test_http_status_display() {
        let error = AfluxError::http_status("https://aflow.org/API/aflux/?x", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("https://aflow.org/API/aflux/?x"), "got: {msg}");
    }

    #[test]
    fn test_http_status_keeps_retry_after() {
        let error = AfluxError::http_status_with_retry_after(
            "https://aflow.org",
            429,
            Some("120".to_string()),
        );
        match error {
            AfluxError::HttpStatus { retry_after, .. } => {
                assert_eq!(retry_after.as_deref(), Some("120"));
            }
            other => panic!("expected HttpStatus, got: {other:?}"),
        }
    }

    #[test]
    fn test_decode_display() {
        let error = AfluxError::decode("http://host/entry", "expected a JSON array of lines");
        let msg = error.to_string();
        assert!(msg.contains("decode"), "got: {msg}");
        assert!(msg.contains("http://host/entry"), "got: {msg}");
    }

    #[test]
    fn test_timeout_display() {
        let error = AfluxError::timeout("http://host/CONTCAR.relax");
        assert!(error.to_string().contains("timeout"));
    }
}
