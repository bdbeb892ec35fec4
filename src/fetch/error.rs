use thiserror::Error;

/// Failures a single fetch can end with.
///
/// Clone so that every caller waiting on the same in-flight request gets
/// its own copy of the outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("invalid bounds: south={south}, west={west}, north={north}, east={east}")]
    InvalidBounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },

    #[error("network failure on {endpoint}: {message}")]
    NetworkFailure { endpoint: String, message: String },

    #[error("upstream error from {endpoint} (status {status}): {message}")]
    UpstreamError {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("failed to parse response: {0}")]
    ParseFailure(String),
}

impl FetchError {
    /// Transient failures that feed backoff and may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkFailure { .. } | FetchError::UpstreamError { .. }
        )
    }

    /// Whether the failure is charged to the endpoint that served it
    pub fn counts_as_endpoint_failure(&self) -> bool {
        self.is_retryable()
    }

    /// Endpoint involved in the failure, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            FetchError::NetworkFailure { endpoint, .. }
            | FetchError::UpstreamError { endpoint, .. }
            | FetchError::RateLimited { endpoint } => Some(endpoint),
            FetchError::InvalidBounds { .. } | FetchError::ParseFailure(_) => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::ParseFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let network = FetchError::NetworkFailure {
            endpoint: "a".into(),
            message: "timeout".into(),
        };
        let upstream = FetchError::UpstreamError {
            endpoint: "a".into(),
            status: 504,
            message: "gateway timeout".into(),
        };
        let limited = FetchError::RateLimited {
            endpoint: "a".into(),
        };
        let parse = FetchError::ParseFailure("eof".into());

        assert!(network.is_retryable());
        assert!(upstream.counts_as_endpoint_failure());
        assert!(!limited.is_retryable());
        assert!(!parse.is_retryable());
        assert_eq!(limited.endpoint(), Some("a"));
        assert_eq!(parse.endpoint(), None);
    }

    #[test]
    fn test_json_error_becomes_parse_failure() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(FetchError::from(err), FetchError::ParseFailure(_)));
    }
}
