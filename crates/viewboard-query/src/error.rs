use thiserror::Error;

/// Why an analytics fetch failed.
///
/// `Clone` because every waiter attached to one in-flight fetch receives the
/// same error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 4xx: the endpoint rejected the filter parameters.
    #[error("analytics endpoint rejected the request ({status}): {message}")]
    Client { status: u16, message: String },

    /// 5xx: the endpoint failed internally.
    #[error("analytics endpoint failed ({status})")]
    Server { status: u16 },

    /// 1xx or 3xx: neither data nor a failure the endpoint will recover from.
    #[error("unexpected analytics response status ({status})")]
    UnexpectedStatus { status: u16 },

    #[error("analytics request failed: {0}")]
    Transport(String),

    #[error("invalid analytics response: {0}")]
    Decode(String),

    /// The fetch task ended without producing a result.
    #[error("analytics fetch aborted")]
    Aborted,

    #[error("invalid analytics endpoint url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Server and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Server { .. } | FetchError::Transport(_))
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, FetchError::Client { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::FetchError;

    #[test]
    fn only_server_and_transport_errors_are_retryable() {
        assert!(FetchError::Server { status: 503 }.is_retryable());
        assert!(FetchError::Transport("reset".into()).is_retryable());
        assert!(!FetchError::Client {
            status: 400,
            message: "Invalid query parameters".into()
        }
        .is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
        assert!(!FetchError::Aborted.is_retryable());
        assert!(!FetchError::UnexpectedStatus { status: 304 }.is_retryable());
    }
}
