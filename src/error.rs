/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request expiration passed before an attempt could start.
    #[error("request expired")]
    Expired,
    /// The transport failed and no retries were left.
    #[error("request failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Number of transport invocations made for this logical request.
        attempts: usize,
        /// Failure of the final attempt.
        #[source]
        source: TransportError,
    },
    /// The request URL could not be resolved against the webroot.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure of a single transport invocation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The attempt was aborted through its cancellation signal.
    #[error("request cancelled")]
    Cancelled,
    /// The attempt did not complete within the transport timeout.
    #[error("request timed out")]
    Timeout,
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Http(#[source] reqwest::Error),
    /// Failure reported by a custom transport.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` when the attempt ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
