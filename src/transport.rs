//! The HTTP fetch primitive.
//!
//! The lifecycle engine only talks to [`Transport`]. [`ReqwestTransport`] is
//! the default implementation; tests and embedders can supply their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use crate::{CancelSignal, Headers, Method, TransportError};

/// One attempt as handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL with the query string and any authorizer query applied.
    pub url: String,
    /// Request headers merged with the authorizer's, keys lowercase.
    pub headers: Headers,
    /// Encoded body, if any.
    pub body: Option<String>,
}

/// Raw result of one attempt, body already read as text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase, e.g. `"Not Found"`. May be empty.
    pub status_text: String,
    /// Header pairs as received; the engine lowercases them.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    /// `true` for any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes single attempts.
///
/// Implementations should abort and return [`TransportError::Cancelled`]
/// when `cancel` fires. On `wasm32` the returned future is not `Send`,
/// matching reqwest's browser backend.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancelSignal,
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh `reqwest::Client` and a per-attempt
    /// `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    /// Reuses an existing `reqwest::Client`, e.g. one with a custom proxy or
    /// TLS setup. `timeout` still applies to every attempt.
    pub fn with_client(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        // On WASM, reqwest uses AbortController for timeout; the `.timeout()`
        // method is available on both targets.
        let mut builder = self
            .http
            .request(request.method.into(), &request.url)
            .timeout(self.timeout);

        for (name, value) in request.headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Other(format!("invalid header name {name}: {err}")))?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                TransportError::Other(format!("invalid value for header {name}: {err}"))
            })?;
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::ClientOptions::default().timeout_ms))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        mut cancel: CancelSignal,
    ) -> Result<TransportResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.execute(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TransportResponse;

    #[test]
    fn ok_covers_2xx_only() {
        let status = |status| TransportResponse {
            status,
            ..TransportResponse::default()
        };
        assert!(status(200).is_ok());
        assert!(status(204).is_ok());
        assert!(!status(199).is_ok());
        assert!(!status(301).is_ok());
        assert!(!status(401).is_ok());
    }
}
