use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    time::SystemTime,
};

// tokio::time::sleep is only available on non-WASM targets.
#[cfg(not(target_arch = "wasm32"))]
use {std::time::Duration, tokio::time::sleep};

use url::Url;

use crate::{
    query, AuthDecision, AuthRequest, Authorizer, Body, CancelHandle, ClientError, ClientOptions,
    ClientResponse, Headers, Method, Query, RequestOptions, ResponseData, Result, Transport,
    TransportRequest, TransportResponse, UnauthorizedMark,
};

const UNAUTHORIZED: u16 = 401;
const JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// One logical request: every attempt, retry and re-authorization it takes.
///
/// Built by [`ClientRequest::new`] and driven by awaiting it. Take a
/// [`CancelHandle`] first to abort the attempt in flight from elsewhere.
pub struct ClientRequest {
    transport: Arc<dyn Transport>,
    method: Method,
    url: String,
    headers: Headers,
    query: Option<Query>,
    body: Option<String>,
    expires: Option<SystemTime>,
    retries: u32,
    unauthorized: Option<UnauthorizedMark>,
    authorizer: Option<Arc<dyn Authorizer>>,
    retry_backoff_ms: u64,
    cancel: CancelHandle,
}

impl fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("retries", &self.retries)
            .field("expires", &self.expires)
            .field("unauthorized", &self.unauthorized)
            .finish_non_exhaustive()
    }
}

impl ClientRequest {
    /// Normalizes `options` and prepares the request. Nothing is sent until
    /// the request is awaited.
    ///
    /// Header keys are lowercased, `url` is resolved against the webroot,
    /// a relative expiry is fixed to an absolute instant, and structured
    /// bodies are encoded according to `content-type` (JSON by default).
    pub fn new(
        transport: Arc<dyn Transport>,
        url: impl AsRef<str>,
        options: RequestOptions,
        client_options: &ClientOptions,
    ) -> Result<Self> {
        let RequestOptions {
            method,
            webroot,
            mut headers,
            query,
            body,
            expires,
            retries,
            authorizer,
        } = options;

        let url = match webroot {
            Some(webroot) => resolve_url(&webroot, url.as_ref())?,
            None => url.as_ref().to_owned(),
        };
        let expires = expires.and_then(|expiry| expiry.resolve(SystemTime::now()));
        let body = body
            .map(|body| encode_body(body, &mut headers))
            .transpose()?;

        Ok(Self {
            transport,
            method,
            url,
            headers,
            query,
            body,
            expires,
            retries,
            unauthorized: None,
            authorizer,
            retry_backoff_ms: client_options.retry_backoff_ms,
            cancel: CancelHandle::new(),
        })
    }

    /// Handle that cancels whichever attempt is in flight.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs attempts until the request settles.
    pub async fn send(mut self) -> Result<ClientResponse> {
        let result = self.run().await;
        self.cancel.disarm();
        result
    }

    async fn run(&mut self) -> Result<ClientResponse> {
        let mut attempts = 0usize;
        // Only retries count towards backoff; the 401 re-entry does not.
        let mut retried = 0usize;
        loop {
            if self.expires.is_some_and(|at| at < SystemTime::now()) {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %self.url, attempts, "request expired");
                return Err(ClientError::Expired);
            }

            let mut url = query::append(&self.url, self.query.as_ref());
            let mut headers = self.headers.clone();

            if let Some(authorizer) = &self.authorizer {
                let decision = authorizer
                    .authorize(AuthRequest {
                        url: url.clone(),
                        headers: headers.clone(),
                        body: self.body.clone(),
                        unauthorized: self.unauthorized.clone(),
                    })
                    .await;

                match decision {
                    AuthDecision::Continue => {}
                    AuthDecision::Reject(status) => return Ok(ClientResponse::rejected(status)),
                    AuthDecision::Patch(auth) => {
                        if let Some(extra) = auth.headers {
                            headers.merge(extra);
                        }
                        url = query::append(&url, auth.query.as_ref());
                    }
                }
            }

            let signal = self.cancel.arm();
            attempts += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(method = %self.method, %url, attempts, "sending request");

            let outcome = self
                .transport
                .send(
                    TransportRequest {
                        method: self.method,
                        url,
                        headers,
                        body: self.body.clone(),
                    },
                    signal,
                )
                .await;

            match outcome {
                Ok(response) => {
                    if response.status == UNAUTHORIZED && self.unauthorized.is_none() {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("unauthorized response, re-authorizing once");

                        self.unauthorized = Some(UnauthorizedMark {
                            status: response.status,
                            status_text: response.status_text,
                            at: SystemTime::now(),
                        });
                        continue;
                    }

                    if response.is_ok() || self.retries == 0 {
                        return finalize(response);
                    }
                }
                Err(err) => {
                    if self.retries == 0 {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(attempts, error = %err, "request failed, no retries left");
                        return Err(ClientError::RetryExhausted {
                            attempts,
                            source: err,
                        });
                    }
                }
            }

            self.retries -= 1;
            self.wait_before_retry(retried).await;
            retried += 1;
        }
    }

    /// Waits before retry number `retry` (0-based).
    ///
    /// On native targets: exponential backoff sleep via `tokio::time::sleep`.
    /// On WASM targets: no-op.
    async fn wait_before_retry(&self, retry: usize) {
        if self.retry_backoff_ms == 0 {
            return;
        }

        let delay_ms = backoff_delay_ms(self.retry_backoff_ms, retry);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying request after {} ms", delay_ms);

        #[cfg(not(target_arch = "wasm32"))]
        sleep(Duration::from_millis(delay_ms)).await;

        // WASM: no sleep implementation — suppress unused variable warning.
        #[cfg(target_arch = "wasm32")]
        let _ = delay_ms;
    }
}

impl IntoFuture for ClientRequest {
    type Output = Result<ClientResponse>;
    #[cfg(not(target_arch = "wasm32"))]
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;
    #[cfg(target_arch = "wasm32")]
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}

fn backoff_delay_ms(base_ms: u64, retry: usize) -> u64 {
    let exp = retry.min(16) as u32;
    base_ms.saturating_mul(1u64 << exp)
}

fn resolve_url(webroot: &str, url: &str) -> Result<String> {
    let base = Url::parse(webroot)
        .map_err(|err| ClientError::InvalidUrl(format!("webroot '{webroot}': {err}")))?;
    base.join(url)
        .map(String::from)
        .map_err(|err| ClientError::InvalidUrl(format!("'{url}' against '{webroot}': {err}")))
}

fn encode_body(body: Body, headers: &mut Headers) -> Result<String> {
    match body {
        Body::Raw(text) => Ok(text),
        Body::Structured(value) => {
            if headers.content_type_is(FORM_URLENCODED) {
                match value {
                    serde_json::Value::Object(map) => Ok(query::stringify(&map)),
                    other => Err(ClientError::Encode(format!(
                        "form body must be an object, got {other}"
                    ))),
                }
            } else {
                if !headers.contains("content-type") {
                    headers.insert("content-type", JSON);
                }
                serde_json::to_string(&value)
                    .map_err(|err| ClientError::Encode(format!("invalid JSON body: {err}")))
            }
        }
    }
}

fn finalize(response: TransportResponse) -> Result<ClientResponse> {
    let TransportResponse {
        status,
        status_text,
        headers,
        body,
    } = response;
    let headers: Headers = headers.into_iter().collect();

    let data = if headers.content_type_is(JSON) {
        let value = serde_json::from_str(&body).map_err(|err| {
            ClientError::Decode(format!("invalid response JSON: {err}; body: {body}"))
        })?;
        ResponseData::Json(value)
    } else {
        ResponseData::Text(body)
    };

    Ok(ClientResponse {
        ok: (200..300).contains(&status),
        status,
        status_text,
        headers,
        data: Some(data),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{backoff_delay_ms, encode_body, finalize, resolve_url};
    use crate::{Body, ClientError, Headers, ResponseData, TransportResponse};

    #[test]
    fn webroot_resolution() {
        assert_eq!(
            resolve_url("https://api.example.com/v1/", "users?id=1").expect("must resolve"),
            "https://api.example.com/v1/users?id=1"
        );
        assert_eq!(
            resolve_url("https://api.example.com/v1/", "/health").expect("must resolve"),
            "https://api.example.com/health"
        );
        assert_eq!(
            resolve_url("https://api.example.com/", "https://other.example.com/x")
                .expect("must resolve"),
            "https://other.example.com/x"
        );
        assert!(matches!(
            resolve_url("not a url", "x"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn structured_body_defaults_to_json() {
        let mut headers = Headers::new();
        let body = encode_body(Body::Structured(json!({ "a": 1 })), &mut headers)
            .expect("must encode");
        assert_eq!(body, r#"{"a":1}"#);
        assert_eq!(headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn structured_body_keeps_explicit_content_type() {
        let mut headers = Headers::from([("Content-Type", "application/vnd.api+json")]);
        encode_body(Body::Structured(json!([1])), &mut headers).expect("must encode");
        assert_eq!(headers.get("content-type"), Some("application/vnd.api+json"));
    }

    #[test]
    fn form_body_uses_query_codec() {
        let mut headers = Headers::from([(
            "content-type",
            "application/x-www-form-urlencoded; charset=utf-8",
        )]);
        let body = encode_body(
            Body::Structured(json!({ "user": { "name": "a b" }, "tags": ["x"] })),
            &mut headers,
        )
        .expect("must encode");
        assert_eq!(body, "user[name]=a%20b&tags[0]=x");
    }

    #[test]
    fn form_body_rejects_non_object_root() {
        for value in [json!("abc"), json!(5), json!(null), json!(["x"])] {
            let mut headers = Headers::from([("content-type", "application/x-www-form-urlencoded")]);
            let err = encode_body(Body::Structured(value), &mut headers).expect_err("must fail");
            assert!(matches!(err, ClientError::Encode(_)));
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        assert_eq!(backoff_delay_ms(100, 0), 100);
        assert_eq!(backoff_delay_ms(100, 1), 200);
        assert_eq!(backoff_delay_ms(100, 3), 800);
        assert_eq!(backoff_delay_ms(1, 40), 1 << 16);
        assert_eq!(backoff_delay_ms(u64::MAX, 2), u64::MAX);
    }

    #[test]
    fn raw_body_is_untouched() {
        let mut headers = Headers::new();
        let body = encode_body(Body::Raw("{not json".to_owned()), &mut headers).expect("raw");
        assert_eq!(body, "{not json");
        assert!(headers.is_empty());
    }

    #[test]
    fn finalize_parses_json_and_lowercases_headers() {
        let response = finalize(TransportResponse {
            status: 200,
            status_text: "OK".to_owned(),
            headers: vec![(
                "Content-Type".to_owned(),
                "application/json; charset=utf-8".to_owned(),
            )],
            body: r#"{"id":7}"#.to_owned(),
        })
        .expect("must finalize");

        assert!(response.ok);
        assert_eq!(
            response.headers.get("content-type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(response.data, Some(ResponseData::Json(json!({ "id": 7 }))));
    }

    #[test]
    fn finalize_without_content_type_is_text() {
        let response = finalize(TransportResponse {
            status: 503,
            status_text: "Service Unavailable".to_owned(),
            headers: vec![],
            body: "down".to_owned(),
        })
        .expect("must finalize");

        assert!(!response.ok);
        assert_eq!(response.text(), Some("down"));
    }

    #[test]
    fn finalize_rejects_malformed_json() {
        let err = finalize(TransportResponse {
            status: 200,
            status_text: "OK".to_owned(),
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
            body: "{oops".to_owned(),
        })
        .expect_err("must fail");

        assert!(matches!(err, ClientError::Decode(_)));
    }
}
