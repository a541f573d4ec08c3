use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use serde_json::Value;

use crate::{Authorizer, Headers, Query};

/// Configures transport timeout and retry pacing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds, applied by the default transport.
    pub timeout_ms: u64,
    /// Base retry backoff in milliseconds (exponential strategy). `0` retries
    /// immediately.
    pub retry_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry_backoff_ms: 0,
        }
    }
}

/// HTTP method of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request body before encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Sent as-is.
    Raw(String),
    /// Form- or JSON-encoded depending on the `content-type` header.
    Structured(Value),
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_owned())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// When a request stops being worth sending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    /// Absolute instant.
    At(SystemTime),
    /// Relative to the moment the request is constructed.
    After(Duration),
}

impl Expiry {
    /// Relative expiry in milliseconds.
    pub fn after_ms(ms: u64) -> Self {
        Self::After(Duration::from_millis(ms))
    }

    /// Fixes the expiry to an absolute instant. `None` when `now + delay`
    /// is not representable, i.e. the request never expires.
    pub(crate) fn resolve(self, now: SystemTime) -> Option<SystemTime> {
        match self {
            Self::At(at) => Some(at),
            Self::After(delay) => now.checked_add(delay),
        }
    }
}

impl From<SystemTime> for Expiry {
    fn from(at: SystemTime) -> Self {
        Self::At(at)
    }
}

impl From<Duration> for Expiry {
    fn from(delay: Duration) -> Self {
        Self::After(delay)
    }
}

/// Per-request options.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Base URL used to resolve a relative request URL.
    pub webroot: Option<String>,
    pub headers: Headers,
    pub query: Option<Query>,
    pub body: Option<Body>,
    pub expires: Option<Expiry>,
    /// Retries after the initial attempt.
    pub retries: u32,
    pub authorizer: Option<Arc<dyn Authorizer>>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("webroot", &self.webroot)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("expires", &self.expires)
            .field("retries", &self.retries)
            .field("authorizer", &self.authorizer.as_ref().map(|_| "<authorizer>"))
            .finish()
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn webroot(mut self, webroot: impl Into<String>) -> Self {
        self.webroot = Some(webroot.into());
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    /// Sets the query structure.
    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a structured JSON or form body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Structured(body));
        self
    }

    pub fn expires(mut self, expires: impl Into<Expiry>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use serde_json::json;

    use super::{Body, ClientOptions, Expiry, Method, RequestOptions};
    use crate::Query;

    #[test]
    fn defaults() {
        let opts = ClientOptions::default();
        assert_eq!(opts.timeout_ms, 10_000);
        assert_eq!(opts.retry_backoff_ms, 0);

        let req = RequestOptions::default();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.retries, 0);
        assert!(req.authorizer.is_none());
    }

    #[test]
    fn builder_lowercases_headers() {
        let mut query = Query::new();
        query.insert("page".to_owned(), json!(2));
        let req = RequestOptions::new(Method::Post)
            .header("X-Api-Key", "k")
            .query(query)
            .body("raw");
        assert_eq!(req.headers.get("x-api-key"), Some("k"));
        assert_eq!(req.query.as_ref().and_then(|q| q.get("page")), Some(&json!(2)));
        assert_eq!(req.body, Some(Body::Raw("raw".to_owned())));
    }

    #[test]
    fn relative_expiry_resolves_against_now() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        assert_eq!(
            Expiry::after_ms(1_500).resolve(now),
            Some(now + Duration::from_millis(1_500))
        );
        assert_eq!(Expiry::At(now).resolve(SystemTime::now()), Some(now));
    }

    #[test]
    fn overflowing_relative_expiry_never_expires() {
        assert_eq!(Expiry::After(Duration::MAX).resolve(SystemTime::now()), None);
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(reqwest::Method::from(Method::Delete), reqwest::Method::DELETE);
    }
}
