use std::{fmt, sync::Arc, time::Duration};

use crate::{
    Authorizer, ClientOptions, ClientRequest, ClientResponse, Headers, Method, Query,
    ReqwestTransport, RequestOptions, Result, Transport,
};

/// Instance-level defaults merged into every request.
#[derive(Clone, Default)]
pub struct ClientDefaults {
    /// Used when a request does not carry its own webroot.
    pub webroot: Option<String>,
    /// Per-request headers override these.
    pub headers: Headers,
    /// Shallow-merged with the per-request query; per-request keys win.
    pub query: Option<Query>,
    /// Used when a request does not carry its own authorizer.
    pub authorizer: Option<Arc<dyn Authorizer>>,
}

impl fmt::Debug for ClientDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name == "authorization" {
                    (name, "<redacted>")
                } else {
                    (name, value)
                }
            })
            .collect();

        f.debug_struct("ClientDefaults")
            .field("webroot", &self.webroot)
            .field("headers", &headers)
            .field("query", &self.query)
            .field("authorizer", &self.authorizer.as_ref().map(|_| "<authorizer>"))
            .finish()
    }
}

impl ClientDefaults {
    pub fn webroot(mut self, webroot: impl Into<String>) -> Self {
        self.webroot = Some(webroot.into());
        self
    }

    /// Adds a default header. The name is lowercased.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }
}

#[derive(Clone)]
/// HTTP client with verb helpers and instance defaults.
pub struct Client {
    transport: Arc<dyn Transport>,
    default_transport: bool,
    defaults: ClientDefaults,
    options: ClientOptions,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.defaults)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client backed by `reqwest` with no defaults.
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::default()),
            default_transport: true,
            defaults: ClientDefaults::default(),
            options: ClientOptions::default(),
        }
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            default_transport: false,
            defaults: ClientDefaults::default(),
            options: ClientOptions::default(),
        }
    }

    /// Sets instance defaults for webroot, headers, query and authorizer.
    pub fn with_defaults(mut self, defaults: ClientDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Applies client options such as timeout and retry backoff.
    ///
    /// The timeout only reaches the default `reqwest` transport; a custom
    /// transport keeps its own.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        if self.default_transport && self.options.timeout_ms != opts.timeout_ms {
            self.transport = Arc::new(ReqwestTransport::new(Duration::from_millis(
                opts.timeout_ms,
            )));
        }
        self.options = opts;
        self
    }

    /// Builds a request with instance defaults merged in, without sending it.
    ///
    /// Use this to obtain a [`crate::CancelHandle`] before awaiting.
    pub fn request(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientRequest> {
        let options = self.merge_defaults(options);
        ClientRequest::new(self.transport.clone(), url, options, &self.options)
    }

    /// Builds and awaits a request.
    pub async fn send(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        self.request(url, options)?.send().await
    }

    /// Sends a `GET` request. Any body in `options` is dropped.
    pub async fn get(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        let mut options = options.method(Method::Get);
        options.body = None;
        self.send(url, options).await
    }

    /// Sends a `POST` request.
    pub async fn post(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        self.send(url, options.method(Method::Post)).await
    }

    /// Sends a `PUT` request.
    pub async fn put(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        self.send(url, options.method(Method::Put)).await
    }

    /// Sends a `PATCH` request.
    pub async fn patch(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        self.send(url, options.method(Method::Patch)).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete(
        &self,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<ClientResponse> {
        self.send(url, options.method(Method::Delete)).await
    }

    fn merge_defaults(&self, mut options: RequestOptions) -> RequestOptions {
        if options.webroot.is_none() {
            options.webroot = self.defaults.webroot.clone();
        }

        let mut headers = self.defaults.headers.clone();
        headers.merge(std::mem::take(&mut options.headers));
        options.headers = headers;

        options.query = match (self.defaults.query.clone(), options.query.take()) {
            (Some(mut merged), Some(query)) => {
                merged.extend(query);
                Some(merged)
            }
            (defaults, query) => query.or(defaults),
        };

        if options.authorizer.is_none() {
            options.authorizer = self.defaults.authorizer.clone();
        }

        options
    }
}
