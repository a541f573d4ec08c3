//! `lifecycle-http` is a minimal async HTTP request client.
//!
//! Every request runs a small lifecycle:
//! authorize → send → classify the response → retry, re-authorize or return.
//!
//! - [`Client`] offers verb helpers (`get`, `post`, ...) and instance defaults.
//! - [`ClientRequest`] owns one logical request and can be cancelled through
//!   its [`CancelHandle`].
//! - [`query`] serializes nested structures into bracketed query strings.

mod auth;
mod cancel;
mod client;
mod error;
mod headers;
mod options;
pub mod query;
mod request;
mod transport;
mod types;

pub use auth::{
    from_fn, AuthDecision, AuthRequest, Authorization, Authorizer, FnAuthorizer, UnauthorizedMark,
};
pub use cancel::{CancelHandle, CancelSignal};
pub use client::{Client, ClientDefaults};
pub use error::{ClientError, TransportError};
pub use headers::Headers;
pub use options::{Body, ClientOptions, Expiry, Method, RequestOptions};
pub use query::Query;
pub use request::ClientRequest;
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::{ClientResponse, ResponseData};

pub type Result<T> = std::result::Result<T, ClientError>;
