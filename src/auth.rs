//! Authorizer contract.
//!
//! An authorizer runs before every attempt and may inject credentials,
//! refresh them after an unauthorized response, or reject the request
//! outright.

use std::{fmt, future::Future, time::SystemTime};

use async_trait::async_trait;

use crate::{Headers, Query};

/// Record of the first unauthorized response seen by a logical request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnauthorizedMark {
    pub status: u16,
    pub status_text: String,
    pub at: SystemTime,
}

/// Snapshot handed to the authorizer before an attempt.
#[derive(Clone, Debug)]
pub struct AuthRequest {
    /// Effective URL including the configured query.
    pub url: String,
    /// Copy of the current request headers.
    pub headers: Headers,
    /// Encoded request body, if any.
    pub body: Option<String>,
    /// Set once an earlier attempt was answered with `401`.
    pub unauthorized: Option<UnauthorizedMark>,
}

/// Extra headers and query parameters merged in before sending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Authorization {
    pub headers: Option<Headers>,
    pub query: Option<Query>,
}

impl Authorization {
    pub fn header(name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert(name, value);
        Self {
            headers: Some(headers),
            query: None,
        }
    }

    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::header("authorization", format!("Bearer {}", token.as_ref().trim()))
    }

    pub fn query(query: Query) -> Self {
        Self {
            headers: None,
            query: Some(query),
        }
    }
}

/// Outcome of an authorizer call.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthDecision {
    /// Send the attempt unchanged.
    Continue,
    /// Stop the logical request with a synthetic response carrying this status.
    Reject(u16),
    /// Merge the authorization into the attempt.
    Patch(Authorization),
}

impl From<Authorization> for AuthDecision {
    fn from(auth: Authorization) -> Self {
        Self::Patch(auth)
    }
}

impl From<Option<Authorization>> for AuthDecision {
    fn from(auth: Option<Authorization>) -> Self {
        auth.map_or(Self::Continue, Self::Patch)
    }
}

/// Caller-supplied credential hook.
///
/// Implemented for async closures `Fn(AuthRequest) -> impl Future<Output =
/// AuthDecision>`. Use [`from_fn`] for synchronous closures.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: AuthRequest) -> AuthDecision;
}

#[async_trait]
impl<F, Fut> Authorizer for F
where
    F: Fn(AuthRequest) -> Fut + Send + Sync,
    Fut: Future<Output = AuthDecision> + Send,
{
    async fn authorize(&self, request: AuthRequest) -> AuthDecision {
        (self)(request).await
    }
}

/// Adapts a synchronous closure into an [`Authorizer`].
pub fn from_fn<F>(f: F) -> FnAuthorizer<F>
where
    F: Fn(AuthRequest) -> AuthDecision + Send + Sync,
{
    FnAuthorizer(f)
}

/// Synchronous authorizer created by [`from_fn`].
pub struct FnAuthorizer<F>(F);

impl<F> fmt::Debug for FnAuthorizer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnAuthorizer")
    }
}

#[async_trait]
impl<F> Authorizer for FnAuthorizer<F>
where
    F: Fn(AuthRequest) -> AuthDecision + Send + Sync,
{
    async fn authorize(&self, request: AuthRequest) -> AuthDecision {
        (self.0)(request)
    }
}
