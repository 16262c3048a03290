//! Subscription-platform boundary
//!
//! This module provides:
//! - `SubscriptionPlatform` trait: update a remote post's visibility
//! - `PatreonClient`: authenticated PATCH implementation over reqwest

pub mod patreon;

pub use patreon::PatreonClient;

use async_trait::async_trait;

use crate::error::Result;

/// Longest slice of a remote response body quoted in error messages
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Successful remote response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

/// Mirror of episode access on the subscription platform.
///
/// One attempt per call, no retries: a transport error or non-2xx status is
/// returned as `UnlockError::RemoteCallFailed`.
#[async_trait]
pub trait SubscriptionPlatform: Send + Sync {
    /// Set the public/private flag of a remote post
    async fn set_post_visibility(&self, post_id: &str, public: bool) -> Result<RemoteResponse>;
}

/// First `BODY_EXCERPT_CHARS` characters of a response body
pub fn body_excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
