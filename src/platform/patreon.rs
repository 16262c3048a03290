//! Patreon API client implementation
//!
//! Implements `SubscriptionPlatform` against the Patreon v2 posts endpoint.
//! Only the static creator access token is used; there is no refresh flow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{RemoteResponse, SubscriptionPlatform, body_excerpt};
use crate::config::PatreonConfig;
use crate::error::{Result, UnlockError};

/// Patreon API client
pub struct PatreonClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl PatreonClient {
    /// Create a client. A missing token is reported per call, not here.
    pub fn new(config: &PatreonConfig, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UnlockError::RemoteCallFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn post_url(&self, post_id: &str) -> String {
        format!("{}/posts/{}", self.base_url, post_id)
    }

    /// JSON:API body toggling `is_public`
    fn build_request(post_id: &str, public: bool) -> Value {
        json!({
            "data": {
                "attributes": {
                    "is_public": public
                },
                "type": "post",
                "id": post_id
            }
        })
    }
}

#[async_trait]
impl SubscriptionPlatform for PatreonClient {
    async fn set_post_visibility(&self, post_id: &str, public: bool) -> Result<RemoteResponse> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| UnlockError::ConfigMissing("Patreon access token not configured.".to_string()))?;

        log::info!("PATCH Patreon post {} is_public={}", post_id, public);

        let response = self
            .client
            .patch(self.post_url(post_id))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .json(&Self::build_request(post_id, public))
            .send()
            .await
            .map_err(|e| UnlockError::RemoteCallFailed(format!("Patreon API error: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            log::warn!("Patreon post {} update returned {}", post_id, status.as_u16());
            return Err(UnlockError::RemoteCallFailed(format!(
                "Patreon API returned status {}. Response: {}",
                status.as_u16(),
                body_excerpt(&body)
            )));
        }

        Ok(RemoteResponse {
            status: status.as_u16(),
            body,
        })
    }
}
