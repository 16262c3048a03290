//! Access State Applier
//!
//! Sets an episode's access tier in every system of record:
//! 1. taxonomy term (`Free` / `Advance`), created lazily
//! 2. tier-gating metadata
//! 3. custom-field mirror, when the store has custom fields
//! 4. subscription-platform post visibility, when the episode is linked
//!
//! Steps are independent: a failure in one is recorded and the rest still run.
//! Nothing is rolled back.

mod outcome;

pub use outcome::{AccessOutcome, AccessStep, StepReport, StepStatus};

use crate::catalog::EpisodeCatalog;
use crate::config::FieldsConfig;
use crate::domain::{AccessTier, Episode};
use crate::error::{Result, UnlockError};
use crate::platform::SubscriptionPlatform;
use crate::storage::ContentStore;

/// Tier-gate value meaning "available to everyone"
pub const UNGATED_LEVEL: &str = "0";

pub struct AccessApplier<'a> {
    store: &'a dyn ContentStore,
    platform: &'a dyn SubscriptionPlatform,
    fields: &'a FieldsConfig,
    paid_tier_id: Option<String>,
}

impl<'a> AccessApplier<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        platform: &'a dyn SubscriptionPlatform,
        fields: &'a FieldsConfig,
        paid_tier_id: Option<String>,
    ) -> Self {
        Self {
            store,
            platform,
            fields,
            paid_tier_id: paid_tier_id.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Apply `access` to `episode` across all systems of record.
    pub async fn apply_access(&self, episode: &Episode, access: AccessTier) -> Result<AccessOutcome> {
        if access == AccessTier::Unknown {
            return Err(UnlockError::InvalidAccess(
                "access type must be \"free\" or \"advance\"".to_string(),
            ));
        }

        log::info!("Applying '{}' access to episode {}", access, episode.label());
        let mut outcome = AccessOutcome::new(episode.id, access, episode.access);

        outcome.push(AccessStep::Taxonomy, self.set_taxonomy(episode.id, access));
        outcome.push(AccessStep::TierGate, self.set_tier_gate(episode.id, access));
        outcome.push(AccessStep::CustomField, self.set_custom_field(episode.id, access));
        outcome.push(AccessStep::RemoteMirror, self.mirror_remote(episode, access).await);

        for problem in outcome.problems() {
            log::warn!("Episode {} {}: {}", episode.id, problem.step, problem.status.detail());
        }
        Ok(outcome)
    }

    fn set_taxonomy(&self, episode_id: i64, access: AccessTier) -> StepStatus {
        let catalog = EpisodeCatalog::new(self.store, self.fields);
        let result = catalog.classify(episode_id, access).and_then(|term| {
            let names: Vec<String> = catalog
                .current_terms(episode_id)?
                .into_iter()
                .map(|t| t.name)
                .collect();
            Ok(format!("Set to \"{}\" category (now: {})", term.name, names.join(", ")))
        });

        match result {
            Ok(detail) => StepStatus::Applied(detail),
            Err(e) => StepStatus::Failed(format!("Failed to set \"{}\" category: {}", access.term_name(), e)),
        }
    }

    fn write_tier_gate(&self, episode_id: i64, access: AccessTier) -> Result<Option<String>> {
        let level_key = &self.fields.tier_level_key;
        let extra_keys = &self.fields.tier_extra_keys;

        if access == AccessTier::Free {
            for key in extra_keys {
                self.store.delete_meta(episode_id, key)?;
            }
            self.store.delete_meta(episode_id, level_key)?;
            self.store.set_meta(episode_id, level_key, UNGATED_LEVEL)?;
            return Ok(Some("Removed tier restriction (available to everyone)".to_string()));
        }

        let Some(tier) = &self.paid_tier_id else {
            return Ok(None);
        };
        for key in extra_keys {
            self.store.set_meta(episode_id, key, tier)?;
        }
        self.store.set_meta(episode_id, level_key, tier)?;
        Ok(Some(format!("Set tier requirement to paid tier (ID: {})", tier)))
    }

    fn set_tier_gate(&self, episode_id: i64, access: AccessTier) -> StepStatus {
        match self.write_tier_gate(episode_id, access) {
            Ok(Some(detail)) => StepStatus::Applied(detail),
            Ok(None) => StepStatus::Skipped("Paid tier ID not configured; tier gate left unchanged".to_string()),
            Err(e) => StepStatus::Failed(format!("Failed to update tier gate: {}", e)),
        }
    }

    fn set_custom_field(&self, episode_id: i64, access: AccessTier) -> StepStatus {
        if !self.store.supports_custom_fields() {
            return StepStatus::Skipped("Custom field store not available".to_string());
        }
        let field = &self.fields.access_custom_field;
        match self.store.set_custom_field(episode_id, field, access.slug()) {
            Ok(()) => StepStatus::Applied(format!("Updated custom field \"{}\" to \"{}\"", field, access)),
            Err(e) => StepStatus::Failed(format!("Failed to update custom field \"{}\": {}", field, e)),
        }
    }

    async fn mirror_remote(&self, episode: &Episode, access: AccessTier) -> StepStatus {
        let Some(post_id) = episode.external_ref.as_deref() else {
            return StepStatus::Skipped("No Patreon post ID found for this episode".to_string());
        };

        match self.platform.set_post_visibility(post_id, access.is_public()).await {
            Ok(_) => StepStatus::Applied(format!("Patreon post {} updated to '{}' access.", post_id, access)),
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::{Result, UnlockError};
    use crate::platform::{RemoteResponse, SubscriptionPlatform};

    /// Records visibility calls; optionally fails every call.
    #[derive(Default)]
    pub struct RecordingPlatform {
        pub calls: Mutex<Vec<(String, bool)>>,
        pub fail_with: Option<u16>,
    }

    impl RecordingPlatform {
        pub fn failing(status: u16) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_with: Some(status),
            }
        }

        pub fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubscriptionPlatform for RecordingPlatform {
        async fn set_post_visibility(&self, post_id: &str, public: bool) -> Result<RemoteResponse> {
            self.calls.lock().unwrap().push((post_id.to_string(), public));
            match self.fail_with {
                Some(status) => Err(UnlockError::RemoteCallFailed(format!(
                    "Patreon API returned status {}",
                    status
                ))),
                None => Ok(RemoteResponse {
                    status: 200,
                    body: "{}".to_string(),
                }),
            }
        }
    }
}
