//! Episode catalog - assembles `Episode` views from raw store records.
//!
//! The store only knows titles, terms and metadata; the catalog knows which
//! metadata keys and taxonomy carry episode numbers, access tiers and
//! subscription-platform post ids.

mod select;
mod sync;

pub use sync::{SyncReport, SyncRow, SyncStatus, extract_episode_number, sync_episode_numbers};

use crate::config::FieldsConfig;
use crate::domain::{AccessTier, Episode, Term};
use crate::error::Result;
use crate::storage::{ContentStore, EpisodeRecord};

/// How many near matches the not-found diagnostics list
pub const NEAR_MATCH_LIMIT: usize = 5;

/// Parse an episode-number field. Leading digits count, blank is unset.
pub fn parse_episode_number(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Classify a set of taxonomy terms. The last recognised term wins.
pub fn access_from_terms(terms: &[Term]) -> AccessTier {
    terms
        .iter()
        .filter_map(|t| AccessTier::from_term_name(&t.name))
        .last()
        .unwrap_or(AccessTier::Unknown)
}

/// Episode that mentions a number without carrying it in the number field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearMatch {
    pub id: i64,
    pub title: String,
    /// Raw value of the episode-number field
    pub episode_number: Option<String>,
}

/// Read-side helper over a content store.
pub struct EpisodeCatalog<'a> {
    store: &'a dyn ContentStore,
    fields: &'a FieldsConfig,
}

impl<'a> EpisodeCatalog<'a> {
    pub fn new(store: &'a dyn ContentStore, fields: &'a FieldsConfig) -> Self {
        Self { store, fields }
    }

    pub fn store(&self) -> &'a dyn ContentStore {
        self.store
    }

    pub fn fields(&self) -> &'a FieldsConfig {
        self.fields
    }

    /// Build the episode view for a stored record.
    pub fn assemble(&self, record: &EpisodeRecord) -> Result<Episode> {
        let episode_number = self
            .store
            .get_meta(record.id, &self.fields.episode_number)?
            .as_deref()
            .and_then(parse_episode_number);

        let terms = self.store.episode_terms(record.id, &self.fields.taxonomy)?;

        let external_ref = self
            .store
            .get_meta(record.id, &self.fields.external_post_id)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Episode {
            id: record.id,
            title: record.title.clone(),
            episode_number,
            access: access_from_terms(&terms),
            external_ref,
        })
    }

    /// Load a single episode by store ID.
    pub fn load(&self, id: i64) -> Result<Option<Episode>> {
        match self.store.get_episode(id)? {
            Some(record) => Ok(Some(self.assemble(&record)?)),
            None => Ok(None),
        }
    }

    /// Every episode currently classified `advance`.
    pub fn advance_episodes(&self) -> Result<Vec<Episode>> {
        self.store
            .episodes_with_term(&self.fields.taxonomy, AccessTier::Advance.slug())?
            .iter()
            .map(|record| self.assemble(record))
            .collect()
    }

    /// Episode whose number field equals `number` (first by ID).
    pub fn find_by_number(&self, number: i64) -> Result<Option<Episode>> {
        let records = self
            .store
            .episodes_by_meta(&self.fields.episode_number, &number.to_string())?;
        match records.first() {
            Some(record) => Ok(Some(self.assemble(record)?)),
            None => Ok(None),
        }
    }

    /// Episodes whose title or content mention `number`, for diagnostics.
    pub fn near_matches(&self, number: i64) -> Result<Vec<NearMatch>> {
        let mut matches = Vec::new();
        for record in self.store.search_episodes(&number.to_string(), NEAR_MATCH_LIMIT)? {
            matches.push(NearMatch {
                id: record.id,
                episode_number: self.store.get_meta(record.id, &self.fields.episode_number)?,
                title: record.title,
            });
        }
        Ok(matches)
    }

    /// The taxonomy term for `tier`: by name, then by slug, else created.
    pub fn resolve_term(&self, tier: AccessTier) -> Result<Term> {
        let taxonomy = &self.fields.taxonomy;
        if let Some(term) = self.store.term_by_name(taxonomy, tier.term_name())? {
            return Ok(term);
        }
        if let Some(term) = self.store.term_by_slug(taxonomy, tier.slug())? {
            return Ok(term);
        }
        log::warn!("\"{}\" term not found in {}. Creating it", tier.term_name(), taxonomy);
        self.store.insert_term(taxonomy, tier.term_name())
    }

    /// Replace the episode's access term with the one for `tier`.
    pub fn classify(&self, episode_id: i64, tier: AccessTier) -> Result<Term> {
        let term = self.resolve_term(tier)?;
        self.store
            .set_episode_terms(episode_id, &self.fields.taxonomy, &[term.id])?;
        Ok(term)
    }

    /// Current terms of an episode in the access taxonomy.
    pub fn current_terms(&self, episode_id: i64) -> Result<Vec<Term>> {
        self.store.episode_terms(episode_id, &self.fields.taxonomy)
    }
}
