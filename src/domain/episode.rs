//! Episode, series and access-tier types.
//!
//! Episodes and series are owned by the content store; these are the
//! assembled views the scheduling engine works with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Effective access tier of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    /// Public, ungated
    Free,
    /// Patron-only early access
    Advance,
    /// Neither taxonomy term is attached
    Unknown,
}

impl AccessTier {
    /// Taxonomy term display name for this tier
    pub fn term_name(&self) -> &'static str {
        match self {
            AccessTier::Free => "Free",
            AccessTier::Advance => "Advance",
            AccessTier::Unknown => "Unknown",
        }
    }

    /// Taxonomy term slug for this tier
    pub fn slug(&self) -> &'static str {
        match self {
            AccessTier::Free => "free",
            AccessTier::Advance => "advance",
            AccessTier::Unknown => "unknown",
        }
    }

    /// Classify a taxonomy term name (case-insensitive)
    pub fn from_term_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "free" => Some(AccessTier::Free),
            "advance" => Some(AccessTier::Advance),
            _ => None,
        }
    }

    /// Whether the remote post should be publicly visible
    pub fn is_public(&self) -> bool {
        matches!(self, AccessTier::Free)
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AccessTier {
    type Err = String;

    /// Only the two settable tiers parse; `unknown` is derived, never requested.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(AccessTier::Free),
            "advance" => Ok(AccessTier::Advance),
            other => Err(format!("Invalid access type '{}'. Must be \"free\" or \"advance\".", other)),
        }
    }
}

/// A taxonomy term attached to episodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
}

/// An episode as seen by the scheduling engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Content store identifier
    pub id: i64,

    /// Display title
    pub title: String,

    /// Value of the configured episode-number field, if set
    pub episode_number: Option<i64>,

    /// Classification derived from the taxonomy terms
    pub access: AccessTier,

    /// Post id on the subscription platform, if linked
    pub external_ref: Option<String>,
}

impl Episode {
    /// Short label for reports: `Title (ID: 7)`
    pub fn label(&self) -> String {
        format!("{} (ID: {})", self.title, self.id)
    }
}

/// A named grouping of episodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub title: String,

    /// Substring used to match episode titles; falls back to the title
    #[serde(default)]
    pub search_term: Option<String>,
}

impl Series {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            search_term: None,
        }
    }

    /// Attach a search-term override (blank overrides are ignored)
    pub fn with_search_term(mut self, term: Option<String>) -> Self {
        self.search_term = term.filter(|t| !t.trim().is_empty());
        self
    }

    /// The term used to match this series' episodes
    pub fn effective_search_term(&self) -> &str {
        match &self.search_term {
            Some(term) if !term.trim().is_empty() => term.trim(),
            _ => self.title.as_str(),
        }
    }
}
