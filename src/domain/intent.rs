//! Structured command intent produced by the command interpreter.

use serde::{Deserialize, Serialize};

use super::episode::AccessTier;

/// How sure the interpreter was about its reading of the command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Confidence {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }
}

/// A validated `{episode_number, access_type}` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub episode_number: i64,
    pub access_type: AccessTier,
    #[serde(default)]
    pub confidence: Confidence,
}
