//! Command Interpreter boundary
//!
//! This module provides:
//! - `CommandInterpreter` trait: free text in, validated `Intent` out
//! - `GeminiInterpreter`: Gemini `generateContent` implementation
//! - JSON extraction with the brace-delimited fallback
//! - `CommandExecutor`: interprets text and hands the intent on
//! - `IntentExecutor`: resolves the intent's episode and applies the access change

pub mod command;
pub mod extract;
pub mod gemini;

pub use command::{CommandExecutor, CommandOutcome, CommandStatus, IntentExecutor};
pub use extract::{extract_json_object, parse_intent};
pub use gemini::GeminiInterpreter;

use async_trait::async_trait;

use crate::domain::Intent;
use crate::error::Result;

/// Validated intent plus the interpreter's raw reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub intent: Intent,
    pub raw_text: String,
}

/// Turns an operator command into a structured intent.
///
/// Fails with `MalformedResponse` when no valid intent can be parsed, and with
/// `RemoteCallFailed` / `ConfigMissing` when the backing service is unusable.
#[async_trait]
pub trait CommandInterpreter: Send + Sync {
    async fn interpret(&self, text: &str) -> Result<Interpretation>;
}
