//! Command path: interpret, resolve the episode by number, apply access.
//!
//! Bypasses scheduling entirely. A missing episode is reported with near
//! matches and nothing is mutated.

use crate::access::{AccessApplier, AccessOutcome, StepStatus};
use crate::catalog::{EpisodeCatalog, NearMatch};
use crate::domain::{AccessTier, Episode, Intent, Term};
use crate::error::{Result, UnlockError};

use super::{CommandInterpreter, Interpretation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Access applied; taxonomy step succeeded
    Updated,
    /// Episode found but the taxonomy step failed
    Failed,
    /// No episode carries the requested number
    NotFound,
    /// The interpreter could not produce a valid intent
    Uninterpretable,
}

/// Everything the operator sees after a command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    pub message: String,
    pub interpretation: Option<Interpretation>,
    pub episode: Option<Episode>,
    /// Terms held before the change
    pub current_terms: Vec<Term>,
    pub near_matches: Vec<NearMatch>,
    pub access: Option<AccessOutcome>,
}

impl CommandOutcome {
    fn new(status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            interpretation: None,
            episode: None,
            current_terms: Vec::new(),
            near_matches: Vec::new(),
            access: None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == CommandStatus::Updated
    }

    /// Access tier before the change, if an episode was resolved
    pub fn previous_access(&self) -> Option<AccessTier> {
        self.episode.as_ref().map(|e| e.access)
    }
}

/// Interprets text, then hands the intent to an `IntentExecutor`
pub struct CommandExecutor<'a> {
    interpreter: &'a dyn CommandInterpreter,
    intents: IntentExecutor<'a>,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(interpreter: &'a dyn CommandInterpreter, catalog: EpisodeCatalog<'a>, applier: AccessApplier<'a>) -> Self {
        Self {
            interpreter,
            intents: IntentExecutor::new(catalog, applier),
        }
    }

    /// Interpret `text` and carry out the resulting intent.
    ///
    /// Interpreter failures become an `Uninterpretable` outcome; only store
    /// errors are returned as `Err`.
    pub async fn execute(&self, text: &str) -> Result<CommandOutcome> {
        let interpretation = match self.interpreter.interpret(text).await {
            Ok(interpretation) => interpretation,
            Err(e @ (UnlockError::MalformedResponse(_)
            | UnlockError::RemoteCallFailed(_)
            | UnlockError::ConfigMissing(_))) => {
                log::warn!("Command not interpreted: {}", e);
                return Ok(CommandOutcome::new(CommandStatus::Uninterpretable, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let mut outcome = self.intents.execute(&interpretation.intent).await?;
        outcome.interpretation = Some(interpretation);
        Ok(outcome)
    }
}

/// Carries out an already-structured intent
pub struct IntentExecutor<'a> {
    catalog: EpisodeCatalog<'a>,
    applier: AccessApplier<'a>,
}

impl<'a> IntentExecutor<'a> {
    pub fn new(catalog: EpisodeCatalog<'a>, applier: AccessApplier<'a>) -> Self {
        Self { catalog, applier }
    }

    /// Resolve the episode numbered `intent.episode_number` and apply the access.
    pub async fn execute(&self, intent: &Intent) -> Result<CommandOutcome> {
        let number = intent.episode_number;
        log::info!(
            "Searching for episode number {} using meta key \"{}\"",
            number,
            self.catalog.fields().episode_number
        );

        let near_matches = self.catalog.near_matches(number)?;

        let Some(episode) = self.catalog.find_by_number(number)? else {
            let mut outcome = CommandOutcome::new(
                CommandStatus::NotFound,
                format!(
                    "Episode {} not found. Make sure the '{}' field is set to {} on the episode.",
                    number,
                    self.catalog.fields().episode_number,
                    number
                ),
            );
            outcome.near_matches = near_matches;
            return Ok(outcome);
        };

        let current_terms = self.catalog.current_terms(episode.id)?;
        log::info!("Found episode {}; current access: {}", episode.label(), episode.access);

        let access = self.applier.apply_access(&episode, intent.access_type).await?;

        let (status, message) = if access.success() {
            (
                CommandStatus::Updated,
                format!("Episode {} successfully updated to '{}' access!", number, intent.access_type),
            )
        } else {
            let detail = access
                .steps
                .iter()
                .find(|r| matches!(r.status, StepStatus::Failed(_)))
                .map(|r| r.status.detail().to_string())
                .unwrap_or_default();
            (
                CommandStatus::Failed,
                format!("Failed to update episode {}: {}", number, detail),
            )
        };

        Ok(CommandOutcome {
            status,
            message,
            interpretation: None,
            episode: Some(episode),
            current_terms,
            near_matches,
            access: Some(access),
        })
    }
}
