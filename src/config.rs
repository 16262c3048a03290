use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Env var that overrides `settings.gemini_api_key`
pub const GEMINI_KEY_ENV: &str = "UNLOCKR_GEMINI_API_KEY";

/// Env var that overrides `settings.patreon_access_token`
pub const PATREON_TOKEN_ENV: &str = "UNLOCKR_PATREON_ACCESS_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub database: DatabaseConfig,
    pub settings: Settings,
    pub fields: FieldsConfig,
    pub gemini: GeminiConfig,
    pub patreon: PatreonConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("unlockr")
                .join("unlockr.db"),
        }
    }
}

/// Credentials and identifiers. Read-only to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub patreon_access_token: Option<String>,
    pub patreon_refresh_token: Option<String>,
    pub patreon_client_id: Option<String>,
    pub patreon_client_secret: Option<String>,
    pub paid_tier_id: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(var: &str, fallback: Option<&String>) -> Option<String> {
    non_empty(std::env::var(var).ok().as_ref()).or_else(|| non_empty(fallback))
}

impl Settings {
    pub fn gemini_api_key(&self) -> Option<String> {
        env_or(GEMINI_KEY_ENV, self.gemini_api_key.as_ref())
    }

    pub fn patreon_access_token(&self) -> Option<String> {
        env_or(PATREON_TOKEN_ENV, self.patreon_access_token.as_ref())
    }

    pub fn paid_tier_id(&self) -> Option<String> {
        non_empty(self.paid_tier_id.as_ref())
    }

    /// Which settings are present, for the quick-status view
    pub fn status(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("Gemini API key", self.gemini_api_key().is_some()),
            ("Patreon access token", self.patreon_access_token().is_some()),
            ("Patreon refresh token", non_empty(self.patreon_refresh_token.as_ref()).is_some()),
            ("Patreon client id", non_empty(self.patreon_client_id.as_ref()).is_some()),
            ("Patreon client secret", non_empty(self.patreon_client_secret.as_ref()).is_some()),
            ("Paid tier id", self.paid_tier_id().is_some()),
        ]
    }
}

/// Names of the content-store fields the engine reads and writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    /// Metadata key holding the episode number
    pub episode_number: String,
    /// Metadata key holding the subscription-platform post id
    pub external_post_id: String,
    /// Custom field mirroring the access type
    pub access_custom_field: String,
    /// Whether the custom-field store is available
    pub custom_fields_enabled: bool,
    /// Taxonomy carrying the Free / Advance terms
    pub taxonomy: String,
    /// Tier-gate key zeroed on free, set to the paid tier on advance
    pub tier_level_key: String,
    /// Additional tier-gate keys, removed on free and set on advance
    pub tier_extra_keys: Vec<String>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            episode_number: "episode_number".to_string(),
            external_post_id: "patreon_post_id".to_string(),
            access_custom_field: "section".to_string(),
            custom_fields_enabled: true,
            taxonomy: "chapter-categories".to_string(),
            tier_level_key: "patreon-level".to_string(),
            tier_extra_keys: vec!["_ppwp_patreon_level".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatreonConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PatreonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.patreon.com/api/oauth2/v2".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Name of the recurring trigger; also the advisory lock key
    pub lock_name: String,
    /// A lock older than this is considered abandoned
    pub stale_lock_secs: u64,
    /// How often to re-check when no schedule is enabled
    pub idle_poll_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            lock_name: "gpc_auto_unlock_novels".to_string(),
            stale_lock_secs: 3600,
            idle_poll_secs: 900,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            database: DatabaseConfig::default(),
            settings: Settings::default(),
            fields: FieldsConfig::default(),
            gemini: GeminiConfig::default(),
            patreon: PatreonConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
