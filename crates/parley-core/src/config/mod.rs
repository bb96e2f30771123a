mod channels;
mod defaults;
mod providers;

#[cfg(test)]
mod tests;

pub use channels::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::ParleyError;
use defaults::*;

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parley: ParleyConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How many recent messages the context block may include.
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            db_path: default_db_path(),
            max_context_messages: default_max_context(),
        }
    }
}

/// Reply decision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Author display names eligible for automated replies. Matched by
    /// exact-or-substring comparison.
    #[serde(default)]
    pub allow_list: Vec<String>,
    /// Optional JSON file of the form `{"aiResponders": [..]}` merged into
    /// `allow_list` at load time.
    #[serde(default)]
    pub allow_list_file: Option<String>,
    /// Body substrings that mark a message as an automated reply.
    #[serde(default = "default_reply_signatures")]
    pub reply_signatures: Vec<String>,
    /// How author names are compared with the allow-list:
    /// `"substring"` (equal or contains) or `"exact"`.
    #[serde(default = "default_match_mode")]
    pub match_mode: String,
    /// Keep the answered-message set in the database across restarts.
    #[serde(default = "default_true")]
    pub persist_answered: bool,
    /// Opening line of every reply prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            allow_list_file: None,
            reply_signatures: default_reply_signatures(),
            match_mode: default_match_mode(),
            persist_answered: true,
            persona: default_persona(),
        }
    }
}

#[derive(Deserialize)]
struct AllowListFile {
    #[serde(rename = "aiResponders", default)]
    ai_responders: Vec<String>,
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Read an allow-list JSON file (`{"aiResponders": ["Alice", ...]}`).
pub fn read_allow_list_file(path: &str) -> Result<Vec<String>, ParleyError> {
    let path = shellexpand(path);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ParleyError::Config(format!("failed to read {path}: {e}")))?;
    let parsed: AllowListFile = serde_json::from_str(&content)?;
    Ok(parsed.ai_responders)
}

impl Config {
    /// Fill empty credentials from environment variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini = self.provider.gemini.get_or_insert_with(GeminiConfig::default);
        if gemini.api_key.is_empty() {
            if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
                gemini.api_key = key;
            }
        }

        if let Some(tg) = self.channel.telegram.as_mut() {
            if tg.bot_token.is_empty() {
                if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
                    tg.bot_token = token;
                }
            }
        }
    }

    /// Merge `allow_list_file` into `allow_list`, keeping first-seen order.
    pub fn merge_allow_list_file(&mut self) -> Result<(), ParleyError> {
        let Some(ref file) = self.responder.allow_list_file else {
            return Ok(());
        };
        let extra = read_allow_list_file(file)?;
        let before = self.responder.allow_list.len();
        for name in extra {
            if !self.responder.allow_list.contains(&name) {
                self.responder.allow_list.push(name);
            }
        }
        info!(
            "loaded {} responder name(s) from {file}",
            self.responder.allow_list.len() - before
        );
        Ok(())
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment overrides
/// and the allow-list file are applied in both cases.
pub fn load(path: &str) -> Result<Config, ParleyError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ParleyError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| ParleyError::Config(format!("failed to parse config: {}", e)))?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.merge_allow_list_file()?;

    if config.responder.allow_list.is_empty() {
        warn!("responder allow_list is empty; no message will trigger a reply");
    }

    Ok(config)
}
