//! Configuration for the chat controller
//!
//! Provides centralized configuration for the responder, the conversation
//! and the speech facility. Every field has a default, so a config file only
//! needs the values it changes.

use crate::{FluentError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "FLUENTAI_CONFIG";

/// Remote responder settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Chat endpoint receiving `POST {"message": ...}`
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/chatbox".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ResponderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Bot-authored message the history starts with
    pub greeting: String,

    /// Quiet period after the last transcript before an implicit submit
    pub silence_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm FluentAI. How can I help you today?".to_string(),
            silence_ms: 3000,
        }
    }
}

/// Speech recognition settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether to probe for a speech facility at all
    pub enabled: bool,

    /// BCP 47 language tag
    pub language: String,

    /// Keep listening across utterances
    pub continuous: bool,

    /// Emit hypotheses while an utterance is still in progress
    pub interim_results: bool,

    /// Path to the Whisper model file
    pub model_path: PathBuf,

    /// Number of threads to use for transcription
    pub n_threads: i32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            n_threads: 4,
        }
    }
}

/// Configuration for the complete chat client
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub responder: ResponderConfig,
    pub conversation: ConversationConfig,
    pub speech: SpeechConfig,
}

impl ChatConfig {
    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FluentError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: ChatConfig = toml::from_str(&content).map_err(|e| {
            FluentError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Locate and load the configuration
    ///
    /// Order: `$FLUENTAI_CONFIG`, then `<config dir>/fluentai/config.toml`,
    /// then built-in defaults.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }

        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(path);
            }
            debug!("No config file at {}, using defaults", path.display());
        }

        Ok(Self::default())
    }

    /// Per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fluentai").join("config.toml"))
    }

    /// Set the responder endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.responder.endpoint = endpoint.into();
        self
    }

    /// Set the greeting the history is seeded with
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.conversation.greeting = greeting.into();
        self
    }

    /// Set the silence period before an implicit submit
    pub fn with_silence(mut self, silence: Duration) -> Self {
        self.conversation.silence_ms = silence.as_millis() as u64;
        self
    }

    /// Disable speech input (text-only mode)
    pub fn without_speech(mut self) -> Self {
        self.speech.enabled = false;
        self
    }

    pub fn silence_period(&self) -> Duration {
        Duration::from_millis(self.conversation.silence_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.responder.endpoint.trim();
        if endpoint.is_empty() {
            return Err(FluentError::ConfigError(
                "Responder endpoint is required".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(FluentError::ConfigError(format!(
                "Responder endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        if self.responder.timeout_secs == 0 {
            return Err(FluentError::ConfigError(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.conversation.silence_ms == 0 {
            return Err(FluentError::ConfigError(
                "Silence period must be greater than 0".to_string(),
            ));
        }

        if self.speech.language.trim().is_empty() {
            return Err(FluentError::ConfigError(
                "Speech language is required".to_string(),
            ));
        }

        Ok(())
    }
}
