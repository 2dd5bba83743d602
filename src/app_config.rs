use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::batch::DispatchSettings;
use crate::errors::BatchError;

/// Application configuration module
/// This module handles loading, validating and saving the batcher settings.
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Backend to use; inferred from the model name when absent
    #[serde(default)]
    pub provider: Option<Backend>,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// API key for the selected backend
    #[serde(default)]
    pub api_key: String,

    /// Alternate service URL (OpenAI-compatible servers, proxies)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// System prompt sent with every chat request
    #[serde(default)]
    pub system_prompt: String,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit (required by Anthropic)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Worker pool size, which is also the chunk size
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Seconds to wait for one wave before retrying its stragglers
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Waves per chunk, the first one included
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// HTTP client timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Inference backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenAI or any OpenAI-compatible server
    OpenAI,
    /// Anthropic messages API
    Anthropic,
}

impl Backend {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    /// Guess the backend from a model name, e.g. `claude-*` routes to Anthropic
    pub fn from_model_name(model: &str) -> Option<Self> {
        const OPENAI_PREFIXES: [&str; 8] = [
            "gpt", "chatgpt", "o1", "o3", "o4", "text-embedding", "davinci", "babbage",
        ];

        let model = model.trim().to_lowercase();
        if model.contains("claude") {
            Some(Self::Anthropic)
        } else if OPENAI_PREFIXES.iter().any(|prefix| model.starts_with(prefix)) {
            Some(Self::OpenAI)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo-0125".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_num_workers() -> usize {
    64
}

fn default_timeout_secs() -> f64 {
    60.0
}

fn default_retry_attempts() -> usize {
    2
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_model(),
            api_key: String::new(),
            api_base_url: None,
            system_prompt: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            num_workers: default_num_workers(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), BatchError> {
        self.dispatch_settings()?;

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BatchError::InvalidSettings(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(BatchError::InvalidSettings(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(BatchError::InvalidSettings(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }

        let endpoint = self.endpoint_override();
        if let Some(url) = endpoint {
            url::Url::parse(url).map_err(|e| BatchError::InvalidEndpoint {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        }

        let backend = self.resolve_backend()?;

        // Self-hosted compatible servers often run without a key
        if self.api_key.trim().is_empty() && endpoint.is_none() {
            return Err(BatchError::MissingApiKey {
                backend: backend.display_name().to_string(),
            });
        }

        Ok(())
    }

    /// The configured backend, or the one inferred from the model name
    pub fn resolve_backend(&self) -> Result<Backend, BatchError> {
        self.provider
            .or_else(|| Backend::from_model_name(&self.model))
            .ok_or_else(|| BatchError::UnknownBackend {
                model: self.model.clone(),
            })
    }

    /// Pool size, wave timeout and retry ceiling for the dispatcher
    pub fn dispatch_settings(&self) -> Result<DispatchSettings, BatchError> {
        let wave_timeout = Duration::try_from_secs_f64(self.timeout_secs).map_err(|_| {
            BatchError::InvalidSettings(format!(
                "timeout_secs must be a positive number of seconds, got {}",
                self.timeout_secs
            ))
        })?;
        DispatchSettings::new(self.num_workers, wave_timeout, self.retry_attempts)
    }

    /// The alternate endpoint, if one is set and non-blank
    pub fn endpoint_override(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
