use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_DIR: &str = "ethics_adventure";
const CONFIG_FILE: &str = "config.json";
const PLACEHOLDER_KEY: &str = "your_api_key_here";

pub const API_KEY_VAR: &str = "STORY_API_KEY";
pub const ENDPOINTS_VAR: &str = "STORY_ENDPOINTS";

/// Inclusive range a choice's points must fall in (enforced by strict validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBound {
    pub min: i64,
    pub max: i64,
}

impl PointsBound {
    pub fn contains(&self, points: i64) -> bool {
        (self.min..=self.max).contains(&points)
    }
}

impl Default for PointsBound {
    fn default() -> Self {
        Self { min: -10, max: 10 }
    }
}

/// Game rules shared by the validator and the playthrough engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryRules {
    /// Number of stages a story is expected to have (N).
    pub story_length: u32,

    /// Reaching this score or anything below it ends the game.
    pub minimum_score: i64,

    pub points: PointsBound,

    /// Also reject dangling `nextStage` references, out-of-bound points
    /// and gaps or duplicates in stage numbering.
    pub strict_validation: bool,
}

impl Default for StoryRules {
    fn default() -> Self {
        Self {
            story_length: 15,
            minimum_score: -15,
            points: PointsBound::default(),
            strict_validation: false,
        }
    }
}

/// Bearer token for the generation service. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyStatus {
    Configured,
    Placeholder,
    Missing,
}

impl fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeyStatus::Configured => f.write_str("Configured"),
            ApiKeyStatus::Placeholder => {
                f.write_str("WARNING: Default value detected - update with actual key")
            }
            ApiKeyStatus::Missing => f.write_str("Not configured"),
        }
    }
}

/// Where and how to reach the generative text service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Candidate base URLs, probed in this order.
    pub endpoints: Vec<String>,

    /// Path appended to each candidate for the health probe.
    pub probe_path: String,
    pub probe_timeout_ms: u64,

    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_response_chars: usize,

    /// Read from the environment only, never written to disk.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoints: (1234..=1244)
                .map(|port| format!("http://localhost:{port}"))
                .collect(),
            probe_path: "/v1/models".into(),
            probe_timeout_ms: 500,
            model: "local-model".into(),
            temperature: 0.5,
            max_tokens: 4000,
            max_response_chars: 4000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// How many consecutive ports to try when the first is busy.
    pub port_attempts: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            port_attempts: 11,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub story: StoryRules,
    pub service: ServiceSettings,
    pub server: ServerSettings,
}

impl AppConfig {
    /// Apply `STORY_API_KEY` and `STORY_ENDPOINTS` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(API_KEY_VAR).ok(),
            std::env::var(ENDPOINTS_VAR).ok(),
        );
    }

    pub fn apply_overrides(&mut self, api_key: Option<String>, endpoints: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.service.api_key = Some(ApiKey::new(key.trim()));
        }

        if let Some(list) = endpoints {
            let parsed: Vec<String> = list
                .split(',')
                .map(|e| e.trim().trim_end_matches('/').to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.service.endpoints = parsed;
            }
        }
    }

    pub fn api_key_status(&self) -> ApiKeyStatus {
        match &self.service.api_key {
            None => ApiKeyStatus::Missing,
            Some(key) if key.expose() == PLACEHOLDER_KEY => ApiKeyStatus::Placeholder,
            Some(_) => ApiKeyStatus::Configured,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.story.story_length == 0 {
            return Err(ConfigError::Invalid("story_length must be at least 1".into()));
        }
        if self.story.points.min > self.story.points.max {
            return Err(ConfigError::Invalid(format!(
                "points bound is inverted ({} > {})",
                self.story.points.min, self.story.points.max
            )));
        }
        if self.service.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one service endpoint is required".into(),
            ));
        }
        if self.server.port_attempts == 0 {
            return Err(ConfigError::Invalid("port_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(CONFIG_FILE);
    path
}

/// Load the config file (explicit path, or the per-user default).
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => {
            let path = config_path();
            if path.exists() {
                read_config(&path)?
            } else {
                AppConfig::default()
            }
        }
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}
