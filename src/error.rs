use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Broad failure families. Every error the crate produces maps to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Content,
    Structure,
    Integrity,
}

/// Structural problems found in a candidate story.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("response must contain a 'stages' array")]
    MalformedRoot { fragment: Value },

    #[error("stage {} is missing required fields", .index + 1)]
    MalformedStage { index: usize, fragment: Value },

    #[error("choice {} of stage {} is malformed: {reason}", .choice_index + 1, .stage_index + 1)]
    MalformedChoice {
        stage_index: usize,
        choice_index: usize,
        reason: String,
        fragment: Value,
    },

    #[error("stage number {number} appears more than once (element {})", .index + 1)]
    DuplicateStage { index: usize, number: u32 },

    #[error("stage {number} is missing from the story")]
    MissingStage { number: u32 },
}

impl ValidationError {
    /// The raw piece of the candidate that failed, if there is one.
    pub fn fragment(&self) -> Option<&Value> {
        match self {
            ValidationError::MalformedRoot { fragment }
            | ValidationError::MalformedStage { fragment, .. }
            | ValidationError::MalformedChoice { fragment, .. } => Some(fragment),
            ValidationError::DuplicateStage { .. } | ValidationError::MissingStage { .. } => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::MalformedRoot { .. } => "Invalid story format",
            ValidationError::MalformedStage { .. } => "Invalid stage format",
            ValidationError::MalformedChoice { .. } => "Invalid choice format",
            ValidationError::DuplicateStage { .. } | ValidationError::MissingStage { .. } => {
                "Invalid stage numbering"
            }
        }
    }
}

/// Everything that can stop a story from being fetched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("could not connect to a story service on any of {} endpoints", .tried.len())]
    NoEndpoint { tried: Vec<String> },

    #[error("API error (status {status}): {detail}")]
    Http { status: u16, detail: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("unexpected API response structure: {0}")]
    UnexpectedResponse(String),

    #[error("failed to parse story content: {detail}")]
    UnparsableContent { raw: String, detail: String },

    #[error("invalid story structure: {0}")]
    InvalidStructure(#[from] ValidationError),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::NoEndpoint { .. }
            | ProviderError::Http { .. }
            | ProviderError::Transport(_)
            | ProviderError::UnexpectedResponse(_) => ErrorKind::Transport,
            ProviderError::UnparsableContent { .. } => ErrorKind::Content,
            ProviderError::InvalidStructure(_) => ErrorKind::Structure,
        }
    }

    /// Short heading suitable for an error screen.
    pub fn title(&self) -> &'static str {
        match self {
            ProviderError::NoEndpoint { .. } => "Story service unavailable",
            ProviderError::Http { .. } => "Story service API error",
            ProviderError::Transport(_) => "Failed to connect to the story service",
            ProviderError::UnexpectedResponse(_) => "Unexpected API response structure",
            ProviderError::UnparsableContent { .. } => "Failed to parse story content",
            ProviderError::InvalidStructure(inner) => inner.title(),
        }
    }

    /// Human readable detail line. Never includes credentials.
    pub fn details(&self) -> String {
        match self {
            ProviderError::NoEndpoint { tried } => format!(
                "No story service answered at {}. Make sure the service is running.",
                tried.join(", ")
            ),
            ProviderError::InvalidStructure(inner) => inner.to_string(),
            other => other.to_string(),
        }
    }
}

/// Rejected player actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    #[error("the game is over; start a new game to keep playing")]
    SessionOver,

    #[error("stage {stage} has no choice number {}", .index + 1)]
    NoSuchChoice { stage: u32, index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
