//! Branching, scored story engine backed by a generative text service.
//!
//! A `StoryProvider` fetches one complete story per game and turns the
//! service's free-form reply into a validated `StoryTree`; a
//! `PlaythroughEngine` walks a `Session` through it.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod server;
pub mod testing;
pub mod ui;

pub use config::{AppConfig, StoryRules};
pub use engine::engine::PlaythroughEngine;
pub use engine::prompt_builder::PromptSpec;
pub use engine::provider::StoryProvider;
pub use engine::validator::StoryValidator;
pub use error::{ErrorKind, PlayError, ProviderError, ValidationError};
pub use model::session::Session;
pub use model::story::{Choice, Stage, StoryTree};
pub use model::view::{ChoiceOption, PlayState, StageView, TerminalView, View};
