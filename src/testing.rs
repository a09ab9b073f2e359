//! Testing utilities.
//!
//! - `ScriptedClient` stands in for the generation service without network calls
//! - story fixtures for engine and pipeline tests

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};

use crate::engine::llm_client::{ChatCompletionRequest, CompletionClient};
use crate::error::ProviderError;
use crate::model::story::{Choice, Stage, StoryTree};

/// A completion client that answers from a script.
///
/// Endpoints listed as live pass the probe; completions are handed out in
/// the order they were added.
#[derive(Default)]
pub struct ScriptedClient {
    live: HashSet<String>,
    state: Mutex<ScriptState>,
}

#[derive(Default)]
struct ScriptState {
    completions: VecDeque<Result<String, ProviderError>>,
    probed: Vec<String>,
    completion_endpoints: Vec<String>,
    requests: Vec<ChatCompletionRequest>,
}

impl ScriptedClient {
    pub fn new(live: &[&str]) -> Self {
        Self {
            live: live.iter().map(|e| e.to_string()).collect(),
            state: Mutex::default(),
        }
    }

    pub fn with_completion(self, completion: Result<String, ProviderError>) -> Self {
        self.lock().completions.push_back(completion);
        self
    }

    /// Every endpoint probed so far, in order.
    pub fn probed(&self) -> Vec<String> {
        self.lock().probed.clone()
    }

    pub fn completion_endpoints(&self) -> Vec<String> {
        self.lock().completion_endpoints.clone()
    }

    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.lock().requests.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CompletionClient for ScriptedClient {
    fn probe(&self, endpoint: &str) -> Result<(), String> {
        self.lock().probed.push(endpoint.to_string());
        if self.live.contains(endpoint) {
            Ok(())
        } else {
            Err("connection refused".into())
        }
    }

    fn complete(
        &self,
        endpoint: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, ProviderError> {
        let mut state = self.lock();
        state.completion_endpoints.push(endpoint.to_string());
        state.requests.push(request.clone());
        state
            .completions
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted completion".into())))
    }
}

pub fn choice(text: &str, points: i64, next_stage: u32) -> Choice {
    Choice {
        text: text.to_string(),
        points,
        next_stage,
        next_context: None,
    }
}

pub fn stage(stage_number: u32, text: &str, choices: Vec<Choice>) -> Stage {
    Stage {
        stage_number,
        text: text.to_string(),
        choices,
    }
}

/// Stages 1..=n, each with one choice worth `points` leading to the next stage.
/// The last stage points at n + 1.
pub fn linear_story(n: u32, points: i64) -> StoryTree {
    StoryTree::new(
        (1..=n)
            .map(|i| {
                stage(
                    i,
                    &format!("Dilemma {i}"),
                    vec![Choice {
                        next_context: Some("The story continues".into()),
                        ..choice(&format!("Carry on from {i}"), points, i + 1)
                    }],
                )
            })
            .collect(),
    )
}

/// Wire-format JSON for `linear_story`.
pub fn linear_story_json(n: u32, points: i64) -> Value {
    let stages: Vec<Value> = (1..=n)
        .map(|i| {
            json!({
                "stageNumber": i,
                "text": format!("Dilemma {i}"),
                "choices": [{
                    "text": format!("Carry on from {i}"),
                    "points": points,
                    "nextStage": i + 1,
                    "nextContext": "The story continues"
                }]
            })
        })
        .collect();
    json!({ "stages": stages })
}
