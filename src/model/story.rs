use serde::{Deserialize, Serialize};

/// A complete, pre-generated story. Read-only once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryTree {
    pub stages: Vec<Stage>,
}

/// One narrative beat with its outgoing choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub stage_number: u32,
    pub text: String,

    /// Empty only for a dead-end stage.
    pub choices: Vec<Choice>,
}

/// A scored transition from one stage to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    pub points: i64,

    /// Not checked against the tree unless strict validation is on.
    pub next_stage: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_context: Option<String>,
}

impl StoryTree {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// First stage carrying `number`, if any.
    pub fn stage(&self, number: u32) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_number == number)
    }

    pub fn contains_stage(&self, number: u32) -> bool {
        self.stage(number).is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage {
    pub fn is_dead_end(&self) -> bool {
        self.choices.is_empty()
    }
}
