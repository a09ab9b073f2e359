use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::StoryRules;
use crate::error::ValidationError;
use crate::model::story::{Choice, Stage, StoryTree};

/// Checks that decoded JSON has the shape of a story and turns it into a typed tree.
///
/// Checks run in order and stop at the first failure:
/// root shape, then every stage, then every choice. With strict validation
/// on, choice references and point bounds are checked next, followed by
/// stage numbering.
#[derive(Debug, Clone)]
pub struct StoryValidator {
    rules: StoryRules,
}

impl StoryValidator {
    pub fn new(rules: StoryRules) -> Self {
        Self { rules }
    }

    pub fn validate(&self, candidate: &Value) -> Result<StoryTree, ValidationError> {
        let result = self.check(candidate);
        if let Err(err) = &result {
            warn!(error = %err, fragment = ?err.fragment(), "Story failed validation");
        }
        result
    }

    fn check(&self, candidate: &Value) -> Result<StoryTree, ValidationError> {
        let Some(raw_stages) = candidate.get("stages").and_then(Value::as_array) else {
            return Err(ValidationError::MalformedRoot {
                fragment: candidate.clone(),
            });
        };

        let mut stages = Vec::with_capacity(raw_stages.len());
        for (index, raw) in raw_stages.iter().enumerate() {
            stages.push(stage_shape(index, raw)?);
        }

        for (stage_index, (raw, stage)) in raw_stages.iter().zip(stages.iter_mut()).enumerate() {
            let raw_choices = raw
                .get("choices")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (choice_index, raw_choice) in raw_choices.iter().enumerate() {
                stage
                    .choices
                    .push(choice_shape(stage_index, choice_index, raw_choice)?);
            }
        }

        let tree = StoryTree::new(stages);
        if self.rules.strict_validation {
            self.check_references(&tree, raw_stages)?;
            self.check_numbering(&tree)?;
        }
        Ok(tree)
    }

    fn check_references(
        &self,
        tree: &StoryTree,
        raw_stages: &[Value],
    ) -> Result<(), ValidationError> {
        let end_of_story = self.rules.story_length.saturating_add(1);
        let bound = self.rules.points;

        for (stage_index, stage) in tree.stages.iter().enumerate() {
            for (choice_index, choice) in stage.choices.iter().enumerate() {
                let reason = if !bound.contains(choice.points) {
                    Some(format!(
                        "points {} outside [{}, {}]",
                        choice.points, bound.min, bound.max
                    ))
                } else if choice.next_stage != end_of_story
                    && !tree.contains_stage(choice.next_stage)
                {
                    Some(format!("nextStage {} does not exist", choice.next_stage))
                } else {
                    None
                };

                if let Some(reason) = reason {
                    return Err(ValidationError::MalformedChoice {
                        stage_index,
                        choice_index,
                        reason,
                        fragment: raw_stages[stage_index]["choices"][choice_index].clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_numbering(&self, tree: &StoryTree) -> Result<(), ValidationError> {
        let mut seen = HashSet::with_capacity(tree.len());
        for (index, stage) in tree.stages.iter().enumerate() {
            if !seen.insert(stage.stage_number) {
                return Err(ValidationError::DuplicateStage {
                    index,
                    number: stage.stage_number,
                });
            }
        }

        match (1..=self.rules.story_length).find(|n| !seen.contains(n)) {
            Some(number) => Err(ValidationError::MissingStage { number }),
            None => Ok(()),
        }
    }
}

/// Stage fields without its choices; those are filled in by the caller.
fn stage_shape(index: usize, raw: &Value) -> Result<Stage, ValidationError> {
    let malformed = || ValidationError::MalformedStage {
        index,
        fragment: raw.clone(),
    };

    let obj = raw.as_object().ok_or_else(malformed)?;
    let stage_number = positive_u32(obj, "stageNumber").ok_or_else(malformed)?;
    let text = non_empty_str(obj, "text").ok_or_else(malformed)?;
    if !obj.get("choices").is_some_and(Value::is_array) {
        return Err(malformed());
    }

    Ok(Stage {
        stage_number,
        text: text.to_string(),
        choices: Vec::new(),
    })
}

fn choice_shape(
    stage_index: usize,
    choice_index: usize,
    raw: &Value,
) -> Result<Choice, ValidationError> {
    let malformed = |reason: &str| ValidationError::MalformedChoice {
        stage_index,
        choice_index,
        reason: reason.to_string(),
        fragment: raw.clone(),
    };

    let obj = raw.as_object().ok_or_else(|| malformed("not an object"))?;
    let text = non_empty_str(obj, "text").ok_or_else(|| malformed("missing text"))?;
    let points = obj
        .get("points")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("points must be an integer"))?;
    let next_stage = obj
        .get("nextStage")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| malformed("nextStage must be a non-negative integer"))?;
    let next_context = obj
        .get("nextContext")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Choice {
        text: text.to_string(),
        points,
        next_stage,
        next_context,
    })
}

fn positive_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
