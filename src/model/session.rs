use std::sync::Arc;

use crate::model::story::StoryTree;

/// Mutable state of one playthrough.
///
/// Only the playthrough engine changes score and position; everything else
/// reads them through the accessors.
#[derive(Debug, Clone)]
pub struct Session {
    score: i64,
    current_stage: u32,
    story: Arc<StoryTree>,
}

impl Session {
    pub fn new(story: Arc<StoryTree>) -> Self {
        Self {
            score: 0,
            current_stage: 1,
            story,
        }
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn current_stage(&self) -> u32 {
        self.current_stage
    }

    pub fn story(&self) -> &StoryTree {
        &self.story
    }

    /// Back to stage 1 with a zero score, same story.
    pub fn reset(&mut self) {
        self.score = 0;
        self.current_stage = 1;
    }

    /// Start over on a freshly fetched story.
    pub fn restart_with(&mut self, story: Arc<StoryTree>) {
        self.story = story;
        self.reset();
    }

    pub(crate) fn add_points(&mut self, points: i64) -> i64 {
        self.score = self.score.saturating_add(points);
        self.score
    }

    pub(crate) fn move_to(&mut self, stage: u32) {
        self.current_stage = stage;
    }
}
