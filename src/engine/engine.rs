use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::config::StoryRules;
use crate::error::PlayError;
use crate::model::session::Session;
use crate::model::story::{Choice, Stage};
use crate::model::view::{ChoiceOption, PlayState, StageView, TerminalView, View};

/// Plays a validated story: applies choices to a session and decides what
/// comes next.
///
/// Termination is checked when a choice is committed (so a losing choice
/// never follows its `nextStage`) and again on every view (which catches a
/// finished story and stages missing from the tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaythroughEngine {
    story_length: u32,
    minimum_score: i64,
}

enum Position<'a> {
    GameOver,
    Complete,
    Stuck(u32),
    DeadEnd(&'a Stage),
    Playing(&'a Stage),
}

impl PlaythroughEngine {
    pub fn new(rules: &StoryRules) -> Self {
        Self {
            story_length: rules.story_length,
            minimum_score: rules.minimum_score,
        }
    }

    fn locate<'a>(&self, session: &'a Session) -> Position<'a> {
        if session.score() <= self.minimum_score {
            return Position::GameOver;
        }
        if session.current_stage() > self.story_length {
            return Position::Complete;
        }
        match session.story().stage(session.current_stage()) {
            None => Position::Stuck(session.current_stage()),
            Some(stage) if stage.is_dead_end() => Position::DeadEnd(stage),
            Some(stage) => Position::Playing(stage),
        }
    }

    pub fn state(&self, session: &Session) -> PlayState {
        match self.locate(session) {
            Position::GameOver => PlayState::GameOver,
            Position::Complete => PlayState::Complete,
            Position::Stuck(_) => PlayState::Stuck,
            Position::DeadEnd(_) => PlayState::DeadEnd,
            Position::Playing(_) => PlayState::Playing,
        }
    }

    pub fn current_stage_view(&self, session: &Session) -> View {
        self.current_stage_view_with(session, &mut rand::thread_rng())
    }

    /// Same as `current_stage_view` with a caller-supplied shuffle source.
    pub fn current_stage_view_with<R: Rng + ?Sized>(&self, session: &Session, rng: &mut R) -> View {
        let final_score = session.score();
        match self.locate(session) {
            Position::GameOver => View::Terminal(TerminalView::GameOver {
                final_score,
                minimum_score: self.minimum_score,
            }),
            Position::Complete => View::Terminal(TerminalView::Complete { final_score }),
            Position::Stuck(stage_number) => View::Terminal(TerminalView::Stuck {
                stage_number,
                final_score,
            }),
            Position::DeadEnd(stage) => View::Terminal(TerminalView::DeadEnd {
                stage_number: stage.stage_number,
                text: stage.text.clone(),
                final_score,
            }),
            Position::Playing(stage) => {
                let mut choices: Vec<ChoiceOption> = stage
                    .choices
                    .iter()
                    .enumerate()
                    .map(|(index, choice)| ChoiceOption {
                        index,
                        text: choice.text.clone(),
                    })
                    .collect();
                choices.shuffle(rng);

                View::Playing(StageView {
                    stage_number: stage.stage_number,
                    text: stage.text.clone(),
                    score: final_score,
                    choices,
                })
            }
        }
    }

    /// Apply `choice` to the session.
    ///
    /// The points are always added. If the score then sits at or below the
    /// floor the game is over and the stage does not change; otherwise the
    /// session moves to `choice.next_stage` unchecked.
    pub fn commit(&self, session: &mut Session, choice: &Choice) -> Result<PlayState, PlayError> {
        if self.state(session).is_terminal() {
            return Err(PlayError::SessionOver);
        }

        let score = session.add_points(choice.points);
        if score <= self.minimum_score {
            info!(score, floor = self.minimum_score, "Score fell to the floor, game over");
            return Ok(PlayState::GameOver);
        }

        debug!(
            from = session.current_stage(),
            to = choice.next_stage,
            points = choice.points,
            score,
            "Choice committed"
        );
        session.move_to(choice.next_stage);
        Ok(self.state(session))
    }

    /// Commit the choice at `index` in the current stage's stored order
    /// (`ChoiceOption::index`), not the shuffled display position.
    pub fn commit_index(
        &self,
        session: &mut Session,
        index: usize,
    ) -> Result<PlayState, PlayError> {
        let choice = match self.locate(session) {
            Position::Playing(stage) => stage
                .choices
                .get(index)
                .cloned()
                .ok_or(PlayError::NoSuchChoice {
                    stage: stage.stage_number,
                    index,
                })?,
            _ => return Err(PlayError::SessionOver),
        };
        self.commit(session, &choice)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::model::story::StoryTree;
    use crate::testing::{choice, linear_story, stage};

    fn engine(story_length: u32) -> PlaythroughEngine {
        PlaythroughEngine::new(&StoryRules {
            story_length,
            ..StoryRules::default()
        })
    }

    fn session(tree: StoryTree) -> Session {
        Session::new(Arc::new(tree))
    }

    #[test]
    fn fresh_session_shows_stage_one() {
        let session = session(linear_story(3, 1));
        match engine(3).current_stage_view(&session) {
            View::Playing(view) => {
                assert_eq!(view.stage_number, 1);
                assert_eq!(view.score, 0);
                assert_eq!(view.text, "Dilemma 1");
            }
            other => panic!("unexpected view: {other:?}"),
        }
    }

    #[test]
    fn commit_adds_points_exactly_and_follows_next_stage() {
        let tree = StoryTree::new(vec![
            stage(1, "start", vec![choice("a", 7, 3), choice("b", -4, 2)]),
            stage(2, "two", vec![choice("c", 1, 3)]),
            stage(3, "three", vec![choice("d", 1, 4)]),
        ]);
        let mut session = session(tree);
        let engine = engine(3);

        assert_eq!(engine.commit_index(&mut session, 1), Ok(PlayState::Playing));
        assert_eq!(session.score(), -4);
        assert_eq!(session.current_stage(), 2);

        assert_eq!(engine.commit_index(&mut session, 0), Ok(PlayState::Playing));
        assert_eq!(session.score(), -3);
        assert_eq!(session.current_stage(), 3);
    }

    #[test]
    fn score_at_the_floor_is_game_over_without_advancing() {
        let tree = StoryTree::new(vec![
            stage(1, "start", vec![choice("bad", -15, 2)]),
            stage(2, "never seen", vec![choice("x", 0, 3)]),
        ]);
        let mut session = session(tree);
        let engine = engine(2);

        assert_eq!(engine.commit_index(&mut session, 0), Ok(PlayState::GameOver));
        assert_eq!(session.score(), -15);
        assert_eq!(session.current_stage(), 1);
        assert_eq!(
            engine.current_stage_view(&session),
            View::Terminal(TerminalView::GameOver {
                final_score: -15,
                minimum_score: -15
            })
        );
    }

    #[test]
    fn game_over_preempts_a_dangling_next_stage() {
        let tree = StoryTree::new(vec![stage(1, "start", vec![choice("bad", -30, 99)])]);
        let mut session = session(tree);
        assert_eq!(engine(1).commit_index(&mut session, 0), Ok(PlayState::GameOver));
        assert_eq!(session.current_stage(), 1);
    }

    #[test]
    fn past_the_last_stage_is_complete() {
        let mut session = session(linear_story(2, 3));
        let engine = engine(2);
        engine.commit_index(&mut session, 0).unwrap();
        assert_eq!(engine.commit_index(&mut session, 0), Ok(PlayState::Complete));
        assert_eq!(session.current_stage(), 3);
        assert_eq!(
            engine.current_stage_view(&session),
            View::Terminal(TerminalView::Complete { final_score: 6 })
        );
    }

    #[test]
    fn missing_stage_is_stuck_with_integrity_kind() {
        let tree = StoryTree::new(vec![
            stage(1, "start", vec![choice("gap", 1, 3)]),
            stage(2, "two", vec![choice("x", 1, 3)]),
        ]);
        let mut session = session(tree);
        let engine = engine(5);

        assert_eq!(engine.commit_index(&mut session, 0), Ok(PlayState::Stuck));
        let View::Terminal(terminal) = engine.current_stage_view(&session) else {
            panic!("expected a terminal view");
        };
        assert_eq!(
            terminal,
            TerminalView::Stuck {
                stage_number: 3,
                final_score: 1
            }
        );
        assert_eq!(terminal.error_kind(), Some(crate::error::ErrorKind::Integrity));
    }

    #[test]
    fn stage_without_choices_is_a_dead_end() {
        let tree = StoryTree::new(vec![
            stage(1, "start", vec![choice("on", 2, 2)]),
            stage(2, "The lab shuts down.", vec![]),
        ]);
        let mut session = session(tree);
        let engine = engine(3);

        assert_eq!(engine.commit_index(&mut session, 0), Ok(PlayState::DeadEnd));
        assert_eq!(
            engine.current_stage_view(&session),
            View::Terminal(TerminalView::DeadEnd {
                stage_number: 2,
                text: "The lab shuts down.".into(),
                final_score: 2
            })
        );
    }

    #[test]
    fn terminal_sessions_reject_further_commits() {
        let mut session = session(linear_story(1, 0));
        let engine = engine(1);
        engine.commit_index(&mut session, 0).unwrap();

        assert_eq!(engine.commit_index(&mut session, 0), Err(PlayError::SessionOver));
        assert_eq!(
            engine.commit(&mut session, &choice("late", 5, 1)),
            Err(PlayError::SessionOver)
        );
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut session = session(linear_story(2, 0));
        assert_eq!(
            engine(2).commit_index(&mut session, 4),
            Err(PlayError::NoSuchChoice { stage: 1, index: 4 })
        );
    }

    #[test]
    fn shuffling_never_touches_the_stored_order() {
        let choices: Vec<Choice> = (0..6).map(|i| choice(&format!("c{i}"), i, 2)).collect();
        let tree = StoryTree::new(vec![stage(1, "start", choices.clone())]);
        let session = session(tree);
        let engine = engine(1);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let View::Playing(view) = engine.current_stage_view_with(&session, &mut rng) else {
                panic!("expected a playing view");
            };
            let mut seen: Vec<usize> = view.choices.iter().map(|c| c.index).collect();
            for option in &view.choices {
                assert_eq!(option.text, choices[option.index].text);
            }
            seen.sort_unstable();
            assert_eq!(seen, (0..6).collect::<Vec<_>>());
        }
        assert_eq!(session.story().stages[0].choices, choices);
    }

    #[test]
    fn committing_by_display_index_uses_the_stored_choice() {
        let tree = StoryTree::new(vec![
            stage(1, "start", vec![choice("good", 5, 2), choice("bad", -5, 2)]),
            stage(2, "two", vec![choice("x", 0, 3)]),
        ]);
        let mut session = session(tree);
        let engine = engine(2);
        let mut rng = StdRng::seed_from_u64(1);

        let View::Playing(view) = engine.current_stage_view_with(&session, &mut rng) else {
            panic!("expected a playing view");
        };
        let bad = view.choices.iter().find(|c| c.text == "bad").unwrap();
        engine.commit_index(&mut session, bad.index).unwrap();
        assert_eq!(session.score(), -5);
    }
}
