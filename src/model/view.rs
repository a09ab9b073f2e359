use crate::error::ErrorKind;

/// Coarse engine state derived from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    GameOver,
    Complete,
    /// The current stage number is not in the story.
    Stuck,
    /// The current stage has no choices.
    DeadEnd,
}

impl PlayState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PlayState::Playing)
    }
}

/// What a front end should show next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Playing(StageView),
    Terminal(TerminalView),
}

impl View {
    pub fn state(&self) -> PlayState {
        match self {
            View::Playing(_) => PlayState::Playing,
            View::Terminal(terminal) => terminal.state(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView {
    pub stage_number: u32,
    pub text: String,
    pub score: i64,

    /// Display order only; shuffled on every render.
    pub choices: Vec<ChoiceOption>,
}

/// A choice as offered to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Position of the choice in the stage's stored order; pass this to `commit_index`.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalView {
    GameOver {
        final_score: i64,
        minimum_score: i64,
    },
    Complete {
        final_score: i64,
    },
    Stuck {
        stage_number: u32,
        final_score: i64,
    },
    DeadEnd {
        stage_number: u32,
        text: String,
        final_score: i64,
    },
}

impl TerminalView {
    pub fn state(&self) -> PlayState {
        match self {
            TerminalView::GameOver { .. } => PlayState::GameOver,
            TerminalView::Complete { .. } => PlayState::Complete,
            TerminalView::Stuck { .. } => PlayState::Stuck,
            TerminalView::DeadEnd { .. } => PlayState::DeadEnd,
        }
    }

    pub fn final_score(&self) -> i64 {
        match self {
            TerminalView::GameOver { final_score, .. }
            | TerminalView::Complete { final_score }
            | TerminalView::Stuck { final_score, .. }
            | TerminalView::DeadEnd { final_score, .. } => *final_score,
        }
    }

    /// Stuck is a data problem, not something the player did.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            TerminalView::Stuck { .. } => Some(ErrorKind::Integrity),
            _ => None,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            TerminalView::GameOver { .. } => "GAME OVER",
            TerminalView::Complete { .. } => "Story Complete!",
            TerminalView::Stuck { .. } => "Error: Story stage not found.",
            TerminalView::DeadEnd { .. } => "No choices available. Story ends here.",
        }
    }

    pub fn message(&self) -> String {
        match self {
            TerminalView::GameOver {
                final_score,
                minimum_score,
            } => format!(
                "Your ethical score dropped to {minimum_score} or below. \
                 Your poor ethical choices have led to serious consequences.\n\
                 Final Score: {final_score}"
            ),
            TerminalView::Complete { final_score } => format!(
                "Congratulations! You have completed the AI Ethics Adventure.\n\
                 Final Ethical Score: {final_score}"
            ),
            TerminalView::Stuck {
                stage_number,
                final_score,
            } => format!(
                "The story has no stage {stage_number}.\nFinal Score: {final_score}"
            ),
            TerminalView::DeadEnd {
                text, final_score, ..
            } => format!("{text}\nFinal Score: {final_score}"),
        }
    }
}
