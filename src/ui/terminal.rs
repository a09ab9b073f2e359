use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::warn;

use crate::engine::engine::PlaythroughEngine;
use crate::engine::llm_client::CompletionClient;
use crate::engine::prompt_builder::PromptSpec;
use crate::engine::provider::StoryProvider;
use crate::error::ProviderError;
use crate::model::session::Session;
use crate::model::story::StoryTree;
use crate::model::view::View;

/// Line-oriented front end: one game per fetched story, with a manual
/// "try again" after every failure or ending.
pub struct TerminalGame<'a, C> {
    provider: &'a StoryProvider<C>,
    prompt: &'a PromptSpec,
    engine: PlaythroughEngine,
}

enum Input {
    Line(String),
    Eof,
}

impl<'a, C: CompletionClient> TerminalGame<'a, C> {
    pub fn new(
        provider: &'a StoryProvider<C>,
        prompt: &'a PromptSpec,
        engine: PlaythroughEngine,
    ) -> Self {
        Self {
            provider,
            prompt,
            engine,
        }
    }

    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut out: W) -> io::Result<()> {
        loop {
            writeln!(out, "Loading story...")?;
            let story = match self.load_story() {
                Ok(story) => story,
                Err(err) => {
                    writeln!(out, "Error: {}", err.title())?;
                    writeln!(out, "{}", err.details())?;
                    if !ask_again(&mut input, &mut out, "Try again? [Y/n] ")? {
                        return Ok(());
                    }
                    continue;
                }
            };
            if story.is_empty() {
                warn!("Story service returned no stages");
                writeln!(out, "Failed to load story")?;
                writeln!(out, "The story service returned no stages.")?;
                if !ask_again(&mut input, &mut out, "Try again? [Y/n] ")? {
                    return Ok(());
                }
                continue;
            }

            let mut session = Session::new(story);
            if !self.play(&mut session, &mut input, &mut out)? {
                return Ok(());
            }
            if !ask_again(&mut input, &mut out, "Start a new game? [Y/n] ")? {
                return Ok(());
            }
        }
    }

    fn load_story(&self) -> Result<Arc<StoryTree>, ProviderError> {
        let story = self.provider.fetch_story(self.prompt)?;
        Ok(Arc::new(story))
    }

    /// Returns `false` when input ran out mid-game.
    fn play<R: BufRead, W: Write>(
        &self,
        session: &mut Session,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<bool> {
        loop {
            let view = match self.engine.current_stage_view(session) {
                View::Terminal(terminal) => {
                    writeln!(out)?;
                    writeln!(out, "{}", terminal.headline())?;
                    writeln!(out, "{}", terminal.message())?;
                    return Ok(true);
                }
                View::Playing(view) => view,
            };

            writeln!(out)?;
            writeln!(out, "Ethical Score: {}", view.score)?;
            writeln!(out, "{}", view.text)?;
            for (position, option) in view.choices.iter().enumerate() {
                writeln!(out, "  {}. {}", position + 1, option.text)?;
            }

            let picked = loop {
                write!(out, "> ")?;
                out.flush()?;
                let line = match read_line(input)? {
                    Input::Line(line) => line,
                    Input::Eof => return Ok(false),
                };
                match line.trim().parse::<usize>() {
                    Ok(n) if (1..=view.choices.len()).contains(&n) => {
                        break view.choices[n - 1].index
                    }
                    _ => writeln!(out, "Pick a number between 1 and {}.", view.choices.len())?,
                }
            };

            if let Err(err) = self.engine.commit_index(session, picked) {
                warn!(error = %err, "Choice rejected");
                writeln!(out, "{err}")?;
            }
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Input> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        Ok(Input::Eof)
    } else {
        Ok(Input::Line(line))
    }
}

fn ask_again<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<bool> {
    write!(out, "{question}")?;
    out.flush()?;
    match read_line(input)? {
        Input::Eof => Ok(false),
        Input::Line(line) => {
            let answer = line.trim().to_ascii_lowercase();
            Ok(answer.is_empty() || answer == "y" || answer == "yes")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoryRules;
    use crate::engine::validator::StoryValidator;
    use crate::testing::{linear_story_json, ScriptedClient};

    fn provider(client: ScriptedClient) -> StoryProvider<ScriptedClient> {
        StoryProvider::new(
            client,
            vec!["http://llm".into()],
            "local-model",
            StoryValidator::new(StoryRules::default()),
        )
    }

    fn engine(story_length: u32) -> PlaythroughEngine {
        PlaythroughEngine::new(&StoryRules {
            story_length,
            ..StoryRules::default()
        })
    }

    fn scripted(completion: String) -> StoryProvider<ScriptedClient> {
        provider(ScriptedClient::new(&["http://llm"]).with_completion(Ok(completion)))
    }

    fn run(
        provider: &StoryProvider<ScriptedClient>,
        engine: PlaythroughEngine,
        input: &str,
    ) -> String {
        let prompt = PromptSpec::default();
        let game = TerminalGame::new(provider, &prompt, engine);
        let mut out = Vec::new();
        game.run(input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn plays_a_story_to_completion() {
        let provider = scripted(linear_story_json(2, 3).to_string());
        let out = run(&provider, engine(2), "1\n1\nn\n");
        assert!(out.contains("Dilemma 1"));
        assert!(out.contains("Ethical Score: 3"));
        assert!(out.contains("Story Complete!"));
        assert!(out.contains("Final Ethical Score: 6"));
    }

    #[test]
    fn losing_choice_ends_in_game_over() {
        let provider = scripted(linear_story_json(3, -20).to_string());
        let out = run(&provider, engine(3), "1\nn\n");
        assert!(out.contains("GAME OVER"));
        assert!(out.contains("Final Score: -20"));
        assert!(!out.contains("Dilemma 2"));
    }

    #[test]
    fn invalid_input_is_asked_again() {
        let provider = scripted(linear_story_json(1, 1).to_string());
        let out = run(&provider, engine(1), "seven\n9\n1\nn\n");
        assert_eq!(out.matches("Pick a number between 1 and 1.").count(), 2);
        assert!(out.contains("Story Complete!"));
    }

    #[test]
    fn failure_offers_a_fresh_attempt() {
        let client = ScriptedClient::new(&["http://llm"])
            .with_completion(Err(ProviderError::Http {
                status: 500,
                detail: "model crashed".into(),
            }))
            .with_completion(Ok(linear_story_json(1, 2).to_string()));
        let provider = provider(client);

        let out = run(&provider, engine(1), "\n1\nn\n");
        assert!(out.contains("Error: Story service API error"));
        assert!(out.contains("status 500"));
        assert!(out.contains("Story Complete!"));
        assert_eq!(provider.client().completion_endpoints().len(), 2);
    }

    #[test]
    fn story_without_stages_offers_a_fresh_attempt() {
        let client = ScriptedClient::new(&["http://llm"])
            .with_completion(Ok(r#"{"stages":[]}"#.to_string()))
            .with_completion(Ok(linear_story_json(1, 2).to_string()));
        let provider = provider(client);

        let out = run(&provider, engine(1), "y\n1\nn\n");
        assert!(out.contains("Failed to load story"));
        assert!(!out.contains("Story stage not found"));
        assert!(out.contains("Story Complete!"));
        assert_eq!(provider.client().completion_endpoints().len(), 2);
    }

    #[test]
    fn end_of_input_stops_quietly() {
        let provider = scripted(linear_story_json(2, 1).to_string());
        let out = run(&provider, engine(2), "");
        assert!(out.contains("Dilemma 1"));
    }
}
