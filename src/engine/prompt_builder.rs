use crate::config::{AppConfig, PointsBound};

/// Shape and sampling parameters for one story request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub theme: String,
    pub stage_count: u32,
    pub points: PointsBound,
    pub min_choices: u32,
    pub max_choices: u32,
    pub max_response_chars: usize,

    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptSpec {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            stage_count: config.story.story_length,
            points: config.story.points,
            temperature: config.service.temperature,
            max_tokens: config.service.max_tokens,
            max_response_chars: config.service.max_response_chars,
            ..Self::default()
        }
    }
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            theme: "an AI ethics choose-your-own-adventure game".into(),
            stage_count: 15,
            points: PointsBound::default(),
            min_choices: 3,
            max_choices: 4,
            max_response_chars: 4000,
            temperature: 0.5,
            max_tokens: 4000,
        }
    }
}

/// Builds the structural prompt sent to the LLM.
/// Only formats text; no parsing or networking.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(spec: &PromptSpec) -> String {
        let mut prompt = String::new();

        push_intro(&mut prompt, spec);
        push_structure(&mut prompt);
        push_rules(&mut prompt, spec);
        push_example(&mut prompt, spec);

        prompt
    }
}

fn push_intro(prompt: &mut String, spec: &PromptSpec) {
    prompt.push_str(&format!(
        "You are a JSON generator for {}. Generate a complete story with {} stages.\n\n",
        spec.theme, spec.stage_count
    ));
    prompt.push_str(
        "IMPORTANT: Your response must be ONLY a valid JSON object \
         with no additional text or formatting.\n\n",
    );
}

fn push_structure(prompt: &mut String) {
    prompt.push_str("Required JSON structure:\n");
    prompt.push_str(
        r#"{
    "stages": [
        {
            "stageNumber": 1,
            "text": "Brief dilemma description",
            "choices": [
                {
                    "text": "Choice description",
                    "points": 0,
                    "nextStage": 2,
                    "nextContext": "Brief outcome"
                }
            ]
        }
    ]
}"#,
    );
    prompt.push_str("\n\n");
}

fn push_rules(prompt: &mut String, spec: &PromptSpec) {
    let rules = [
        "Use ONLY double quotes for strings (no single quotes)".to_string(),
        "Escape any quotes within text using backslash".to_string(),
        "Keep text brief and concise".to_string(),
        "Ensure all numbers are integers".to_string(),
        format!(
            "Each stage must have {}-{} choices",
            spec.min_choices, spec.max_choices
        ),
        format!(
            "Each choice must point to a valid next stage between 2 and {}, or {} to end the story",
            spec.stage_count,
            spec.stage_count.saturating_add(1)
        ),
        format!(
            "Points should be integers between {} and {}",
            spec.points.min, spec.points.max
        ),
        "Do not include any text before or after the JSON".to_string(),
        "Do not use line breaks within text fields".to_string(),
        format!(
            "Keep the total response under {} characters",
            spec.max_response_chars
        ),
    ];

    prompt.push_str("Rules:\n");
    for (i, rule) in rules.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    prompt.push('\n');
}

fn push_example(prompt: &mut String, spec: &PromptSpec) {
    prompt.push_str("Example of valid text:\n");
    prompt.push_str(&format!(
        r#""text": "You discover an AI system making biased decisions. What do you do?",
"choices": [
    {{
        "text": "Report the bias to management",
        "points": {},
        "nextStage": 2,
        "nextContext": "Management investigates"
    }}
]"#,
        spec.points.max / 2
    ));
    prompt.push('\n');
}
