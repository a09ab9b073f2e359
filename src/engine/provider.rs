use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::engine::llm_client::{
    ChatCompletionRequest, ChatMessage, CompletionClient, LmStudioClient, ResponseFormat,
};
use crate::engine::prompt_builder::{PromptBuilder, PromptSpec};
use crate::engine::validator::StoryValidator;
use crate::error::ProviderError;
use crate::model::llm_decode::decode_story_json;
use crate::model::story::StoryTree;

/// Fetches one story: find a live endpoint, ask for a story, decode, validate.
///
/// Every failure is returned on first occurrence. Nothing here retries.
pub struct StoryProvider<C = LmStudioClient> {
    client: C,
    endpoints: Vec<String>,
    model: String,
    validator: StoryValidator,
}

impl StoryProvider<LmStudioClient> {
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let client = LmStudioClient::new(&config.service)?;
        Ok(Self::new(
            client,
            config.service.endpoints.clone(),
            config.service.model.clone(),
            StoryValidator::new(config.story.clone()),
        ))
    }
}

impl<C: CompletionClient> StoryProvider<C> {
    pub fn new(
        client: C,
        endpoints: Vec<String>,
        model: impl Into<String>,
        validator: StoryValidator,
    ) -> Self {
        Self {
            client,
            endpoints,
            model: model.into(),
            validator,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// First candidate that answers the probe, in configured order.
    pub fn discover_endpoint(&self) -> Result<&str, ProviderError> {
        for endpoint in &self.endpoints {
            match self.client.probe(endpoint) {
                Ok(()) => {
                    info!(endpoint = %endpoint, "Story service found");
                    return Ok(endpoint);
                }
                Err(reason) => {
                    debug!(endpoint = %endpoint, reason = %reason, "Endpoint not available");
                }
            }
        }

        Err(ProviderError::NoEndpoint {
            tried: self.endpoints.clone(),
        })
    }

    pub fn fetch_story(&self, prompt: &PromptSpec) -> Result<StoryTree, ProviderError> {
        let endpoint = self.discover_endpoint()?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: PromptBuilder::build(prompt),
            }],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            response_format: ResponseFormat::json_object(),
        };

        info!(endpoint = %endpoint, stages = prompt.stage_count, "Requesting story");
        let content = self.client.complete(endpoint, &request).inspect_err(|err| {
            warn!(error = %err, "Story request failed");
        })?;
        debug!(chars = content.len(), "Completion received");

        let candidate = decode_story_json(&content)?;
        let tree = self.validator.validate(&candidate)?;

        info!(stages = tree.len(), "Story validated");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoryRules;
    use crate::error::ValidationError;
    use crate::testing::{linear_story_json, ScriptedClient};

    fn provider(client: ScriptedClient) -> StoryProvider<ScriptedClient> {
        StoryProvider::new(
            client,
            vec!["http://a".into(), "http://b".into(), "http://c".into()],
            "local-model",
            StoryValidator::new(StoryRules::default()),
        )
    }

    #[test]
    fn probes_in_order_and_stops_at_first_live_endpoint() {
        let client = ScriptedClient::new(&["http://b", "http://c"])
            .with_completion(Ok(linear_story_json(3, 1).to_string()));
        let provider = provider(client);

        let tree = provider.fetch_story(&PromptSpec::default()).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(provider.client().probed(), vec!["http://a", "http://b"]);
        assert_eq!(provider.client().completion_endpoints(), vec!["http://b"]);
    }

    #[test]
    fn no_live_endpoint_fails_before_any_request() {
        let provider = provider(ScriptedClient::new(&[]));
        let err = provider.fetch_story(&PromptSpec::default()).unwrap_err();
        assert!(matches!(err, ProviderError::NoEndpoint { ref tried } if tried.len() == 3));
        assert!(provider.client().completion_endpoints().is_empty());
    }

    #[test]
    fn http_errors_surface_without_retry() {
        let client = ScriptedClient::new(&["http://a"]).with_completion(Err(ProviderError::Http {
            status: 503,
            detail: "overloaded".into(),
        }));
        let provider = provider(client);

        let err = provider.fetch_story(&PromptSpec::default()).unwrap_err();
        assert_eq!(
            err,
            ProviderError::Http {
                status: 503,
                detail: "overloaded".into()
            }
        );
        assert_eq!(provider.client().completion_endpoints().len(), 1);
    }

    #[test]
    fn request_carries_prompt_and_sampling_parameters() {
        let client = ScriptedClient::new(&["http://a"])
            .with_completion(Ok(linear_story_json(2, 0).to_string()));
        let provider = provider(client);
        let spec = PromptSpec {
            temperature: 0.2,
            max_tokens: 1234,
            ..PromptSpec::default()
        };

        provider.fetch_story(&spec).unwrap();
        let request = provider.client().last_request().unwrap();
        assert_eq!(request.model, "local-model");
        assert_eq!(request.max_tokens, 1234);
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert!(request.messages[0].content.contains("Required JSON structure"));
        assert_eq!(request.response_format.kind, "json_object");
    }

    #[test]
    fn validation_failure_is_invalid_structure() {
        let client = ScriptedClient::new(&["http://a"])
            .with_completion(Ok(r#"{"stages":{"stageNumber":1}}"#.into()));
        let err = provider(client)
            .fetch_story(&PromptSpec::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidStructure(ValidationError::MalformedRoot { .. })
        ));
    }
}
