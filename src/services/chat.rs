//! General chat through rig-core.

use std::sync::Arc;

use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::ExposeSecret;

use crate::config::{ChatConfig, ChatProvider};
use crate::dispatch::ChatResponder;
use crate::error::{CollaboratorError, LlmError};

const PREAMBLE: &str = "You are a concise, friendly assistant. \
Answer the user's message directly in plain text.";

const MAX_TOKENS: u64 = 1024;

/// Chat responder over any rig completion model.
pub struct RigChat<M: CompletionModel> {
    agent: Agent<M>,
    provider: &'static str,
    model: String,
}

impl<M: CompletionModel> RigChat<M> {
    pub fn new(agent: Agent<M>, provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            agent,
            provider,
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<M> ChatResponder for RigChat<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.provider
    }

    async fn reply(&self, text: &str) -> Result<String, CollaboratorError> {
        let reply = self
            .agent
            .prompt(text)
            .await
            .map_err(|e| CollaboratorError::request_failed(self.provider, e))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(CollaboratorError::invalid_response(
                self.provider,
                "empty completion",
            ));
        }
        Ok(reply.to_string())
    }
}

/// Create the chat collaborator from configuration.
///
/// Must be called from within a Tokio runtime: building a rig agent spawns
/// its tool server.
pub fn create_chat(config: &ChatConfig) -> Result<Arc<dyn ChatResponder>, LlmError> {
    match config.provider {
        ChatProvider::Anthropic => create_anthropic_chat(config),
        ChatProvider::OpenAi => create_openai_chat(config),
    }
}

fn create_anthropic_chat(config: &ChatConfig) -> Result<Arc<dyn ChatResponder>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(PREAMBLE)
        .max_tokens(MAX_TOKENS)
        .build();
    tracing::info!("Chat via Anthropic (model: {})", config.model);
    Ok(Arc::new(RigChat::new(agent, "anthropic", &config.model)))
}

fn create_openai_chat(config: &ChatConfig) -> Result<Arc<dyn ChatResponder>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(PREAMBLE)
        .max_tokens(MAX_TOKENS)
        .build();
    tracing::info!("Chat via OpenAI (model: {})", config.model);
    Ok(Arc::new(RigChat::new(agent, "openai", &config.model)))
}
