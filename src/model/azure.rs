//! Azure OpenAI chat-completions backend.

use super::{AssistantTurn, ChatModel};
use crate::config::ModelSettings;
use crate::error::{MediCoreError, Result};
use crate::openai::create_client;
use async_openai::config::AzureConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model served from an Azure OpenAI deployment.
pub struct AzureOpenAIModel {
    client: Client<AzureConfig>,
    model_id: String,
    temperature: Option<f32>,
}

impl AzureOpenAIModel {
    /// Create a model handle from settings, resolving endpoint and key from the environment.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model_id: settings.model_id.clone(),
            temperature: settings.temperature,
        })
    }

    /// Override the model id sent in requests.
    pub fn with_model_id(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }
}

#[async_trait]
impl ChatModel for AzureOpenAIModel {
    #[instrument(skip(self, messages, tools), fields(model = %self.model_id, messages = messages.len()))]
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<AssistantTurn> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_id).messages(messages.to_vec());
        if !tools.is_empty() {
            args.tools(tools.to_vec());
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args
            .build()
            .map_err(|e| MediCoreError::Model(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| MediCoreError::Model(format!("Chat completion failed: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MediCoreError::Model("No response from model".to_string()))?;

        let turn = AssistantTurn {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        };
        debug!("Model returned {} tool call(s)", turn.tool_calls.len());
        Ok(turn)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
