//! Chat model abstraction for the agent loop.

mod azure;

pub use azure::AzureOpenAIModel;

use crate::error::Result;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestMessage, ChatCompletionTool,
};
use async_trait::async_trait;

/// One assistant reply: free text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ChatCompletionMessageToolCall>,
}

impl AssistantTurn {
    /// A plain text reply with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Whether the model asked for any tool calls.
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and available tools; return the next assistant turn.
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<AssistantTurn>;

    /// Model identifier, for logs and traces.
    fn model_id(&self) -> &str;
}
