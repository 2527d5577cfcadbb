//! Test doubles shared by unit tests.

use crate::error::{MediCoreError, Result};
use crate::model::{AssistantTurn, ChatModel};
use crate::sandbox::{CodeExecutor, ExecutionOutput};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestMessage, ChatCompletionTool,
    ChatCompletionToolType, FunctionCall,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays a fixed list of assistant turns and records message counts.
pub struct ScriptedModel {
    turns: Mutex<VecDeque<AssistantTurn>>,
    pub calls: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<AssistantTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        _tools: &[ChatCompletionTool],
    ) -> Result<AssistantTurn> {
        self.calls.lock().unwrap().push(messages.len());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| MediCoreError::Model("script exhausted".to_string()))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Executor that accepts any code and prints nothing.
pub struct NoopExecutor;

#[async_trait]
impl CodeExecutor for NoopExecutor {
    async fn execute(&self, _code: &str) -> Result<ExecutionOutput> {
        Ok(ExecutionOutput::default())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// A function tool call as the model would emit it.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: id.to_string(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

/// An assistant turn that only requests tools.
pub fn tools_turn(calls: Vec<ChatCompletionMessageToolCall>) -> AssistantTurn {
    AssistantTurn {
        content: None,
        tool_calls: calls,
    }
}
