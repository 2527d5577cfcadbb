//! Agent runner with tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::config::{Prompts, Settings};
use crate::error::{MediCoreError, Result};
use crate::model::{AzureOpenAIModel, ChatModel};
use crate::sandbox::{self, ImportPolicy};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default number of model calls per run.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Agent that answers clinical requests by calling tools.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolContext,
    definitions: Vec<ChatCompletionTool>,
    max_steps: usize,
    prompts: Prompts,
    custom_system_prompt: Option<String>,
}

impl Agent {
    /// Create a new agent with the given model and tool context.
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolContext) -> Self {
        let definitions = tool_definitions(&tools.imports);
        Self {
            model,
            tools,
            definitions,
            max_steps: DEFAULT_MAX_STEPS,
            prompts: Prompts::default(),
            custom_system_prompt: None,
        }
    }

    /// Build the agent described by settings: Azure model, configured sandbox,
    /// import allow-list, step limit and prompts.
    pub fn from_settings(settings: &Settings, model_override: Option<&str>) -> Result<Self> {
        let mut model = AzureOpenAIModel::from_settings(&settings.model)?;
        if let Some(model_id) = model_override {
            model = model.with_model_id(model_id);
        }

        let executor = sandbox::from_settings(&settings.sandbox)?;
        let imports = ImportPolicy::new(&settings.agent.additional_authorized_imports);
        let tools = ToolContext::new(executor, imports);

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        Ok(Self::new(Arc::new(model), tools)
            .with_prompts(prompts)
            .with_max_steps(settings.agent.max_steps))
    }

    /// Use these prompt templates for the system prompt.
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set a fixed system prompt, bypassing the templates.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.custom_system_prompt = Some(prompt.to_string());
        self
    }

    /// System prompt sent at the start of every run.
    pub fn system_prompt(&self) -> String {
        match &self.custom_system_prompt {
            Some(prompt) => prompt.clone(),
            None => render_system_prompt(&self.prompts, &self.tools, self.max_steps),
        }
    }

    /// Set the maximum number of model calls per run.
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Maximum number of model calls per run.
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Name of the code executor backing the python tool.
    pub fn executor_name(&self) -> &'static str {
        self.tools.executor.name()
    }

    /// Release sandbox resources held by the executor.
    pub async fn shutdown(&self) -> Result<()> {
        self.tools.executor.shutdown().await
    }

    /// Run the agent on a free-text request.
    ///
    /// Stateful executors get a private copy for the run, released when it ends.
    #[instrument(skip(self, query), fields(model = %self.model.model_id()))]
    pub async fn run(&self, query: &str) -> Result<AgentResponse> {
        let Some(executor) = self.tools.executor.scoped() else {
            return self.run_with(&self.tools, query).await;
        };

        let tools = self.tools.with_executor(executor.clone());
        let result = self.run_with(&tools, query).await;
        if let Err(e) = executor.shutdown().await {
            warn!("Failed to release sandbox: {}", e);
        }
        result
    }

    async fn run_with(&self, tools: &ToolContext, query: &str) -> Result<AgentResponse> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Agent run {} started", run_id);

        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt())
                .build()
                .map_err(|e| MediCoreError::Agent(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(query.to_string())
                .build()
                .map_err(|e| MediCoreError::Agent(e.to_string()))?
                .into(),
        ];

        let mut iterations = 0;
        let mut steps = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_steps {
                return Err(MediCoreError::MaxSteps(self.max_steps));
            }

            debug!("Agent step {}/{}", iterations, self.max_steps);

            let turn = self.model.complete(&messages, &self.definitions).await?;

            if !turn.wants_tools() {
                info!(
                    "Agent run {} finished after {} step(s), {} tool call(s)",
                    run_id,
                    iterations,
                    steps.len()
                );
                return Ok(AgentResponse {
                    run_id,
                    model: self.model.model_id().to_string(),
                    content: turn.content.unwrap_or_default(),
                    steps,
                    iterations,
                    started_at,
                });
            }

            // Add assistant message with tool calls to history
            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.tool_calls(turn.tool_calls.clone());
            if let Some(content) = turn.content.as_ref().filter(|c| !c.is_empty()) {
                assistant.content(content.clone());
            }
            messages.push(
                assistant
                    .build()
                    .map_err(|e| MediCoreError::Agent(e.to_string()))?
                    .into(),
            );

            for tool_call in &turn.tool_calls {
                let record = self.execute_tool_call(tools, tool_call, iterations).await;

                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&tool_call.id)
                    .content(record.result.clone())
                    .build()
                    .map_err(|e| MediCoreError::Agent(e.to_string()))?;
                messages.push(tool_msg.into());

                steps.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(
        &self,
        tools: &ToolContext,
        tool_call: &ChatCompletionMessageToolCall,
        step: usize,
    ) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        let (result, success) = match parse_tool_call(name, arguments) {
            Ok(tool) => match tools.execute(&tool).await {
                Ok(output) => (output, true),
                Err(e) => (format!("Tool error: {}", e), false),
            },
            Err(e) => (format!("Failed to parse tool call: {}", e), false),
        };

        ToolCallRecord {
            step,
            name: name.clone(),
            arguments: arguments.clone(),
            result,
            success,
        }
    }
}

/// Fill the system prompt template with the tool list and limits.
fn render_system_prompt(prompts: &Prompts, tools: &ToolContext, max_steps: usize) -> String {
    let tool_list = tool_definitions(&tools.imports)
        .iter()
        .map(|t| {
            format!(
                "- {}: {}",
                t.function.name,
                t.function.description.clone().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut vars = HashMap::new();
    vars.insert("tools".to_string(), tool_list);
    vars.insert(
        "authorized_imports".to_string(),
        tools.imports.allowed().join(", "),
    );
    vars.insert("max_steps".to_string(), max_steps.to_string());
    prompts.render_with_custom(&prompts.agent.system, &vars)
}

/// Response from an agent run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    /// Identifier of this run, also recorded in logs.
    pub run_id: Uuid,
    /// Model that produced the answer.
    pub model: String,
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub steps: Vec<ToolCallRecord>,
    /// Number of model calls used.
    pub iterations: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// Step (model call) that requested the tool.
    pub step: usize,
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool, or the error text fed back to the model.
    pub result: String,
    /// Whether the tool ran without error.
    pub success: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
