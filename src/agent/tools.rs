//! Tool definitions and implementations for the clinical agent.

use crate::clinical::{
    calculate_renal_function, clinical_guidelines, retrieve_medical_knowledge, DEFAULT_AGE,
    DEFAULT_CREATININE, DEFAULT_GENDER,
};
use crate::error::{MediCoreError, Result};
use crate::sandbox::{CodeExecutor, ImportPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Available tools for the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Estimate GFR to help with drug dosing.
    CalculateRenalFunction {
        creatinine: f64,
        age: f64,
        gender: String,
    },

    /// Treatment protocol for a condition.
    GetClinicalGuidelines { condition: String },

    /// Search clinical registers and knowledge bases.
    MedicalKnowledgeRetriever { query: String },

    /// Run Python code in the sandbox.
    PythonInterpreter { code: String },
}

impl ToolCall {
    /// Tool name as the model sees it.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CalculateRenalFunction { .. } => "calculate_renal_function",
            ToolCall::GetClinicalGuidelines { .. } => "get_clinical_guidelines",
            ToolCall::MedicalKnowledgeRetriever { .. } => "medical_knowledge_retriever",
            ToolCall::PythonInterpreter { .. } => "python_interpreter",
        }
    }
}

/// Tool execution context with access to the code sandbox.
#[derive(Clone)]
pub struct ToolContext {
    pub executor: Arc<dyn CodeExecutor>,
    pub imports: ImportPolicy,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(executor: Arc<dyn CodeExecutor>, imports: ImportPolicy) -> Self {
        Self { executor, imports }
    }

    /// Same import policy, different executor.
    pub fn with_executor(&self, executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            executor,
            imports: self.imports.clone(),
        }
    }

    /// Execute a tool call and return the result as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        match tool {
            ToolCall::CalculateRenalFunction {
                creatinine,
                age,
                gender,
            } => calculate_renal_function(*creatinine, *age, gender),
            ToolCall::GetClinicalGuidelines { condition } => Ok(clinical_guidelines(condition)),
            ToolCall::MedicalKnowledgeRetriever { query } => {
                Ok(retrieve_medical_knowledge(query))
            }
            ToolCall::PythonInterpreter { code } => self.execute_python(code).await,
        }
    }

    async fn execute_python(&self, code: &str) -> Result<String> {
        if let Err(e) = self.imports.check(code) {
            warn!("Rejected generated code: {}", e);
            return Err(e);
        }
        let output = self.executor.execute(code).await?;
        Ok(output.render())
    }
}

/// Get OpenAI function/tool definitions for the agent.
pub fn tool_definitions(imports: &ImportPolicy) -> Vec<async_openai::types::ChatCompletionTool> {
    use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};

    vec![
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "calculate_renal_function".to_string(),
                description: Some(
                    "Calculates GFR (Glomerular Filtration Rate) to help with drug dosing."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "creatinine": {
                            "type": "number",
                            "description": "Serum creatinine in mg/dL."
                        },
                        "age": {
                            "type": "integer",
                            "description": "Patient age in years."
                        },
                        "gender": {
                            "type": "string",
                            "description": "Patient gender ('male' or 'female')."
                        }
                    },
                    "required": ["creatinine", "age", "gender"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "get_clinical_guidelines".to_string(),
                description: Some(
                    "Retrieves official treatment protocols for a specific condition.".to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "condition": {
                            "type": "string",
                            "description": "The medical condition (e.g., 'Hypertension')."
                        }
                    },
                    "required": ["condition"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "medical_knowledge_retriever".to_string(),
                description: Some(
                    "Searches clinical registers and knowledge bases for the query.".to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The medical term or symptom to research."
                        }
                    },
                    "required": ["query"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "python_interpreter".to_string(),
                description: Some(format!(
                    "Runs Python code in a secure remote sandbox and returns what it prints. \
                    Only these modules may be imported: {}.",
                    imports.allowed().join(", ")
                )),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "code": {
                            "type": "string",
                            "description": "Python source to execute. Use print() to see values."
                        }
                    },
                    "required": ["code"]
                })),
                strict: None,
            },
        },
    ]
}

/// Parse a tool call from the OpenAI response format.
///
/// Missing calculator arguments fall back to defaults instead of failing.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = if arguments.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(arguments)
            .map_err(|e| MediCoreError::Agent(format!("Invalid tool arguments: {}", e)))?
    };

    match name {
        "calculate_renal_function" => {
            let creatinine = number_arg(&args, "creatinine")?.unwrap_or(DEFAULT_CREATININE);
            let age = number_arg(&args, "age")?.unwrap_or(DEFAULT_AGE);
            let gender = args["gender"]
                .as_str()
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(DEFAULT_GENDER)
                .to_string();
            Ok(ToolCall::CalculateRenalFunction {
                creatinine,
                age,
                gender,
            })
        }
        "get_clinical_guidelines" => Ok(ToolCall::GetClinicalGuidelines {
            condition: string_arg(&args, "condition")?,
        }),
        "medical_knowledge_retriever" => Ok(ToolCall::MedicalKnowledgeRetriever {
            query: string_arg(&args, "query")?,
        }),
        "python_interpreter" => Ok(ToolCall::PythonInterpreter {
            code: string_arg(&args, "code")?,
        }),
        _ => Err(MediCoreError::Agent(format!("Unknown tool: {}", name))),
    }
}

fn string_arg(args: &serde_json::Value, key: &str) -> Result<String> {
    args[key]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| MediCoreError::Agent(format!("Missing '{}' argument", key)))
}

/// Numeric argument that may arrive as a number or a numeric string.
fn number_arg(args: &serde_json::Value, key: &str) -> Result<Option<f64>> {
    match &args[key] {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => Ok(n.as_f64()),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            MediCoreError::InvalidInput(format!("'{}' must be a number, got {:?}", key, s))
        }),
        other => Err(MediCoreError::InvalidInput(format!(
            "'{}' must be a number, got {}",
            key, other
        ))),
    }
}
