//! Agent system for clinical requests with tool calling.
//!
//! Provides an LLM agent that computes renal function, looks up treatment
//! protocols and runs generated Python code in a sandbox before writing a
//! final clinical summary.

mod runner;
mod tools;

pub use runner::{Agent, AgentResponse, ToolCallRecord, DEFAULT_MAX_STEPS};
pub use tools::{parse_tool_call, tool_definitions, ToolCall, ToolContext};
