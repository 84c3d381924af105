pub mod args;
mod notes;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::notes::{NoteStore, NoteStoreError};
use crate::domain::types::{ToolFault, ToolResult};
use args::FieldError;
use notes::{CreateNote, DeleteNote, GetNote, SearchNotes, UpdateNote};

/// Messages from failing tools are bounded before they are fed back to the
/// model or written to logs.
const MAX_FAILURE_MESSAGE_CHARS: usize = 200;

/// A tool the model can invoke against the note store. The set is closed
/// and known at startup; implementations hold no mutable state.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shown to the model in the tool catalogue; short and stable.
    fn description(&self) -> &'static str;

    /// Argument field names, for prompt rendering.
    fn arg_fields(&self) -> &'static [&'static str];

    /// Validates raw args against this tool's schema without executing.
    fn check_args(&self, args: &Value) -> Result<(), Vec<FieldError>>;

    async fn run(&self, store: &NoteStore, args: Value) -> Result<Value, ToolFailure>;
}

/// Domain-level failure raised by a tool body. Dispatch folds these into
/// `ToolResult.error`; they never escape the loop.
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{0}")]
    Failed(String),
}

impl From<NoteStoreError> for ToolFailure {
    fn from(err: NoteStoreError) -> Self {
        match err {
            NoteStoreError::NotFound { note_id } => ToolFailure::NotFound {
                message: "Note not found".to_string(),
                details: json!({ "note_id": note_id }),
            },
        }
    }
}

/// Name-indexed set of tools, built once at startup and immutable after.
/// `dispatch` is the single choke point between the agent loop and tool
/// execution: it never fails, so a broken tool becomes an observation the
/// model can react to instead of a crashed run.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The built-in note tools.
    pub fn builtin() -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
        };
        registry.register(Arc::new(SearchNotes));
        registry.register(Arc::new(GetNote));
        registry.register(Arc::new(CreateNote));
        registry.register(Arc::new(UpdateNote));
        registry.register(Arc::new(DeleteNote));
        registry
    }

    fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Compact textual catalogue for prompt rendering:
    /// `- name: description Args: [a, b]`, one line per tool.
    pub fn catalogue(&self) -> String {
        self.tools
            .values()
            .map(|tool| {
                format!(
                    "- {}: {} Args: [{}]",
                    tool.name(),
                    tool.description(),
                    tool.arg_fields().join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn dispatch(&self, store: &NoteStore, tool_name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.tools.get(tool_name) else {
            warn!(requested_tool = %tool_name, "Unknown tool requested");
            return ToolResult::failure(
                tool_name,
                0.0,
                ToolFault::new("unknown_tool", format!("Unknown tool: {tool_name}")),
            );
        };

        if let Err(errors) = tool.check_args(&args) {
            warn!(tool = %tool_name, "Tool args validation failed");
            return ToolResult::failure(
                tool_name,
                0.0,
                ToolFault::new("invalid_args", "Tool args validation failed")
                    .with_details(json!(errors)),
            );
        }

        let started = Instant::now();
        match tool.run(store, args).await {
            Ok(data) => {
                let cost_ms = started.elapsed().as_secs_f64() * 1000.0;
                info!(tool = %tool_name, cost_ms, "Tool executed");
                ToolResult::success(tool_name, cost_ms, data)
            }
            Err(ToolFailure::NotFound { message, details }) => {
                let cost_ms = started.elapsed().as_secs_f64() * 1000.0;
                warn!(tool = %tool_name, cost_ms, "Tool target not found");
                ToolResult::failure(
                    tool_name,
                    cost_ms,
                    ToolFault::new("not_found", message).with_details(details),
                )
            }
            Err(ToolFailure::Failed(message)) => {
                let cost_ms = started.elapsed().as_secs_f64() * 1000.0;
                warn!(tool = %tool_name, cost_ms, %message, "Tool execution failed");
                ToolResult::failure(
                    tool_name,
                    cost_ms,
                    ToolFault::new("tool_exception", truncate(&message)),
                )
            }
        }
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_FAILURE_MESSAGE_CHARS).collect()
}
