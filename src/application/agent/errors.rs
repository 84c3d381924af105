use serde_json::Value;
use thiserror::Error;

use super::prompts::UnknownPrompt;
use crate::application::checkpoint::CheckpointError;
use crate::infrastructure::model::ModelError;

/// A model decision that failed schema or engineering-constraint
/// validation. Recovered locally by the one-shot repair round-trip; if that
/// also fails it escalates to [`DecisionError::DecisionFailed`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct InvalidAction {
    pub message: String,
    pub details: Option<Value>,
}

impl InvalidAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Error)]
pub enum DecisionError {
    /// Transport or content failure from the model collaborator; fatal to
    /// the decision step and not repaired here.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
    /// Both the original output and the repair attempt failed validation.
    #[error("model output failed validation after one repair attempt: {0}")]
    DecisionFailed(InvalidAction),
}

impl DecisionError {
    pub fn user_message(&self) -> String {
        match self {
            DecisionError::Model(err) => err.user_message(),
            DecisionError::DecisionFailed(_) => {
                "The model kept producing output that could not be validated. Try rephrasing the request.".to_string()
            }
        }
    }
}

/// Run-level failures that cannot be folded into a structured outcome.
/// Decision and model failures are not here: the runner reports those as
/// `stopped_reason = "error"` instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Prompt(#[from] UnknownPrompt),
}
