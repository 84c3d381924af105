use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// One decision produced by the model: either invoke a tool or finish the
/// run with an answer. The `type` field is the wire discriminant and the
/// only accepted values are `"tool"` and `"final"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "tool")]
    Tool {
        tool_name: String,
        #[serde(default)]
        #[schema(value_type = Object)]
        args: Map<String, Value>,
    },
    #[serde(rename = "final")]
    Final {
        answer: String,
        #[serde(default)]
        citations: Vec<String>,
    },
}

impl Action {
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Action::Tool { tool_name, .. } => Some(tool_name),
            Action::Final { .. } => None,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Action::Final { .. })
    }
}

/// Structured failure attached to a [`ToolResult`]. `details` carries
/// field-level validation errors or domain context, `null` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolFault {
    pub code: String,
    pub message: String,
    #[schema(value_type = Object)]
    pub details: Value,
}

impl ToolFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Normalized outcome of one tool dispatch. `data` is present iff `ok`,
/// `error` is present iff not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolResult {
    pub ok: bool,
    pub tool_name: String,
    pub cost_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFault>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, cost_ms: f64, data: Value) -> Self {
        Self {
            ok: true,
            tool_name: tool_name.into(),
            cost_ms,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, cost_ms: f64, fault: ToolFault) -> Self {
        Self {
            ok: false,
            tool_name: tool_name.into(),
            cost_ms,
            data: None,
            error: Some(fault),
        }
    }
}

/// One completed loop iteration: the action the model chose and the
/// observation that came back. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Step {
    pub step: u32,
    pub action: Action,
    pub observation: ToolResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoppedReason {
    #[default]
    None,
    Final,
    MaxSteps,
    Error,
}

impl StoppedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoppedReason::None => "none",
            StoppedReason::Final => "final",
            StoppedReason::MaxSteps => "max_steps",
            StoppedReason::Error => "error",
        }
    }
}

/// The whole loop state, threaded through every iteration and persisted by
/// the checkpoint store after each transition. Becomes immutable once
/// `stopped_reason` is anything other than `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub request: String,
    pub steps: Vec<Step>,
    pub action: Option<Action>,
    pub answer: String,
    pub citations: Vec<String>,
    pub iterations: u32,
    pub stopped_reason: StoppedReason,
}

impl AgentState {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            steps: Vec::new(),
            action: None,
            answer: String::new(),
            citations: Vec::new(),
            iterations: 0,
            stopped_reason: StoppedReason::None,
        }
    }

    /// Re-arms a resumed state for a fresh run: the prior steps and the
    /// iteration counter survive, transient decision output does not.
    pub fn begin_run(&mut self, request: impl Into<String>) {
        self.request = request.into();
        self.action = None;
        self.answer.clear();
        self.citations.clear();
        self.stopped_reason = StoppedReason::None;
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }
}

/// Structured result handed back to the caller of a run. Raw errors never
/// cross this boundary; failures arrive as `stopped_reason = "error"`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunOutcome {
    pub thread_id: String,
    pub answer: String,
    pub citations: Vec<String>,
    pub steps: Vec<Step>,
    pub stopped_reason: StoppedReason,
    pub cost_ms: f64,
}

/// Read-only view of a persisted thread, served without mutating the
/// stored state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThreadStateView {
    pub thread_id: String,
    pub steps_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observation_ok: Option<bool>,
    pub next: Vec<String>,
}
