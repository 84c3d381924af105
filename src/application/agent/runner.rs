use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use super::errors::AgentError;
use super::policy::{self, CreateIntentConfig};
use super::prompts::{self, DEFAULT_PROMPT_KEY};
use super::stepper;
use crate::application::checkpoint::CheckpointStore;
use crate::application::notes::NoteStore;
use crate::application::tooling::ToolRegistry;
use crate::domain::types::{
    Action, AgentState, RunOutcome, Step, StoppedReason, ThreadStateView,
};
use crate::infrastructure::model::ModelProvider;

/// Answer returned when the step brake fires before the model finishes on
/// its own.
const STEP_LIMIT_ANSWER: &str =
    "I hit the step limit before finishing. The partial steps are recorded; \
     try narrowing the request or raising max_steps.";

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Resume an existing thread when set; omitted mints a fresh id.
    pub thread_id: Option<String>,
    pub max_steps: u32,
    pub prompt_key: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            thread_id: None,
            max_steps: 5,
            prompt_key: DEFAULT_PROMPT_KEY.to_string(),
        }
    }
}

/// Drives the decide/dispatch loop over a note store, checkpointing after
/// every state transition. Decision failures surface as structured
/// outcomes, never as errors; only checkpoint and prompt-lookup failures
/// escape as [`AgentError`].
pub struct AgentRunner<P: ModelProvider> {
    provider: Arc<P>,
    store: Arc<NoteStore>,
    registry: Arc<ToolRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    memory_max_steps: usize,
    create_intent: CreateIntentConfig,
    prompt_override: Option<String>,
}

impl<P: ModelProvider> AgentRunner<P> {
    pub fn new(
        provider: Arc<P>,
        store: Arc<NoteStore>,
        registry: Arc<ToolRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            checkpoints,
            memory_max_steps: 20,
            create_intent: CreateIntentConfig::default(),
            prompt_override: None,
        }
    }

    pub fn with_memory_max_steps(mut self, memory_max_steps: usize) -> Self {
        self.memory_max_steps = memory_max_steps.max(1);
        self
    }

    pub fn with_create_intent(mut self, create_intent: CreateIntentConfig) -> Self {
        self.create_intent = create_intent;
        self
    }

    /// Replaces the default template's text. Keyed lookups other than the
    /// default key still resolve to their registered text.
    pub fn with_prompt_override(mut self, template: Option<String>) -> Self {
        self.prompt_override = template;
        self
    }

    pub async fn run(
        &self,
        request: &str,
        options: RunOptions,
    ) -> Result<RunOutcome, AgentError> {
        let thread_id = options
            .thread_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let template = self.resolve_template(&options.prompt_key)?;
        let started = Instant::now();

        let mut state = match self.checkpoints.load(&thread_id).await? {
            Some(prior) => {
                info!(thread_id, steps = prior.steps.len(), "resuming thread");
                let mut prior = prior;
                prior.begin_run(request);
                prior
            }
            None => AgentState::new(request),
        };

        loop {
            if state.iterations >= options.max_steps {
                warn!(thread_id, iterations = state.iterations, "step limit reached");
                state.action = Some(Action::Final {
                    answer: STEP_LIMIT_ANSWER.to_string(),
                    citations: Vec::new(),
                });
                state.answer = STEP_LIMIT_ANSWER.to_string();
                state.stopped_reason = StoppedReason::MaxSteps;
                break;
            }

            let decided = stepper::decide(
                self.provider.as_ref(),
                &self.registry,
                template,
                request,
                &state.steps,
            )
            .await;
            let action = match decided {
                Ok(action) => action,
                Err(err) => {
                    warn!(thread_id, error = %err, "decision step failed");
                    state.answer = err.user_message();
                    state.stopped_reason = StoppedReason::Error;
                    break;
                }
            };
            let action =
                policy::apply(request, state.iterations, action, &self.create_intent);
            state.action = Some(action.clone());

            match action {
                Action::Final { answer, citations } => {
                    state.answer = answer;
                    state.citations = citations;
                    state.stopped_reason = StoppedReason::Final;
                    break;
                }
                Action::Tool { tool_name, args } => {
                    let observation = self
                        .registry
                        .dispatch(&self.store, &tool_name, serde_json::Value::Object(args.clone()))
                        .await;
                    info!(
                        thread_id,
                        tool = %tool_name,
                        ok = observation.ok,
                        cost_ms = observation.cost_ms,
                        "tool dispatched"
                    );
                    state.iterations += 1;
                    state.steps.push(Step {
                        step: state.iterations,
                        action: Action::Tool { tool_name, args },
                        observation,
                    });
                    trim_steps(&mut state.steps, self.memory_max_steps);
                    self.checkpoints.save(&thread_id, &state).await?;
                }
            }
        }

        self.checkpoints.save(&thread_id, &state).await?;
        Ok(RunOutcome {
            thread_id,
            answer: state.answer.clone(),
            citations: state.citations.clone(),
            steps: state.steps.clone(),
            stopped_reason: state.stopped_reason,
            cost_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// A read-only snapshot of a persisted thread, or `None` for an
    /// unknown id.
    pub async fn state(&self, thread_id: &str) -> Result<Option<ThreadStateView>, AgentError> {
        let Some(state) = self.checkpoints.load(thread_id).await? else {
            return Ok(None);
        };
        let last = state.last_step();
        Ok(Some(ThreadStateView {
            thread_id: thread_id.to_string(),
            steps_count: state.steps.len(),
            last_action: last.map(|s| s.action.clone()),
            last_observation_ok: last.map(|s| s.observation.ok),
            next: match state.stopped_reason {
                StoppedReason::None => vec!["decide".to_string()],
                _ => Vec::new(),
            },
        }))
    }

    fn resolve_template(&self, prompt_key: &str) -> Result<&str, AgentError> {
        if prompt_key == DEFAULT_PROMPT_KEY {
            if let Some(custom) = &self.prompt_override {
                return Ok(custom);
            }
        }
        Ok(prompts::template(prompt_key)?)
    }
}

/// Drops the oldest steps in place once the window overflows. The step
/// numbers on the survivors keep their original values so the trace stays
/// honest about what was forgotten.
fn trim_steps(steps: &mut Vec<Step>, memory_max_steps: usize) {
    if steps.len() > memory_max_steps {
        let overflow = steps.len() - memory_max_steps;
        steps.drain(..overflow);
    }
}
