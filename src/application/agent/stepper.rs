use serde_json::Value;
use tracing::warn;

use super::errors::DecisionError;
use super::prompts;
use super::validator::validate_action;
use crate::application::tooling::ToolRegistry;
use crate::domain::types::{Action, Step};
use crate::infrastructure::model::ModelProvider;

/// One decision step: render the prompt, ask the model for a JSON action,
/// validate it, and on validation failure run exactly one repair round-trip
/// before giving up. At most two model calls per invocation.
pub async fn decide<P: ModelProvider>(
    provider: &P,
    registry: &ToolRegistry,
    template: &str,
    request: &str,
    history: &[Step],
) -> Result<Action, DecisionError> {
    let history_json =
        serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".to_string());
    let prompt = prompts::render(template, request, &registry.catalogue(), &history_json);

    let first = provider.complete_json(&prompt).await?;
    let invalid = match validate_action(&first, registry) {
        Ok(action) => return Ok(action),
        Err(invalid) => invalid,
    };

    warn!(error = %invalid, "model decision failed validation, attempting repair");
    let repair_prompt = repair_prompt(&prompt, &first, &invalid.to_string());
    let second = provider.complete_json(&repair_prompt).await?;
    match validate_action(&second, registry) {
        Ok(action) => Ok(action),
        Err(invalid) => {
            warn!(error = %invalid, "repair attempt also failed validation");
            Err(DecisionError::DecisionFailed(invalid))
        }
    }
}

fn repair_prompt(original: &str, bad_output: &Value, error: &str) -> String {
    let bad_json =
        serde_json::to_string_pretty(bad_output).unwrap_or_else(|_| bad_output.to_string());
    format!(
        "Your previous output was rejected: {error}\n\
         You MUST output valid JSON ONLY, exactly one object matching the required shape.\n\n\
         {original}\n\nYour rejected output was:\n{bad_json}\n"
    )
}
