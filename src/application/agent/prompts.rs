use thiserror::Error;

pub const DEFAULT_PROMPT_KEY: &str = "react_step_v1";

/// Step-decision template. Placeholders: `{{request}}`, `{{tools}}`,
/// `{{history}}`.
const REACT_STEP_V1: &str = r#"You are an assistant that manages a user's notes by calling tools.

User request:
{{request}}

Available tools:
{{tools}}

Previous steps (actions you took and their observations), as JSON:
{{history}}

Decide the single next step. Respond with exactly one JSON object and nothing else.
To call a tool:
{"type": "tool", "tool_name": "<name>", "args": {<arguments>}}
To finish with an answer for the user:
{"type": "final", "answer": "<answer>", "citations": ["note:<id>", ...]}

Rules:
- "type" must be "tool" or "final".
- Only use tool names from the list above, with the argument fields shown.
- Cite notes you used as "note:<id>" in citations; use [] when none apply.
"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown prompt key: {0}")]
pub struct UnknownPrompt(pub String);

/// Looks up a registered template by key. The set is closed; prompt text is
/// versioned by key so callers can pin behavior.
pub fn template(key: &str) -> Result<&'static str, UnknownPrompt> {
    match key {
        DEFAULT_PROMPT_KEY => Ok(REACT_STEP_V1),
        other => Err(UnknownPrompt(other.to_string())),
    }
}

pub fn render(template: &str, request: &str, tools: &str, history_json: &str) -> String {
    template
        .replace("{{request}}", request)
        .replace("{{tools}}", tools)
        .replace("{{history}}", history_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_resolves_and_unknown_does_not() {
        assert!(template(DEFAULT_PROMPT_KEY).is_ok());
        assert_eq!(
            template("react_step_v9"),
            Err(UnknownPrompt("react_step_v9".to_string()))
        );
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let template = template(DEFAULT_PROMPT_KEY).expect("registered");
        let rendered = render(template, "find my okr notes", "- get_note: ...", "[]");
        assert!(rendered.contains("find my okr notes"));
        assert!(rendered.contains("- get_note"));
        assert!(!rendered.contains("{{"));
    }
}
