use serde::{Deserialize, Serialize};
use serde_json::{Map, json};

use crate::domain::types::Action;

/// Heuristics for routing an explicit "create a note" request straight to
/// the create tool on the first iteration, instead of trusting the model to
/// pick it. All lists are configuration data so deployments can retune them
/// without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateIntentConfig {
    /// Substrings that signal create intent, matched case-insensitively.
    pub trigger_words: Vec<String>,
    /// Markers whose following text (up to punctuation) becomes the title.
    pub title_markers: Vec<String>,
    /// Markers whose following text becomes the content.
    pub content_markers: Vec<String>,
    /// Title used when no title marker is present in the request.
    pub fallback_title: String,
}

impl Default for CreateIntentConfig {
    fn default() -> Self {
        Self {
            trigger_words: vec![
                "创建".to_string(),
                "新增".to_string(),
                "记录".to_string(),
                "create".to_string(),
            ],
            title_markers: vec!["标题为".to_string(), "titled ".to_string()],
            content_markers: vec![
                "内容为：".to_string(),
                "内容为:".to_string(),
                "with content ".to_string(),
            ],
            fallback_title: "untitled".to_string(),
        }
    }
}

/// Overrides the model's first decision when the request plainly asks to
/// create a note. Applies only on iteration zero; later iterations belong
/// to the model. Passes create_note calls and everything on later
/// iterations through untouched.
pub fn apply(request: &str, iterations: u32, action: Action, cfg: &CreateIntentConfig) -> Action {
    if iterations != 0 || !has_create_intent(request, cfg) {
        return action;
    }
    if action.tool_name() == Some("create_note") {
        return action;
    }

    let title = extract_after(request, &cfg.title_markers)
        .map(take_title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| cfg.fallback_title.clone());
    let content = extract_after(request, &cfg.content_markers)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| request.trim().to_string());

    let mut args = Map::new();
    args.insert("title".to_string(), json!(title));
    args.insert("content".to_string(), json!(content));
    Action::Tool {
        tool_name: "create_note".to_string(),
        args,
    }
}

fn has_create_intent(request: &str, cfg: &CreateIntentConfig) -> bool {
    let lowered = request.to_lowercase();
    cfg.trigger_words
        .iter()
        .any(|word| lowered.contains(&word.to_lowercase()))
}

/// Text following the first matching marker, or `None`.
fn extract_after<'a>(request: &'a str, markers: &[String]) -> Option<&'a str> {
    markers.iter().find_map(|marker| {
        request
            .find(marker.as_str())
            .map(|at| &request[at + marker.len()..])
    })
}

/// A title runs to the first whitespace or sentence punctuation after the
/// marker.
fn take_title(rest: &str) -> String {
    rest.trim_start()
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '，' | '。' | ',' | '.'))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn final_action() -> Action {
        Action::Final {
            answer: "ok".to_string(),
            citations: vec![],
        }
    }

    #[test]
    fn english_create_request_forces_create_note() {
        let cfg = CreateIntentConfig::default();
        let action = apply(
            "create a note titled groceries with content milk and eggs",
            0,
            final_action(),
            &cfg,
        );
        match action {
            Action::Tool { tool_name, args } => {
                assert_eq!(tool_name, "create_note");
                assert_eq!(args["title"], json!("groceries"));
                assert_eq!(args["content"], json!("milk and eggs"));
            }
            _ => panic!("expected forced create_note"),
        }
    }

    #[test]
    fn chinese_create_request_forces_create_note() {
        let cfg = CreateIntentConfig::default();
        let action = apply("创建一条笔记，标题为购物，内容为：牛奶和鸡蛋", 0, final_action(), &cfg);
        match action {
            Action::Tool { tool_name, args } => {
                assert_eq!(tool_name, "create_note");
                assert_eq!(args["title"], json!("购物"));
                assert_eq!(args["content"], json!("牛奶和鸡蛋"));
            }
            _ => panic!("expected forced create_note"),
        }
    }

    #[test]
    fn missing_markers_fall_back_to_defaults() {
        let cfg = CreateIntentConfig::default();
        let action = apply("please create a note about my day", 0, final_action(), &cfg);
        match action {
            Action::Tool { args, .. } => {
                assert_eq!(args["title"], json!("untitled"));
                assert_eq!(args["content"], json!("please create a note about my day"));
            }
            _ => panic!("expected forced create_note"),
        }
    }

    #[test]
    fn later_iterations_are_left_alone() {
        let cfg = CreateIntentConfig::default();
        let action = apply("create a note titled x", 1, final_action(), &cfg);
        assert!(action.is_final());
    }

    #[test]
    fn non_create_requests_pass_through() {
        let cfg = CreateIntentConfig::default();
        let action = apply("what notes mention okr?", 0, final_action(), &cfg);
        assert!(action.is_final());
    }

    #[test]
    fn explicit_create_note_calls_pass_through() {
        let cfg = CreateIntentConfig::default();
        let mut args = Map::new();
        args.insert("title".to_string(), json!("t"));
        args.insert("content".to_string(), json!("c"));
        let original = Action::Tool {
            tool_name: "create_note".to_string(),
            args: args.clone(),
        };
        let action = apply("create a note", 0, original.clone(), &cfg);
        assert_eq!(action, original);
    }

    #[test]
    fn trigger_matching_is_case_insensitive() {
        let cfg = CreateIntentConfig::default();
        let action = apply("Create a note titled Plan", 0, final_action(), &cfg);
        match action {
            Action::Tool { tool_name, .. } => assert_eq!(tool_name, "create_note"),
            _ => panic!("expected forced create_note"),
        }
    }
}
