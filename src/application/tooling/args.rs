use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_TITLE_CHARS: usize = 200;
const MAX_SEARCH_LIMIT: u32 = 20;

/// One field-level validation error, serialized into
/// `ToolResult.error.details` so the model can see what to fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Typed argument schema for a tool: structural decode via serde followed
/// by range/content checks.
pub trait ToolArgs: DeserializeOwned {
    fn validate(self) -> Result<Self, Vec<FieldError>>
    where
        Self: Sized;
}

/// Decodes and validates `args` against `T`. Decode failures surface as a
/// single error on the `args` field; semantic failures keep their field name.
pub fn parse<T: ToolArgs>(args: &Value) -> Result<T, Vec<FieldError>> {
    let decoded: T = serde_json::from_value(args.clone())
        .map_err(|err| vec![FieldError::new("args", err.to_string())])?;
    decoded.validate()
}

fn default_search_limit() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchNotesArgs {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

impl ToolArgs for SearchNotesArgs {
    fn validate(self) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.query.trim().is_empty() {
            errors.push(FieldError::new("query", "must not be empty"));
        }
        if self.limit < 1 || self.limit > MAX_SEARCH_LIMIT {
            errors.push(FieldError::new(
                "limit",
                format!("must be between 1 and {MAX_SEARCH_LIMIT}"),
            ));
        }
        if errors.is_empty() { Ok(self) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetNoteArgs {
    pub note_id: u64,
}

impl ToolArgs for GetNoteArgs {
    fn validate(self) -> Result<Self, Vec<FieldError>> {
        if self.note_id < 1 {
            return Err(vec![FieldError::new("note_id", "must be at least 1")]);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateNoteArgs {
    pub title: String,
    pub content: String,
}

impl ToolArgs for CreateNoteArgs {
    fn validate(self) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push(FieldError::new("title", "must not be empty"));
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            errors.push(FieldError::new(
                "title",
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }
        if self.content.trim().is_empty() {
            errors.push(FieldError::new("content", "must not be empty"));
        }
        if errors.is_empty() { Ok(self) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateNoteArgs {
    pub note_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ToolArgs for UpdateNoteArgs {
    fn validate(self) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.note_id < 1 {
            errors.push(FieldError::new("note_id", "must be at least 1"));
        }
        if self.title.is_none() && self.content.is_none() {
            errors.push(FieldError::new(
                "args",
                "at least one of title/content must be provided",
            ));
        }
        if let Some(title) = &self.title {
            if title.chars().count() > MAX_TITLE_CHARS {
                errors.push(FieldError::new(
                    "title",
                    format!("must be at most {MAX_TITLE_CHARS} characters"),
                ));
            }
        }
        if errors.is_empty() { Ok(self) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteNoteArgs {
    pub note_id: u64,
}

impl ToolArgs for DeleteNoteArgs {
    fn validate(self) -> Result<Self, Vec<FieldError>> {
        if self.note_id < 1 {
            return Err(vec![FieldError::new("note_id", "must be at least 1")]);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn search_args_default_limit_and_bounds() {
        let ok: SearchNotesArgs = parse(&json!({"query": "okr"})).expect("valid");
        assert_eq!(ok.limit, 5);

        let errs = parse::<SearchNotesArgs>(&json!({"query": "okr", "limit": 999}))
            .expect_err("limit out of range");
        assert_eq!(errs[0].field, "limit");

        let errs =
            parse::<SearchNotesArgs>(&json!({"query": "  "})).expect_err("blank query");
        assert_eq!(errs[0].field, "query");
    }

    #[test]
    fn update_args_require_at_least_one_field() {
        let errs = parse::<UpdateNoteArgs>(&json!({"note_id": 3})).expect_err("nothing to change");
        assert!(errs.iter().any(|e| e.message.contains("at least one")));

        let ok: UpdateNoteArgs =
            parse(&json!({"note_id": 3, "content": "new"})).expect("content alone is fine");
        assert_eq!(ok.content.as_deref(), Some("new"));
    }

    #[test]
    fn decode_failures_report_the_args_field() {
        let errs = parse::<GetNoteArgs>(&json!({"note_id": "seven"})).expect_err("wrong type");
        assert_eq!(errs[0].field, "args");

        let errs = parse::<GetNoteArgs>(&json!({})).expect_err("missing field");
        assert_eq!(errs[0].field, "args");
    }

    #[test]
    fn title_length_is_bounded() {
        let long = "x".repeat(201);
        let errs = parse::<CreateNoteArgs>(&json!({"title": long, "content": "c"}))
            .expect_err("title too long");
        assert_eq!(errs[0].field, "title");
    }
}
