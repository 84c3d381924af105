use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned status {status}")]
    Api { status: StatusCode },
    #[error("model provider returned no content")]
    EmptyContent,
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),
}

impl ModelError {
    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network(err) => {
                if err.is_connect() {
                    "Could not reach the AI service. Check that the endpoint is up and reachable."
                        .to_string()
                } else if err.is_timeout() {
                    "The AI service took too long to respond. Try again shortly.".to_string()
                } else {
                    "A network error occurred while contacting the AI service. Try again later."
                        .to_string()
                }
            }
            ModelError::Api { status } => match *status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    "The AI service rejected the API key. Check the configured credentials."
                        .to_string()
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    "The AI service is rate limiting requests. Try again in a moment.".to_string()
                }
                status => format!(
                    "The AI service request failed with status {}. Try again later.",
                    status.as_u16()
                ),
            },
            ModelError::EmptyContent | ModelError::InvalidJson(_) => {
                "The AI service returned a response that could not be processed. Try again."
                    .to_string()
            }
        }
    }
}

/// A model collaborator that answers a prompt with one JSON value. The
/// agent core only ever needs this single capability, which keeps tests
/// free to script decisions directly.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete_json(&self, prompt: &str) -> Result<Value, ModelError>;
}

/// OpenAI-compatible chat-completions client pinned to JSON mode. Works
/// against any endpoint that speaks the `/chat/completions` shape.
#[derive(Clone)]
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Output JSON only.";

/// Empty completions happen on some providers under load; one extra
/// attempt is enough in practice.
const EMPTY_CONTENT_ATTEMPTS: usize = 2;

impl OpenAiChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(base_url, model, Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: 0.1,
            max_tokens: 600,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        format!("{trimmed}/chat/completions")
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, ModelError> {
        let payload = ChatCompletionRequest {
            model: self.model.as_str(),
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            stream: false,
        };

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Api { status });
        }
        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ModelError::EmptyContent);
        }
        Ok(content)
    }
}

#[async_trait]
impl ModelProvider for OpenAiChatClient {
    async fn complete_json(&self, prompt: &str) -> Result<Value, ModelError> {
        info!(model = self.model.as_str(), url = %self.endpoint(), "sending model request");
        let mut content = None;
        for attempt in 1..=EMPTY_CONTENT_ATTEMPTS {
            match self.complete_once(prompt).await {
                Ok(text) => {
                    content = Some(text);
                    break;
                }
                Err(ModelError::EmptyContent) if attempt < EMPTY_CONTENT_ATTEMPTS => {
                    warn!(attempt, "model returned empty content, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        let content = content.ok_or(ModelError::EmptyContent)?;
        debug!(chars = content.len(), "received model content");
        serde_json::from_str(&content).map_err(|err| ModelError::InvalidJson(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionContent {
    #[serde(default)]
    content: String,
}
