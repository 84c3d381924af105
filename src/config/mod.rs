use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::agent::CreateIntentConfig;

const DEFAULT_CONFIG_PATH: &str = "config/carnet.toml";
const API_KEY_ENV: &str = "CARNET_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";
const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Qwen-32B";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    /// Prefer the CARNET_API_KEY environment variable over putting the key
    /// in the file; see [`ModelConfig::resolved_api_key`].
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_s: f64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_s: 30.0,
            max_tokens: 600,
            temperature: 0.1,
        }
    }
}

impl ModelConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV).ok().or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub memory_max_steps: usize,
    /// Checkpoints live in memory unless a directory is configured.
    pub checkpoint_dir: Option<PathBuf>,
    /// Replaces the default decision template's text when set.
    pub prompt_template: Option<String>,
    pub create_intent: CreateIntentConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            memory_max_steps: 20,
            checkpoint_dir: None,
            prompt_template: None,
            create_intent: CreateIntentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads from an explicit path, or from the default path when it
    /// exists, or falls back to defaults. An explicit path that cannot be
    /// read is an error; a missing default path is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
