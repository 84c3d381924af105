mod application;
mod cli;
mod config;
mod domain;
mod infrastructure;

use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use application::agent::{AgentRunner, RunOptions};
use application::checkpoint::{CheckpointStore, FileCheckpointer, MemoryCheckpointer};
use application::notes::NoteStore;
use application::tooling::ToolRegistry;
use cli::{Cli, RunMode};
use config::AppConfig;
use infrastructure::model::OpenAiChatClient;
use infrastructure::server::{self, ServerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("starting carnet");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, thread = ?cli.thread, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    if let Some(base_url) = cli.base_url.clone() {
        config.model.base_url = base_url;
    }
    if let Some(model) = cli.model.clone() {
        config.model.model = model;
    }
    if let Some(max_steps) = cli.max_steps {
        config.agent.max_steps = max_steps;
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(config.model.timeout_s))
        .build()?;
    let provider = Arc::new(
        OpenAiChatClient::with_client(
            config.model.base_url.clone(),
            config.model.model.clone(),
            http,
        )
        .with_api_key(config.model.resolved_api_key())
        .with_sampling(config.model.temperature, config.model.max_tokens),
    );

    let notes = Arc::new(NoteStore::new());
    let registry = Arc::new(ToolRegistry::builtin());
    let checkpoints: Arc<dyn CheckpointStore> = match &config.agent.checkpoint_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using file checkpoints");
            Arc::new(FileCheckpointer::new(dir)?)
        }
        None => Arc::new(MemoryCheckpointer::default()),
    };

    let runner = Arc::new(
        AgentRunner::new(provider, notes.clone(), registry, checkpoints)
            .with_memory_max_steps(config.agent.memory_max_steps)
            .with_create_intent(config.agent.create_intent.clone())
            .with_prompt_override(config.agent.prompt_template.clone()),
    );

    match cli.mode {
        RunMode::Agent => {
            let request = load_request(&cli)?;
            let options = RunOptions {
                thread_id: cli.thread.clone(),
                max_steps: config.agent.max_steps,
                prompt_key: cli.prompt_key.clone(),
            };
            info!(max_steps = options.max_steps, "executing agent run");
            let outcome = runner.run(&request, options).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "starting REST server");
            let state = Arc::new(ServerState::new(runner, notes));
            server::serve(state, cli.rest_addr).await?;
        }
    }
    info!("carnet finished");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_request(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.request_file {
        info!(path = %path, "loading request from file");
        let content = fs::read_to_string(path)?;
        return Ok(content.trim().to_string());
    }

    if !cli.request.is_empty() {
        return Ok(cli.request.join(" ").trim().to_string());
    }

    if atty::isnt(atty::Stream::Stdin) {
        info!("reading request from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer.trim().to_string());
    }

    warn!("request not provided via arguments, file, or stdin");
    Err("request required via arguments, file, or stdin".into())
}
