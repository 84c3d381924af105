use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "carnet",
    version,
    about = "Note-keeping agent with tool calls and resumable runs"
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<String>,
    /// OpenAI-compatible endpoint base URL; overrides the config file.
    #[arg(long)]
    pub base_url: Option<String>,
    /// Model identifier; overrides the config file.
    #[arg(long)]
    pub model: Option<String>,
    /// Thread id to resume. A fresh id is minted when omitted.
    #[arg(long)]
    pub thread: Option<String>,
    /// Overrides the configured step brake for this run.
    #[arg(long)]
    pub max_steps: Option<u32>,
    #[arg(long, default_value = "react_step_v1")]
    pub prompt_key: String,
    /// Read the request from a file instead of the arguments.
    #[arg(long)]
    pub request_file: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Agent)]
    pub mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub rest_addr: SocketAddr,
    /// The request, joined from the remaining arguments.
    #[arg()]
    pub request: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunMode {
    Agent,
    Rest,
}
