use clap::{ Parser, Subcommand };
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Client Args ---
    /// Base URL of the chat server (the relay started with `serve`)
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://127.0.0.1:5000")]
    pub server_url: String,

    /// Model to use; overrides the previously selected one
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    // --- History Store Args ---
    /// History store type (file, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory holding the persisted conversation and selected model
    #[arg(long, env = "HISTORY_DIR", default_value = ".tokamak-chat")]
    pub history_dir: PathBuf,

    /// Directory exports are written to
    #[arg(long, env = "EXPORT_DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// Print answers without ANSI styling
    #[arg(long, env = "PLAIN_OUTPUT", default_value = "false")]
    pub plain: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    // --- Relay Server Args ---
    /// Host address and port for the relay server to listen on
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:5000")]
    pub server_addr: String,

    /// Base URL of the OpenAI-compatible upstream (e.g., https://api.example.com/v1)
    #[arg(long, env = "AI_BASE_URL")]
    pub ai_base_url: Option<String>,

    /// Default API key for the upstream. Per-model keys come from AI_API_KEY_<MODEL>.
    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    /// Comma-separated models advertised when the upstream listing is unavailable
    #[arg(long, env = "DEFAULT_MODELS", default_value = "")]
    pub default_models: String,

    /// Model used when a chat request does not name one
    #[arg(long, env = "AI_MODEL", default_value = "qwen3-235b")]
    pub fallback_model: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question, stream the answer and exit
    Ask {
        question: Vec<String>,
    },
    /// List the models offered by the server
    Models,
    /// Query the server health endpoint
    Health,
    /// Print the stored conversation
    History,
    /// Write the stored conversation to a JSON file
    Export,
    /// Delete the stored conversation
    Clear {
        /// Also forget the selected model
        #[arg(long)]
        all: bool,
    },
    /// Run the relay server in front of an OpenAI-compatible upstream
    Serve,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}
