//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for streamchat
#[derive(Parser, Debug)]
#[command(name = "streamchat")]
#[command(author, version, about = "Chat with a language model over progressively streamed HTML")]
#[command(long_about = r#"
streamchat serves a chat page whose replies stream into the document as the
model produces them. Without JavaScript the whole page streams; with the
client bundle loaded, submissions stream only the new messages.

Configuration files are loaded from (in priority order):
1. STREAMCHAT_<SECTION>__<KEY>    Environment variables
2. --config <path>                 Explicit config file
3. ./streamchat.toml               Project-level config
4. ~/.config/streamchat/config.toml   Global config

Example:
  OPENAI_API_KEY=... streamchat -v
  streamchat --bind 0.0.0.0:8080 --database /tmp/chat.db
"#)]
pub struct Cli {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// SQLite database file (overrides database.path)
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory served under /static (overrides server.static_dir)
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Model name (overrides provider.model)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
