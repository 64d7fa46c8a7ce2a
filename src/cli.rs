use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytca",
    about = "YouTube comment analyzer",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Config file (default: ~/.config/ytca/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides config `bind`)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Analyze one video and print the report
    Analyze {
        /// YouTube video URL or video ID
        url: String,

        /// Number of comments to fetch (default from config)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Also generate the LLM summary, demands and suggestions
        #[arg(long)]
        ai: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}
