use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use log::info;

mod cli;

use cli::{Cli, Command};
use ytca::analysis::Analyzer;
use ytca::config::Config;
use ytca::server::{self, AppState};

fn setup_logging(to_stderr: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if to_stderr {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytca.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytca")
        .join("logs")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.log_stderr)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let analyzer = Analyzer::from_config(&config)?;
            let state = Arc::new(AppState { analyzer, config });

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .wrap_err_with(|| format!("cannot bind {bind}"))?;
            eprintln!("Listening on {}", listener.local_addr()?);
            server::serve(listener, state).await?;
        }
        Command::Analyze { url, limit, ai, json } => {
            let limit = config.clamp_limit(limit.unwrap_or(config.default_comment_limit));
            let analyzer = Analyzer::from_config(&config)?;

            info!("Analyzing {url} (limit {limit})");
            let report = analyzer.analyze(&url, limit, ai).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", ytca::output::render_text(&report));
            }
        }
    }

    Ok(())
}
