//! CLI entrypoint for streamchat
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Arc;
use streamchat_application::StreamRenderer;
use streamchat_infrastructure::{
    ConfigLoader, FileConfig, FileLoggingConfig, OpenAiCompletionProvider, SqliteMessageStore,
};
use streamchat_presentation::{AppState, Cli, router, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        for line in ConfigLoader::describe_sources() {
            println!("{line}");
        }
        return Ok(());
    }

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("failed to load configuration: {e}"))?
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("invalid configuration")?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = init_logging(&config.logging, cli.verbose)?;

    info!("Starting streamchat");

    // === Dependency Injection ===
    let chat_id = config.default_chat_id()?;
    let store = SqliteMessageStore::open(&config.database.path).with_context(|| {
        format!("failed to open database {}", config.database.path.display())
    })?;
    store
        .ensure_chat(chat_id)
        .await
        .context("failed to create default chat")?;

    let provider = OpenAiCompletionProvider::from_config(&config.provider)
        .context("failed to create completion provider")?;

    let shutdown = CancellationToken::new();
    let renderer = StreamRenderer::with_shutdown(shutdown.clone());
    let state = AppState::new(
        Arc::new(store),
        Arc::new(provider),
        config.chat.prompt_config(),
        renderer,
    )
    .with_default_chat(chat_id);

    if !config.server.static_dir.is_dir() {
        warn!(
            "Static directory {} not found; the client bundle will not load",
            config.server.static_dir.display()
        );
    }
    let app = router(state, &config.server.static_dir);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
            shutdown.cancel();
        }
    });

    serve(listener, app, shutdown).await?;
    Ok(())
}

fn apply_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    if let Some(dir) = &cli.static_dir {
        config.server.static_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
}

/// Filter priority: `logging.filter`, then `RUST_LOG`, then `-v` count
fn init_logging(logging: &FileLoggingConfig, verbose: u8) -> Result<Option<WorkerGuard>> {
    let filter = match &logging.filter {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid logging.filter {directive:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        }),
    };

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}
