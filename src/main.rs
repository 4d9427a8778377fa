use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mcp2ai::backend::{BackendSession, StdioTransport, ToolBackend};
use mcp2ai::cli::{is_exit_command, Args};
use mcp2ai::config::{Config, LOCAL_CONFIG_FILE};
use mcp2ai::error::Mcp2AiError;
use mcp2ai::logging;
use mcp2ai::model::build_adapter;
use mcp2ai::models::Conversation;
use mcp2ai::orchestrator::{Orchestrator, RunObserver};
use mcp2ai::registry::ToolRegistry;
use mcp2ai::ui;

type Session = BackendSession<StdioTransport>;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.config_init {
        match Config::init_file(Path::new(LOCAL_CONFIG_FILE)) {
            Ok(()) => {
                println!(
                    "{}",
                    format!("Wrote example configuration to {}", LOCAL_CONFIG_FILE).green()
                );
                return;
            }
            Err(e) => {
                ui::display_error(&e.to_string());
                process::exit(1);
            }
        }
    }

    let config = match Config::from_env_and_args(&args) {
        Ok(config) => config,
        Err(e) => {
            ui::display_error(&e.to_string());
            process::exit(1);
        }
    };

    logging::init(config.verbose);

    if let Err(e) = run(config).await {
        ui::display_error(&format!("{:#}", e));
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let adapter = build_adapter(&config.model)?;
    adapter.ping().await.with_context(|| {
        format!(
            "Could not reach the inference service at {} (is `ollama serve` running?)",
            config.model.endpoint
        )
    })?;
    info!(model = %config.model.model, provider = %config.model.provider, "inference service reachable");

    let (session, registry) = connect_tools(&config).await?;

    ui::display_banner(
        &config.model.model,
        &config.model.provider.to_string(),
        &config.server.display(),
    );
    ui::display_tools(&registry.list_schemas());

    let observer: RunObserver = Arc::new(ui::display_event);
    let orchestrator = Orchestrator::new(adapter, Arc::new(registry), config.orchestrator.clone())
        .with_observer(observer);

    let result = repl(&orchestrator).await;

    if let Some(session) = session {
        if let Err(e) = session.shutdown().await {
            warn!("tool server shutdown failed: {}", e);
        }
    }

    result
}

async fn connect_tools(config: &Config) -> Result<(Option<Arc<Session>>, ToolRegistry)> {
    let mut registry = ToolRegistry::new();

    if !config.tools_enabled {
        info!("tools disabled");
        return Ok((None, registry));
    }

    if config.local_tools_enabled {
        registry.register_builtin_tools()?;
    }

    let transport = StdioTransport::spawn(&config.server)
        .with_context(|| format!("Could not start tool server '{}'", config.server.display()))?;
    let session = BackendSession::connect(transport, config.backend)
        .await
        .with_context(|| {
            format!(
                "Could not connect to tool server '{}'",
                config.server.display()
            )
        })?;
    let schemas = session
        .discover()
        .await
        .context("Could not discover tools from the tool server")?;

    let session = Arc::new(session);
    let backend: Arc<dyn ToolBackend> = session.clone();
    for skipped in registry.register_backend_tools(backend, &schemas) {
        ui::display_error(&skipped.to_string());
    }

    Ok((Some(session), registry))
}

async fn repl(orchestrator: &Orchestrator) -> Result<()> {
    let mut history = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        ui::prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };

        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            break;
        }

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let mut run = orchestrator.start(history, input);
        let outcome = orchestrator.drive(&mut run, &cancel).await;
        watcher.abort();

        match outcome {
            Ok(outcome) => ui::display_answer(&outcome.answer),
            Err(Mcp2AiError::Cancelled) => println!("{}", "[Cancelled]".yellow()),
            Err(e) => ui::display_error(&e.to_string()),
        }
        history = run.into_conversation();
    }

    println!("{}", "Goodbye!".dimmed());
    Ok(())
}
