// Stdio MCP server binary

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use herald_mcp::config::ServerConfig;
use herald_mcp::services::{self, Base64Service, DemoService, MemoService};
use herald_mcp::{McpServer, Notifier};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServiceKind {
    /// sum tool, greeting prompt and a static resource
    Demo,
    /// base64 encode, decode and to-image tools
    Base64,
    /// business insights memo
    Memo,
}

#[derive(Parser, Debug)]
#[command(name = "herald-mcp")]
#[command(about = "MCP server over stdio", long_about = None)]
struct Args {
    /// Service to expose
    #[arg(short, long, value_enum, default_value = "demo")]
    service: ServiceKind,

    /// Path to configuration file
    #[arg(short, long, default_value = "herald.toml")]
    config: PathBuf,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "HERALD_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn init_tracing(filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        // stdout carries the protocol
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServerConfig::load(&args.config)?;

    let log_file = args.log_file.as_deref().or(config.logging.file.as_deref());
    init_tracing(&config.logging.filter, log_file)?;

    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None => tracing::info!(
            path = %args.config.display(),
            "Configuration file not found, using defaults"
        ),
    }

    let server = match args.service {
        ServiceKind::Demo => McpServer::for_service(
            &config,
            services::demo::SERVER_NAME,
            Arc::new(DemoService::new()),
        ),
        ServiceKind::Base64 => McpServer::for_service(
            &config,
            services::encoder::SERVER_NAME,
            Arc::new(Base64Service::new()),
        ),
        ServiceKind::Memo => {
            let (notifier, outbox) = Notifier::channel();
            McpServer::for_service(
                &config,
                services::memo::SERVER_NAME,
                Arc::new(MemoService::with_notifier(notifier)),
            )
            .map(|server| server.with_outbox(outbox))
        }
    }
    .context("Failed to build operation registry")?;

    tracing::info!(
        server = %server.info().name,
        version = %server.info().version,
        service = ?args.service,
        "Herald MCP server starting on stdio"
    );

    Arc::new(server)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
}
