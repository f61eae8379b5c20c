//! perplexity-mcp: Perplexity AI search over the Model Context Protocol
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use perplexity_mcp::{
    config::{Settings, Transport},
    mcp::McpServer,
    web::create_router,
    AppState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    transport: Option<Transport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let dotenv = dotenvy::dotenv();

    // Load configuration
    let (settings, source) = load_settings(args.config.as_ref())?;

    // Initialize logging; stdout belongs to the MCP channel
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting perplexity-mcp v{}", perplexity_mcp::VERSION);
    match dotenv {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(e) => warn!("No .env file loaded: {}", e),
    }
    match source {
        Some(path) => info!("Loaded settings from: {}", path.display()),
        None => info!("No settings file found, using defaults"),
    }
    if settings.cache.enabled {
        info!("Response caching requested but not available; every query hits the API");
    }

    let transport = args.transport.unwrap_or(settings.server.transport);

    // Create application state
    let state = AppState::from_settings(settings)?;
    info!("Application state initialized");

    match transport {
        Transport::Stdio => McpServer::new(state).run_stdio().await?,
        Transport::Http => serve_http(state).await?,
    }

    info!("Server stopped");
    Ok(())
}

/// Serve the HTTP routes until ctrl-c
async fn serve_http(state: AppState) -> Result<()> {
    let addr = SocketAddr::new(
        state
            .settings
            .server
            .bind_address
            .parse()
            .context("invalid bind address")?,
        state.settings.server.port,
    );

    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Load settings from file or use defaults, then overlay the environment
fn load_settings(explicit: Option<&PathBuf>) -> Result<(Settings, Option<PathBuf>)> {
    // An explicit path must exist
    if let Some(path) = explicit {
        let mut settings = Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        settings.merge_env();
        return Ok((settings, Some(path.clone())));
    }

    let mut paths = Vec::new();
    if let Ok(path) = std::env::var("PERPLEXITY_MCP_SETTINGS_PATH") {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("settings.yml"));
    paths.push(PathBuf::from("config/settings.yml"));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("perplexity-mcp/settings.yml"));
    }

    for path in paths {
        if path.exists() {
            let mut settings = Settings::from_file(&path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?;
            settings.merge_env();
            return Ok((settings, Some(path)));
        }
    }

    // Use defaults
    let mut settings = Settings::default();
    settings.merge_env();
    Ok((settings, None))
}

/// Parse command line arguments; `None` when the process should exit
fn parse_args() -> Result<Option<Args>> {
    let mut args = Args::default();
    let mut argv = std::env::args().skip(1);

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("perplexity-mcp {}", perplexity_mcp::VERSION);
                return Ok(None);
            }
            "-c" | "--config" => {
                let path = argv.next().context("--config requires a file path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--http" => args.transport = Some(Transport::Http),
            "--stdio" => args.transport = Some(Transport::Stdio),
            other => anyhow::bail!("unknown argument: {} (see --help)", other),
        }
    }

    Ok(Some(args))
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
perplexity-mcp v{}
Perplexity AI search exposed as an MCP tool

USAGE:
    perplexity-mcp [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file
        --stdio            Serve MCP over stdin/stdout (default)
        --http             Serve the HTTP API
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    PERPLEXITY_API_KEY             API key (required, starts with pplx-)
    DEFAULT_MODEL                  Answer model (default: sonar-pro)
    PERPLEXITY_API_URL             Chat completions endpoint
    CACHE_ENABLED                  Request response caching (true/false)
    LOG_LEVEL                      Log filter when RUST_LOG is unset
    PERPLEXITY_MCP_SETTINGS_PATH   Path to settings.yml
    PERPLEXITY_MCP_TRANSPORT       stdio or http
    PERPLEXITY_MCP_BIND_ADDRESS    HTTP bind address
    PERPLEXITY_MCP_PORT            HTTP port
"#,
        perplexity_mcp::VERSION
    );
}
