use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt};

use repo_pulse::config::AppConfig;
use repo_pulse::transport::HttpServerApp;
use repo_pulse::types::LanguageQuery;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"))]
#[command(about = "repo-pulse - commit counts for GitHub repositories, grouped by language")]
#[command(
    long_about = "repo-pulse searches GitHub repositories by language, looks up the commit count of every repository found and returns one line per repository. It runs as an HTTP server answering `?q=language:Go language:Rust` style queries, or answers a single query from the command line."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: <config dir>/repo-pulse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// GitHub personal access token (overrides REPO_PULSE_GITHUB_TOKEN and the config file)
    #[arg(short = 't', long, global = true)]
    github_token: Option<String>,

    /// Number of search pages fetched per language
    #[arg(long, global = true)]
    page_limit: Option<u32>,

    /// Request timeout in seconds, 0 to wait indefinitely
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve `GET /?q=language:<name>...` over HTTP
    Serve {
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Run a single query and print the result
    Query {
        /// Languages to search, e.g. `Go Rust`
        #[arg(required = true)]
        languages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(token) = cli.github_token {
        config.github.personal_token = Some(token);
    }
    if let Some(page_limit) = cli.page_limit {
        config.pipeline.page_limit = page_limit;
    }
    if let Some(request_timeout) = cli.request_timeout {
        config.pipeline.request_timeout_secs = request_timeout;
    }

    match cli.command {
        Commands::Serve { address } => {
            if let Some(address) = address {
                config.server.bind_address = address;
            }
            run_http_server(config).await
        }
        Commands::Query { languages } => run_query(config, languages).await,
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},{}", level, env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

async fn run_http_server(config: AppConfig) -> Result<()> {
    config.validate()?;
    let bind_addr = config.bind_address()?;
    let orchestrator = Arc::new(config.build_orchestrator()?);

    tracing::info!("Starting repo-pulse HTTP server on {}", bind_addr);
    tracing::info!("Press Ctrl+C to stop the server");

    HttpServerApp::new(bind_addr, orchestrator).serve().await
}

async fn run_query(config: AppConfig, languages: Vec<String>) -> Result<()> {
    config.validate()?;
    let orchestrator = config.build_orchestrator()?;

    // Accept both `Go Rust` and `language:Go language:Rust`.
    let query = LanguageQuery::parse(
        &languages
            .iter()
            .map(|language| {
                if language.starts_with("language:") {
                    language.clone()
                } else {
                    format!("language:{}", language)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    );

    let result = orchestrator
        .run(query)
        .await
        .context("Query could not be run")?;
    println!("{}", result.body.trim_end());
    Ok(())
}
