//! chat-proxy: streaming chat proxy in front of Google Gemini
//!
//! Accepts a chat history, optionally prepends web context from DuckDuckGo,
//! and relays the Gemini reply to the client as plain text while it arrives.

use chat_proxy::{config::AppConfig, generator::GeneratorHandle, proxy, run_server};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "chat-proxy")]
#[command(version)]
#[command(about = "Streaming chat proxy for Google Gemini")]
#[command(long_about = "
chat-proxy accepts a chat history over HTTP and streams the Gemini reply
back as plain text. Requests may ask for web context, which is looked up
on DuckDuckGo and prepended to the conversation.

The API key is read from GEMINI_API_KEY (a .env file in the working
directory is honored) or from the gemini.api_key config entry.

Example usage:
  chat-proxy run --port 8000
  chat-proxy --config config.yaml check-config
  chat-proxy ping
")]
struct Cli {
    /// Path to config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen address
        #[arg(long)]
        host: Option<String>,
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate and print the effective configuration
    CheckConfig,

    /// Send a single "ping" generation to Gemini
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { host, port } => {
            let mut config = load_config_or_exit(config_path);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Commands::CheckConfig => {
            check_config(config_path);
        }
        Commands::Ping => {
            ping(config_path).await;
        }
    }

    Ok(())
}

/// Validate configuration and print the effective values
fn check_config(config_path: Option<&Path>) {
    let config = load_config_or_exit(config_path);

    println!("✓ Configuration is valid\n");
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("\nGemini:");
    println!("  API key: {}", mask_key(config.gemini.api_key()));
    println!("  Model: {}", config.gemini.model);
    println!("  Base URL: {}", config.gemini.base_url());
    println!("  Timeout: {}s", config.gemini.timeout_seconds);
    println!("\nSearch:");
    println!("  URL: {}", config.search.url);
    println!("  Timeout: {}s", config.search.timeout_seconds);
    println!("\nStats:");
    println!("  Enabled: {}", config.stats.enabled);
    println!("  Format: {:?}", config.stats.format);
}

/// One round trip through the configured generator
async fn ping(config_path: Option<&Path>) {
    let config = load_config_or_exit(config_path);

    if !config.gemini.has_api_key() {
        eprintln!("✗ {}", proxy::MISSING_KEY_ERROR);
        std::process::exit(1);
    }

    println!("Pinging {} at {}", config.gemini.model, config.gemini.base_url());

    let generator = match proxy::check_generator(&config) {
        GeneratorHandle::Ready(generator) => generator,
        GeneratorHandle::Unavailable { reason, .. } => {
            eprintln!("✗ Generator not available: {}", reason);
            std::process::exit(1);
        }
    };

    match proxy::ping(generator.as_ref()).await {
        Ok(sample) => {
            println!("✓ Gemini is reachable");
            println!("  Sample: {}", sample);
        }
        Err(e) => {
            eprintln!("✗ Ping failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some(key) if key.chars().count() <= 8 => "****".to_string(),
        Some(key) => {
            let skip = key.chars().count() - 4;
            format!("****{}", key.chars().skip(skip).collect::<String>())
        }
    }
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}
