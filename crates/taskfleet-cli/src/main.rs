//! Taskfleet command-line entry point: loads configuration, assembles
//! the engine, and serves the HTTP gateway.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use taskfleet_engine::{Engine, EngineConfig, FilePackager};
use taskfleet_gateway::GatewayServer;
use taskfleet_reason::{HttpBackend, ModelConfig};
use taskfleet_store::{MemoryStore, SqliteStore, TaskStore};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskfleet", about = "Taskfleet — a tick-driven fleet of LLM agent workers")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "taskfleet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine and the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Deserialize)]
struct TaskfleetConfig {
    model: ModelConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    store: StoreConfig,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct StoreConfig {
    #[serde(default = "default_store_backend")]
    backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_store_backend() -> String {
    "sqlite".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config: TaskfleetConfig = toml::from_str(&config_str)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            tokio::fs::create_dir_all(&config.data_dir).await?;
            let store: Arc<dyn TaskStore> = match config.store.backend.as_str() {
                "sqlite" => Arc::new(SqliteStore::open(config.data_dir.join("fleet.db"))?),
                "memory" => Arc::new(MemoryStore::new()),
                other => anyhow::bail!("unknown store backend '{other}' (sqlite | memory)"),
            };
            info!(backend = %config.store.backend, "store ready");

            let backend = Arc::new(HttpBackend::new(config.model));
            let packager = Arc::new(FilePackager::new(config.data_dir.join("artifacts")));

            let engine = Engine::with_defaults(config.engine, store, backend, packager)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let runner = engine.clone();
            let engine_task = tokio::spawn(async move { runner.run(shutdown_rx).await });

            let app = GatewayServer::build(engine);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Taskfleet gateway listening on {addr}");

            axum_serve(listener, app).await?;

            shutdown_tx.send(true).ok();
            engine_task.await?;
        }
    }
    Ok(())
}

/// Serve until ctrl-c.
async fn axum_serve(listener: tokio::net::TcpListener, app: axum::Router) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
