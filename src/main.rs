use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_server::config::{AppConfig, CliConfig, FileConfig};
use notification_server::kv::{InMemoryBackend, KvBackend, SqliteBackend};
use notification_server::metrics;
use notification_server::notifications::range::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use notification_server::notifications::IdGenerator;
use notification_server::server::{run_server, RequestsLoggingLevel, ServerState};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file. Without it everything is kept in memory.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 8081)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Worker id embedded in generated notification ids (0-1023). Random when absent.
    #[clap(long)]
    pub worker_id: Option<u16>,

    /// Number of notifications returned when the client doesn't ask for a page size.
    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub default_page_size: usize,

    /// Largest page size a client may ask for.
    #[clap(long, default_value_t = MAX_PAGE_SIZE)]
    pub max_page_size: usize,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            worker_id: self.worker_id,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn open_backend(config: &AppConfig) -> Result<Arc<dyn KvBackend>> {
    match &config.db_path {
        Some(db_path) => {
            info!("Opening SQLite key-value database at {:?}...", db_path);
            Ok(Arc::new(SqliteBackend::new(db_path)?))
        }
        None => {
            info!("No database path configured, keeping notifications in memory");
            Ok(Arc::new(InMemoryBackend::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let backend = open_backend(&config)?;
    let id_generator = match config.worker_id {
        Some(worker_id) => IdGenerator::new(worker_id)?,
        None => IdGenerator::with_random_worker_id(),
    };

    let state = ServerState::new(config.server_config(), backend, id_generator)
        .context("Failed to initialize stores")?;

    run_server(state).await
}
