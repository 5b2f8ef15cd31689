mod file_config;

pub use file_config::{FileConfig, PaginationConfig};

use crate::notifications::range::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::notifications::{PageLimits, MAX_WORKER_ID};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub worker_id: Option<u16>,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            port: 8080,
            metrics_port: 8081,
            logging_level: RequestsLoggingLevel::default(),
            worker_id: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite file backing the store. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Identity generator worker id. `None` picks one at random.
    pub worker_id: Option<u16>,
    pub page_limits: PageLimits,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file.db_path.map(PathBuf::from).or_else(|| cli.db_path.clone());
        if let Some(db_path) = &db_path {
            if db_path.is_dir() {
                bail!("db_path is a directory: {:?}", db_path);
            }
            let parent = db_path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                if !parent.is_dir() {
                    bail!("Database directory does not exist: {:?}", parent);
                }
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ (both {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let worker_id = file.worker_id.or(cli.worker_id);
        if let Some(worker_id) = worker_id {
            if worker_id > MAX_WORKER_ID {
                bail!(
                    "worker_id must be between 0 and {}, got {}",
                    MAX_WORKER_ID,
                    worker_id
                );
            }
        }

        let pagination = file.pagination.unwrap_or_default();
        let page_limits = PageLimits {
            default_size: pagination
                .default_page_size
                .unwrap_or(cli.default_page_size),
            max_size: pagination.max_page_size.unwrap_or(cli.max_page_size),
        };
        if page_limits.default_size == 0 {
            bail!("default_page_size must be greater than 0");
        }
        if page_limits.max_size < page_limits.default_size {
            bail!(
                "max_page_size ({}) must not be lower than default_page_size ({})",
                page_limits.max_size,
                page_limits.default_size
            );
        }

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            worker_id,
            page_limits,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            page_limits: self.page_limits,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
