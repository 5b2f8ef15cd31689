use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub worker_id: Option<u16>,

    pub pagination: Option<PaginationConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: Option<usize>,
    pub max_page_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_path = "/var/lib/notifications/kv.db"
port = 8080
logging_level = "headers"
worker_id = 12

[pagination]
max_page_size = 50
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("/var/lib/notifications/kv.db"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.logging_level.as_deref(), Some("headers"));
        assert_eq!(config.worker_id, Some(12));

        let pagination = config.pagination.unwrap();
        assert_eq!(pagination.default_page_size, None);
        assert_eq!(pagination.max_page_size, Some(50));
    }

    #[test]
    fn test_load_missing_file() {
        let result = FileConfig::load(Path::new("/nonexistent/config.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }
}
