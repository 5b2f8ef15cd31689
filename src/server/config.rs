use super::RequestsLoggingLevel;
use crate::notifications::PageLimits;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Page size defaults and ceiling for `Range` requests.
    pub page_limits: PageLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8080,
            metrics_port: 8081,
            page_limits: PageLimits::default(),
        }
    }
}
