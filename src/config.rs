//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Worker-pool and timing knobs for the four pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of playlist-refresh workers.
    pub playlist_workers: usize,
    /// Number of segment-download workers.
    pub download_workers: usize,
    /// Number of demux workers.
    pub demux_workers: usize,
    /// Blocking-receive timeout for each worker loop, in milliseconds.
    /// Also the upper bound on shutdown join latency.
    pub worker_recv_timeout_ms: u64,
    /// Floor applied to a playlist's reported target duration before using
    /// it as the next refresh interval, in milliseconds.
    pub playlist_refresh_floor_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            playlist_workers: 4,
            download_workers: 8,
            demux_workers: 2,
            worker_recv_timeout_ms: 200,
            playlist_refresh_floor_ms: 1000,
        }
    }
}

/// Observability server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind the observability server to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Pipeline worker/timing configuration.
    pub pipeline: PipelineConfig,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Enable CORS on the observability endpoints.
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            pipeline: PipelineConfig::default(),
            log_level: "info".to_string(),
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.pipeline.playlist_workers, 4);
        assert_eq!(config.pipeline.download_workers, 8);
        assert_eq!(config.pipeline.demux_workers, 2);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = ServerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.port, config.port);
        assert_eq!(parsed.pipeline.demux_workers, config.pipeline.demux_workers);
    }
}
