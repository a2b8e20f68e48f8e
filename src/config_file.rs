//! Configuration loading: `config.toml` with environment-variable overrides.
//!
//! `HLS_PIPELINE__<SECTION>__<FIELD>` overrides the matching TOML key, e.g.
//! `HLS_PIPELINE__PIPELINE__DOWNLOAD_WORKERS=4`. This mirrors the
//! file-then-env layering the teacher's `ConfigFile` does with TOML alone,
//! extended with the env layer a deployed service needs.

use std::path::Path;

use crate::config::ServerConfig;

const ENV_PREFIX: &str = "HLS_PIPELINE__";

/// Load configuration from `path` if it exists, falling back to defaults,
/// then apply any `HLS_PIPELINE__...` environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> ServerConfig {
    let mut config = if path.as_ref().exists() {
        match ServerConfig::from_file(path.as_ref().to_str().unwrap_or_default()) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "failed to load config file, using defaults"
                );
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };

    apply_env_overrides(&mut config);
    config
}

fn apply_env_overrides(config: &mut ServerConfig) {
    if let Ok(host) = std::env::var(format!("{ENV_PREFIX}HOST")) {
        config.host = host;
    }
    if let Ok(port) = std::env::var(format!("{ENV_PREFIX}PORT")) {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
    if let Ok(level) = std::env::var(format!("{ENV_PREFIX}LOG_LEVEL")) {
        config.log_level = level;
    }
    if let Ok(n) = std::env::var(format!("{ENV_PREFIX}PIPELINE__DOWNLOAD_WORKERS")) {
        if let Ok(n) = n.parse() {
            config.pipeline.download_workers = n;
        }
    }
    if let Ok(n) = std::env::var(format!("{ENV_PREFIX}PIPELINE__PLAYLIST_WORKERS")) {
        if let Ok(n) = n.parse() {
            config.pipeline.playlist_workers = n;
        }
    }
    if let Ok(n) = std::env::var(format!("{ENV_PREFIX}PIPELINE__DEMUX_WORKERS")) {
        if let Ok(n) = n.parse() {
            config.pipeline.demux_workers = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_config("/nonexistent/path/config.toml");
        assert_eq!(config.port, ServerConfig::default().port);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let custom = ServerConfig {
            port: 9999,
            ..Default::default()
        };
        file.write_all(toml::to_string_pretty(&custom).unwrap().as_bytes())
            .unwrap();

        let loaded = load_config(file.path());
        assert_eq!(loaded.port, 9999);
    }

    #[test]
    fn test_env_override_port() {
        std::env::set_var("HLS_PIPELINE__PORT", "4242");
        let config = load_config("/nonexistent/path/config.toml");
        assert_eq!(config.port, 4242);
        std::env::remove_var("HLS_PIPELINE__PORT");
    }
}
