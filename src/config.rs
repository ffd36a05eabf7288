//! Runtime configuration derived from CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the mock server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Build a static snapshot instead of serving forever.
    pub build: bool,

    /// Listener port.
    pub port: u16,

    /// Path to the entrypoint file with the API definitions.
    pub entrypoint: PathBuf,

    /// Session idle timeout in seconds.
    pub session_ttl_secs: u64,

    /// Enable verbose logging.
    pub verbose: bool,
}

fn default_port() -> u16 {
    3030
}

fn default_entrypoint() -> PathBuf {
    PathBuf::from("./mock-data/api.toml")
}

fn default_session_ttl() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build: false,
            port: default_port(),
            entrypoint: default_entrypoint(),
            session_ttl_secs: default_session_ttl(),
            verbose: false,
        }
    }
}

impl Config {
    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.entrypoint.as_os_str().is_empty() {
            return Err("entrypoint path must not be empty".to_string());
        }

        if self.session_ttl_secs == 0 {
            return Err("session TTL must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Directory containing the entrypoint file.
    ///
    /// Relative `file`, `markdown` and build `out` paths resolve against
    /// this directory.
    pub fn data_dir(&self) -> PathBuf {
        self.entrypoint
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    }

    /// Session idle timeout as a duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.port, 3030);
        assert_eq!(config.entrypoint, PathBuf::from("./mock-data/api.toml"));
        assert_eq!(config.session_ttl_secs, 60);
        assert!(!config.build);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_session_ttl() {
        let config = Config {
            session_ttl_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn data_dir_is_entrypoint_parent() {
        let config = Config {
            entrypoint: PathBuf::from("./mock-data/api.toml"),
            ..Config::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("./mock-data"));
    }

    #[test]
    fn data_dir_defaults_to_cwd_for_bare_filename() {
        let config = Config {
            entrypoint: PathBuf::from("api.toml"),
            ..Config::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("."));
    }
}
