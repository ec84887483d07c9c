//! Configuration loading and validation for diffview.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            workspace_root: None,
            paths: PathsConfig::default(),
            git: GitConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_allow_absolute")]
    pub allow_absolute: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            allow_absolute: default_allow_absolute(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_detect_timeout_secs")]
    pub detect_timeout_secs: u64,
    #[serde(default = "default_diff_timeout_secs")]
    pub diff_timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            detect_timeout_secs: default_detect_timeout_secs(),
            diff_timeout_secs: default_diff_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid toml: {0}")]
    InvalidToml(#[from] toml::de::Error),
    #[error("`listen_addr` must not be empty")]
    EmptyListenAddr,
    #[error("`workspace_root` must be absolute: `{0}`")]
    RelativeWorkspaceRoot(PathBuf),
    #[error("`git.detect_timeout_secs` must be greater than zero")]
    ZeroDetectTimeout,
    #[error("`git.diff_timeout_secs` must be greater than zero")]
    ZeroDiffTimeout,
    #[error("`git.max_output_bytes` must be greater than zero")]
    ZeroMaxOutputBytes,
    #[error("`store.ttl_secs` must be greater than zero")]
    ZeroTtl,
    #[error("`store.sweep_interval_secs` must be greater than zero")]
    ZeroSweepInterval,
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::EmptyListenAddr);
        }

        if let Some(workspace_root) = &self.workspace_root {
            if !workspace_root.is_absolute() {
                return Err(ConfigError::RelativeWorkspaceRoot(workspace_root.clone()));
            }
        }

        if self.git.detect_timeout_secs == 0 {
            return Err(ConfigError::ZeroDetectTimeout);
        }

        if self.git.diff_timeout_secs == 0 {
            return Err(ConfigError::ZeroDiffTimeout);
        }

        if self.git.max_output_bytes == 0 {
            return Err(ConfigError::ZeroMaxOutputBytes);
        }

        if self.store.ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }

        if self.store.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }

        Ok(())
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:0".to_string()
}

fn default_allow_absolute() -> bool {
    true
}

fn default_detect_timeout_secs() -> u64 {
    10
}

fn default_diff_timeout_secs() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_ttl_secs() -> u64 {
    60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    30 * 60
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = Config::from_toml("listen_addr = \"127.0.0.1:4306\"")
            .expect("minimal config should parse");

        assert_eq!(config.listen_addr, "127.0.0.1:4306");
        assert_eq!(config.workspace_root, None);
        assert!(config.paths.allow_absolute);
        assert_eq!(config.git.detect_timeout_secs, 10);
        assert_eq!(config.git.diff_timeout_secs, 30);
        assert_eq!(config.git.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(config.store.ttl_secs, 3600);
        assert_eq!(config.store.sweep_interval_secs, 1800);
    }

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml(
            r#"
            listen_addr = "127.0.0.1:4306"
            workspace_root = "/work/project"

            [paths]
            allow_absolute = false

            [git]
            detect_timeout_secs = 5
            diff_timeout_secs = 60
            max_output_bytes = 1048576

            [store]
            ttl_secs = 120
            sweep_interval_secs = 30
            "#,
        )
        .expect("full config should parse");

        assert_eq!(
            config.workspace_root,
            Some(std::path::PathBuf::from("/work/project"))
        );
        assert!(!config.paths.allow_absolute);
        assert_eq!(config.git.diff_timeout_secs, 60);
        assert_eq!(config.store.ttl_secs, 120);
    }

    #[test]
    fn rejects_empty_listen_addr() {
        let err = Config::from_toml("listen_addr = \" \"").expect_err("blank addr must fail");
        assert!(matches!(err, ConfigError::EmptyListenAddr));
    }

    #[test]
    fn rejects_relative_workspace_root() {
        let err = Config::from_toml(
            "listen_addr = \"127.0.0.1:0\"\nworkspace_root = \"relative/dir\"",
        )
        .expect_err("relative workspace root must fail");
        assert!(matches!(err, ConfigError::RelativeWorkspaceRoot(_)));
    }

    #[test]
    fn rejects_zero_limits() {
        let err = Config::from_toml("listen_addr = \"127.0.0.1:0\"\n[git]\ndiff_timeout_secs = 0")
            .expect_err("zero diff timeout must fail");
        assert!(matches!(err, ConfigError::ZeroDiffTimeout));

        let err = Config::from_toml("listen_addr = \"127.0.0.1:0\"\n[store]\nttl_secs = 0")
            .expect_err("zero ttl must fail");
        assert!(matches!(err, ConfigError::ZeroTtl));
    }

    #[test]
    fn default_config_validates() {
        Config::default()
            .validate()
            .expect("built-in defaults should be valid");
    }
}
