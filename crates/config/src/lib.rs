use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable prefix for node configuration
pub const ENV_PREFIX: &str = "SC_";

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// VM task execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Maximum number of VM tasks executing at the same time
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Bound on the request execution phase of a single task, in
    /// milliseconds. Zero disables the bound.
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
}

fn default_max_concurrent_tasks() -> usize {
    16
}

fn default_execution_timeout_ms() -> u64 {
    30_000
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            execution_timeout_ms: default_execution_timeout_ms(),
        }
    }
}

impl VmConfig {
    pub fn execution_timeout(&self) -> Option<Duration> {
        match self.execution_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Main node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub vm: VmConfig,
}

fn default_node_id() -> String {
    "sc-node".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            log_level: default_log_level(),
            log_dir: None,
            vm: VmConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the file named by `SC_CONFIG_FILE` if it
    /// exists, otherwise from defaults, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(format!("{}CONFIG_FILE", ENV_PREFIX)) {
            Ok(path) if Path::new(&path).exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: NodeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `SC_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(node_id) = env_string("NODE_ID") {
            self.node_id = node_id;
        }
        if let Some(level) = env_string("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(dir) = env_string("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = env_parse::<usize>("VM_MAX_CONCURRENT_TASKS")? {
            self.vm.max_concurrent_tasks = n;
        }
        if let Some(ms) = env_parse::<u64>("VM_EXECUTION_TIMEOUT_MS")? {
            self.vm.execution_timeout_ms = ms;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node_id must not be empty".to_string()));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Invalid(format!("Invalid log level: {}", other)));
            }
        }

        if self.vm.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "vm.max_concurrent_tasks must be greater than zero".to_string(),
            ));
        }

        if self.vm.execution_timeout_ms == 0 {
            warn!("VM execution timeout disabled; processors run unbounded");
        }

        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar(format!("{}{}", ENV_PREFIX, key), e.to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.node_id, "sc-node");
        assert_eq!(config.vm.max_concurrent_tasks, 16);
        assert_eq!(config.vm.execution_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = NodeConfig::from_yaml_str("node_id: committee-1\nvm:\n  execution_timeout_ms: 0\n").unwrap();
        assert_eq!(config.node_id, "committee-1");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.vm.max_concurrent_tasks, 16);
        assert_eq!(config.vm.execution_timeout(), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_id: node-a").unwrap();
        writeln!(file, "log_level: debug").unwrap();
        writeln!(file, "vm:").unwrap();
        writeln!(file, "  max_concurrent_tasks: 4").unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.vm.max_concurrent_tasks, 4);
    }

    #[test]
    fn test_missing_file() {
        let err = NodeConfig::from_file("/nonexistent/sc-node.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            NodeConfig::from_yaml_str("log_level: loud\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            NodeConfig::from_yaml_str("vm:\n  max_concurrent_tasks: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            NodeConfig::from_yaml_str("vm: [1, 2]\n"),
            Err(ConfigError::YamlParseError(_))
        ));
    }
}
