use crate::address::is_valid_solana_address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Benchmark definition loaded from `config.json`
///
/// ```json
/// {
///   "nodes": ["https://node-a:443", "http://node-b:10000"],
///   "benchmarkDuration": 60,
///   "detectionAddress": "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfig {
    /// Geyser endpoints to race against each other
    pub nodes: Vec<String>,
    /// Observation window in seconds
    pub benchmark_duration: i64,
    /// Account every tracked transaction must include
    pub detection_address: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    TooFewNodes(usize),
    DuplicateNode(String),
    InvalidNode(String),
    InvalidDuration(i64),
    InvalidDetectionAddress(String),
    MissingFlagValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "Failed to parse config JSON: {}", e),
            ConfigError::TooFewNodes(n) => {
                write!(f, "There must be at least 2 nodes in the config, got {}", n)
            }
            ConfigError::DuplicateNode(node) => write!(f, "Node {} is listed more than once", node),
            ConfigError::InvalidNode(node) => {
                write!(f, "Node {} must start with http:// or https://", node)
            }
            ConfigError::InvalidDuration(d) => {
                write!(f, "Benchmark duration must be positive, got {}", d)
            }
            ConfigError::InvalidDetectionAddress(addr) => {
                write!(f, "Detection address {} is not a valid Solana address", addr)
            }
            ConfigError::MissingFlagValue(flag) => write!(f, "{} requires a value", flag),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl BenchmarkConfig {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&raw)
    }

    /// Parse and validate a config from JSON text
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: BenchmarkConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.len() < 2 {
            return Err(ConfigError::TooFewNodes(self.nodes.len()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !node.starts_with("http://") && !node.starts_with("https://") {
                return Err(ConfigError::InvalidNode(node.clone()));
            }
            if !seen.insert(node.as_str()) {
                return Err(ConfigError::DuplicateNode(node.clone()));
            }
        }

        if self.benchmark_duration <= 0 {
            return Err(ConfigError::InvalidDuration(self.benchmark_duration));
        }

        if !is_valid_solana_address(&self.detection_address) {
            return Err(ConfigError::InvalidDetectionAddress(
                self.detection_address.clone(),
            ));
        }

        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.benchmark_duration.max(0) as u64)
    }
}

/// Command-line flags for the benchmark binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub json_output: bool,
}

impl CliArgs {
    pub fn from_env_args() -> Result<Self, ConfigError> {
        Self::parse(std::env::args().skip(1))
    }

    /// Recognizes `--config <path>` and `--json`; anything else is ignored
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut json_output = false;

        let mut args = args.into_iter().map(Into::<String>::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => match args.next() {
                    Some(path) if !path.starts_with("--") => config_path = PathBuf::from(path),
                    _ => return Err(ConfigError::MissingFlagValue("--config")),
                },
                "--json" => json_output = true,
                _ => {}
            }
        }

        Ok(Self {
            config_path,
            json_output,
        })
    }
}
