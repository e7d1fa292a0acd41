use std::env;
use std::time::Duration;
use yellowstone_grpc_proto::geyser::CommitmentLevel;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Optional `x-token` sent to every node
    pub x_token: Option<String>,
    pub commitment_level: CommitmentLevel,
    pub rust_log: String,
    /// Capacity of the observation channel shared by all source loops
    pub channel_buffer: usize,
    pub connect_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            x_token: None,
            commitment_level: CommitmentLevel::Processed,
            rust_log: "info".to_string(),
            channel_buffer: 10_000,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime settings from environment variables
    ///
    /// Environment variables:
    /// - `X_TOKEN` (optional)
    /// - `COMMITMENT_LEVEL` (default: processed)
    /// - `RUST_LOG` (default: info)
    /// - `DETECTION_CHANNEL_BUFFER` (default: 10000)
    /// - `CONNECT_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let x_token = lookup("X_TOKEN").filter(|t| !t.is_empty());

        let commitment_level = match lookup("COMMITMENT_LEVEL") {
            None => defaults.commitment_level,
            Some(raw) => match raw.to_lowercase().as_str() {
                "finalized" => CommitmentLevel::Finalized,
                "confirmed" => CommitmentLevel::Confirmed,
                "processed" => CommitmentLevel::Processed,
                _ => {
                    log::warn!(
                        "Invalid COMMITMENT_LEVEL '{}', defaulting to Processed",
                        raw
                    );
                    defaults.commitment_level
                }
            },
        };

        let rust_log = lookup("RUST_LOG").unwrap_or(defaults.rust_log);

        let channel_buffer = lookup("DETECTION_CHANNEL_BUFFER")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.channel_buffer);

        let connect_timeout = lookup("CONNECT_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        Self {
            x_token,
            commitment_level,
            rust_log,
            channel_buffer,
            connect_timeout,
        }
    }
}
