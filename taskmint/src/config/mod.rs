//! Configuration for the `TaskMint` client.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskmint/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit
//! `--config` path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use taskmint_proto::identity::ChainId;

use crate::claim::DEFAULT_CLAIM_TIMEOUT;
use crate::progress::DEFAULT_POLL_INTERVAL;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A setting has a value the client cannot run with.
    #[error("invalid value for {field}: must be greater than zero")]
    Invalid {
        /// Dotted name of the offending setting.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    wallet: WalletFileConfig,
    progress: ProgressFileConfig,
    claim: ClaimFileConfig,
    ui: UiFileConfig,
}

/// `[api]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[wallet]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct WalletFileConfig {
    address: Option<String>,
    chain_id: Option<u64>,
}

/// `[progress]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProgressFileConfig {
    poll_interval_ms: Option<u64>,
}

/// `[claim]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ClaimFileConfig {
    timeout_secs: Option<u64>,
}

/// `[ui]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
    notice_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- API --
    /// Base URL of the task store and reward authority. `None` runs
    /// against in-process backends.
    pub api_url: Option<String>,
    /// Per-request timeout enforced by the HTTP client.
    pub request_timeout: Duration,

    // -- Wallet --
    /// Account exposed by the loopback wallet.
    pub wallet_address: Option<String>,
    /// The single supported network.
    pub chain_id: ChainId,

    // -- Progress / claim --
    /// Period between progress fetches.
    pub poll_interval: Duration,
    /// Upper bound on one claim round trip.
    pub claim_timeout: Duration,

    // -- UI --
    /// Timestamp display format (chrono).
    pub timestamp_format: String,
    /// Capacity of the notice channel.
    pub notice_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout: Duration::from_secs(15),
            wallet_address: None,
            chain_id: ChainId::SEPOLIA,
            poll_interval: DEFAULT_POLL_INTERVAL,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
            timestamp_format: "%H:%M:%S".to_string(),
            notice_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file cannot be read,
    /// if any config file fails to parse, or if the merged settings
    /// contain a zero poll interval or notice buffer.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            api_url: cli.api_url.clone().or_else(|| file.api.base_url.clone()),
            request_timeout: file
                .api
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            wallet_address: cli
                .address
                .clone()
                .or_else(|| file.wallet.address.clone()),
            chain_id: cli
                .chain_id
                .or(file.wallet.chain_id)
                .map_or(defaults.chain_id, ChainId),
            poll_interval: cli
                .poll_interval_ms
                .or(file.progress.poll_interval_ms)
                .map_or(defaults.poll_interval, Duration::from_millis),
            claim_timeout: file
                .claim
                .timeout_secs
                .map_or(defaults.claim_timeout, Duration::from_secs),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
            notice_buffer: file.ui.notice_buffer.unwrap_or(defaults.notice_buffer),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that tokio cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "progress.poll_interval_ms",
            });
        }
        if self.notice_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "ui.notice_buffer",
            });
        }
        Ok(())
    }

    /// The REST base URL, if one is configured and non-empty.
    #[must_use]
    pub fn api_base(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task tracker with milestone rewards")]
pub struct CliArgs {
    /// Base URL of the REST backend (omit to run offline).
    #[arg(long, env = "TASKMINT_API_URL")]
    pub api_url: Option<String>,

    /// Wallet account to connect with.
    #[arg(long, env = "TASKMINT_ADDRESS")]
    pub address: Option<String>,

    /// Supported chain id (default: Sepolia).
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Progress polling period in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Path to config file (default: `~/.config/taskmint/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKMINT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskmint.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Load and parse a TOML config file.
///
/// An explicit path must exist; the default path may be missing.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit_path {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskmint").join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
