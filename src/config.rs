use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for `token_ttl_secs` (30 days)
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Main configuration structure that can be loaded from CLI, environment, or config file
///
/// Example configuration file content
/// # Asset Redeem Configuration
///
/// # Server configuration
/// listen_on_port = 10000
/// host = "0.0.0.0"
///
/// # Where the unwatermarked assets live
/// asset_dir = "./paid/img_paid"
///
/// # Redemption code ledger (JSON, rewritten on every redemption)
/// ledger_file = "./codes.json"
///
/// # Download tokens
/// token_ttl_secs = 3600
/// sweep_interval_secs = 60  # 0 disables the background sweep
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 10000)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    #[serde(default = "default_host")]
    pub host: String,

    /// Directory holding the downloadable assets
    #[arg(short, long, env = "ASSET_DIR", default_value = "paid/img_paid")]
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,

    /// JSON file with the redemption codes
    #[arg(long, env = "LEDGER_FILE", default_value = "codes.json")]
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    /// Lifetime of a download token in seconds
    #[arg(short, long, env = "TOKEN_TTL_SECS", default_value_t = 3600)]
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Interval of the expired token sweep in seconds (0 = disabled)
    #[arg(long, env = "TOKEN_SWEEP_SECS", default_value_t = 60)]
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Configuration file path (TOML)
    #[arg(short, long, env = "REDEEM_CONFIG")]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            host: default_host(),
            asset_dir: default_asset_dir(),
            ledger_file: default_ledger_file(),
            token_ttl_secs: default_token_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args and environment, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))
                .with_context(|| format!("Failed to load config file {config_path}"))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI/env values take precedence when not default
    fn merge_with_file(mut self, file_config: Config) -> Self {
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.host == default_host() {
            self.host = file_config.host;
        }
        if self.asset_dir == default_asset_dir() {
            self.asset_dir = file_config.asset_dir;
        }
        if self.ledger_file == default_ledger_file() {
            self.ledger_file = file_config.ledger_file;
        }
        if self.token_ttl_secs == default_token_ttl_secs() {
            self.token_ttl_secs = file_config.token_ttl_secs;
        }
        if self.sweep_interval_secs == default_sweep_interval_secs() {
            self.sweep_interval_secs = file_config.sweep_interval_secs;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_secs == 0 {
            return Err(anyhow::anyhow!("token_ttl_secs must be greater than 0"));
        }
        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(anyhow::anyhow!(
                "token_ttl_secs cannot exceed {MAX_TOKEN_TTL_SECS}"
            ));
        }
        if self.host.is_empty() {
            return Err(anyhow::anyhow!("host cannot be empty"));
        }
        if self.asset_dir.is_empty() {
            return Err(anyhow::anyhow!("asset_dir cannot be empty"));
        }
        if self.ledger_file.is_empty() {
            return Err(anyhow::anyhow!("ledger_file cannot be empty"));
        }

        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// `None` when the sweep is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.listen_on_port)
    }
}

// Default value functions
fn default_port() -> u16 {
    10000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_asset_dir() -> String {
    "paid/img_paid".to_string()
}

fn default_ledger_file() -> String {
    "codes.json".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}
