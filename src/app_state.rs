use crate::asset::AssetDir;
use crate::ledger::{CodeLedger, JsonFileStorage};
use crate::token::TokenStore;
use crate::Config;
use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub ledger: CodeLedger,
    pub tokens: TokenStore,
    pub assets: AssetDir,
    pub token_ttl: Duration,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let asset_dir = Path::new(&config.asset_dir);
        if !asset_dir.is_dir() {
            warn!(asset_dir = %asset_dir.display(), "Asset directory does not exist yet");
        }

        let ledger_path = Path::new(&config.ledger_file);
        if let Some(parent) = ledger_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create ledger directory {}", parent.display()))?;
        }

        let ledger = CodeLedger::new(JsonFileStorage::new(ledger_path));
        let summary = ledger
            .summary()
            .await
            .with_context(|| format!("Failed to read ledger {}", ledger_path.display()))?;
        info!(
            ledger = %ledger_path.display(),
            total = summary.total,
            used = summary.used,
            unused = summary.unused,
            "Initialize code ledger"
        );

        let this = Self {
            ledger,
            tokens: TokenStore::new(),
            assets: AssetDir::new(asset_dir),
            token_ttl: config.token_ttl(),
        };

        if let Some(interval) = config.sweep_interval() {
            info!(interval_secs = interval.as_secs(), "Token sweep started");
            this.tokens.start_cleanup_task(interval);
        }

        Ok(this)
    }
}
