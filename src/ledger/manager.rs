use crate::ledger::{JsonFileStorage, LedgerError, LedgerStorage, RedemptionCode};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info};

/// Counts of codes in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total: usize,
    pub used: usize,
    pub unused: usize,
}

/// Single-writer front for the redemption code ledger.
///
/// Every operation takes the storage lock, reads the full document, and (for
/// `redeem`) writes it back before releasing the lock. Two callers racing on
/// the same code are therefore serialized and only the first one sees it
/// unused.
pub struct CodeLedger<S = JsonFileStorage> {
    storage: Arc<TokioMutex<S>>,
}

impl<S> Clone for CodeLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: LedgerStorage> CodeLedger<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(TokioMutex::new(storage)),
        }
    }

    /// Consume `code`, recording which asset it unlocked.
    ///
    /// Returns only after the updated ledger has been persisted. On a
    /// persistence failure nothing is kept: the next call reloads the ledger
    /// and still finds the code unused.
    pub async fn redeem(&self, code: &str, asset_id: &str) -> Result<RedemptionCode, LedgerError> {
        if code.is_empty() {
            return Err(LedgerError::CodeNotFound);
        }

        let storage = self.storage.lock().await;
        let mut doc = storage.load().await?;

        let Some(record) = doc.find_mut(code) else {
            debug!(asset = asset_id, "Unknown redemption code");
            return Err(LedgerError::CodeNotFound);
        };
        if record.used {
            debug!(asset = asset_id, used_at = ?record.used_at, "Redemption code reused");
            return Err(LedgerError::CodeAlreadyUsed);
        }

        record.mark_used(asset_id, Utc::now());
        let redeemed = record.clone();

        storage.persist(&doc).await.inspect_err(|error| {
            error!(asset = asset_id, ?error, "Failed to persist ledger, redemption aborted");
        })?;

        info!(asset = asset_id, "Redemption code consumed");
        Ok(redeemed)
    }

    /// Current state of a single code, if provisioned
    pub async fn lookup(&self, code: &str) -> Result<Option<RedemptionCode>, LedgerError> {
        let storage = self.storage.lock().await;
        let doc = storage.load().await?;
        Ok(doc.find(code).cloned())
    }

    pub async fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let storage = self.storage.lock().await;
        let doc = storage.load().await?;
        let used = doc.codes.iter().filter(|c| c.used).count();

        Ok(LedgerSummary {
            total: doc.codes.len(),
            used,
            unused: doc.codes.len() - used,
        })
    }
}
