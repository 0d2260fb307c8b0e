use crate::ledger::{LedgerDocument, LedgerError};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, info};

/// Whole-document persistence for the code ledger.
///
/// `CodeLedger` calls `load` and `persist` while holding its write lock, so
/// implementations see a single writer and never need their own locking
/// around the read-modify-write cycle.
pub trait LedgerStorage: Send + Sync + 'static {
    /// Read the complete ledger.
    fn load(&self) -> impl Future<Output = Result<LedgerDocument, LedgerError>> + Send;

    /// Replace the complete ledger. Must only return `Ok` once the new
    /// document is durable.
    fn persist(
        &self,
        doc: &LedgerDocument,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// Ledger kept as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl LedgerStorage for JsonFileStorage {
    async fn load(&self) -> Result<LedgerDocument, LedgerError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No ledger file, treating as empty");
                return Ok(LedgerDocument::default());
            }
            Err(error) => return Err(error.into()),
        };

        if content.trim().is_empty() {
            return Ok(LedgerDocument::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn persist(&self, doc: &LedgerDocument) -> Result<(), LedgerError> {
        let content = serde_json::to_vec_pretty(doc)?;
        let tmp = self.temp_path();
        debug!(path = %self.path.display(), codes = doc.codes.len(), "Saving ledger to file");

        // write + fsync a sibling file, then swap it in
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(error) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(error.into());
        }

        Ok(())
    }
}

/// Ledger held only in memory. Useful for tests and for embedding the
/// service with externally managed codes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    doc: Arc<Mutex<LedgerDocument>>,
}

impl MemoryStorage {
    pub fn new(doc: LedgerDocument) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    /// Copy of the currently stored document
    pub fn snapshot(&self) -> LedgerDocument {
        self.doc.lock().clone()
    }
}

impl LedgerStorage for MemoryStorage {
    async fn load(&self) -> Result<LedgerDocument, LedgerError> {
        Ok(self.snapshot())
    }

    async fn persist(&self, doc: &LedgerDocument) -> Result<(), LedgerError> {
        *self.doc.lock() = doc.clone();
        Ok(())
    }
}
