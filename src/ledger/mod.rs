pub mod error;
pub mod manager;
pub mod record;
pub mod storage;

// Re-export public types and functions
pub use error::LedgerError;
pub use manager::{CodeLedger, LedgerSummary};
pub use record::{LedgerDocument, RedemptionCode};
pub use storage::{JsonFileStorage, LedgerStorage, MemoryStorage};
