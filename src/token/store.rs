use crate::token::{AccessToken, TokenError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// What the client gets back after a successful redemption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: Duration,
}

/// In-memory registry of download tokens.
///
/// Entries are only reachable through `issue`, `consume` and the expiry
/// sweep. The whole check-and-mark of `consume` runs under one lock
/// acquisition, so of two concurrent consumers exactly one sees the token
/// unused.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    tokens: Arc<Mutex<HashMap<String, AccessToken>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token for `asset_id` that stays valid for `ttl`
    pub fn issue(&self, asset_id: &str, ttl: Duration) -> Result<IssuedToken, TokenError> {
        self.issue_at(asset_id, ttl, Instant::now())
    }

    pub fn issue_at(
        &self,
        asset_id: &str,
        ttl: Duration,
        now: Instant,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now.checked_add(ttl).ok_or(TokenError::TtlOutOfRange)?;
        let mut tokens = self.tokens.lock();

        // v4 uuids carry 122 random bits; a clash with a live entry is
        // practically impossible but would silently overwrite it
        let token = loop {
            let candidate = Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = tokens.entry(candidate.clone()) {
                slot.insert(AccessToken::new(asset_id.to_string(), expires_at));
                break candidate;
            }
        };

        debug!(asset = asset_id, ttl_secs = ttl.as_secs(), "Issued download token");
        Ok(IssuedToken {
            token,
            expires_in: ttl,
        })
    }

    /// Validate `token` for `asset_id` and burn it
    pub fn consume(&self, token: &str, asset_id: &str) -> Result<(), TokenError> {
        self.consume_at(token, asset_id, Instant::now())
    }

    pub fn consume_at(&self, token: &str, asset_id: &str, now: Instant) -> Result<(), TokenError> {
        let mut tokens = self.tokens.lock();

        let Some(entry) = tokens.get_mut(token) else {
            return Err(TokenError::TokenNotFound);
        };

        if entry.is_expired_at(now) {
            tokens.remove(token);
            return Err(TokenError::TokenExpired);
        }
        if entry.is_used() {
            return Err(TokenError::TokenAlreadyUsed);
        }
        if entry.asset_id() != asset_id {
            return Err(TokenError::AssetMismatch);
        }

        entry.mark_used();
        Ok(())
    }

    /// Drop expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    pub fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut tokens = self.tokens.lock();
        let before_count = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));

        let removed = before_count - tokens.len();
        if removed > 0 {
            debug!(removed, remaining = tokens.len(), "Cleaned up download tokens");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    /// Periodically sweep expired tokens. Must be called inside a tokio runtime.
    pub fn start_cleanup_task(&self, interval: Duration) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        });
    }
}
