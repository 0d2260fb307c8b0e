use std::time::Instant;

/// A single-use download credential bound to one asset
#[derive(Debug, Clone)]
pub struct AccessToken {
    asset_id: String,
    expires_at: Instant,
    used: bool,
}

impl AccessToken {
    pub fn new(asset_id: String, expires_at: Instant) -> Self {
        Self {
            asset_id,
            expires_at,
            used: false,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }
}
