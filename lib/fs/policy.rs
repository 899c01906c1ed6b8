//! Time-based freshness policy.

use std::time::Duration;

use tokio::time::Instant;

/// Decides when cached node state must be fetched again.
///
/// A zero TTL disables caching: every node is stale on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: Duration,
}

impl CachePolicy {
    /// Default time a refreshed node stays fresh.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    /// A policy keeping nodes fresh for `ttl`.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a node last refreshed at `last_refresh` must be refreshed again.
    #[must_use]
    pub fn is_stale(&self, last_refresh: Option<Instant>) -> bool {
        match last_refresh {
            None => true,
            Some(_) if self.ttl.is_zero() => true,
            Some(at) => at.elapsed() > self.ttl,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
