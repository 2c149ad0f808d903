use std::sync::Arc;

use thiserror::Error;

use cellarwatch_infra::store::{CatalogStore, InMemoryStore, RestockEventStore, WatchStore};

/// Batch sizes negotiated between the fetch and ack endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    fetch: usize,
    ack: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitsError {
    #[error("batch limits must be positive (fetch={fetch}, ack={ack})")]
    Zero { fetch: usize, ack: usize },

    /// A drainer acks everything it fetched in one request, so a fetch page
    /// larger than the ack cap could never be retired.
    #[error("notification fetch limit {fetch} exceeds ack batch limit {ack}")]
    FetchExceedsAck { fetch: usize, ack: usize },
}

impl BatchLimits {
    pub fn new(fetch: usize, ack: usize) -> Result<Self, LimitsError> {
        if fetch == 0 || ack == 0 {
            return Err(LimitsError::Zero { fetch, ack });
        }
        if fetch > ack {
            return Err(LimitsError::FetchExceedsAck { fetch, ack });
        }
        Ok(Self { fetch, ack })
    }

    pub fn fetch(&self) -> usize {
        self.fetch
    }

    pub fn ack(&self) -> usize {
        self.ack
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self { fetch: 100, ack: 100 }
    }
}

/// Shared handler state: store handles plus batch limits.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub events: Arc<dyn RestockEventStore>,
    pub watches: Arc<dyn WatchStore>,
    pub limits: BatchLimits,
}

impl AppServices {
    /// Wire all three boundaries to one backing store.
    pub fn from_store<S>(store: Arc<S>, limits: BatchLimits) -> Self
    where
        S: CatalogStore + RestockEventStore + WatchStore + 'static,
    {
        Self {
            catalog: store.clone(),
            events: store.clone(),
            watches: store,
            limits,
        }
    }

    /// Dev/test wiring backed by a fresh in-memory store.
    pub fn in_memory(limits: BatchLimits) -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()), limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_limit_may_not_exceed_ack_limit() {
        assert!(BatchLimits::new(100, 100).is_ok());
        assert!(BatchLimits::new(50, 100).is_ok());
        assert_eq!(
            BatchLimits::new(101, 100),
            Err(LimitsError::FetchExceedsAck { fetch: 101, ack: 100 })
        );
        assert!(matches!(BatchLimits::new(0, 10), Err(LimitsError::Zero { .. })));
    }
}
