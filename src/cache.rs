use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::FetchFailure;
use crate::types::PriceSeries;

pub type FetchOutcome = Result<PriceSeries, FetchFailure>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    identifier: String,
    start: NaiveDate,
}

struct CacheEntry {
    stored_at: Instant,
    outcome: FetchOutcome,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Fetch outcomes keyed by identifier and start date, valid for `ttl`.
/// Failures are stored too, so a failed identifier is not re-queried
/// inside the window.
pub struct PriceCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub async fn get(&self, identifier: &str, start: NaiveDate) -> Option<FetchOutcome> {
        let key = CacheKey {
            identifier: identifier.to_string(),
            start,
        };
        let found = {
            let entries = self.entries.read().await;
            entries
                .get(&key)
                .filter(|entry| entry.stored_at.elapsed() < self.ttl)
                .map(|entry| entry.outcome.clone())
        };

        let mut stats = self.stats.write().await;
        if found.is_some() {
            stats.hits += 1;
            debug!("cache hit for {} from {}", identifier, start);
        } else {
            stats.misses += 1;
            debug!("cache miss for {} from {}", identifier, start);
        }
        found
    }

    pub async fn insert(&self, identifier: &str, start: NaiveDate, outcome: FetchOutcome) {
        let key = CacheKey {
            identifier: identifier.to_string(),
            start,
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                outcome,
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await.len();
        CacheStats {
            entries,
            ..*self.stats.read().await
        }
    }
}
