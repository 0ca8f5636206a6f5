use crate::batch::{build_records, BatchReport};
use crate::domain::recommendation::StockMap;
use crate::enrich::Enricher;
use crate::error::SourceError;
use crate::snapshot::SnapshotLoader;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_TTL_SECS: i64 = 15 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    last_update: DateTime<Utc>,
    data: Arc<StockMap>,
    report: BatchReport,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_update <= ttl
    }
}

/// Enriched ticker records, recomputed lazily once they are older than the TTL.
///
/// The entry lock is held while a recomputation runs, so concurrent callers wait for the
/// in-flight batch and then share its result. A failed load leaves the previous entry in place
/// and is returned to the caller; expired data is never served.
pub struct SnapshotCache {
    loader: Arc<dyn SnapshotLoader>,
    enricher: Enricher,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: tokio::sync::Mutex<Option<CacheEntry>>,
    refreshes: AtomicU64,
}

impl SnapshotCache {
    pub fn new(
        loader: Arc<dyn SnapshotLoader>,
        enricher: Enricher,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            loader,
            enricher,
            clock,
            ttl,
            entry: tokio::sync::Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    pub async fn get(&self) -> Result<Arc<StockMap>, SourceError> {
        let mut guard = self.entry.lock().await;
        let now = self.clock.now();
        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh(now, self.ttl) {
                return Ok(Arc::clone(&entry.data));
            }
            tracing::info!(last_update = %entry.last_update, "snapshot cache expired");
        }

        let snapshot = match self.loader.load().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(
                    source = %self.loader.describe(),
                    error = %err,
                    "snapshot refresh failed; cache left unchanged"
                );
                return Err(err);
            }
        };
        let (records, report) = build_records(&snapshot, &self.enricher).await;

        let data = Arc::new(records);
        let last_update = self.clock.now();
        *guard = Some(CacheEntry {
            last_update,
            data: Arc::clone(&data),
            report,
        });
        let refreshes = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(%last_update, tickers = data.len(), refreshes, "snapshot cache refreshed");

        Ok(data)
    }

    /// Number of completed recomputations since construction.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.entry.lock().await.as_ref().map(|e| e.last_update)
    }

    pub async fn last_report(&self) -> Option<BatchReport> {
        self.entry.lock().await.as_ref().map(|e| e.report.clone())
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("source", &self.loader.describe())
            .field("enricher", &self.enricher)
            .field("ttl", &self.ttl)
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::Snapshot;
    use crate::prices::LocalSeries;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            )))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct CountingLoader {
        loads: AtomicU64,
        fail: AtomicBool,
    }

    impl CountingLoader {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicU64::new(0),
                fail: AtomicBool::new(false),
            })
        }

        fn loads(&self) -> u64 {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SnapshotLoader for CountingLoader {
        fn describe(&self) -> String {
            "counting".into()
        }

        async fn load(&self) -> Result<Snapshot, SourceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers pile up on the lock.
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                return Err(SourceError::Malformed {
                    path: "counting".into(),
                    source,
                });
            }
            let v = json!({
                "AAPL": {
                    "weekly_prices": [{"date": "2024-01-03", "close": 90}],
                    "recommendations": [{"date": "Jan. 4, 2024", "sentiment": "Buy"}]
                },
                "EMPTY": {
                    "weekly_prices": [],
                    "recommendations": [{"date": "Jan. 4, 2024", "sentiment": "Buy"}]
                }
            });
            Ok(Snapshot::from_json_slice(v.to_string().as_bytes()).unwrap())
        }
    }

    fn cache(loader: Arc<CountingLoader>, clock: Arc<ManualClock>) -> SnapshotCache {
        SnapshotCache::new(
            loader,
            Enricher::new(Arc::new(LocalSeries)),
            clock,
            Duration::seconds(DEFAULT_TTL_SECS),
        )
    }

    #[tokio::test]
    async fn serves_cached_data_within_ttl() {
        let loader = CountingLoader::new();
        let clock = ManualClock::new();
        let cache = cache(loader.clone(), clock.clone());

        let first = cache.get().await.unwrap();
        clock.advance(Duration::minutes(14));
        let second = cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loads(), 1);
        assert_eq!(cache.refresh_count(), 1);
        assert!(first.contains_key("AAPL"));
        assert!(!first.contains_key("EMPTY"));
    }

    #[tokio::test]
    async fn recomputes_once_after_ttl() {
        let loader = CountingLoader::new();
        let clock = ManualClock::new();
        let cache = cache(loader.clone(), clock.clone());

        let first = cache.get().await.unwrap();
        // Exactly at the TTL the entry is still fresh.
        clock.advance(Duration::minutes(15));
        cache.get().await.unwrap();
        assert_eq!(cache.refresh_count(), 1);

        clock.advance(Duration::seconds(1));
        let refreshed = cache.get().await.unwrap();
        let again = cache.get().await.unwrap();

        assert_eq!(cache.refresh_count(), 2);
        assert_eq!(loader.loads(), 2);
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert!(Arc::ptr_eq(&refreshed, &again));
        assert_eq!(*first, *refreshed);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_recomputation() {
        let loader = CountingLoader::new();
        let cache = Arc::new(cache(loader.clone(), ManualClock::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await.unwrap() })
            })
            .collect();
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }

        assert_eq!(loader.loads(), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_error_and_keeps_entry() {
        let loader = CountingLoader::new();
        let clock = ManualClock::new();
        let cache = cache(loader.clone(), clock.clone());

        cache.get().await.unwrap();
        let stamped = cache.last_update().await.unwrap();

        loader.fail.store(true, Ordering::SeqCst);
        clock.advance(Duration::minutes(16));
        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
        assert_eq!(cache.last_update().await, Some(stamped));
        assert_eq!(cache.refresh_count(), 1);

        // The next call retries rather than serving the expired entry.
        loader.fail.store(false, Ordering::SeqCst);
        cache.get().await.unwrap();
        assert_eq!(loader.loads(), 3);
        assert_eq!(cache.refresh_count(), 2);
    }

    #[tokio::test]
    async fn cold_failure_stays_cold() {
        let loader = CountingLoader::new();
        loader.fail.store(true, Ordering::SeqCst);
        let cache = cache(loader.clone(), ManualClock::new());

        assert!(cache.get().await.is_err());
        assert_eq!(cache.last_update().await, None);
        assert!(cache.last_report().await.is_none());
    }
}
