pub mod batch;
pub mod cache;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod prices;
pub mod snapshot;
pub mod time;

pub mod config {
    use crate::cache::{SnapshotCache, SystemClock, DEFAULT_TTL_SECS};
    use crate::enrich::Enricher;
    use crate::ingest::provider::RemoteChart;
    use crate::prices::{LocalSeries, PriceSource};
    use crate::snapshot::FileSnapshotLoader;
    use anyhow::Context;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    const DEFAULT_SNAPSHOT_PATH: &str = "static/stock_data_complete.json";
    const DEFAULT_LIVE_PRICES_BASE_URL: &str = "https://query1.finance.yahoo.com";
    const DEFAULT_LIVE_PRICES_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_PORT: u16 = 8000;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PriceSourceKind {
        /// Weekly prices from the snapshot, core anchors only.
        Snapshot,
        /// Daily prices fetched per recommendation, all anchors.
        Live,
    }

    impl std::str::FromStr for PriceSourceKind {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> anyhow::Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "snapshot" | "local" => Ok(Self::Snapshot),
                "live" | "remote" => Ok(Self::Live),
                other => anyhow::bail!("unknown PRICE_SOURCE {other:?} (expected snapshot|live)"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub snapshot_path: PathBuf,
        pub cache_ttl: chrono::Duration,
        pub price_source: PriceSourceKind,
        pub live_prices_base_url: String,
        pub live_prices_timeout: Duration,
        pub sentry_dsn: Option<String>,
        pub port: u16,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
                cache_ttl: chrono::Duration::seconds(DEFAULT_TTL_SECS),
                price_source: PriceSourceKind::Snapshot,
                live_prices_base_url: DEFAULT_LIVE_PRICES_BASE_URL.to_string(),
                live_prices_timeout: Duration::from_secs(DEFAULT_LIVE_PRICES_TIMEOUT_SECS),
                sentry_dsn: None,
                port: DEFAULT_PORT,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
            let mut out = Self::default();

            if let Some(path) = var("SNAPSHOT_PATH") {
                out.snapshot_path = PathBuf::from(path);
            }

            if let Some(s) = var("CACHE_TTL_SECS") {
                let secs = s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("CACHE_TTL_SECS must be an integer (got {s:?})"))?;
                anyhow::ensure!(secs >= 0, "CACHE_TTL_SECS must be >= 0 (got {secs})");
                out.cache_ttl = chrono::Duration::seconds(secs);
            }

            if let Some(s) = var("PRICE_SOURCE") {
                out.price_source = s.parse()?;
            }

            if let Some(url) = var("LIVE_PRICES_BASE_URL") {
                out.live_prices_base_url = url;
            }

            if let Some(s) = var("LIVE_PRICES_TIMEOUT_SECS") {
                let secs = s.trim().parse::<u64>().with_context(|| {
                    format!("LIVE_PRICES_TIMEOUT_SECS must be an integer (got {s:?})")
                })?;
                out.live_prices_timeout = Duration::from_secs(secs);
            }

            out.sentry_dsn = var("SENTRY_DSN");

            if let Some(s) = var("PORT") {
                out.port = s
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a port number (got {s:?})"))?;
            }

            Ok(out)
        }

        pub fn price_source(&self) -> anyhow::Result<Arc<dyn PriceSource>> {
            let source: Arc<dyn PriceSource> = match self.price_source {
                PriceSourceKind::Snapshot => Arc::new(LocalSeries),
                PriceSourceKind::Live => Arc::new(RemoteChart::from_settings(self)?),
            };
            Ok(source)
        }

        pub fn snapshot_loader(&self) -> FileSnapshotLoader {
            FileSnapshotLoader::new(&self.snapshot_path)
        }

        pub fn build_cache(&self) -> anyhow::Result<SnapshotCache> {
            let enricher = Enricher::new(self.price_source()?);
            Ok(SnapshotCache::new(
                Arc::new(self.snapshot_loader()),
                enricher,
                Arc::new(SystemClock),
                self.cache_ttl,
            ))
        }
    }

}
