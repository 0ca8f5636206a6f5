use anyhow::Context;
use clap::Parser;
use ratings_core::batch::{build_records, BatchReport};
use ratings_core::config::{PriceSourceKind, Settings};
use ratings_core::domain::contract::Snapshot;
use ratings_core::enrich::Enricher;
use ratings_core::snapshot::{FileSnapshotLoader, SnapshotLoader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ratings_worker")]
struct Args {
    /// Snapshot JSON to enrich. Defaults to SNAPSHOT_PATH.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Fetch daily prices live and compute the 6M/1Y/2Y/5Y anchors as well.
    #[arg(long)]
    live: bool,

    /// Only enrich these tickers (repeatable).
    #[arg(long = "ticker")]
    tickers: Vec<String>,

    /// Write the enriched mapping here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run the batch and log the report without writing output.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(path) = &args.snapshot {
        settings.snapshot_path = path.clone();
    }
    if args.live {
        settings.price_source = PriceSourceKind::Live;
    }

    if let Err(err) = run(&args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "enrichment run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let loader = FileSnapshotLoader::new(&settings.snapshot_path);
    let snapshot = loader.load().await?;
    let snapshot = select_tickers(snapshot, &args.tickers);

    let enricher = Enricher::new(settings.price_source()?);
    tracing::info!(
        snapshot = %loader.path().display(),
        source = enricher.source_name(),
        tickers = snapshot.tickers.len(),
        "starting enrichment run"
    );

    let (records, report) = build_records(&snapshot, &enricher).await;
    log_report(&report);

    if args.dry_run {
        tracing::info!(dry_run = true, "skipping output");
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&records).context("serialize enriched records failed")?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("write {} failed", path.display()))?;
            tracing::info!(output = %path.display(), tickers = records.len(), "wrote enriched records");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn select_tickers(mut snapshot: Snapshot, tickers: &[String]) -> Snapshot {
    if tickers.is_empty() {
        return snapshot;
    }
    let wanted: Vec<String> = tickers.iter().map(|t| t.trim().to_ascii_uppercase()).collect();
    snapshot
        .tickers
        .retain(|ticker, _| wanted.iter().any(|w| w.eq_ignore_ascii_case(ticker)));
    for w in &wanted {
        if !snapshot.tickers.keys().any(|t| t.eq_ignore_ascii_case(w)) {
            tracing::warn!(ticker = %w, "ticker not present in snapshot");
        }
    }
    snapshot
}

fn log_report(report: &BatchReport) {
    tracing::info!(
        tickers_seen = report.tickers_seen,
        tickers_kept = report.tickers_kept,
        tickers_without_prices = report.tickers_without_prices,
        tickers_without_recommendations = report.tickers_without_recommendations,
        tickers_without_usable_recommendations = report.tickers_without_usable_recommendations,
        recommendations_kept = report.recommendations_kept,
        dropped_unparseable_date = report.dropped_unparseable_date,
        dropped_missing_report_price = report.dropped_missing_report_price,
        skipped_price_rows = report.skipped_price_rows,
        "enrichment report"
    );
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
