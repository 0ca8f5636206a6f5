use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratings_core::cache::SnapshotCache;
use ratings_core::domain::recommendation::{StockMap, TickerRecord};
use ratings_core::error::SourceError;
use ratings_core::prices::PriceObservation;
use ratings_core::snapshot::SnapshotLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ratings_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cache = Arc::new(settings.build_cache()?);
    let loader: Arc<dyn SnapshotLoader> = Arc::new(settings.snapshot_loader());

    tracing::info!(
        snapshot = %settings.snapshot_path.display(),
        price_source = ?settings.price_source,
        ttl_secs = settings.cache_ttl.num_seconds(),
        "warming snapshot cache"
    );
    match cache.get().await {
        Ok(data) => {
            let last_update = cache.last_update().await;
            if let Some(report) = cache.last_report().await {
                tracing::info!(tickers = data.len(), ?last_update, ?report, "snapshot cache warmed");
            }
        }
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "initial snapshot load failed; starting API in degraded mode");
        }
    }

    let app = router(AppState { cache, loader });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stocks", get(get_stocks))
        .route("/api/stock/:ticker", get(get_stock))
        .route("/api/stock/:ticker/history", get(get_stock_history))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    cache: Arc<SnapshotCache>,
    /// History reads go straight to the snapshot, bypassing the cache.
    loader: Arc<dyn SnapshotLoader>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound,
    Source(SourceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Stock not found".to_string()),
            ApiError::Source(e) => (StatusCode::INTERNAL_SERVER_ERROR, report_source_error(e)),
        };
        (status, Json(ErrorDetail { detail })).into_response()
    }
}

fn report_source_error(e: SourceError) -> String {
    let err = anyhow::Error::new(e);
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "snapshot unavailable");
    err.to_string()
}

async fn get_stocks(State(state): State<AppState>) -> Result<Json<Arc<StockMap>>, ApiError> {
    let data = state.cache.get().await.map_err(ApiError::Source)?;
    Ok(Json(data))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<TickerRecord>, ApiError> {
    let data = state.cache.get().await.map_err(ApiError::Source)?;
    let record = data.get(&ticker).cloned().ok_or(ApiError::NotFound)?;
    Ok(Json(record))
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    prices: Vec<PriceObservation>,
    error: Option<String>,
}

impl HistoryResponse {
    fn failed(status: StatusCode, error: String) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                prices: Vec::new(),
                error: Some(error),
            }),
        )
    }
}

async fn get_stock_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> (StatusCode, Json<HistoryResponse>) {
    let snapshot = match state.loader.load().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let detail = report_source_error(e);
            return HistoryResponse::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unexpected error: {detail}"),
            );
        }
    };

    let Some(entry) = snapshot.get(&ticker) else {
        return HistoryResponse::failed(StatusCode::NOT_FOUND, "Stock not found".to_string());
    };

    if entry.prices.is_empty() {
        return HistoryResponse::failed(
            StatusCode::OK,
            "No historical data available".to_string(),
        );
    }

    (
        StatusCode::OK,
        Json(HistoryResponse {
            prices: entry.prices.clone(),
            error: None,
        }),
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &ratings_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
