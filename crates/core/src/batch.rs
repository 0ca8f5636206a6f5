use crate::domain::contract::{Snapshot, TickerSnapshot};
use crate::domain::recommendation::{StockMap, TickerRecord};
use crate::enrich::Enricher;
use crate::error::{DropReason, TickerDrop};
use crate::prices::PriceSeries;
use serde::Serialize;

const NOT_AVAILABLE: &str = "N/A";

/// Counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub tickers_seen: usize,
    pub tickers_kept: usize,
    pub tickers_without_prices: usize,
    pub tickers_without_recommendations: usize,
    pub tickers_without_usable_recommendations: usize,
    pub recommendations_kept: usize,
    pub dropped_unparseable_date: usize,
    pub dropped_missing_report_price: usize,
    pub skipped_price_rows: usize,
}

impl BatchReport {
    fn record_ticker_drop(&mut self, reason: TickerDrop) {
        match reason {
            TickerDrop::NoPrices => self.tickers_without_prices += 1,
            TickerDrop::NoRecommendations => self.tickers_without_recommendations += 1,
            TickerDrop::NoUsableRecommendations => {
                self.tickers_without_usable_recommendations += 1
            }
        }
    }

    fn record_recommendation_drop(&mut self, reason: &DropReason) {
        match reason {
            DropReason::UnparseableDate { .. } => self.dropped_unparseable_date += 1,
            DropReason::MissingReportPrice { .. } => self.dropped_missing_report_price += 1,
        }
    }
}

/// Enriches every ticker of the snapshot.
///
/// Tickers without prices, without recommendations, or left with no recommendation after
/// enrichment are not part of the result. Tickers are processed one at a time.
pub async fn build_records(snapshot: &Snapshot, enricher: &Enricher) -> (StockMap, BatchReport) {
    let t0 = std::time::Instant::now();
    let mut records = StockMap::new();
    let mut report = BatchReport {
        tickers_seen: snapshot.tickers.len(),
        skipped_price_rows: snapshot.skipped_prices(),
        ..Default::default()
    };

    for (ticker, entry) in &snapshot.tickers {
        match build_ticker_record(ticker, entry, enricher, &mut report).await {
            Ok(record) => {
                report.recommendations_kept += record.recommendations.len();
                records.insert(ticker.clone(), record);
            }
            Err(reason) => {
                tracing::info!(%ticker, reason = %reason, "dropping ticker");
                report.record_ticker_drop(reason);
            }
        }
    }

    report.tickers_kept = records.len();
    tracing::info!(
        source = enricher.source_name(),
        tickers_seen = report.tickers_seen,
        tickers_kept = report.tickers_kept,
        recommendations_kept = report.recommendations_kept,
        dropped_unparseable_date = report.dropped_unparseable_date,
        dropped_missing_report_price = report.dropped_missing_report_price,
        skipped_price_rows = report.skipped_price_rows,
        elapsed_ms = t0.elapsed().as_millis(),
        "batch complete"
    );

    (records, report)
}

async fn build_ticker_record(
    ticker: &str,
    entry: &TickerSnapshot,
    enricher: &Enricher,
    report: &mut BatchReport,
) -> Result<TickerRecord, TickerDrop> {
    if entry.prices.is_empty() {
        return Err(TickerDrop::NoPrices);
    }
    if entry.recommendations.is_empty() {
        return Err(TickerDrop::NoRecommendations);
    }

    let series = PriceSeries::new(entry.prices.clone());
    let enrichment = enricher
        .enrich_ticker(ticker, &entry.recommendations, &series)
        .await;
    for reason in &enrichment.dropped {
        report.record_recommendation_drop(reason);
    }
    if enrichment.kept.is_empty() {
        return Err(TickerDrop::NoUsableRecommendations);
    }

    Ok(TickerRecord {
        ticker: ticker.to_string(),
        company_name: entry
            .company_name
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        market: entry
            .market
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        sector: entry.sector().unwrap_or(NOT_AVAILABLE).to_string(),
        recommendations: enrichment.kept,
        current_quote: entry.current_quote.clone(),
        fundamentals: entry.company_info.clone(),
        weekly_prices: series,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::LocalSeries;
    use serde_json::json;
    use std::sync::Arc;

    fn snapshot(v: serde_json::Value) -> Snapshot {
        Snapshot::from_json_slice(v.to_string().as_bytes()).unwrap()
    }

    fn enricher() -> Enricher {
        Enricher::new(Arc::new(LocalSeries))
    }

    #[tokio::test]
    async fn builds_records_and_drops_ineligible_tickers() {
        let snap = snapshot(json!({
            "AAPL": {
                "company_name": "Apple Inc.",
                "market": "NASDAQ",
                "weekly_prices": [
                    {"date": "2024-01-03", "close": "90"},
                    {"date": "2024-01-10", "close": "100"}
                ],
                "recommendations": [
                    {"date": "Jan. 4, 2024", "sentiment": "Buy"},
                    {"date": "Jan. 11, 2024", "sentiment": "Hold"},
                    {"date": "sometime", "sentiment": "Buy"}
                ],
                "current_quote": {"price": 105.0},
                "company_info": {"sector": "Technology"}
            },
            "NOPX": {
                "weekly_prices": [],
                "recommendations": [{"date": "Jan. 4, 2024", "sentiment": "Buy"}]
            },
            "NORC": {
                "weekly_prices": [{"date": "2024-01-03", "close": 5}],
                "recommendations": []
            },
            "OLD": {
                "weekly_prices": [{"date": "2024-01-03", "close": 5}],
                "recommendations": [{"date": "Jan. 4, 2019", "sentiment": "Sell"}]
            }
        }));

        let (records, report) = build_records(&snap, &enricher()).await;

        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["AAPL"]);
        let aapl = &records["AAPL"];
        assert_eq!(aapl.company_name, "Apple Inc.");
        assert_eq!(aapl.sector, "Technology");
        assert_eq!(aapl.recommendations.len(), 2);
        assert_eq!(aapl.recommendations[0].price_at_report, 100.0);
        assert_eq!(aapl.recommendations[1].price_at_report, 90.0);
        assert_eq!(aapl.weekly_prices.latest().unwrap().close, 100.0);
        assert_eq!(aapl.current_quote, json!({"price": 105.0}));

        assert_eq!(
            report,
            BatchReport {
                tickers_seen: 4,
                tickers_kept: 1,
                tickers_without_prices: 1,
                tickers_without_recommendations: 1,
                tickers_without_usable_recommendations: 1,
                recommendations_kept: 2,
                dropped_unparseable_date: 1,
                dropped_missing_report_price: 1,
                skipped_price_rows: 0,
            }
        );
    }

    #[tokio::test]
    async fn every_record_has_recommendations_and_prices() {
        let snap = snapshot(json!({
            "A": {"weekly_prices": [{"date": "2024-01-03", "close": 1}], "recommendations": [{"date": "2024-01-05"}]},
            "B": {"weekly_prices": [{"date": "bad", "close": 1}], "recommendations": [{"date": "2024-01-05"}]},
            "C": {"recommendations": [{"date": "2024-01-05"}]}
        }));
        let (records, report) = build_records(&snap, &enricher()).await;
        assert!(records
            .values()
            .all(|r| !r.recommendations.is_empty() && !r.weekly_prices.is_empty()));
        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped_price_rows, 1);
        assert_eq!(report.tickers_without_prices, 2);
    }

    #[tokio::test]
    async fn wrongly_typed_recommendation_dates_are_dropped_not_fatal() {
        let snap = snapshot(json!({
            "AAPL": {
                "weekly_prices": [{"date": "2024-01-03", "close": 1}],
                "recommendations": [{"date": "2024-01-05", "sentiment": 5}]
            },
            "MSFT": {
                "weekly_prices": [{"date": "2024-01-03", "close": 1}],
                "recommendations": [{"date": null}, {"date": 20240105}]
            }
        }));
        let (records, report) = build_records(&snap, &enricher()).await;
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["AAPL"]);
        assert_eq!(
            records["AAPL"].recommendations[0].sentiment_class,
            crate::domain::recommendation::SentimentClass::Unknown
        );
        assert_eq!(report.dropped_unparseable_date, 2);
        assert_eq!(report.tickers_without_usable_recommendations, 1);
    }

    #[tokio::test]
    async fn missing_metadata_defaults_to_not_available() {
        let snap = snapshot(json!({
            "X": {"weekly_prices": [{"date": "2024-01-03", "close": 1}], "recommendations": [{"date": "2024-01-05"}]}
        }));
        let (records, _) = build_records(&snap, &enricher()).await;
        let x = &records["X"];
        assert_eq!(x.company_name, "N/A");
        assert_eq!(x.market, "N/A");
        assert_eq!(x.sector, "N/A");
        assert_eq!(x.current_quote, json!({}));
        assert!(x.fundamentals.is_empty());
    }
}
