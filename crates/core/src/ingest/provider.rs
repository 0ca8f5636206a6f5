use crate::config::Settings;
use crate::enrich::AnchorSet;
use crate::ingest::types::ChartResponse;
use crate::prices::{PriceObservation, PriceSeries, PriceSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate};
use std::borrow::Cow;

// Padding on each side of the fetch window so weekend/holiday anchors still find a bar.
const WINDOW_PADDING_DAYS: i64 = 10;

/// Daily closes from a chart-style HTTP API (`/v8/finance/chart/{ticker}`).
///
/// One request per recommendation, no retries: a failed fetch surfaces as an error and the
/// enricher treats it as an empty series.
#[derive(Debug, Clone)]
pub struct RemoteChart {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteChart {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.live_prices_timeout)
            .user_agent(concat!("ratings_core/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build live price http client")?;

        Ok(Self {
            http,
            base_url: settings.live_prices_base_url.clone(),
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker.trim()
        )
    }

    pub async fn fetch_daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let period1 = start.and_hms_opt(0, 0, 0).context("invalid start")?.and_utc().timestamp();
        let period2 = end.and_hms_opt(0, 0, 0).context("invalid end")?.and_utc().timestamp();

        let res = self
            .http
            .get(self.url(ticker))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .context("live price request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read live price response")?;
        if !status.is_success() {
            anyhow::bail!("live price HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<ChartResponse>(&text)
            .context("failed to parse live price response")?;
        parse_chart(parsed)
    }
}

/// Date range covering every anchor of a report date, padded on both sides.
fn fetch_window(report_date: NaiveDate, forward_days: i64) -> Result<(NaiveDate, NaiveDate)> {
    let start = report_date
        .checked_sub_signed(Duration::days(WINDOW_PADDING_DAYS))
        .with_context(|| format!("report date {report_date} has no fetch window start"))?;
    let end = report_date
        .checked_add_signed(Duration::days(forward_days + WINDOW_PADDING_DAYS))
        .with_context(|| format!("report date {report_date} has no fetch window end"))?;
    Ok((start, end))
}

#[async_trait::async_trait]
impl PriceSource for RemoteChart {
    fn source_name(&self) -> &'static str {
        "live_chart"
    }

    fn anchor_set(&self) -> AnchorSet {
        AnchorSet::Extended
    }

    async fn series_for<'a>(
        &'a self,
        ticker: &str,
        _local: &'a PriceSeries,
        report_date: NaiveDate,
    ) -> Result<Cow<'a, PriceSeries>> {
        let (start, end) = fetch_window(report_date, self.anchor_set().max_forward_days())?;

        tracing::debug!(%ticker, %start, %end, "fetching live price window");
        let series = self.fetch_daily_closes(ticker, start, end).await?;
        tracing::debug!(
            %ticker,
            bars = series.len(),
            first = ?series.earliest().map(|o| o.date),
            last = ?series.latest().map(|o| o.date),
            "live price window fetched"
        );
        Ok(Cow::Owned(series))
    }
}

fn parse_chart(resp: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = resp.chart.error {
        anyhow::bail!(
            "chart API error {}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        );
    }

    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::default());
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    // Bars with a null close (halts, partial days) are dropped.
    let observations = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceObservation { date, close })
        })
        .collect();

    Ok(PriceSeries::new(observations))
}
