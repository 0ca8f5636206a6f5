use crate::domain::recommendation::{
    EnrichedRecommendation, ExtendedPrices, Recommendation, SentimentClass, ENRICHED_FIELDS,
};
use crate::error::DropReason;
use crate::prices::{resolve, Direction, PriceObservation, PriceSeries, PriceSource};
use crate::time::parse_report_date;
use chrono::{Duration, NaiveDate};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Report,
    Before3m,
    After3m,
    After6m,
    After1y,
    After2y,
    After5y,
}

impl Anchor {
    pub fn offset_days(self) -> i64 {
        match self {
            Anchor::Report => 0,
            Anchor::Before3m => -90,
            Anchor::After3m => 90,
            Anchor::After6m => 180,
            Anchor::After1y => 365,
            Anchor::After2y => 730,
            Anchor::After5y => 1825,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Anchor::Report | Anchor::Before3m => Direction::OnOrBefore,
            _ => Direction::OnOrAfter,
        }
    }

    /// `None` when the shifted date falls outside the calendar range.
    pub fn target(self, report_date: NaiveDate) -> Option<NaiveDate> {
        report_date.checked_add_signed(Duration::days(self.offset_days()))
    }

    fn resolve(self, series: &[PriceObservation], report_date: NaiveDate) -> Option<f64> {
        resolve(series, self.target(report_date)?, self.direction()).map(|o| o.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSet {
    /// Report date and three months either side.
    Core,
    /// Core plus 6M/1Y/2Y/5Y forward anchors.
    Extended,
}

impl AnchorSet {
    /// Furthest forward offset, used to size fetch windows.
    pub fn max_forward_days(self) -> i64 {
        match self {
            AnchorSet::Core => Anchor::After3m.offset_days(),
            AnchorSet::Extended => Anchor::After5y.offset_days(),
        }
    }
}

/// Joins a single recommendation to the price series.
///
/// Pure: equal inputs always give equal output.
pub fn enrich(
    ticker: &str,
    rec: &Recommendation,
    series: &PriceSeries,
    anchors: AnchorSet,
) -> Result<EnrichedRecommendation, DropReason> {
    let report_date = parse_report_date(&rec.date).ok_or_else(|| DropReason::UnparseableDate {
        raw: rec.date.clone(),
    })?;
    // A report date this close to the calendar limits has no three-month window.
    let (Some(date_3m_before), Some(date_3m_after)) = (
        Anchor::Before3m.target(report_date),
        Anchor::After3m.target(report_date),
    ) else {
        return Err(DropReason::UnparseableDate {
            raw: rec.date.clone(),
        });
    };

    let prices = series.as_slice();
    let price_at_report = Anchor::Report
        .resolve(prices, report_date)
        .ok_or(DropReason::MissingReportPrice { report_date })?;

    let extended = match anchors {
        AnchorSet::Core => None,
        AnchorSet::Extended => Some(ExtendedPrices {
            price_6m_after: Anchor::After6m.resolve(prices, report_date),
            price_1y_after: Anchor::After1y.resolve(prices, report_date),
            price_2y_after: Anchor::After2y.resolve(prices, report_date),
            price_5y_after: Anchor::After5y.resolve(prices, report_date),
        }),
    };

    let mut recommendation = rec.clone();
    if recommendation.ticker.is_none() {
        recommendation.ticker = Some(ticker.to_string());
    }
    for key in ENRICHED_FIELDS {
        recommendation.extra.remove(*key);
    }

    Ok(EnrichedRecommendation {
        sentiment_class: SentimentClass::from_label(rec.sentiment.as_deref()),
        report_date,
        price_at_report,
        price_3m_before: Anchor::Before3m.resolve(prices, report_date),
        price_3m_after: Anchor::After3m.resolve(prices, report_date),
        date_3m_before,
        date_3m_after,
        extended,
        recommendation,
    })
}

/// Outcome of enriching all recommendations of one ticker.
#[derive(Debug, Clone, Default)]
pub struct TickerEnrichment {
    /// Newest report date first.
    pub kept: Vec<EnrichedRecommendation>,
    pub dropped: Vec<DropReason>,
}

/// Runs [`enrich`] against whichever series the configured [`PriceSource`] provides.
#[derive(Clone)]
pub struct Enricher {
    source: Arc<dyn PriceSource>,
}

impl Enricher {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    pub fn anchor_set(&self) -> AnchorSet {
        self.source.anchor_set()
    }

    pub async fn enrich_ticker(
        &self,
        ticker: &str,
        recommendations: &[Recommendation],
        local: &PriceSeries,
    ) -> TickerEnrichment {
        let anchors = self.anchor_set();
        let empty = PriceSeries::default();
        let mut out = TickerEnrichment::default();

        for rec in recommendations {
            // Without a report date there is nothing to fetch; let `enrich` report it.
            let series = match parse_report_date(&rec.date) {
                Some(report_date) => {
                    match self.source.series_for(ticker, local, report_date).await {
                        Ok(series) => series,
                        Err(err) => {
                            tracing::warn!(
                                %ticker,
                                %report_date,
                                source = self.source_name(),
                                error = %err,
                                "price source failed; resolving against an empty series"
                            );
                            Cow::Borrowed(&empty)
                        }
                    }
                }
                None => Cow::Borrowed(&empty),
            };

            match enrich(ticker, rec, &series, anchors) {
                Ok(enriched) => {
                    tracing::debug!(
                        %ticker,
                        report_date = %enriched.report_date,
                        price_at_report = enriched.price_at_report,
                        price_3m_before = ?enriched.price_3m_before,
                        price_3m_after = ?enriched.price_3m_after,
                        "enriched recommendation"
                    );
                    out.kept.push(enriched);
                }
                Err(reason) => {
                    tracing::info!(%ticker, reason = %reason, "dropping recommendation");
                    out.dropped.push(reason);
                }
            }
        }

        out.kept.sort_by(|a, b| b.report_date.cmp(&a.report_date));
        out
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("source", &self.source_name())
            .finish()
    }
}
