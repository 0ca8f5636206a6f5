use crate::enrich::AnchorSet;
use crate::prices::PriceSeries;
use chrono::NaiveDate;
use std::borrow::Cow;

/// Supplies the series a recommendation's anchors are resolved against.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    fn anchor_set(&self) -> AnchorSet;

    /// `local` is the ticker's own snapshot series.
    async fn series_for<'a>(
        &'a self,
        ticker: &str,
        local: &'a PriceSeries,
        report_date: NaiveDate,
    ) -> anyhow::Result<Cow<'a, PriceSeries>>;
}

/// Resolves against the snapshot's weekly prices only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSeries;

#[async_trait::async_trait]
impl PriceSource for LocalSeries {
    fn source_name(&self) -> &'static str {
        "snapshot"
    }

    fn anchor_set(&self) -> AnchorSet {
        AnchorSet::Core
    }

    async fn series_for<'a>(
        &'a self,
        _ticker: &str,
        local: &'a PriceSeries,
        _report_date: NaiveDate,
    ) -> anyhow::Result<Cow<'a, PriceSeries>> {
        Ok(Cow::Borrowed(local))
    }
}
