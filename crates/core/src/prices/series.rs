use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
}

/// Price history for one ticker, newest first.
///
/// Construction always sorts, so lookups can rely on the descending order. The sort is stable:
/// if a source repeats a date, the observation that came first keeps precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceSeries(Vec<PriceObservation>);

impl PriceSeries {
    pub fn new(mut observations: Vec<PriceObservation>) -> Self {
        observations.sort_by(|a, b| b.date.cmp(&a.date));
        Self(observations)
    }

    pub fn as_slice(&self) -> &[PriceObservation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&PriceObservation> {
        self.0.first()
    }

    pub fn earliest(&self) -> Option<&PriceObservation> {
        self.0.last()
    }
}
