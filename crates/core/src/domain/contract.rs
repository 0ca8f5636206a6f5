//! Shape of the snapshot file (`stock_data_complete.json`) and its validation into typed records.

use crate::domain::recommendation::{string_or_none, Recommendation};
use crate::prices::PriceObservation;
use crate::time::parse_price_date;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct RawTickerEntry {
    #[serde(default, deserialize_with = "string_or_none")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub market: Option<String>,
    #[serde(default)]
    pub weekly_prices: Option<Vec<RawPriceRow>>,
    /// Kept loose so one malformed entry is skipped instead of failing the file.
    #[serde(default)]
    pub recommendations: Option<Vec<Value>>,
    #[serde(default)]
    pub current_quote: Option<Value>,
    #[serde(default)]
    pub company_info: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceRow {
    #[serde(default, deserialize_with = "string_or_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub close: Option<RawClose>,
}

/// Closes are written as numbers by some collectors and as strings by others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawClose {
    Number(f64),
    Text(String),
}

impl RawClose {
    fn value(&self) -> Option<f64> {
        let v = match self {
            RawClose::Number(n) => *n,
            RawClose::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

/// A validated snapshot entry for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSnapshot {
    pub ticker: String,
    pub company_name: Option<String>,
    pub market: Option<String>,
    /// Price rows in file order.
    pub prices: Vec<PriceObservation>,
    pub skipped_prices: usize,
    pub recommendations: Vec<Recommendation>,
    pub current_quote: Value,
    pub company_info: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub tickers: BTreeMap<String, TickerSnapshot>,
}

impl Snapshot {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let raw = serde_json::from_slice::<BTreeMap<String, RawTickerEntry>>(bytes)?;
        let tickers = raw
            .into_iter()
            .map(|(ticker, entry)| {
                let validated = entry.validate_and_into_ticker(&ticker);
                (ticker, validated)
            })
            .collect();
        Ok(Self { tickers })
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerSnapshot> {
        self.tickers.get(ticker)
    }

    pub fn skipped_prices(&self) -> usize {
        self.tickers.values().map(|t| t.skipped_prices).sum()
    }
}

impl RawTickerEntry {
    pub fn validate_and_into_ticker(self, ticker: &str) -> TickerSnapshot {
        let rows = self.weekly_prices.unwrap_or_default();
        let mut prices = Vec::with_capacity(rows.len());
        let mut skipped_prices = 0;
        for row in rows {
            match row.validate() {
                Some(obs) => prices.push(obs),
                None => {
                    skipped_prices += 1;
                    tracing::debug!(%ticker, date = ?row.date, "skipping unusable price row");
                }
            }
        }

        let recommendations = self
            .recommendations
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Recommendation>(v) {
                Ok(rec) => Some(rec),
                Err(err) => {
                    tracing::warn!(%ticker, error = %err, "skipping malformed recommendation");
                    None
                }
            })
            .collect();

        let current_quote = match self.current_quote {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(v) => v,
        };

        TickerSnapshot {
            ticker: ticker.to_string(),
            company_name: non_empty(self.company_name),
            market: non_empty(self.market),
            prices,
            skipped_prices,
            recommendations,
            current_quote,
            company_info: self.company_info.unwrap_or_default(),
        }
    }
}

impl RawPriceRow {
    fn validate(&self) -> Option<PriceObservation> {
        let date = parse_price_date(self.date.as_deref()?)?;
        let close = self.close.as_ref()?.value()?;
        Some(PriceObservation { date, close })
    }
}

impl TickerSnapshot {
    pub fn sector(&self) -> Option<&str> {
        self.company_info
            .get("sector")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
