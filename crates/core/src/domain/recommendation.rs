use crate::prices::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One analyst action as it appears in the snapshot.
///
/// Fields other than `ticker`, `date` and `sentiment` (firm, price target, ...) are carried
/// through untouched in `extra`. A wrongly typed known field never fails the record: a
/// non-string `date` is kept as its JSON text and fails date parsing later, while a non-string
/// `ticker` or `sentiment` counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ticker: Option<String>,
    #[serde(default, deserialize_with = "string_or_json_text")]
    pub date: String,
    #[serde(default, deserialize_with = "string_or_none")]
    pub sentiment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub(crate) fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn string_or_json_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentClass {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl SentimentClass {
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return SentimentClass::Unknown;
        };
        match label.trim().to_ascii_uppercase().as_str() {
            "STRONG BUY" | "BUY" => SentimentClass::Positive,
            "HOLD" => SentimentClass::Neutral,
            "SELL" | "STRONG SELL" => SentimentClass::Negative,
            _ => SentimentClass::Unknown,
        }
    }
}

/// Forward prices only computed when a long live series is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExtendedPrices {
    pub price_6m_after: Option<f64>,
    pub price_1y_after: Option<f64>,
    pub price_2y_after: Option<f64>,
    pub price_5y_after: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub report_date: NaiveDate,
    pub sentiment_class: SentimentClass,
    pub price_at_report: f64,
    pub price_3m_before: Option<f64>,
    pub price_3m_after: Option<f64>,
    pub date_3m_before: NaiveDate,
    pub date_3m_after: NaiveDate,
    #[serde(flatten)]
    pub extended: Option<ExtendedPrices>,
}

/// Keys the enricher writes; a passthrough field with one of these names is replaced.
pub const ENRICHED_FIELDS: &[&str] = &[
    "report_date",
    "sentiment_class",
    "price_at_report",
    "price_3m_before",
    "price_3m_after",
    "date_3m_before",
    "date_3m_after",
    "price_6m_after",
    "price_1y_after",
    "price_2y_after",
    "price_5y_after",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerRecord {
    pub ticker: String,
    pub company_name: String,
    pub market: String,
    pub sector: String,
    pub recommendations: Vec<EnrichedRecommendation>,
    pub current_quote: Value,
    pub fundamentals: Map<String, Value>,
    pub weekly_prices: PriceSeries,
}

pub type StockMap = BTreeMap<String, TickerRecord>;
