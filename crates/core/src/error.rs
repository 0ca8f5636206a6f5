use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;

/// Why a single recommendation was left out of a ticker's enriched list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    UnparseableDate { raw: String },
    MissingReportPrice { report_date: NaiveDate },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnparseableDate { raw } => {
                write!(f, "unrecognised recommendation date {raw:?}")
            }
            DropReason::MissingReportPrice { report_date } => {
                write!(f, "no price on or before report date {report_date}")
            }
        }
    }
}

impl std::error::Error for DropReason {}

/// Why a whole ticker was left out of the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerDrop {
    NoPrices,
    NoRecommendations,
    NoUsableRecommendations,
}

impl fmt::Display for TickerDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TickerDrop::NoPrices => "no price history",
            TickerDrop::NoRecommendations => "no recommendations",
            TickerDrop::NoUsableRecommendations => "no recommendation survived enrichment",
        };
        f.write_str(s)
    }
}

/// The snapshot could not be read or does not match the expected schema.
#[derive(Debug)]
pub enum SourceError {
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unreadable { path, source } => {
                write!(f, "snapshot {} is unreadable: {source}", path.display())
            }
            SourceError::Malformed { path, source } => {
                write!(f, "snapshot {} is malformed: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Unreadable { source, .. } => Some(source),
            SourceError::Malformed { source, .. } => Some(source),
        }
    }
}
