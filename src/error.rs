//! Error types for the dataset pipeline.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Date coverage of one symbol that took part in alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRange {
    pub symbol: String,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub count: usize,
}

impl fmt::Display for SymbolRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first, self.last) {
            (Some(first), Some(last)) => {
                write!(f, "{} [{} .. {}, {} days]", self.symbol, first, last, self.count)
            }
            _ => write!(f, "{} [no dates]", self.symbol),
        }
    }
}

fn join_ranges(ranges: &[SymbolRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fatal pipeline errors. Row-level problems are reported through
/// diagnostics instead.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("CSV header is missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("CSV contains no data rows")]
    EmptyDataset,

    #[error("selected symbols share no common dates: {}", join_ranges(.attempted))]
    NoCommonDates { attempted: Vec<SymbolRange> },

    #[error(
        "not enough aligned dates to build a sample: {dates} dates, \
         sequence_length={sequence_length}, predict_horizon={predict_horizon} \
         (need at least {})",
        .sequence_length + .predict_horizon
    )]
    InsufficientData {
        dates: usize,
        sequence_length: usize,
        predict_horizon: usize,
    },

    #[error("invalid loader setting: {0}")]
    InvalidSetting(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("setting file error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
