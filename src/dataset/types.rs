//! Price records and shared dataset enums.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw price column usable as a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// CSV header name (matched case-insensitively)
    pub fn column_name(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume",
        }
    }

    /// Lower-case feature name used in feature listings
    pub fn feature_name(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One row of one symbol on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, open: f64, close: f64) -> Self {
        Self {
            date,
            open,
            close,
            high: None,
            low: None,
            volume: None,
        }
    }

    /// Value of a price column, `None` when the column was not loaded
    pub fn get(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => Some(self.open),
            PriceField::Close => Some(self.close),
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Volume => self.volume,
        }
    }
}

/// Data segment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Train,
    Test,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_get() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut record = PriceRecord::new(date, 10.0, 11.0);
        assert_eq!(record.get(PriceField::Open), Some(10.0));
        assert_eq!(record.get(PriceField::Close), Some(11.0));
        assert_eq!(record.get(PriceField::High), None);

        record.high = Some(12.5);
        assert_eq!(record.get(PriceField::High), Some(12.5));
    }

    #[test]
    fn test_field_serde_names() {
        let json = serde_json::to_string(&vec![PriceField::Open, PriceField::Volume]).unwrap();
        assert_eq!(json, r#"["Open","Volume"]"#);
        assert_eq!(PriceField::Close.to_string(), "Close");
    }
}
