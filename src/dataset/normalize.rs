//! Per-symbol min/max scaling.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::align::AlignedDataset;
use super::types::PriceField;

/// Gap forced between min and max of a constant series
pub const NORMALIZER_EPSILON: f64 = 1e-6;

/// Value range of one feature of one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Fit on a sequence of values; `max` is nudged above `min` when all
    /// values are equal
    pub fn fit(values: impl IntoIterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            min = min.min(value);
            max = max.max(value);
        }

        if !min.is_finite() || !max.is_finite() {
            return Self { min: 0.0, max: NORMALIZER_EPSILON };
        }
        if max <= min {
            max = min + NORMALIZER_EPSILON;
        }
        Self { min, max }
    }

    /// Map a raw value into the fitted range, `[0, 1]` inside it
    pub fn scale(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Min/max per symbol and per raw feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    symbols: Vec<String>,
    fields: Vec<PriceField>,
    /// `ranges[symbol][field]`
    ranges: Vec<Vec<MinMax>>,
    /// Number of leading dates the ranges were fitted on
    fitted_dates: usize,
}

impl Normalizer {
    /// Fit every symbol/field pair on the first `fit_dates` aligned dates
    /// (clamped to the axis length).
    pub fn fit(aligned: &AlignedDataset, fields: &[PriceField], fit_dates: usize) -> Self {
        let fit_dates = fit_dates.clamp(1, aligned.len().max(1));

        let ranges: Vec<Vec<MinMax>> = (0..aligned.num_symbols())
            .map(|s| {
                let series = &aligned.series(s)[..fit_dates.min(aligned.series(s).len())];
                fields
                    .iter()
                    .map(|field| MinMax::fit(series.iter().filter_map(|r| r.get(*field))))
                    .collect()
            })
            .collect();

        for (symbol, symbol_ranges) in aligned.symbols().iter().zip(ranges.iter()) {
            debug!(symbol = %symbol, ranges = ?symbol_ranges, "Fitted normalizer");
        }

        Self {
            symbols: aligned.symbols().to_vec(),
            fields: fields.to_vec(),
            ranges,
            fitted_dates: fit_dates,
        }
    }

    pub fn fields(&self) -> &[PriceField] {
        &self.fields
    }

    pub fn fitted_dates(&self) -> usize {
        self.fitted_dates
    }

    /// Range by symbol position and field
    pub fn range(&self, symbol_idx: usize, field: PriceField) -> Option<MinMax> {
        let field_idx = self.fields.iter().position(|f| *f == field)?;
        self.ranges.get(symbol_idx)?.get(field_idx).copied()
    }

    /// Range by symbol name and field
    pub fn get(&self, symbol: &str, field: PriceField) -> Option<MinMax> {
        let symbol_idx = self.symbols.iter().position(|s| s == symbol)?;
        self.range(symbol_idx, field)
    }

    /// Scale by symbol position and field position
    pub fn scale(&self, symbol_idx: usize, field_idx: usize, value: f64) -> f64 {
        self.ranges[symbol_idx][field_idx].scale(value)
    }
}
