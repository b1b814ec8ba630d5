//! Symbol selection and common date axis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

use super::ingest::IngestedData;
use super::types::PriceRecord;
use crate::error::{DatasetError, Result, SymbolRange};

/// What alignment left out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignDiagnostics {
    /// Symbols present in the CSV
    pub available_symbols: usize,
    /// Present symbols not selected (over the cap or not requested)
    pub unused_symbols: Vec<String>,
    /// Requested symbols absent from the CSV
    pub unknown_symbols: Vec<String>,
    /// Rows replaced by a later row for the same symbol and date
    pub duplicate_rows: usize,
    /// Dates seen for some but not all selected symbols
    pub excluded_dates: usize,
}

/// Selected symbols restricted to the dates they all share.
///
/// `series(s)[i].date == dates()[i]` for every symbol `s` and index `i`.
#[derive(Debug, Clone)]
pub struct AlignedDataset {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    series: Vec<Vec<PriceRecord>>,
    pub diagnostics: AlignDiagnostics,
}

impl AlignedDataset {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Common date axis, ascending
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of aligned dates
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    /// Aligned records of the symbol at position `idx`
    pub fn series(&self, idx: usize) -> &[PriceRecord] {
        &self.series[idx]
    }

    /// Aligned records of a symbol by name
    pub fn get(&self, symbol: &str) -> Option<&[PriceRecord]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| self.series[idx].as_slice())
    }

    /// Raw close prices of the symbol at position `idx`
    pub fn closes(&self, idx: usize) -> Vec<f64> {
        self.series[idx].iter().map(|r| r.close).collect()
    }

    /// Long-format frame (`date`, `symbol`, `open`, `close`) for inspection
    #[cfg(feature = "frame")]
    pub fn to_dataframe(&self) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use polars::prelude::*;

        let rows = self.len() * self.num_symbols();
        let mut dates = Vec::with_capacity(rows);
        let mut symbols = Vec::with_capacity(rows);
        let mut opens = Vec::with_capacity(rows);
        let mut closes = Vec::with_capacity(rows);

        for (symbol, series) in self.symbols.iter().zip(self.series.iter()) {
            for record in series {
                dates.push(record.date.format("%Y-%m-%d").to_string());
                symbols.push(symbol.clone());
                opens.push(record.open);
                closes.push(record.close);
            }
        }

        DataFrame::new(vec![
            Column::new("date".into(), dates),
            Column::new("symbol".into(), symbols),
            Column::new("open".into(), opens),
            Column::new("close".into(), closes),
        ])
    }
}

/// Sort by date; a later row for an already seen date replaces it
fn sort_dedup(records: &[PriceRecord]) -> (Vec<PriceRecord>, usize) {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.date);

    let mut result: Vec<PriceRecord> = Vec::with_capacity(sorted.len());
    let mut duplicates = 0;
    for record in sorted {
        match result.last_mut() {
            Some(last) if last.date == record.date => {
                *last = record;
                duplicates += 1;
            }
            _ => result.push(record),
        }
    }
    (result, duplicates)
}

fn symbol_range(symbol: &str, records: &[PriceRecord]) -> SymbolRange {
    SymbolRange {
        symbol: symbol.to_string(),
        first: records.first().map(|r| r.date),
        last: records.last().map(|r| r.date),
        count: records.len(),
    }
}

/// Pick the symbols to use: the requested list in its order, or all symbols
/// sorted by name, capped at `max_symbols`.
fn select_symbols(
    data: &IngestedData,
    max_symbols: usize,
    requested: Option<&[String]>,
    diagnostics: &mut AlignDiagnostics,
) -> Vec<String> {
    let candidates: Vec<String> = match requested {
        Some(requested) => {
            let mut seen = HashSet::new();
            let mut list = Vec::new();
            for symbol in requested {
                if !seen.insert(symbol.as_str()) {
                    continue;
                }
                if data.get(symbol).is_some() {
                    list.push(symbol.clone());
                } else {
                    diagnostics.unknown_symbols.push(symbol.clone());
                }
            }
            list
        }
        None => {
            let mut list = data.symbols().to_vec();
            list.sort();
            list
        }
    };

    let selected: Vec<String> = candidates.into_iter().take(max_symbols).collect();
    diagnostics.unused_symbols = data
        .symbols()
        .iter()
        .filter(|s| !selected.contains(*s))
        .cloned()
        .collect();
    diagnostics.unused_symbols.sort();
    selected
}

/// Select symbols and restrict them to their common dates.
///
/// Fails with [`DatasetError::NoCommonDates`] when the selected symbols do
/// not share a single date.
pub fn align(
    data: &IngestedData,
    max_symbols: usize,
    requested: Option<&[String]>,
) -> Result<AlignedDataset> {
    let mut diagnostics = AlignDiagnostics {
        available_symbols: data.len(),
        ..AlignDiagnostics::default()
    };

    let symbols = select_symbols(data, max_symbols, requested, &mut diagnostics);
    if !diagnostics.unknown_symbols.is_empty() {
        warn!("Requested symbols not found in CSV: {:?}", diagnostics.unknown_symbols);
    }
    if symbols.is_empty() {
        let attempted = diagnostics
            .unknown_symbols
            .iter()
            .map(|s| symbol_range(s, &[]))
            .collect();
        return Err(DatasetError::NoCommonDates { attempted });
    }

    let mut sorted_series = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let (sorted, duplicates) = sort_dedup(data.get(symbol).unwrap_or(&[]));
        diagnostics.duplicate_rows += duplicates;
        debug!(
            symbol = %symbol,
            records = sorted.len(),
            duplicates,
            "Sorted symbol series"
        );
        sorted_series.push(sorted);
    }

    let mut union: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for series in &sorted_series {
        let set: BTreeSet<NaiveDate> = series.iter().map(|r| r.date).collect();
        union.extend(set.iter().copied());
        common = Some(match common {
            Some(common) => common.intersection(&set).copied().collect(),
            None => set,
        });
    }
    let common = common.unwrap_or_default();

    if common.is_empty() {
        let attempted = symbols
            .iter()
            .zip(sorted_series.iter())
            .map(|(symbol, series)| symbol_range(symbol, series))
            .collect();
        return Err(DatasetError::NoCommonDates { attempted });
    }

    diagnostics.excluded_dates = union.len() - common.len();
    if diagnostics.excluded_dates > 0 {
        warn!(
            excluded = diagnostics.excluded_dates,
            "Dates missing for at least one selected symbol were excluded"
        );
    }

    let series: Vec<Vec<PriceRecord>> = sorted_series
        .into_iter()
        .map(|records| {
            records
                .into_iter()
                .filter(|r| common.contains(&r.date))
                .collect()
        })
        .collect();
    let dates: Vec<NaiveDate> = common.into_iter().collect();

    info!(
        symbols = symbols.len(),
        dates = dates.len(),
        first = %dates[0],
        last = %dates[dates.len() - 1],
        "Aligned symbols on common dates"
    );

    Ok(AlignedDataset {
        symbols,
        dates,
        series,
        diagnostics,
    })
}
