//! CSV ingestion: raw text to per-symbol price records.
//!
//! Parsing is lenient at the row level. Rows with a wrong field count, a
//! missing or unparseable date, an empty symbol or a bad number in a used
//! column are dropped and counted in [`IngestDiagnostics`]; only a broken
//! header or an empty file abort the load.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::types::{PriceField, PriceRecord};
use crate::error::{DatasetError, Result};
use crate::utility::{parse_date, parse_price};

/// Number of dropped lines remembered individually
const MAX_DROP_SAMPLES: usize = 20;

/// Why a CSV row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Field count differs from the header
    FieldCount,
    MissingDate,
    InvalidDate,
    MissingSymbol,
    /// Unparseable or non-finite value in a used price column
    InvalidNumber,
    /// Row the CSV reader itself rejected
    Malformed,
}

/// A dropped row, by 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub line: u64,
    pub reason: DropReason,
}

/// Row-level parse diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestDiagnostics {
    /// Data rows seen after the header
    pub total_rows: usize,
    pub dropped_rows: usize,
    pub reasons: BTreeMap<DropReason, usize>,
    /// The first few dropped rows
    pub samples: Vec<DroppedRow>,
}

impl IngestDiagnostics {
    fn drop_row(&mut self, line: u64, reason: DropReason) {
        self.dropped_rows += 1;
        *self.reasons.entry(reason).or_insert(0) += 1;
        if self.samples.len() < MAX_DROP_SAMPLES {
            self.samples.push(DroppedRow { line, reason });
        }
    }

    /// Number of rows dropped for one reason
    pub fn count(&self, reason: DropReason) -> usize {
        self.reasons.get(&reason).copied().unwrap_or(0)
    }

    pub fn kept_rows(&self) -> usize {
        self.total_rows - self.dropped_rows
    }
}

/// Per-symbol records in first-seen order, each list unsorted
#[derive(Debug, Clone)]
pub struct IngestedData {
    symbols: Vec<String>,
    series: Vec<Vec<PriceRecord>>,
    index: HashMap<String, usize>,
    pub diagnostics: IngestDiagnostics,
}

impl IngestedData {
    fn new() -> Self {
        Self {
            symbols: Vec::new(),
            series: Vec::new(),
            index: HashMap::new(),
            diagnostics: IngestDiagnostics::default(),
        }
    }

    fn push(&mut self, symbol: &str, record: PriceRecord) {
        let idx = match self.index.get(symbol) {
            Some(&idx) => idx,
            None => {
                let idx = self.symbols.len();
                self.symbols.push(symbol.to_string());
                self.series.push(Vec::new());
                self.index.insert(symbol.to_string(), idx);
                idx
            }
        };
        self.series[idx].push(record);
    }

    /// Symbols in the order they first appeared
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Records of one symbol, in file order
    pub fn get(&self, symbol: &str) -> Option<&[PriceRecord]> {
        self.index.get(symbol).map(|&idx| self.series[idx].as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PriceRecord])> {
        self.symbols
            .iter()
            .zip(self.series.iter())
            .map(|(symbol, records)| (symbol.as_str(), records.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.series.iter().map(Vec::len).sum()
    }
}

/// Column positions resolved from the header
#[derive(Debug, Clone)]
struct ColumnMap {
    width: usize,
    date: usize,
    symbol: usize,
    fields: HashMap<PriceField, usize>,
}

const ALL_FIELDS: [PriceField; 5] = [
    PriceField::Open,
    PriceField::High,
    PriceField::Low,
    PriceField::Close,
    PriceField::Volume,
];

impl ColumnMap {
    fn resolve(header: &StringRecord, feature_keys: &[PriceField]) -> Result<Self> {
        let names: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == &name.to_lowercase());

        let mut required = vec!["Date", "Symbol", "Open", "Close"];
        for key in feature_keys {
            if !required.contains(&key.column_name()) {
                required.push(key.column_name());
            }
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::Schema { missing });
        }

        let fields = ALL_FIELDS
            .iter()
            .filter_map(|field| find(field.column_name()).map(|idx| (*field, idx)))
            .collect();

        Ok(Self {
            width: header.len(),
            date: find("Date").unwrap_or_default(),
            symbol: find("Symbol").unwrap_or_default(),
            fields,
        })
    }
}

fn parse_row(
    row: &StringRecord,
    columns: &ColumnMap,
    feature_keys: &[PriceField],
) -> std::result::Result<(String, PriceRecord), DropReason> {
    if row.len() != columns.width {
        return Err(DropReason::FieldCount);
    }

    let date_cell = row.get(columns.date).unwrap_or("");
    if date_cell.is_empty() {
        return Err(DropReason::MissingDate);
    }
    let date = parse_date(date_cell).ok_or(DropReason::InvalidDate)?;

    let symbol = row.get(columns.symbol).unwrap_or("");
    if symbol.is_empty() {
        return Err(DropReason::MissingSymbol);
    }

    let mut values: HashMap<PriceField, f64> = HashMap::new();
    for (field, &idx) in &columns.fields {
        let used = matches!(field, PriceField::Open | PriceField::Close) || feature_keys.contains(field);
        match parse_price(row.get(idx).unwrap_or("")) {
            Some(value) => {
                values.insert(*field, value);
            }
            None if used => return Err(DropReason::InvalidNumber),
            None => {}
        }
    }

    let open = values.get(&PriceField::Open).copied().ok_or(DropReason::InvalidNumber)?;
    let close = values.get(&PriceField::Close).copied().ok_or(DropReason::InvalidNumber)?;

    let record = PriceRecord {
        date,
        open,
        close,
        high: values.get(&PriceField::High).copied(),
        low: values.get(&PriceField::Low).copied(),
        volume: values.get(&PriceField::Volume).copied(),
    };
    Ok((symbol.to_string(), record))
}

/// Parse CSV text into per-symbol price records.
///
/// The header must contain `Date`, `Symbol`, `Open`, `Close` (any case, any
/// order) plus every column named by `feature_keys`.
pub fn ingest_csv(text: &str, feature_keys: &[PriceField]) -> Result<IngestedData> {
    if text.trim().is_empty() {
        return Err(DatasetError::EmptyDataset);
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header = rdr.headers().map_err(|_| DatasetError::EmptyDataset)?.clone();
    let columns = ColumnMap::resolve(&header, feature_keys)?;
    debug!(
        "Resolved CSV columns: date={}, symbol={}, prices={:?}",
        columns.date, columns.symbol, columns.fields
    );

    let mut data = IngestedData::new();
    for result in rdr.records() {
        data.diagnostics.total_rows += 1;
        match result {
            Ok(row) => {
                let line = row.position().map(|p| p.line()).unwrap_or(0);
                match parse_row(&row, &columns, feature_keys) {
                    Ok((symbol, record)) => data.push(&symbol, record),
                    Err(reason) => data.diagnostics.drop_row(line, reason),
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                data.diagnostics.drop_row(line, DropReason::Malformed);
            }
        }
    }

    if data.diagnostics.dropped_rows > 0 {
        warn!(
            dropped = data.diagnostics.dropped_rows,
            total = data.diagnostics.total_rows,
            "Dropped unparseable CSV rows: {:?}",
            data.diagnostics.reasons
        );
    }

    if data.is_empty() {
        return Err(DatasetError::EmptyDataset);
    }

    info!(
        symbols = data.len(),
        records = data.total_records(),
        "Ingested CSV"
    );
    Ok(data)
}
