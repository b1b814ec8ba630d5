//! Per-day feature vectors for every aligned symbol.

use ndarray::{s, Array3, ArrayView1};
use tracing::info;

use super::align::AlignedDataset;
use super::normalize::Normalizer;
use crate::setting::FeatureMode;

/// Gain applied to returns and momentum before clamping
pub const SIGNAL_GAIN: f64 = 5.0;

/// Names of the signals appended in derived mode
pub const DERIVED_FEATURE_NAMES: [&str; 3] = ["return", "momentum", "volatility"];

/// Relative change, zero when the base is zero
fn pct_change(current: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        (current - base) / base
    }
}

/// Scaled return, two-day momentum and volatility for every day of a close
/// series.
///
/// Days without enough history compare against themselves and get 0:
/// the return on day 0, the momentum on days 0 and 1.
pub fn price_signals(closes: &[f64]) -> Vec<[f64; 3]> {
    (0..closes.len())
        .map(|k| {
            let prev1 = if k >= 1 { closes[k - 1] } else { closes[k] };
            let prev2 = if k >= 2 { closes[k - 2] } else { closes[k] };
            let ret = pct_change(closes[k], prev1);
            let momentum = pct_change(closes[k], prev2);

            let ret_scaled = (ret * SIGNAL_GAIN).clamp(-1.0, 1.0);
            let momentum_scaled = (momentum * SIGNAL_GAIN).clamp(-1.0, 1.0);
            let volatility = (ret_scaled - momentum_scaled).abs().clamp(0.0, 2.0);
            [ret_scaled, momentum_scaled, volatility]
        })
        .collect()
}

/// Feature values laid out as `[symbol, day, feature]`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Array3<f64>,
    names: Vec<String>,
}

impl FeatureMatrix {
    pub fn num_symbols(&self) -> usize {
        self.values.shape()[0]
    }

    pub fn num_days(&self) -> usize {
        self.values.shape()[1]
    }

    pub fn features_per_symbol(&self) -> usize {
        self.values.shape()[2]
    }

    /// Feature names in per-symbol order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Feature vector of one symbol on one day
    pub fn row(&self, symbol_idx: usize, day: usize) -> Option<ArrayView1<'_, f64>> {
        if symbol_idx >= self.num_symbols() || day >= self.num_days() {
            return None;
        }
        Some(self.values.slice(s![symbol_idx, day, ..]))
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }
}

/// Build the feature matrix from aligned prices and a fitted normalizer.
///
/// Raw mode emits the normalized columns of the normalizer; derived mode
/// appends scaled return, momentum and volatility computed from raw closes.
pub fn derive_features(
    aligned: &AlignedDataset,
    normalizer: &Normalizer,
    mode: FeatureMode,
) -> FeatureMatrix {
    let fields = normalizer.fields();
    let raw_count = fields.len();
    let feature_count = match mode {
        FeatureMode::Raw => raw_count,
        FeatureMode::Derived => raw_count + DERIVED_FEATURE_NAMES.len(),
    };

    let mut values = Array3::<f64>::zeros((aligned.num_symbols(), aligned.len(), feature_count));

    for s in 0..aligned.num_symbols() {
        let series = aligned.series(s);
        for (k, record) in series.iter().enumerate() {
            for (f, field) in fields.iter().enumerate() {
                values[[s, k, f]] = match record.get(*field) {
                    Some(raw) => normalizer.scale(s, f, raw),
                    None => f64::NAN,
                };
            }
        }

        if mode == FeatureMode::Derived {
            let signals = price_signals(&aligned.closes(s));
            for (k, signal) in signals.iter().enumerate() {
                for (j, value) in signal.iter().enumerate() {
                    values[[s, k, raw_count + j]] = *value;
                }
            }
        }
    }

    let mut names: Vec<String> = fields.iter().map(|f| f.feature_name().to_string()).collect();
    if mode == FeatureMode::Derived {
        names.extend(DERIVED_FEATURE_NAMES.iter().map(|n| n.to_string()));
    }

    info!(
        symbols = aligned.num_symbols(),
        days = aligned.len(),
        features = feature_count,
        mode = ?mode,
        "Derived features"
    );

    FeatureMatrix { values, names }
}
