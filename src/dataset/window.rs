//! Sliding windows, direction labels and the chronological split.
//!
//! For an anchor day `t` the input is the `sequence_length` feature rows
//! ending at `t`, each row the concatenation of every symbol's features in
//! symbol order. Labels compare raw closes `predict_horizon` days ahead with
//! the close at `t` and are flattened day-major: the label of symbol `s`
//! on future day `h` (1-based) sits at `s + (h - 1) * num_symbols`.

use ndarray::{s, Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::align::AlignedDataset;
use super::features::FeatureMatrix;
use super::types::Segment;
use crate::error::{DatasetError, Result};

/// Window geometry and split fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowParams {
    pub sequence_length: usize,
    pub predict_horizon: usize,
    pub test_split: f64,
}

/// Number of anchors a date axis of `num_dates` days supports
pub fn sample_count(num_dates: usize, sequence_length: usize, predict_horizon: usize) -> usize {
    (num_dates + 1).saturating_sub(sequence_length + predict_horizon)
}

/// Index of the first test sample
pub fn split_index(num_samples: usize, test_split: f64) -> usize {
    let split = (num_samples as f64 * (1.0 - test_split)).floor() as usize;
    split.min(num_samples)
}

/// Position of every label inside the flat label vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLayout {
    pub num_symbols: usize,
    pub horizon: usize,
}

impl LabelLayout {
    pub fn new(num_symbols: usize, horizon: usize) -> Self {
        Self { num_symbols, horizon }
    }

    /// Flat label length
    pub fn width(&self) -> usize {
        self.num_symbols * self.horizon
    }

    /// Flat index of `symbol` on future day `day`.
    ///
    /// `day` is 1-based; day 0 is the anchor itself and has no label.
    pub fn index(&self, symbol: usize, day: usize) -> usize {
        debug_assert!(day >= 1, "label days start at 1");
        symbol + (day - 1) * self.num_symbols
    }

    /// Like [`LabelLayout::index`], `None` when `symbol` or `day` falls
    /// outside the layout
    pub fn checked_index(&self, symbol: usize, day: usize) -> Option<usize> {
        if symbol >= self.num_symbols || day == 0 || day > self.horizon {
            return None;
        }
        Some(self.index(symbol, day))
    }

    /// Split a flat label (or prediction) row into `[day][symbol]`
    pub fn decode(&self, row: &[f32]) -> Vec<Vec<f32>> {
        row.chunks(self.num_symbols.max(1))
            .take(self.horizon)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

/// One training example
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Index of the anchor day on the date axis
    pub anchor: usize,
    /// `[sequence_length, num_symbols * features]`
    pub input: Array2<f32>,
    /// `[num_symbols * horizon]`
    pub label: Array1<f32>,
}

/// Every sample of a date axis, ordered by anchor
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSamples {
    /// `[samples, sequence_length, num_symbols * features]`
    pub x: Array3<f32>,
    /// `[samples, num_symbols * horizon]`
    pub y: Array2<f32>,
    /// Anchor date index of every sample
    pub anchors: Vec<usize>,
    /// Anchors dropped because a required value was missing
    pub skipped: usize,
    pub layout: LabelLayout,
}

/// Chronological train/test partition
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub x_train: Array3<f32>,
    pub y_train: Array2<f32>,
    pub x_test: Array3<f32>,
    pub y_test: Array2<f32>,
    pub train_anchors: Vec<usize>,
    pub test_anchors: Vec<usize>,
}

impl DatasetSplit {
    pub fn len(&self, segment: Segment) -> usize {
        match segment {
            Segment::Train => self.train_anchors.len(),
            Segment::Test => self.test_anchors.len(),
        }
    }

    /// Inputs and labels of one segment
    pub fn segment(&self, segment: Segment) -> (&Array3<f32>, &Array2<f32>) {
        match segment {
            Segment::Train => (&self.x_train, &self.y_train),
            Segment::Test => (&self.x_test, &self.y_test),
        }
    }
}

impl WindowedSamples {
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Copy out the `i`-th sample
    pub fn sample(&self, i: usize) -> Option<Sample> {
        let anchor = *self.anchors.get(i)?;
        Some(Sample {
            anchor,
            input: self.x.slice(s![i, .., ..]).to_owned(),
            label: self.y.slice(s![i, ..]).to_owned(),
        })
    }

    /// Split without shuffling: the first `floor(n * (1 - test_split))`
    /// samples train, the rest test
    pub fn split(&self, test_split: f64) -> DatasetSplit {
        let split = split_index(self.len(), test_split);
        debug!(train = split, test = self.len() - split, "Chronological split");

        DatasetSplit {
            x_train: self.x.slice(s![..split, .., ..]).to_owned(),
            y_train: self.y.slice(s![..split, ..]).to_owned(),
            x_test: self.x.slice(s![split.., .., ..]).to_owned(),
            y_test: self.y.slice(s![split.., ..]).to_owned(),
            train_anchors: self.anchors[..split].to_vec(),
            test_anchors: self.anchors[split..].to_vec(),
        }
    }
}

/// True when every feature row of the window and every close of the
/// horizon exists and is finite
fn sample_is_complete(
    features: &FeatureMatrix,
    closes: &[Vec<f64>],
    anchor: usize,
    params: &WindowParams,
) -> bool {
    let start = anchor + 1 - params.sequence_length;
    for (s, symbol_closes) in closes.iter().enumerate() {
        for k in start..=anchor {
            match features.row(s, k) {
                Some(row) if row.iter().all(|v| v.is_finite()) => {}
                _ => return false,
            }
        }
        for day in anchor..=anchor + params.predict_horizon {
            match symbol_closes.get(day) {
                Some(close) if close.is_finite() => {}
                _ => return false,
            }
        }
    }
    true
}

/// Slide the window over the aligned date axis and label every anchor.
///
/// Fails with [`DatasetError::InsufficientData`] when no complete sample
/// can be built.
pub fn build_windows(
    aligned: &AlignedDataset,
    features: &FeatureMatrix,
    params: &WindowParams,
) -> Result<WindowedSamples> {
    let num_dates = aligned.len();
    let num_symbols = aligned.num_symbols();
    let per_symbol = features.features_per_symbol();
    let row_width = num_symbols * per_symbol;
    let layout = LabelLayout::new(num_symbols, params.predict_horizon);

    let insufficient = || DatasetError::InsufficientData {
        dates: num_dates,
        sequence_length: params.sequence_length,
        predict_horizon: params.predict_horizon,
    };

    if params.sequence_length == 0
        || params.predict_horizon == 0
        || sample_count(num_dates, params.sequence_length, params.predict_horizon) == 0
    {
        return Err(insufficient());
    }

    let closes: Vec<Vec<f64>> = (0..num_symbols).map(|s| aligned.closes(s)).collect();

    let first_anchor = params.sequence_length - 1;
    let last_anchor = num_dates - 1 - params.predict_horizon;
    let anchors: Vec<usize> = (first_anchor..=last_anchor)
        .filter(|&t| sample_is_complete(features, &closes, t, params))
        .collect();
    let skipped = (last_anchor + 1 - first_anchor) - anchors.len();

    if anchors.is_empty() {
        return Err(insufficient());
    }
    if skipped > 0 {
        warn!(skipped, "Skipped incomplete windows");
    }

    let mut x = Array3::<f32>::zeros((anchors.len(), params.sequence_length, row_width));
    let mut y = Array2::<f32>::zeros((anchors.len(), layout.width()));

    for (i, &t) in anchors.iter().enumerate() {
        let start = t + 1 - params.sequence_length;
        for (step, k) in (start..=t).enumerate() {
            for s in 0..num_symbols {
                if let Some(row) = features.row(s, k) {
                    for (f, value) in row.iter().enumerate() {
                        x[[i, step, s * per_symbol + f]] = *value as f32;
                    }
                }
            }
        }

        for day in 1..=params.predict_horizon {
            for (s, symbol_closes) in closes.iter().enumerate() {
                let up = symbol_closes[t + day] > symbol_closes[t];
                y[[i, layout.index(s, day)]] = if up { 1.0 } else { 0.0 };
            }
        }
    }

    info!(
        samples = anchors.len(),
        sequence_length = params.sequence_length,
        predict_horizon = params.predict_horizon,
        row_width,
        "Built windowed samples"
    );

    Ok(WindowedSamples {
        x,
        y,
        anchors,
        skipped,
        layout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::align::align;
    use crate::dataset::features::derive_features;
    use crate::dataset::ingest::ingest_csv;
    use crate::dataset::normalize::Normalizer;
    use crate::dataset::types::PriceField;
    use crate::setting::FeatureMode;

    const KEYS: [PriceField; 2] = [PriceField::Open, PriceField::Close];

    fn build(closes: &[(&str, &[f64])], seq: usize, horizon: usize) -> Result<WindowedSamples> {
        let mut text = String::from("Date,Symbol,Open,Close\n");
        for (symbol, values) in closes {
            for (day, close) in values.iter().enumerate() {
                text.push_str(&format!("2024-02-{:02},{},{},{}\n", day + 1, symbol, close, close));
            }
        }
        let aligned = align(&ingest_csv(&text, &KEYS).unwrap(), 10, None).unwrap();
        let normalizer = Normalizer::fit(&aligned, &KEYS, aligned.len());
        let features = derive_features(&aligned, &normalizer, FeatureMode::Raw);
        let params = WindowParams {
            sequence_length: seq,
            predict_horizon: horizon,
            test_split: 0.2,
        };
        build_windows(&aligned, &features, &params)
    }

    #[test]
    fn test_sample_count_and_split_index() {
        assert_eq!(sample_count(20, 5, 2), 14);
        assert_eq!(sample_count(15, 12, 3), 1);
        assert_eq!(sample_count(14, 12, 3), 0);
        assert_eq!(sample_count(2, 12, 3), 0);
        assert_eq!(split_index(14, 0.2), 11);
        assert_eq!(split_index(1, 0.2), 0);
        assert_eq!(split_index(10, 0.5), 5);
    }

    #[test]
    fn test_label_layout() {
        let layout = LabelLayout::new(3, 2);
        assert_eq!(layout.width(), 6);
        assert_eq!(layout.index(0, 1), 0);
        assert_eq!(layout.index(2, 1), 2);
        assert_eq!(layout.index(0, 2), 3);
        assert_eq!(layout.index(2, 2), 5);
        assert_eq!(
            layout.decode(&[1.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            vec![vec![1.0, 0.0, 1.0], vec![0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_label_layout_checked_index() {
        let layout = LabelLayout::new(3, 2);
        assert_eq!(layout.checked_index(1, 2), Some(4));
        assert_eq!(layout.checked_index(0, 0), None);
        assert_eq!(layout.checked_index(3, 1), None);
        assert_eq!(layout.checked_index(0, 3), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_label_layout_rejects_day_zero() {
        LabelLayout::new(3, 2).index(0, 0);
    }

    #[test]
    fn test_windows_and_labels() {
        let aaa: &[f64] = &[1.0, 2.0, 3.0, 2.0, 5.0, 4.0];
        let bbb: &[f64] = &[6.0, 5.0, 4.0, 5.0, 2.0, 3.0];
        let samples = build(&[("AAA", aaa), ("BBB", bbb)], 2, 2).unwrap();

        // Anchors 1..=3.
        assert_eq!(samples.anchors, vec![1, 2, 3]);
        assert_eq!(samples.x.shape(), &[3, 2, 4]);
        assert_eq!(samples.y.shape(), &[3, 4]);
        assert_eq!(samples.skipped, 0);

        // Anchor 1: AAA 2 -> 3, 2; BBB 5 -> 4, 5.
        let first = samples.sample(0).unwrap();
        assert_eq!(first.anchor, 1);
        assert_eq!(first.label.to_vec(), vec![1.0, 0.0, 0.0, 0.0]);

        // Window rows are [AAA open, AAA close, BBB open, BBB close].
        assert_eq!(first.input[[0, 1]], 0.0);
        assert_eq!(first.input[[1, 1]], 0.25);
        assert_eq!(first.input[[0, 3]], 1.0);
        assert_eq!(first.input[[1, 3]], 0.75);

        // Anchor 3: AAA 2 -> 5, 4; BBB 5 -> 2, 3.
        let last = samples.sample(2).unwrap();
        assert_eq!(last.label.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        assert!(samples.sample(3).is_none());
    }

    #[test]
    fn test_equal_close_is_not_up() {
        let flat: &[f64] = &[3.0, 3.0, 3.0, 3.0];
        let samples = build(&[("AAA", flat)], 2, 1).unwrap();
        assert!(samples.y.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_insufficient_data() {
        let short: &[f64] = &[1.0, 2.0, 3.0, 4.0];
        match build(&[("AAA", short)], 3, 2) {
            Err(DatasetError::InsufficientData {
                dates,
                sequence_length,
                predict_horizon,
            }) => {
                assert_eq!((dates, sequence_length, predict_horizon), (4, 3, 2));
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        assert!(build(&[("AAA", short)], 3, 1).is_ok());
    }

    #[test]
    fn test_split_is_chronological() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 4) as f64).collect();
        let samples = build(&[("AAA", values.as_slice())], 5, 2).unwrap();
        assert_eq!(samples.len(), 14);

        let split = samples.split(0.2);
        assert_eq!(split.len(Segment::Train), 11);
        assert_eq!(split.len(Segment::Test), 3);
        assert_eq!(split.x_train.shape(), &[11, 5, 2]);
        assert_eq!(split.y_test.shape(), &[3, 2]);

        let last_train = *split.train_anchors.last().unwrap();
        assert!(split.test_anchors.iter().all(|&a| a > last_train));
        assert_eq!(split.x_test.slice(s![0, .., ..]), samples.x.slice(s![11, .., ..]));

        let (x, y) = split.segment(Segment::Test);
        assert_eq!(x.shape()[0], y.shape()[0]);
    }
}
