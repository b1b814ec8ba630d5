//! Model seam and direction evaluation.
//!
//! The network itself lives outside this crate. Anything that can be fitted
//! on `[samples, sequence_length, width]` inputs and predicts
//! `[samples, symbols * horizon]` up-probabilities plugs in through
//! [`SequenceModel`].

use ndarray::{Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{info, warn};

use crate::dataset::{LabelLayout, Segment};
use crate::loader::PreparedDataset;

/// Trait for direction models consuming windowed samples
pub trait SequenceModel: Send + Sync + Debug {
    /// Fit the model on inputs and flat binary labels
    fn fit(&mut self, x: &Array3<f32>, y: &Array2<f32>);

    /// Predict up-probabilities, one row per sample, same layout as labels
    fn predict(&self, x: &Array3<f32>) -> Array2<f32>;

    /// Get model name
    fn name(&self) -> &str {
        "SequenceModel"
    }
}

/// Predicts, for every output, the share of ups seen during training.
///
/// Useful as the floor a real model has to beat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MajorityModel {
    /// Training up-rate per flat label position
    pub rates: Vec<f32>,
    pub n_samples: usize,
}

impl MajorityModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceModel for MajorityModel {
    fn fit(&mut self, _x: &Array3<f32>, y: &Array2<f32>) {
        self.n_samples = y.nrows();
        self.rates = match y.mean_axis(Axis(0)) {
            Some(mean) => mean.to_vec(),
            None => vec![0.5; y.ncols()],
        };
    }

    fn predict(&self, x: &Array3<f32>) -> Array2<f32> {
        let rates = Array1::from_vec(self.rates.clone());
        let mut out = Array2::<f32>::zeros((x.shape()[0], self.rates.len()));
        for mut row in out.rows_mut() {
            row.assign(&rates);
        }
        out
    }

    fn name(&self) -> &str {
        "MajorityModel"
    }
}

/// Hit rates of thresholded predictions against labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionReport {
    pub samples: usize,
    /// Share of all flat outputs predicted correctly
    pub accuracy: f64,
    /// Accuracy per symbol, over every horizon day
    pub symbol_accuracy: Vec<f64>,
    /// Accuracy per horizon day (index 0 is day 1), over every symbol
    pub day_accuracy: Vec<f64>,
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Compare predictions with labels; a prediction counts as "up" when it
/// is strictly above `threshold`.
///
/// Rows beyond the shorter of the two arrays are ignored. Outputs missing
/// from either array are left out of both hits and totals, so every ratio
/// covers only the outputs actually compared.
pub fn evaluate(
    predictions: &Array2<f32>,
    labels: &Array2<f32>,
    layout: LabelLayout,
    threshold: f32,
) -> DirectionReport {
    let samples = predictions.nrows().min(labels.nrows());
    let columns = predictions.ncols().min(labels.ncols());
    if columns < layout.width() {
        warn!(
            columns,
            expected = layout.width(),
            "Predictions or labels narrower than the label layout"
        );
    }

    let mut symbol_hits = vec![0usize; layout.num_symbols];
    let mut symbol_total = vec![0usize; layout.num_symbols];
    let mut day_hits = vec![0usize; layout.horizon];
    let mut day_total = vec![0usize; layout.horizon];

    for day in 1..=layout.horizon {
        for s in 0..layout.num_symbols {
            let idx = layout.index(s, day);
            if idx >= columns {
                continue;
            }
            for i in 0..samples {
                symbol_total[s] += 1;
                day_total[day - 1] += 1;
                let predicted_up = predictions[[i, idx]] > threshold;
                let actual_up = labels[[i, idx]] > 0.5;
                if predicted_up == actual_up {
                    symbol_hits[s] += 1;
                    day_hits[day - 1] += 1;
                }
            }
        }
    }

    let total_hits: usize = symbol_hits.iter().sum();
    let total: usize = symbol_total.iter().sum();
    DirectionReport {
        samples,
        accuracy: ratio(total_hits, total),
        symbol_accuracy: symbol_hits
            .iter()
            .zip(symbol_total.iter())
            .map(|(&h, &t)| ratio(h, t))
            .collect(),
        day_accuracy: day_hits
            .iter()
            .zip(day_total.iter())
            .map(|(&h, &t)| ratio(h, t))
            .collect(),
    }
}

/// Fit on the training segment and report on the test segment
pub fn fit_and_evaluate(model: &mut dyn SequenceModel, dataset: &PreparedDataset) -> DirectionReport {
    let (x_train, y_train) = dataset.segment(Segment::Train);
    model.fit(x_train, y_train);

    let (x_test, y_test) = dataset.segment(Segment::Test);
    let predictions = model.predict(x_test);
    let report = evaluate(&predictions, y_test, dataset.label_layout(), 0.5);

    info!(
        model = model.name(),
        samples = report.samples,
        accuracy = report.accuracy,
        "Evaluated model on test segment"
    );
    report
}
