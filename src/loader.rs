//! Data loader façade chaining the dataset stages.
//!
//! ```text
//! CSV text -> ingest_csv -> align -> Normalizer::fit -> derive_features
//!          -> build_windows -> split
//! ```
//!
//! Each stage returns a new value; nothing is kept on the loader between
//! calls, so the same loader can prepare any number of files.

use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::dataset::{
    align, build_windows, derive_features, ingest_csv, sample_count, split_index,
    AlignDiagnostics, AlignedDataset, IngestDiagnostics, IngestedData, LabelLayout, Normalizer,
    Segment, WindowParams,
};
use crate::error::Result;
use crate::setting::{LoaderSetting, NormalizationScope};

/// Everything dropped or excluded on the way to the arrays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDiagnostics {
    pub ingest: IngestDiagnostics,
    pub align: AlignDiagnostics,
    /// Windows skipped for missing values
    pub skipped_windows: usize,
}

/// Arrays and metadata handed to the model
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// Symbols in feature and label order
    pub symbols: Vec<String>,
    /// Common date axis
    pub dates: Vec<NaiveDate>,
    pub sequence_length: usize,
    pub predict_horizon: usize,
    pub features_per_symbol: usize,
    /// Per-symbol feature names, in row order
    pub feature_names: Vec<String>,
    /// `[n_train, sequence_length, symbols * features]`
    pub x_train: Array3<f32>,
    /// `[n_train, symbols * predict_horizon]`
    pub y_train: Array2<f32>,
    pub x_test: Array3<f32>,
    pub y_test: Array2<f32>,
    /// Anchor date of every training sample
    pub train_dates: Vec<NaiveDate>,
    /// Anchor date of every test sample
    pub test_dates: Vec<NaiveDate>,
    pub normalizer: Normalizer,
    pub diagnostics: LoadDiagnostics,
}

impl PreparedDataset {
    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    pub fn label_layout(&self) -> LabelLayout {
        LabelLayout::new(self.symbols.len(), self.predict_horizon)
    }

    /// Number of samples in one segment
    pub fn len(&self, segment: Segment) -> usize {
        match segment {
            Segment::Train => self.x_train.shape()[0],
            Segment::Test => self.x_test.shape()[0],
        }
    }

    pub fn num_samples(&self) -> usize {
        self.len(Segment::Train) + self.len(Segment::Test)
    }

    /// Inputs and labels of one segment
    pub fn segment(&self, segment: Segment) -> (&Array3<f32>, &Array2<f32>) {
        match segment {
            Segment::Train => (&self.x_train, &self.y_train),
            Segment::Test => (&self.x_test, &self.y_test),
        }
    }
}

/// Number of leading dates the normalizer is fitted on
fn normalization_dates(num_dates: usize, setting: &LoaderSetting) -> usize {
    match setting.normalization {
        NormalizationScope::FullSeries => num_dates,
        NormalizationScope::TrainOnly => {
            let samples = sample_count(num_dates, setting.sequence_length, setting.predict_horizon);
            if samples == 0 {
                return num_dates;
            }
            let train = split_index(samples, setting.test_split).max(1);
            // Last training anchor, inclusive.
            setting.sequence_length - 1 + train
        }
    }
}

/// Builds windowed datasets from CSV input
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    setting: LoaderSetting,
}

impl DataLoader {
    /// Create a loader; the setting is validated up front
    pub fn new(setting: LoaderSetting) -> Result<Self> {
        setting.validate()?;
        Ok(Self { setting })
    }

    pub fn setting(&self) -> &LoaderSetting {
        &self.setting
    }

    /// Read a CSV file and prepare it
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<PreparedDataset> {
        let path = path.as_ref();
        info!("Loading CSV file {:?}", path);
        let text = tokio::fs::read_to_string(path).await?;
        self.prepare(&text)
    }

    /// Prepare a dataset from CSV text
    pub fn prepare(&self, text: &str) -> Result<PreparedDataset> {
        let data = ingest_csv(text, &self.setting.feature_keys)?;
        self.prepare_ingested(&data)
    }

    /// Prepare a dataset from already ingested records
    pub fn prepare_ingested(&self, data: &IngestedData) -> Result<PreparedDataset> {
        let aligned = align(
            data,
            self.setting.max_symbols,
            self.setting.symbols.as_deref(),
        )?;
        let mut prepared = self.prepare_aligned(&aligned)?;
        prepared.diagnostics.ingest = data.diagnostics.clone();
        Ok(prepared)
    }

    /// Prepare a dataset from an aligned date axis
    pub fn prepare_aligned(&self, aligned: &AlignedDataset) -> Result<PreparedDataset> {
        let setting = &self.setting;

        let fit_dates = normalization_dates(aligned.len(), setting);
        let normalizer = Normalizer::fit(aligned, &setting.feature_keys, fit_dates);
        let features = derive_features(aligned, &normalizer, setting.feature_mode);

        let params = WindowParams {
            sequence_length: setting.sequence_length,
            predict_horizon: setting.predict_horizon,
            test_split: setting.test_split,
        };
        let samples = build_windows(aligned, &features, &params)?;
        let split = samples.split(params.test_split);

        let dates = aligned.dates();
        let to_dates = |anchors: &[usize]| anchors.iter().map(|&a| dates[a]).collect::<Vec<_>>();

        let prepared = PreparedDataset {
            symbols: aligned.symbols().to_vec(),
            dates: dates.to_vec(),
            sequence_length: setting.sequence_length,
            predict_horizon: setting.predict_horizon,
            features_per_symbol: features.features_per_symbol(),
            feature_names: features.names().to_vec(),
            train_dates: to_dates(&split.train_anchors),
            test_dates: to_dates(&split.test_anchors),
            x_train: split.x_train,
            y_train: split.y_train,
            x_test: split.x_test,
            y_test: split.y_test,
            normalizer,
            diagnostics: LoadDiagnostics {
                ingest: IngestDiagnostics::default(),
                align: aligned.diagnostics.clone(),
                skipped_windows: samples.skipped,
            },
        };

        info!(
            symbols = prepared.num_symbols(),
            train = prepared.len(Segment::Train),
            test = prepared.len(Segment::Test),
            features_per_symbol = prepared.features_per_symbol,
            "Prepared dataset"
        );
        Ok(prepared)
    }
}
