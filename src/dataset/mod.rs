//! Dataset pipeline stages: ingest, align, normalize, derive features,
//! window and split.

pub mod types;
pub mod ingest;
pub mod align;
pub mod normalize;
pub mod features;
pub mod window;

pub use types::{PriceField, PriceRecord, Segment};
pub use ingest::{ingest_csv, DropReason, DroppedRow, IngestDiagnostics, IngestedData};
pub use align::{align, AlignDiagnostics, AlignedDataset};
pub use normalize::{MinMax, Normalizer, NORMALIZER_EPSILON};
pub use features::{derive_features, price_signals, FeatureMatrix, SIGNAL_GAIN};
pub use window::{
    build_windows, sample_count, split_index, DatasetSplit, LabelLayout, Sample, WindowParams,
    WindowedSamples,
};
