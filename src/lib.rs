//! Window Dataset - multi-symbol sliding-window datasets for direction models
//!
//! This crate turns a daily multi-symbol price CSV into dense arrays ready for
//! supervised training:
//!
//! - CSV ingestion with lenient, counted row dropping
//! - Symbol selection and common date alignment
//! - Per-symbol min/max normalization
//! - Optional return / momentum / volatility features
//! - Sliding windows with multi-day up/down labels and a chronological split
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use window_dataset::{DataLoader, LoaderSetting};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), window_dataset::DatasetError> {
//!     let loader = DataLoader::new(LoaderSetting::default())?;
//!     let dataset = loader.load_file("prices.csv").await?;
//!     println!("train inputs: {:?}", dataset.x_train.shape());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod utility;
pub mod setting;
pub mod logger;
pub mod dataset;
pub mod loader;
pub mod model;

// Re-export commonly used types
pub use error::{DatasetError, Result, SymbolRange};
pub use setting::{FeatureMode, LoaderSetting, NormalizationScope};
pub use dataset::{
    AlignedDataset, DatasetSplit, IngestDiagnostics, IngestedData, LabelLayout, Normalizer,
    PriceField, PriceRecord, Segment,
};
pub use loader::{DataLoader, LoadDiagnostics, PreparedDataset};
pub use model::{evaluate, fit_and_evaluate, DirectionReport, MajorityModel, SequenceModel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
