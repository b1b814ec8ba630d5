//! Loader configuration.
//!
//! Settings are plain serde structs with per-field defaults so a partial
//! JSON file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::dataset::PriceField;
use crate::error::{DatasetError, Result};
use crate::logger::INFO;
use crate::utility::get_file_path;

/// Setting filename inside the data folder
pub const SETTING_FILENAME: &str = "loader_setting.json";

/// Which per-day features are emitted for every symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Normalized raw columns only
    #[default]
    Raw,
    /// Normalized raw columns followed by return, momentum and volatility
    Derived,
}

/// Range of dates the per-symbol min/max are fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationScope {
    /// Whole aligned series, test period included
    #[default]
    FullSeries,
    /// Dates up to the last training anchor only
    TrainOnly,
}

fn default_sequence_length() -> usize {
    12
}

fn default_predict_horizon() -> usize {
    3
}

fn default_test_split() -> f64 {
    0.2
}

fn default_feature_keys() -> Vec<PriceField> {
    vec![PriceField::Open, PriceField::Close]
}

fn default_max_symbols() -> usize {
    10
}

fn default_log_level() -> i32 {
    INFO
}

fn default_true() -> bool {
    true
}

/// Options for building a windowed dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSetting {
    /// Number of days in every input window
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    /// Number of future days labelled per window
    #[serde(default = "default_predict_horizon")]
    pub predict_horizon: usize,
    /// Fraction of samples (the most recent ones) kept for testing
    #[serde(default = "default_test_split")]
    pub test_split: f64,
    /// Raw price columns turned into features
    #[serde(default = "default_feature_keys")]
    pub feature_keys: Vec<PriceField>,
    /// Upper bound on the number of symbols used
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
    /// Explicit symbol selection, in order; lexicographic when absent
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(default)]
    pub feature_mode: FeatureMode,
    #[serde(default)]
    pub normalization: NormalizationScope,
    /// Python-style integer level (10 debug, 20 info, 30 warning, 40 error)
    #[serde(default = "default_log_level")]
    pub log_level: i32,
    #[serde(default = "default_true")]
    pub log_console: bool,
    #[serde(default)]
    pub log_file: bool,
}

impl Default for LoaderSetting {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            predict_horizon: default_predict_horizon(),
            test_split: default_test_split(),
            feature_keys: default_feature_keys(),
            max_symbols: default_max_symbols(),
            symbols: None,
            feature_mode: FeatureMode::default(),
            normalization: NormalizationScope::default(),
            log_level: default_log_level(),
            log_console: true,
            log_file: false,
        }
    }
}

impl LoaderSetting {
    /// Number of features emitted per symbol per day
    pub fn features_per_symbol(&self) -> usize {
        match self.feature_mode {
            FeatureMode::Raw => self.feature_keys.len(),
            FeatureMode::Derived => self.feature_keys.len() + 3,
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(DatasetError::InvalidSetting(
                "sequence_length must be at least 1".to_string(),
            ));
        }
        if self.predict_horizon == 0 {
            return Err(DatasetError::InvalidSetting(
                "predict_horizon must be at least 1".to_string(),
            ));
        }
        if !(self.test_split > 0.0 && self.test_split < 1.0) {
            return Err(DatasetError::InvalidSetting(format!(
                "test_split must be in (0, 1), got {}",
                self.test_split
            )));
        }
        if self.max_symbols == 0 {
            return Err(DatasetError::InvalidSetting(
                "max_symbols must be at least 1".to_string(),
            ));
        }
        if self.feature_keys.is_empty() {
            return Err(DatasetError::InvalidSetting(
                "feature_keys must name at least one column".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for key in &self.feature_keys {
            if !seen.insert(*key) {
                return Err(DatasetError::InvalidSetting(format!(
                    "feature key {} listed twice",
                    key
                )));
            }
        }
        if let Some(symbols) = &self.symbols {
            if symbols.is_empty() {
                return Err(DatasetError::InvalidSetting(
                    "symbols, when given, must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Load a setting file from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let setting: LoaderSetting = serde_json::from_str(&content)?;
        setting.validate()?;
        Ok(setting)
    }

    /// Load `loader_setting.json` from the data folder, falling back to
    /// defaults when it is absent or unreadable
    pub fn load() -> Self {
        let path = get_file_path(SETTING_FILENAME);
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(setting) => {
                info!("Loaded loader setting from {:?}", path);
                setting
            }
            Err(e) => {
                warn!("Ignoring loader setting file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save the setting as pretty JSON to an explicit path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Save the setting into the data folder
    pub fn save(&self) -> Result<()> {
        self.save_to(get_file_path(SETTING_FILENAME))
    }
}
