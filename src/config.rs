use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::RecordingPreset;
use crate::constants::{DEFAULT_MEMO_EXTENSION, MEMOS_STORAGE_KEY, MEMO_DIRECTORY_NAME};
use crate::error::MemoError;

fn default_memo_dir() -> String {
    MEMO_DIRECTORY_NAME.to_string()
}

fn default_storage_key() -> String {
    MEMOS_STORAGE_KEY.to_string()
}

fn default_file_extension() -> String {
    DEFAULT_MEMO_EXTENSION.to_string()
}

/// Memo store configuration file structure
///
/// ```toml
/// data_dir = "/var/lib/gallery"
/// memo_dir = "memos"
/// measure_duration = false
/// recording_preset = "high_quality"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// App-private document directory (required)
    pub data_dir: PathBuf,
    /// Memo audio subdirectory of data_dir (default: memos)
    #[serde(default = "default_memo_dir")]
    pub memo_dir: String,
    /// Key of the mapping document (default: @photo_memos)
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Extension of committed memo files (default: wav)
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Measure clip duration on commit instead of storing 0 (default: false)
    #[serde(default)]
    pub measure_duration: bool,
    /// Capture quality preset (default: high_quality)
    #[serde(default)]
    pub recording_preset: RecordingPreset,
}

impl StoreConfig {
    /// Configuration with defaults for everything but the data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            memo_dir: default_memo_dir(),
            storage_key: default_storage_key(),
            file_extension: default_file_extension(),
            measure_duration: false,
            recording_preset: RecordingPreset::default(),
        }
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, MemoError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemoError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            MemoError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate().map_err(MemoError::Config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.memo_dir.is_empty() || Path::new(&self.memo_dir).is_absolute() {
            return Err(format!(
                "memo_dir '{}' must be a relative directory name",
                self.memo_dir
            ));
        }
        if self.storage_key.is_empty() {
            return Err("storage_key must not be empty".to_string());
        }
        if self.file_extension.is_empty() || self.file_extension.contains(['.', '/']) {
            return Err(format!(
                "file_extension '{}' must be a bare extension like 'wav'",
                self.file_extension
            ));
        }
        Ok(())
    }

    /// Directory holding memo audio files
    pub fn memo_directory(&self) -> PathBuf {
        self.data_dir.join(&self.memo_dir)
    }
}
