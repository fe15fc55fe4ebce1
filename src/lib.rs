//! Voice memos attached to gallery photos: durable photo -> memo mapping, memo audio
//! files, and the recording/playback sessions behind them.

pub mod audio;
pub mod config;
pub mod constants;
pub mod error;
pub mod files;
pub mod kv;
pub mod mapping_store;
pub mod model;
pub mod session;
pub mod store;

pub use config::StoreConfig;
pub use error::MemoError;
pub use model::{PhotoMemoMapping, VoiceMemoRecord};
pub use store::{MemoStore, RecordingStart};
