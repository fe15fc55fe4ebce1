use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use crate::audio::AudioError;

/// Errors surfaced by the memo store and its components
#[derive(Debug)]
pub enum MemoError {
    /// Memo directory could not be created
    Storage(PathBuf, std::io::Error),
    /// Mapping document could not be written; the mutation was not applied
    StorageWrite { key: String, source: std::io::Error },
    /// Moving or deleting a memo audio file failed
    FileOperation(PathBuf, std::io::Error),
    /// `begin` called while a recording is active
    AlreadyRecording,
    /// `end` called with no active recording
    NoActiveRecording,
    /// Capture handle could not be finalized or produced no file
    RecordingFinalize(String),
    /// Audio at the locator could not be opened or started
    PlaybackLoad(PathBuf, AudioError),
    /// Index is not a valid position in the photo's memo list
    IndexOutOfRange {
        photo_id: String,
        index: usize,
        len: usize,
    },
    /// Audio device operation failed
    Audio(AudioError),
    /// Another process holds the data directory
    StoreLocked(PathBuf),
    /// Configuration file is unreadable or invalid
    Config(String),
}

impl MemoError {
    /// True for errors caused by calling a session operation out of order
    pub fn is_session_state(&self) -> bool {
        matches!(self, MemoError::AlreadyRecording | MemoError::NoActiveRecording)
    }
}

impl fmt::Display for MemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoError::Storage(path, err) => {
                write!(f, "Storage error '{}': {}", path.display(), err)
            }
            MemoError::StorageWrite { key, source } => {
                write!(f, "Failed to write document '{}': {}", key, source)
            }
            MemoError::FileOperation(path, err) => {
                write!(f, "File operation failed '{}': {}", path.display(), err)
            }
            MemoError::AlreadyRecording => write!(f, "A recording is already in progress"),
            MemoError::NoActiveRecording => write!(f, "No active recording"),
            MemoError::RecordingFinalize(msg) => {
                write!(f, "Failed to finalize recording: {}", msg)
            }
            MemoError::PlaybackLoad(path, err) => {
                write!(f, "Failed to load '{}' for playback: {}", path.display(), err)
            }
            MemoError::IndexOutOfRange {
                photo_id,
                index,
                len,
            } => {
                write!(
                    f,
                    "Memo index {} out of range for photo '{}' ({} memos)",
                    index, photo_id, len
                )
            }
            MemoError::Audio(err) => write!(f, "Audio error: {}", err),
            MemoError::StoreLocked(path) => write!(
                f,
                "Memo store at '{}' is already open in another process",
                path.display()
            ),
            MemoError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl StdError for MemoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MemoError::Storage(_, err) | MemoError::FileOperation(_, err) => Some(err),
            MemoError::StorageWrite { source, .. } => Some(source),
            MemoError::PlaybackLoad(_, err) | MemoError::Audio(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for MemoError {
    fn from(err: AudioError) -> Self {
        MemoError::Audio(err)
    }
}

pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_grouping() {
        assert!(MemoError::AlreadyRecording.is_session_state());
        assert!(MemoError::NoActiveRecording.is_session_state());
        assert!(!MemoError::RecordingFinalize("x".to_string()).is_session_state());
    }

    #[test]
    fn test_error_display() {
        let err = MemoError::IndexOutOfRange {
            photo_id: "p1".to_string(),
            index: 5,
            len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("index 5"));
        assert!(msg.contains("'p1'"));
        assert!(msg.contains("2 memos"));
    }
}
