//! Audio collaborator interface.
//!
//! The memo store never touches a device directly. It asks an [`AudioBackend`] for
//! permission, for the capture audio mode, for a [`CaptureHandle`] when recording
//! starts and for a [`SoundHandle`] when a memo is played. [`wav::WavBackend`] is the
//! shipped implementation.

pub mod probe;
pub mod wav;

use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Audio collaborator errors
#[derive(Debug)]
pub enum AudioError {
    /// Device or backend refused the operation
    Device(String),
    /// File could not be decoded
    Decode(String),
    /// WAV read/write failure
    Wav(hound::Error),
    /// General I/O error
    Io(std::io::Error),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Device(msg) => write!(f, "Device error: {}", msg),
            AudioError::Decode(msg) => write!(f, "Decode error: {}", msg),
            AudioError::Wav(err) => write!(f, "WAV error: {}", err),
            AudioError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl StdError for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::Io(err)
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Wav(err)
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => AudioError::Io(e),
            other => AudioError::Decode(other.to_string()),
        }
    }
}

/// Outcome of a microphone permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied {
        /// False once the user has to change the setting outside the app
        can_ask_again: bool,
    },
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Audio session mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMode {
    pub allows_recording: bool,
    pub plays_in_silent_mode: bool,
}

impl AudioMode {
    /// Fixed mode used for memo capture
    pub const CAPTURE: AudioMode = AudioMode {
        allows_recording: true,
        plays_in_silent_mode: true,
    };
}

/// Capture quality preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPreset {
    /// 44.1kHz mono, 16-bit
    #[default]
    HighQuality,
    /// 16kHz mono, 16-bit
    LowQuality,
}

impl RecordingPreset {
    pub fn sample_rate(&self) -> u32 {
        match self {
            RecordingPreset::HighQuality => 44100,
            RecordingPreset::LowQuality => 16000,
        }
    }

    pub fn channels(&self) -> u16 {
        1
    }

    pub fn bits_per_sample(&self) -> u16 {
        16
    }
}

/// Device-facing side of recording and playback
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Ask for microphone access; a refusal is a status, not an error
    async fn request_permission(&self) -> PermissionStatus;

    async fn set_audio_mode(&self, mode: AudioMode) -> Result<(), AudioError>;

    /// Open a new capture; recording starts immediately
    async fn start_capture(
        &self,
        preset: RecordingPreset,
    ) -> Result<Box<dyn CaptureHandle>, AudioError>;

    /// Load the audio at `locator` without starting it
    async fn load_sound(&self, locator: &Path) -> Result<Box<dyn SoundHandle>, AudioError>;
}

/// One in-progress capture
#[async_trait]
pub trait CaptureHandle: Send {
    /// Finish the capture and release the input
    async fn stop_and_unload(&mut self) -> Result<(), AudioError>;

    /// Temporary locator of the captured file, once there is one
    fn uri(&self) -> Option<PathBuf>;
}

/// One loaded sound
#[async_trait]
pub trait SoundHandle: Send {
    async fn play(&mut self) -> Result<(), AudioError>;

    async fn stop(&mut self) -> Result<(), AudioError>;

    async fn unload(&mut self) -> Result<(), AudioError>;

    /// False before `play`, after `stop`, and once the sound ran to its end
    fn is_playing(&self) -> bool;
}
