use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::PathBuf;

use crate::audio::{AudioBackend, AudioMode, CaptureHandle, RecordingPreset};
use crate::error::{MemoError, Result};

/// Recording state reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Not currently recording.
    Idle,
    /// Capturing audio.
    Recording {
        /// When the capture started.
        started_at: DateTime<Utc>,
    },
}

struct ActiveRecording {
    handle: Box<dyn CaptureHandle>,
    started_at: DateTime<Utc>,
}

/// At most one capture at a time; a second `begin` is rejected, not queued
pub struct RecordingSession {
    preset: RecordingPreset,
    active: Option<ActiveRecording>,
}

impl RecordingSession {
    pub fn new(preset: RecordingPreset) -> Self {
        Self {
            preset,
            active: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        match &self.active {
            Some(active) => RecordingState::Recording {
                started_at: active.started_at,
            },
            None => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub async fn begin(&mut self, audio: &dyn AudioBackend) -> Result<()> {
        if self.active.is_some() {
            return Err(MemoError::AlreadyRecording);
        }

        audio.set_audio_mode(AudioMode::CAPTURE).await?;
        let handle = audio.start_capture(self.preset).await?;

        let started_at = Utc::now();
        self.active = Some(ActiveRecording { handle, started_at });
        info!("Recording started ({:?})", self.preset);
        Ok(())
    }

    /// Finish the capture and return its temporary locator
    ///
    /// The session is idle afterwards even when finalizing fails.
    pub async fn end(&mut self) -> Result<PathBuf> {
        let mut active = self.active.take().ok_or(MemoError::NoActiveRecording)?;

        active
            .handle
            .stop_and_unload()
            .await
            .map_err(|e| MemoError::RecordingFinalize(e.to_string()))?;

        let locator = active.handle.uri().ok_or_else(|| {
            MemoError::RecordingFinalize("capture produced no file".to_string())
        })?;

        let elapsed = Utc::now() - active.started_at;
        info!(
            "Recording stopped after {:.1}s: {}",
            elapsed.num_milliseconds() as f64 / 1000.0,
            locator.display()
        );
        Ok(locator)
    }

    /// Drop the active capture without producing a memo
    ///
    /// Returns the temporary locator, if the capture left one behind, so the caller can
    /// delete it. No-op when idle.
    pub async fn abandon(&mut self) -> Option<PathBuf> {
        let mut active = self.active.take()?;
        if let Err(e) = active.handle.stop_and_unload().await {
            warn!("Failed to stop abandoned recording: {}", e);
        }
        info!("Recording abandoned");
        active.handle.uri()
    }
}
