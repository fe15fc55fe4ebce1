use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::audio::{AudioBackend, SoundHandle};
use crate::error::{MemoError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing { locator: PathBuf },
}

struct LoadedSound {
    locator: PathBuf,
    handle: Box<dyn SoundHandle>,
}

/// At most one loaded sound; a new `play` replaces whatever is loaded
#[derive(Default)]
pub struct PlaybackSession {
    current: Option<LoadedSound>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Idle` once the sound has finished on its own
    pub fn state(&self) -> PlaybackState {
        match &self.current {
            Some(sound) if sound.handle.is_playing() => PlaybackState::Playing {
                locator: sound.locator.clone(),
            },
            _ => PlaybackState::Idle,
        }
    }

    pub fn is_playing(&self, locator: &Path) -> bool {
        matches!(self.state(), PlaybackState::Playing { locator: ref playing } if playing == locator)
    }

    pub async fn play(&mut self, audio: &dyn AudioBackend, locator: &Path) -> Result<()> {
        if let Some(mut previous) = self.current.take() {
            if let Err(e) = previous.handle.unload().await {
                warn!(
                    "Failed to unload {} before replacing it: {}",
                    previous.locator.display(),
                    e
                );
            }
        }

        let mut handle = audio
            .load_sound(locator)
            .await
            .map_err(|e| MemoError::PlaybackLoad(locator.to_path_buf(), e))?;
        handle
            .play()
            .await
            .map_err(|e| MemoError::PlaybackLoad(locator.to_path_buf(), e))?;

        info!("Playing {}", locator.display());
        self.current = Some(LoadedSound {
            locator: locator.to_path_buf(),
            handle,
        });
        Ok(())
    }

    /// Stop and unload; no-op when nothing is loaded
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut sound) = self.current.take() else {
            return Ok(());
        };
        sound.handle.stop().await?;
        sound.handle.unload().await?;
        info!("Stopped {}", sound.locator.display());
        Ok(())
    }
}
