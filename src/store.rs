use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::audio::probe::measure_duration;
use crate::audio::AudioBackend;
use crate::config::StoreConfig;
use crate::error::{MemoError, Result};
use crate::files::MemoFileManager;
use crate::kv::{FileKeyValueStore, KeyValueStore};
use crate::mapping_store::MappingStore;
use crate::model::{MonotonicClock, PhotoMemoMapping, VoiceMemoRecord};
use crate::session::{PlaybackSession, PlaybackState, RecordingSession, RecordingState};

/// Result of asking to start a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStart {
    Started,
    /// Microphone access refused; nothing was started
    PermissionDenied,
}

/// Voice memos attached to photos
///
/// Construct one at startup and hand out clones of an `Arc<MemoStore>` to every
/// screen that needs it. Permission, audio mode and the memo directory are checked
/// when a recording starts, never at construction.
pub struct MemoStore {
    config: StoreConfig,
    audio: Arc<dyn AudioBackend>,
    mappings: MappingStore,
    files: MemoFileManager,
    clock: Arc<MonotonicClock>,
    recording: Mutex<RecordingSession>,
    playback: Mutex<PlaybackSession>,
}

impl MemoStore {
    pub fn new(
        config: StoreConfig,
        kv: Arc<dyn KeyValueStore>,
        audio: Arc<dyn AudioBackend>,
    ) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        let mappings = MappingStore::new(kv, config.storage_key.clone());
        let files = MemoFileManager::new(
            config.memo_directory(),
            config.file_extension.clone(),
            Arc::clone(&clock),
        );
        let recording = RecordingSession::new(config.recording_preset);

        Self {
            config,
            audio,
            mappings,
            files,
            clock,
            recording: Mutex::new(recording),
            playback: Mutex::new(PlaybackSession::new()),
        }
    }

    /// Store persisting its mapping as a JSON file in `config.data_dir`
    pub fn open(config: StoreConfig, audio: Arc<dyn AudioBackend>) -> Result<Self> {
        config.validate().map_err(MemoError::Config)?;
        let kv = FileKeyValueStore::open(&config.data_dir)?;
        Ok(Self::new(config, Arc::new(kv), audio))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn memo_directory(&self) -> &Path {
        self.files.directory()
    }

    /// Ask for microphone access. A refusal is `false`, never an error.
    ///
    /// Asked every time; access can be revoked while the store lives.
    pub async fn request_permission(&self) -> bool {
        let status = self.audio.request_permission().await;
        if !status.is_granted() {
            info!("Microphone permission not granted: {:?}", status);
            return false;
        }
        true
    }

    /// Press-in half of recording a new memo
    pub async fn start_recording(&self) -> Result<RecordingStart> {
        if !self.request_permission().await {
            return Ok(RecordingStart::PermissionDenied);
        }
        // Recreated if removed since the last recording
        self.files.ensure_directory().await?;

        let mut recording = self.recording.lock().await;
        recording.begin(self.audio.as_ref()).await?;
        Ok(RecordingStart::Started)
    }

    /// Press-out half: finalize, commit the file and attach the memo to `photo_id`
    pub async fn stop_recording(&self, photo_id: &str) -> Result<VoiceMemoRecord> {
        let temp = self.recording.lock().await.end().await?;
        let locator = self.files.commit(&temp).await?;

        let duration = if self.config.measure_duration {
            self.measure(&locator).await
        } else {
            0.0
        };

        let record = VoiceMemoRecord {
            file_path: locator.to_string_lossy().into_owned(),
            duration,
            timestamp: self.clock.now_millis(),
        };

        self.mappings.append(photo_id, record.clone()).await?;
        info!("Attached memo {} to photo '{}'", record.file_path, photo_id);
        Ok(record)
    }

    /// Abandon the active recording and delete what it captured
    pub async fn cancel_recording(&self) -> Result<()> {
        let temp = self.recording.lock().await.abandon().await;
        if let Some(temp) = temp {
            self.files.remove(&temp).await?;
        }
        Ok(())
    }

    pub async fn is_recording(&self) -> bool {
        self.recording.lock().await.is_recording()
    }

    pub async fn recording_state(&self) -> RecordingState {
        self.recording.lock().await.state()
    }

    pub async fn list_memos(&self, photo_id: &str) -> Vec<VoiceMemoRecord> {
        self.mappings.load().await.memos(photo_id).to_vec()
    }

    /// Snapshot of every photo's memos
    pub async fn mapping(&self) -> PhotoMemoMapping {
        self.mappings.load().await
    }

    pub async fn play(&self, photo_id: &str, index: usize) -> Result<()> {
        let record = self.mappings.load().await.get(photo_id, index)?.clone();
        let mut playback = self.playback.lock().await;
        playback.play(self.audio.as_ref(), &record.path()).await
    }

    /// Stop the memo if it is the one playing, otherwise play it. Returns whether it now plays.
    pub async fn toggle_playback(&self, photo_id: &str, index: usize) -> Result<bool> {
        let record = self.mappings.load().await.get(photo_id, index)?.clone();
        let path = record.path();

        let mut playback = self.playback.lock().await;
        if playback.is_playing(&path) {
            playback.stop().await?;
            return Ok(false);
        }
        playback.play(self.audio.as_ref(), &path).await?;
        Ok(true)
    }

    pub async fn stop_playback(&self) -> Result<()> {
        self.playback.lock().await.stop().await
    }

    pub async fn playback_state(&self) -> PlaybackState {
        self.playback.lock().await.state()
    }

    /// Delete the memo at `index` and its audio file
    ///
    /// The mapping is written first; file removal afterwards is best effort, so a
    /// failed write leaves both entry and file, and a failed removal leaves only a file.
    pub async fn delete_memo(&self, photo_id: &str, index: usize) -> Result<VoiceMemoRecord> {
        let mut tx = self.mappings.begin_write().await;
        let record = tx.mapping_mut().remove(photo_id, index)?;
        let path = record.path();
        tx.commit().await?;

        {
            let mut playback = self.playback.lock().await;
            if playback.is_playing(&path) {
                if let Err(e) = playback.stop().await {
                    warn!("Failed to stop playback of deleted memo: {}", e);
                }
            }
        }

        if let Err(e) = self.files.remove(&path).await {
            warn!("Failed to delete memo file, entry removed anyway: {}", e);
        }
        info!("Deleted memo {} of photo '{}'", index, photo_id);
        Ok(record)
    }

    async fn measure(&self, locator: &Path) -> f64 {
        let path = locator.to_path_buf();
        let measured = tokio::task::spawn_blocking(move || measure_duration(&path)).await;
        match measured {
            Ok(Ok(secs)) => secs,
            Ok(Err(e)) => {
                warn!("Failed to measure {}: {}", locator.display(), e);
                0.0
            }
            Err(e) => {
                warn!("Duration task failed for {}: {}", locator.display(), e);
                0.0
            }
        }
    }
}
