#![allow(dead_code)]

use async_trait::async_trait;
use photo_memos::audio::{
    AudioBackend, AudioError, AudioMode, CaptureHandle, PermissionStatus, RecordingPreset,
    SoundHandle,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the fake device has been asked to do
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub mode: Option<AudioMode>,
    pub captures_started: usize,
    pub loaded: Vec<PathBuf>,
    pub unloaded: Vec<PathBuf>,
    /// Sounds currently producing audio
    pub active: Vec<PathBuf>,
}

/// Scriptable audio backend; captures write small files into `capture_dir`
pub struct FakeAudio {
    capture_dir: PathBuf,
    pub permission: Mutex<PermissionStatus>,
    pub capture_yields_file: Mutex<bool>,
    pub log: Arc<Mutex<DeviceLog>>,
}

impl FakeAudio {
    pub fn new(capture_dir: &Path) -> Self {
        std::fs::create_dir_all(capture_dir).unwrap();
        Self {
            capture_dir: capture_dir.to_path_buf(),
            permission: Mutex::new(PermissionStatus::Granted),
            capture_yields_file: Mutex::new(true),
            log: Arc::new(Mutex::new(DeviceLog::default())),
        }
    }

    pub fn deny_permission(&self) {
        *self.permission.lock().unwrap() = PermissionStatus::Denied {
            can_ask_again: false,
        };
    }

    pub fn grant_permission(&self) {
        *self.permission.lock().unwrap() = PermissionStatus::Granted;
    }

    pub fn active(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().active.clone()
    }

    pub fn unloaded(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().unloaded.clone()
    }

    pub fn captures_started(&self) -> usize {
        self.log.lock().unwrap().captures_started
    }
}

#[async_trait]
impl AudioBackend for FakeAudio {
    async fn request_permission(&self) -> PermissionStatus {
        *self.permission.lock().unwrap()
    }

    async fn set_audio_mode(&self, mode: AudioMode) -> Result<(), AudioError> {
        self.log.lock().unwrap().mode = Some(mode);
        Ok(())
    }

    async fn start_capture(
        &self,
        _preset: RecordingPreset,
    ) -> Result<Box<dyn CaptureHandle>, AudioError> {
        let mut log = self.log.lock().unwrap();
        log.captures_started += 1;
        let path = self
            .capture_dir
            .join(format!("capture_{}.wav", log.captures_started));
        std::fs::write(&path, b"RIFF....WAVE")?;
        Ok(Box::new(FakeCapture {
            path,
            stopped: false,
            yields_file: *self.capture_yields_file.lock().unwrap(),
        }))
    }

    async fn load_sound(&self, locator: &Path) -> Result<Box<dyn SoundHandle>, AudioError> {
        if !locator.exists() {
            return Err(AudioError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such sound",
            )));
        }
        self.log.lock().unwrap().loaded.push(locator.to_path_buf());
        Ok(Box::new(FakeSound {
            locator: locator.to_path_buf(),
            playing: false,
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeCapture {
    path: PathBuf,
    stopped: bool,
    yields_file: bool,
}

#[async_trait]
impl CaptureHandle for FakeCapture {
    async fn stop_and_unload(&mut self) -> Result<(), AudioError> {
        self.stopped = true;
        Ok(())
    }

    fn uri(&self) -> Option<PathBuf> {
        (self.stopped && self.yields_file).then(|| self.path.clone())
    }
}

struct FakeSound {
    locator: PathBuf,
    playing: bool,
    log: Arc<Mutex<DeviceLog>>,
}

#[async_trait]
impl SoundHandle for FakeSound {
    async fn play(&mut self) -> Result<(), AudioError> {
        self.playing = true;
        self.log.lock().unwrap().active.push(self.locator.clone());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        self.playing = false;
        let mut log = self.log.lock().unwrap();
        log.active.retain(|p| p != &self.locator);
        Ok(())
    }

    async fn unload(&mut self) -> Result<(), AudioError> {
        self.playing = false;
        let mut log = self.log.lock().unwrap();
        log.active.retain(|p| p != &self.locator);
        log.unloaded.push(self.locator.clone());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
