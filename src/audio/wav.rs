//! WAV capture and PCM playback over channels.
//!
//! Capture pulls mono PCM chunks from a [`SampleSource`] on a writer thread and
//! writes them to a temporary WAV file. Playback decodes the file up front and a
//! player thread pushes chunks into the output channel. An empty chunk marks the end
//! of an input feed.

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use hound::{WavSpec, WavWriter};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::probe::{decode_file, resample};
use super::{
    AudioBackend, AudioError, AudioMode, CaptureHandle, PermissionStatus, RecordingPreset,
    SoundHandle,
};
use crate::constants::{CHANNEL_CAPACITY, CHUNK_SAMPLES};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Live input feed, e.g. a microphone
pub trait SampleSource: Send + Sync {
    /// Start a feed of mono PCM chunks at `sample_rate`
    fn open(&self, sample_rate: u32) -> Result<Receiver<Vec<i16>>, AudioError>;
}

/// Feeds the contents of an audio file as if it were live input
pub struct FileSampleSource {
    path: PathBuf,
}

impl FileSampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SampleSource for FileSampleSource {
    fn open(&self, sample_rate: u32) -> Result<Receiver<Vec<i16>>, AudioError> {
        let decoded = decode_file(&self.path)?;
        let samples = resample(&decoded.samples, decoded.sample_rate, sample_rate);
        let (tx, rx) = bounded(CHANNEL_CAPACITY);

        thread::spawn(move || {
            for chunk in samples.chunks(CHUNK_SAMPLES) {
                if tx.send(chunk.to_vec()).is_err() {
                    return;
                }
            }
            // Signal end of input
            let _ = tx.send(Vec::new());
        });

        Ok(rx)
    }
}

/// Audio backend writing captures as WAV and playing into a PCM channel
pub struct WavBackend {
    source: Arc<dyn SampleSource>,
    capture_dir: PathBuf,
    output: Sender<Vec<i16>>,
    realtime: bool,
    mode: Mutex<Option<AudioMode>>,
}

impl WavBackend {
    /// `capture_dir` receives temporary capture files; `output` receives played samples
    pub fn new(
        source: Arc<dyn SampleSource>,
        capture_dir: impl Into<PathBuf>,
        output: Sender<Vec<i16>>,
    ) -> Self {
        Self {
            source,
            capture_dir: capture_dir.into(),
            output,
            realtime: false,
            mode: Mutex::new(None),
        }
    }

    /// Pace playback at the clip's sample rate instead of as fast as the output drains
    pub fn with_realtime_playback(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Mode last applied through `set_audio_mode`
    pub fn audio_mode(&self) -> Option<AudioMode> {
        self.mode.lock().ok().and_then(|mode| *mode)
    }
}

#[async_trait]
impl AudioBackend for WavBackend {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn set_audio_mode(&self, mode: AudioMode) -> Result<(), AudioError> {
        let mut current = self
            .mode
            .lock()
            .map_err(|_| AudioError::Device("audio mode lock poisoned".to_string()))?;
        *current = Some(mode);
        Ok(())
    }

    async fn start_capture(
        &self,
        preset: RecordingPreset,
    ) -> Result<Box<dyn CaptureHandle>, AudioError> {
        if !self.audio_mode().map(|m| m.allows_recording).unwrap_or(false) {
            return Err(AudioError::Device(
                "audio mode does not allow recording".to_string(),
            ));
        }

        let spec = WavSpec {
            channels: preset.channels(),
            sample_rate: preset.sample_rate(),
            bits_per_sample: preset.bits_per_sample(),
            sample_format: hound::SampleFormat::Int,
        };
        // Input first; a capture file exists only for a capture that started
        let input = self.source.open(spec.sample_rate)?;

        tokio::fs::create_dir_all(&self.capture_dir).await?;
        let path = tempfile::Builder::new()
            .prefix("recording_")
            .suffix(".wav")
            .tempfile_in(&self.capture_dir)?
            .into_temp_path()
            .keep()
            .map_err(|e| AudioError::Io(e.error))?;

        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let path = path.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || write_capture(&path, spec, input, &stop))
        };

        info!("Capturing to {}", path.display());
        Ok(Box::new(WavCapture {
            path,
            stop,
            worker: Some(worker),
            finished: false,
        }))
    }

    async fn load_sound(&self, locator: &Path) -> Result<Box<dyn SoundHandle>, AudioError> {
        let path = locator.to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || decode_file(&path))
            .await
            .map_err(|e| AudioError::Device(format!("decode task failed: {}", e)))??;

        Ok(Box::new(WavSound {
            samples: Arc::new(decoded.samples),
            sample_rate: decoded.sample_rate,
            output: self.output.clone(),
            realtime: self.realtime,
            loaded: true,
            stop: Arc::new(AtomicBool::new(false)),
            playing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }))
    }
}

fn write_capture(
    path: &Path,
    spec: WavSpec,
    input: Receiver<Vec<i16>>,
    stop: &AtomicBool,
) -> Result<u64, AudioError> {
    let mut writer = WavWriter::create(path, spec)?;
    let mut written = 0u64;

    while !stop.load(Ordering::Relaxed) {
        match input.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => {
                for sample in &chunk {
                    writer.write_sample(*sample)?;
                }
                written += chunk.len() as u64;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Capture input closed before stop");
                break;
            }
        }
    }

    writer.finalize()?;
    Ok(written)
}

struct WavCapture {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<u64, AudioError>>>,
    finished: bool,
}

#[async_trait]
impl CaptureHandle for WavCapture {
    async fn stop_and_unload(&mut self) -> Result<(), AudioError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Relaxed);

        let written = tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|e| AudioError::Device(format!("capture join failed: {}", e)))?
            .map_err(|_| AudioError::Device("capture thread panicked".to_string()))??;

        debug!("Captured {} samples to {}", written, self.path.display());
        self.finished = true;
        Ok(())
    }

    fn uri(&self) -> Option<PathBuf> {
        self.finished.then(|| self.path.clone())
    }
}

impl Drop for WavCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

struct WavSound {
    samples: Arc<Vec<i16>>,
    sample_rate: u32,
    output: Sender<Vec<i16>>,
    realtime: bool,
    loaded: bool,
    stop: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl WavSound {
    async fn halt(&mut self) -> Result<(), AudioError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| AudioError::Device(format!("player join failed: {}", e)))?
                .map_err(|_| AudioError::Device("player thread panicked".to_string()))?;
        }
        self.playing.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl SoundHandle for WavSound {
    async fn play(&mut self) -> Result<(), AudioError> {
        if !self.loaded {
            return Err(AudioError::Device("sound is unloaded".to_string()));
        }
        self.halt().await?;

        self.stop = Arc::new(AtomicBool::new(false));
        self.playing.store(true, Ordering::Relaxed);

        let samples = Arc::clone(&self.samples);
        let output = self.output.clone();
        let stop = Arc::clone(&self.stop);
        let playing = Arc::clone(&self.playing);
        let pace = self
            .realtime
            .then(|| Duration::from_secs_f64(CHUNK_SAMPLES as f64 / self.sample_rate.max(1) as f64));

        self.worker = Some(thread::spawn(move || {
            play_samples(&samples, &output, &stop, pace);
            playing.store(false, Ordering::Relaxed);
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        self.halt().await
    }

    async fn unload(&mut self) -> Result<(), AudioError> {
        self.halt().await?;
        self.loaded = false;
        self.samples = Arc::new(Vec::new());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

impl Drop for WavSound {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn play_samples(
    samples: &[i16],
    output: &Sender<Vec<i16>>,
    stop: &AtomicBool,
    pace: Option<Duration>,
) {
    for chunk in samples.chunks(CHUNK_SAMPLES) {
        let mut pending = chunk.to_vec();
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            match output.send_timeout(pending, POLL_INTERVAL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(chunk)) => pending = chunk,
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
        if let Some(pace) = pace {
            thread::sleep(pace);
        }
    }
}
