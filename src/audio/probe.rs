use log::warn;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::AudioError;

/// Fully decoded mono PCM
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file to mono i16 samples at its native rate
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode(format!("No audio track in '{}'", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("Unknown sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1).max(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(symphonia::core::errors::Error::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);

                // Downmix to mono
                if channels == 1 {
                    samples.extend_from_slice(sample_buf.samples());
                } else {
                    samples.extend(sample_buf.samples().chunks(channels).map(|chunk| {
                        let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                        (sum / chunk.len() as i32) as i16
                    }));
                }
            }
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                warn!("Skipping undecodable packet in '{}': {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(DecodedAudio {
        sample_rate,
        samples,
    })
}

/// Clip length in seconds
///
/// WAV headers are read directly; other containers use the track frame count,
/// falling back to a full decode when the container doesn't carry one.
pub fn measure_duration(path: &Path) -> Result<f64, AudioError> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Ok(0.0);
        }
        return Ok(reader.duration() as f64 / spec.sample_rate as f64);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let frames = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .and_then(|t| Some((t.codec_params.n_frames?, t.codec_params.sample_rate?)));

    match frames {
        Some((n_frames, sample_rate)) if sample_rate > 0 => {
            Ok(n_frames as f64 / sample_rate as f64)
        }
        _ => Ok(decode_file(path)?.duration_secs()),
    }
}

/// Convert mono PCM from `src_rate` to `target_rate`
///
/// Downsampling averages the input span behind each output sample; upsampling
/// interpolates linearly between neighbours.
pub fn resample(samples: &[i16], src_rate: u32, target_rate: u32) -> Vec<i16> {
    if src_rate == target_rate || src_rate == 0 || target_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let step = src_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as u64 * target_rate as u64 / src_rate as u64) as usize;

    if step > 1.0 {
        (0..out_len)
            .map(|i| {
                let start = ((i as f64 * step) as usize).min(samples.len() - 1);
                let end = (((i + 1) as f64 * step) as usize).clamp(start + 1, samples.len());
                let span = &samples[start..end];
                let sum: i64 = span.iter().map(|&s| s as i64).sum();
                (sum / span.len() as i64) as i16
            })
            .collect()
    } else {
        let last = samples.len() - 1;
        (0..out_len)
            .map(|i| {
                let pos = i as f64 * step;
                let idx = (pos as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = pos - idx as f64;
                let (s1, s2) = (samples[idx] as f64, samples[next] as f64);
                (s1 + frac * (s2 - s1)).round() as i16
            })
            .collect()
    }
}
