//! Audio file decoding into interleaved PCM

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while decoding a file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Descriptive tags of a decoded file
#[derive(Debug, Clone, Default)]
pub struct AudioMetadata {
    pub title: String,
    pub artist: String,
    pub duration_secs: f64,
}

/// A fully decoded audio file
pub struct DecodedAudio {
    /// Interleaved samples (f32, normalized to -1.0 to 1.0)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    pub metadata: AudioMetadata,
}

impl DecodedAudio {
    /// Whole frames in `samples`
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Audio file decoder using Symphonia
#[derive(Debug, Clone, Default)]
pub struct AudioLoader {
    /// Resample to this rate after decoding; `None` keeps the file's rate
    target_sample_rate: Option<u32>,
}

impl AudioLoader {
    /// Decoder that keeps the source sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that resamples everything to `target_sample_rate`
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: Some(target_sample_rate),
        }
    }

    /// Load and decode an audio file
    pub fn load(&self, path: &Path) -> Result<DecodedAudio, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut metadata = extract_metadata(&mut format, path);

        let mut samples: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    debug!("stopping at packet error: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => {
                    skipped_packets += 1;
                    continue;
                }
            };

            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if skipped_packets > 0 {
            warn!("Skipped {} undecodable packets in {:?}", skipped_packets, path);
        }

        let total_frames = samples.len() / channels as usize;
        metadata.duration_secs = total_frames as f64 / source_sample_rate as f64;

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != source_sample_rate => {
                (resample(&samples, source_sample_rate, target, channels)?, target)
            }
            _ => (samples, source_sample_rate),
        };

        info!(
            "Decoded {:?}: {} Hz, {} ch, {:.1}s",
            path, sample_rate, channels, metadata.duration_secs
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
            metadata,
        })
    }
}

/// Resample interleaved audio with rubato's FFT resampler
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
    channels: u16,
) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let channels_usize = channels.max(1) as usize;
    let frames = samples.len() / channels_usize;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024,
        channels_usize,
    )
    .map_err(|e| LoadError::Resample(e.to_string()))?;

    // Deinterleave
    let deinterleaved: Vec<Vec<f32>> = (0..channels_usize)
        .map(|ch| {
            (0..frames)
                .map(|f| samples[f * channels_usize + ch])
                .collect()
        })
        .collect();

    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let wanted = ((frames as u64 * target_rate as u64 + source_rate as u64 / 2)
        / source_rate as u64) as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(delay + wanted); channels_usize];
    let mut padded: Vec<Vec<f32>> = vec![vec![0.0; chunk_size]; channels_usize];

    // Past the end of the input, feed silence until the delayed tail is out
    let mut pos = 0;
    while output[0].len() < delay + wanted {
        let input_refs: Vec<&[f32]> = if pos + chunk_size <= frames {
            deinterleaved
                .iter()
                .map(|ch| &ch[pos..pos + chunk_size])
                .collect()
        } else {
            let available = frames.saturating_sub(pos);
            for (dst, src) in padded.iter_mut().zip(&deinterleaved) {
                dst.fill(0.0);
                dst[..available].copy_from_slice(&src[pos.min(frames)..]);
            }
            padded.iter().map(|v| v.as_slice()).collect()
        };

        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data);
        }

        pos += chunk_size;
    }

    // Drop the filter delay so output frame 0 lines up with input frame 0
    for ch in &mut output {
        ch.drain(..delay);
        ch.truncate(wanted);
    }

    // Reinterleave
    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels_usize);
    for frame_idx in 0..output_frames {
        for channel in &output {
            interleaved.push(channel[frame_idx]);
        }
    }

    debug!(
        "Resampled {} frames at {} Hz to {} frames at {} Hz",
        frames, source_rate, output_frames, target_rate
    );

    Ok(interleaved)
}

fn extract_metadata(format: &mut Box<dyn FormatReader>, path: &Path) -> AudioMetadata {
    let mut metadata = AudioMetadata {
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string(),
        artist: "Unknown".to_string(),
        ..Default::default()
    };

    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => metadata.title = tag.value.to_string(),
                Some(StandardTagKey::Artist) => metadata.artist = tag.value.to_string(),
                _ => {}
            }
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WavWriter;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("retempo-loader-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_load_missing_file() {
        let result = AudioLoader::new().load(Path::new("/nonexistent/file.wav"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_load_written_wav() {
        let path = temp_path("roundtrip.wav");
        let samples: Vec<i16> = (0..2000).map(|i| ((i % 200) * 100 - 10000) as i16).collect();
        let mut writer = WavWriter::create(&path, 22050, 2).unwrap();
        writer.write_samples(&samples).unwrap();
        writer.finalize().unwrap();

        let decoded = AudioLoader::new().load(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 1000);
        assert!((decoded.samples[0] - (-10000.0 / 32768.0)).abs() < 1e-4);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resample_changes_length() {
        let samples = vec![0.25f32; 2 * 44100];
        let resampled = resample(&samples, 44100, 22050, 2).unwrap();
        assert_eq!(resampled.len(), 2 * 22050);
        // Steady state, away from the edges
        assert!((resampled[2 * 11025] - 0.25).abs() < 1e-3);
        assert!((resampled[2 * 11025 + 1] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_resample_keeps_events_in_place() {
        let mut samples = vec![0.0f32; 44100];
        samples[10000] = 1.0;
        samples[44050] = 1.0;
        let resampled = resample(&samples, 44100, 22050, 1).unwrap();
        assert_eq!(resampled.len(), 22050);

        let peak = |range: std::ops::Range<usize>| {
            range
                .max_by(|&a, &b| resampled[a].total_cmp(&resampled[b]))
                .unwrap()
        };
        // No leading latency, and the last chunk is not cut short
        assert!((peak(0..15000) as i64 - 5000).abs() <= 2);
        assert!((peak(15000..22050) as i64 - 22025).abs() <= 2);
    }
}
