//! Offline file processing: decode, transform, write WAV

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use tracing::{info, warn};

use retempo_audio::StreamProcessor;
use retempo_library::{AudioLoader, Config, WavWriter};

use crate::cli::TransformOptions;

/// Frames fed to the processor per call
pub const CHUNK_FRAMES: usize = 4096;

/// Decode `input`, run it through the processor and write `output`
pub fn run(
    input: &Path,
    output: &Path,
    resample: Option<u32>,
    transform: &TransformOptions,
    config: &mut Config,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let loader = resample
        .map(AudioLoader::with_sample_rate)
        .unwrap_or_default();
    let audio = loader
        .load(input)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let mut processor = StreamProcessor::new();
    processor.set_channels(audio.channels as usize)?;
    processor.set_sample_rate(audio.sample_rate)?;
    transform.configure(config, &mut processor)?;

    info!(
        "Processing \"{}\" by {}: tempo {:.3}, pitch {:+.2} st, rate {:.3}",
        audio.metadata.title,
        audio.metadata.artist,
        processor.tempo(),
        processor.params().pitch_semitones(),
        processor.rate()
    );

    let mut writer = WavWriter::create(output, audio.sample_rate, audio.channels)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    transform_buffer(&mut processor, &audio.samples, |block| {
        writer.write_samples(block)?;
        Ok(())
    })?;
    let frames = writer.finalize()?;

    info!(
        "Wrote {} ({} frames in, {} frames out, {:.2?})",
        output.display(),
        audio.frames(),
        frames,
        started.elapsed()
    );

    remember_output_dir(config, output);
    Ok(())
}

/// Push all of `samples` through `processor`, flush, and hand every produced
/// block to `sink` as interleaved i16
pub fn transform_buffer<F>(
    processor: &mut StreamProcessor,
    samples: &[f32],
    mut sink: F,
) -> anyhow::Result<u64>
where
    F: FnMut(&[i16]) -> anyhow::Result<()>,
{
    let channels = processor.num_channels();
    let mut out = vec![0i16; CHUNK_FRAMES * channels];
    let mut produced = 0u64;

    for chunk in samples.chunks(CHUNK_FRAMES * channels) {
        processor.put_samples(chunk, chunk.len() / channels)?;
        produced += drain(processor, &mut out, &mut sink)?;
    }

    processor.flush();
    produced += drain(processor, &mut out, &mut sink)?;
    Ok(produced)
}

/// Receive everything ready in `processor` through `sink`
pub fn drain<F>(processor: &mut StreamProcessor, out: &mut [i16], sink: &mut F) -> anyhow::Result<u64>
where
    F: FnMut(&[i16]) -> anyhow::Result<()>,
{
    let channels = processor.num_channels();
    let max_frames = out.len() / channels;
    let mut total = 0u64;
    loop {
        let frames = processor.receive_samples(out, max_frames);
        if frames == 0 {
            return Ok(total);
        }
        sink(&out[..frames * channels])?;
        total += frames as u64;
    }
}

/// Store the output folder in the config; failure to save is not fatal
pub fn remember_output_dir(config: &mut Config, output: &Path) {
    let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return;
    };
    config.last_output_dir = Some(dir.to_path_buf());
    if let Err(e) = config.save() {
        warn!("Failed to save config: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_buffer_halves_at_double_tempo() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_tempo(2.0).unwrap();

        let samples: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut collected = 0usize;
        let frames = transform_buffer(&mut processor, &samples, |block| {
            collected += block.len();
            Ok(())
        })
        .unwrap();

        assert_eq!(frames as usize, collected);
        assert!((frames as i64 - 22050).abs() <= 1, "got {frames}");
    }

    #[test]
    fn test_sink_errors_propagate() {
        let mut processor = StreamProcessor::new();
        let samples = vec![0.0f32; 2 * 20000];
        let result = transform_buffer(&mut processor, &samples, |_| anyhow::bail!("disk full"));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("retempo-process-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.wav");
        let output = dir.join("out.wav");

        let samples: Vec<i16> = (0..2 * 8000)
            .map(|i| ((i as f32 * 0.01).sin() * 8000.0) as i16)
            .collect();
        retempo_library::write_wav(&input, &samples, 16000, 2).unwrap();

        let mut processor = StreamProcessor::new();
        let audio = AudioLoader::new().load(&input).unwrap();
        processor.set_channels(audio.channels as usize).unwrap();
        processor.set_sample_rate(audio.sample_rate).unwrap();
        processor.set_tempo_change(-50.0).unwrap();

        let mut writer = WavWriter::create(&output, audio.sample_rate, audio.channels).unwrap();
        transform_buffer(&mut processor, &audio.samples, |block| {
            writer.write_samples(block)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(writer.finalize().unwrap(), 16000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
