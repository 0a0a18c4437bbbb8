//! Microphone capture through the processor into a WAV file
//!
//! The cpal input callback only copies samples into a lock-free ring. The
//! calling thread owns the processor, drains the ring, and writes the file.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{Sender, TryRecvError};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{info, warn};

use retempo_audio::StreamProcessor;
use retempo_library::{Config, WavWriter};

use crate::cli::TransformOptions;
use crate::process::{drain, remember_output_dir, CHUNK_FRAMES};

/// Ring capacity in seconds of audio
const RING_SECONDS: usize = 2;
/// Sleep while the ring is empty
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(
    output: &Path,
    seconds: f64,
    transform: &TransformOptions,
    config: &mut Config,
) -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No audio input device found")?;
    let supported = device
        .default_input_config()
        .context("Failed to get input config")?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    info!(
        "Recording {:.1}s from {} ({} Hz, {} ch)",
        seconds,
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        sample_rate,
        channels
    );

    let mut processor = StreamProcessor::new();
    processor.set_channels(channels)?;
    processor.set_sample_rate(sample_rate)?;
    transform.configure(config, &mut processor)?;

    let ring = HeapRb::<f32>::new(sample_rate as usize * channels * RING_SECONDS);
    let (producer, mut consumer) = ring.split();
    let (err_tx, err_rx) = crossbeam_channel::bounded::<String>(4);
    let dropped = Arc::new(AtomicUsize::new(0));

    let stream_config = supported.config();
    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            build_input::<f32>(&device, &stream_config, producer, err_tx, dropped.clone())?
        }
        SampleFormat::I16 => {
            build_input::<i16>(&device, &stream_config, producer, err_tx, dropped.clone())?
        }
        SampleFormat::U16 => {
            build_input::<u16>(&device, &stream_config, producer, err_tx, dropped.clone())?
        }
        other => bail!("Unsupported input sample format {:?}", other),
    };
    stream.play().context("Failed to start input stream")?;

    let mut writer = WavWriter::create(output, sample_rate, channels as u16)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut sink = |block: &[i16]| -> anyhow::Result<()> {
        writer.write_samples(block)?;
        Ok(())
    };

    let target_frames = (seconds * sample_rate as f64).round() as usize;
    let mut captured = 0usize;
    let mut input = vec![0.0f32; CHUNK_FRAMES * channels];
    let mut out = vec![0i16; CHUNK_FRAMES * channels];

    while captured < target_frames {
        match err_rx.try_recv() {
            Ok(message) => bail!("Input stream error: {}", message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        let wanted = (target_frames - captured).min(CHUNK_FRAMES);
        let available = consumer.occupied_len() / channels;
        let frames = wanted.min(available);
        if frames == 0 {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        let read = consumer.pop_slice(&mut input[..frames * channels]);
        processor.put_samples(&input[..read], read / channels)?;
        drain(&mut processor, &mut out, &mut sink)?;
        captured += read / channels;
    }

    drop(stream);
    processor.flush();
    drain(&mut processor, &mut out, &mut sink)?;
    let written = writer.finalize()?;

    let lost = dropped.load(Ordering::Relaxed);
    if lost > 0 {
        warn!("Ring overflow dropped {} samples", lost);
    }
    info!(
        "Wrote {} ({} frames captured, {} frames out)",
        output.display(),
        captured,
        written
    );

    remember_output_dir(config, output);
    Ok(())
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: HeapProd<f32>,
    err_tx: Sender<String>,
    dropped: Arc<AtomicUsize>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = (config.channels as usize).max(1);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Whole frames only, so an overflow never shifts the channels
            let vacant = producer.vacant_len();
            let len = data.len().min(vacant - vacant % channels);
            let pushed = producer.push_iter(data[..len].iter().map(|&s| s.to_sample::<f32>()));
            if pushed < data.len() {
                dropped.fetch_add(data.len() - pushed, Ordering::Relaxed);
            }
        },
        move |err| {
            let _ = err_tx.try_send(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}
