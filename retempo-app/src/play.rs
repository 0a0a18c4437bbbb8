//! Playback of a transformed file on the default output device
//!
//! The calling thread decodes and processes; the cpal output callback only
//! pops from a lock-free ring and zero-fills on underrun.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, warn};

use retempo_audio::StreamProcessor;
use retempo_library::{AudioLoader, Config};

use crate::cli::TransformOptions;
use crate::process::CHUNK_FRAMES;

/// Ring capacity in seconds of audio
const RING_SECONDS: f64 = 0.5;
/// Sleep while the ring is full
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Give up waiting for the device to drain after this long
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Events from the audio callback to the feeding thread
#[derive(Debug)]
enum PlaybackEvent {
    /// Input finished and the ring ran dry
    Drained,
    Error(String),
}

pub fn run(input: &Path, transform: &TransformOptions, config: &Config) -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("No audio output device found")?;
    let supported = device
        .default_output_config()
        .context("Failed to get output config")?;

    let device_rate = supported.sample_rate().0;
    let device_channels = supported.channels() as usize;

    // Decode straight to the device rate so no second resampler is needed
    let audio = AudioLoader::with_sample_rate(device_rate)
        .load(input)
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    let source_channels = audio.channels as usize;

    let mut processor = StreamProcessor::new();
    processor.set_channels(source_channels)?;
    processor.set_sample_rate(device_rate)?;
    transform.configure(config, &mut processor)?;

    info!(
        "Playing \"{}\" by {} ({:.1}s at tempo {:.3}, pitch {:+.2} st)",
        audio.metadata.title,
        audio.metadata.artist,
        audio.metadata.duration_secs,
        processor.tempo(),
        processor.params().pitch_semitones()
    );

    let capacity = ((device_rate as f64 * RING_SECONDS) as usize).max(CHUNK_FRAMES) * device_channels;
    let ring = HeapRb::<f32>::new(capacity);
    let (mut producer, consumer) = ring.split();
    let (event_tx, event_rx) = crossbeam_channel::bounded::<PlaybackEvent>(4);
    let finished = Arc::new(AtomicBool::new(false));

    let stream_config = supported.config();
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_output::<f32>(
            &device,
            &stream_config,
            consumer,
            event_tx,
            finished.clone(),
        )?,
        SampleFormat::I16 => build_output::<i16>(
            &device,
            &stream_config,
            consumer,
            event_tx,
            finished.clone(),
        )?,
        SampleFormat::U16 => build_output::<u16>(
            &device,
            &stream_config,
            consumer,
            event_tx,
            finished.clone(),
        )?,
        other => bail!("Unsupported output sample format {:?}", other),
    };
    stream.play().context("Failed to start output stream")?;

    let mut received = vec![0.0f32; CHUNK_FRAMES * source_channels];
    let mut mapped = Vec::with_capacity(CHUNK_FRAMES * device_channels);

    for chunk in audio.samples.chunks(CHUNK_FRAMES * source_channels) {
        processor.put_samples(chunk, chunk.len() / source_channels)?;
        feed(
            &mut processor,
            &mut received,
            &mut mapped,
            device_channels,
            &mut producer,
            &event_rx,
        )?;
    }
    processor.flush();
    feed(
        &mut processor,
        &mut received,
        &mut mapped,
        device_channels,
        &mut producer,
        &event_rx,
    )?;

    finished.store(true, Ordering::Release);
    match event_rx.recv_timeout(DRAIN_TIMEOUT) {
        Ok(PlaybackEvent::Drained) => debug!("Playback drained"),
        Ok(PlaybackEvent::Error(message)) => bail!("Output stream error: {}", message),
        Err(_) => warn!("Timed out waiting for playback to finish"),
    }

    Ok(())
}

/// Move every ready frame from the processor into the ring, blocking while
/// the ring is full
fn feed(
    processor: &mut StreamProcessor,
    received: &mut [f32],
    mapped: &mut Vec<f32>,
    device_channels: usize,
    producer: &mut HeapProd<f32>,
    events: &Receiver<PlaybackEvent>,
) -> anyhow::Result<()> {
    let source_channels = processor.num_channels();
    let max_frames = received.len() / source_channels;

    loop {
        let frames = processor.receive_samples(received, max_frames);
        if frames == 0 {
            return Ok(());
        }

        remap_channels(
            &received[..frames * source_channels],
            source_channels,
            device_channels,
            mapped,
        );

        let mut offset = 0;
        while offset < mapped.len() {
            if let Ok(PlaybackEvent::Error(message)) = events.try_recv() {
                bail!("Output stream error: {}", message);
            }
            let pushed = producer.push_slice(&mapped[offset..]);
            offset += pushed;
            if pushed == 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Convert interleaved frames between channel counts. Output channel `c`
/// takes input channel `c % input_channels`, so mono fans out to every
/// speaker and extra input channels are dropped.
fn remap_channels(input: &[f32], input_channels: usize, output_channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if input_channels == output_channels {
        out.extend_from_slice(input);
        return;
    }
    for frame in input.chunks_exact(input_channels) {
        out.extend((0..output_channels).map(|c| frame[c % input_channels]));
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<f32>,
    events: Sender<PlaybackEvent>,
    finished: Arc<AtomicBool>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let error_events = events.clone();
    let mut drained_sent = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut written = 0;
            for (dst, src) in data.iter_mut().zip(consumer.pop_iter()) {
                *dst = T::from_sample(src);
                written += 1;
            }
            // Underrun or end of stream: output silence
            for dst in &mut data[written..] {
                *dst = T::EQUILIBRIUM;
            }

            if !drained_sent && finished.load(Ordering::Acquire) && consumer.is_empty() {
                drained_sent = true;
                let _ = events.try_send(PlaybackEvent::Drained);
            }
        },
        move |err| {
            let _ = error_events.try_send(PlaybackEvent::Error(err.to_string()));
        },
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_same_layout_copies() {
        let mut out = Vec::new();
        remap_channels(&[0.1, 0.2, 0.3, 0.4], 2, 2, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_remap_mono_to_stereo() {
        let mut out = Vec::new();
        remap_channels(&[0.5, -0.5], 1, 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_remap_drops_extra_channels() {
        let mut out = vec![9.0];
        remap_channels(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_feed_moves_processed_frames_into_ring() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.put_samples(&vec![0.25f32; 8000], 8000).unwrap();
        processor.flush();

        let (mut producer, mut consumer) = HeapRb::<f32>::new(2 * 8000).split();
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let mut received = vec![0.0f32; 1024];
        let mut mapped = Vec::new();
        feed(&mut processor, &mut received, &mut mapped, 2, &mut producer, &rx).unwrap();

        assert_eq!(consumer.occupied_len(), 2 * 8000);
        let mut frame = [0.0f32; 2];
        consumer.pop_slice(&mut frame);
        assert_eq!(frame[0], frame[1]);
    }
}
