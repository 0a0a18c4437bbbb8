//! Stream processor - rate, tempo, and pitch transform over a PCM stream
//!
//! Samples go in through `put_samples`, flow through the rate transposer and
//! the time-stretch stage, and collect in an output FIFO drained with
//! `receive_samples`. Processing is opportunistic: each stage works in
//! blocks, so frames come out in bursts and some always stay inside the
//! pipeline until `flush`.

use crate::error::{EngineError, Result};
use crate::fifo::SampleFifo;
use crate::params::{rejected, TransformParams};
use crate::sample::Sample;
use crate::stretch::{StretchSettings, TimeStretch};
use crate::transposer::RateTransposer;
use tracing::{debug, trace};

/// Sample rate of a freshly created processor
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
/// Channel count of a freshly created processor
pub const DEFAULT_CHANNELS: usize = 2;
/// Highest accepted channel count
pub const MAX_CHANNELS: usize = 16;
/// Highest accepted sample rate
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Frames of silence pushed per step while flushing
const FLUSH_BLOCK_FRAMES: usize = 128;
/// Lower bound on the silence a flush may push (200 blocks)
const FLUSH_MIN_BUDGET_FRAMES: usize = 200 * FLUSH_BLOCK_FRAMES;
/// Upper bound on the silence a flush may push, whatever the latency
const FLUSH_MAX_BUDGET_FRAMES: usize = 2000 * FLUSH_BLOCK_FRAMES;

/// Order of the two pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOrder {
    /// Rate <= 1: resample first, then stretch
    TransposeFirst,
    /// Rate > 1: stretch first so the transposer sees fewer frames
    StretchFirst,
}

/// Streaming rate / tempo / pitch processor for one audio stream
pub struct StreamProcessor {
    params: TransformParams,
    channels: usize,
    sample_rate: u32,
    stretch: TimeStretch,
    transposer: RateTransposer,
    order: StageOrder,
    output: SampleFifo,
    /// Frames the current stream should yield, accumulated per input block
    expected_out: f64,
    /// Frames handed out since the current stream started
    delivered: u64,
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProcessor {
    /// Stereo, 44.1 kHz, identity transform
    pub fn new() -> Self {
        Self {
            params: TransformParams::default(),
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            stretch: TimeStretch::new(DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE),
            transposer: RateTransposer::new(DEFAULT_CHANNELS),
            order: StageOrder::TransposeFirst,
            output: SampleFifo::new(DEFAULT_CHANNELS),
            expected_out: 0.0,
            delivered: 0,
        }
    }

    // ---- Sample I/O -------------------------------------------------------

    /// Append `frames` interleaved frames from `samples`.
    ///
    /// `samples.len()` must equal `frames * channels`.
    pub fn put_samples<S: Sample>(&mut self, samples: &[S], frames: usize) -> Result<()> {
        match frames.checked_mul(self.channels) {
            Some(expected) if expected == samples.len() => {}
            expected => {
                return Err(EngineError::LengthMismatch {
                    expected: expected.unwrap_or(usize::MAX),
                    actual: samples.len(),
                })
            }
        }

        self.expected_out += frames as f64 * self.params.input_output_ratio();
        self.first_stage_input().put_converted(samples);
        self.run_pipeline();

        trace!(
            frames,
            ready = self.output.frames(),
            unprocessed = self.num_unprocessed_samples(),
            "put samples"
        );
        Ok(())
    }

    /// Append little-endian signed 16-bit PCM bytes
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let frame_bytes = 2 * self.channels;
        if bytes.len() % frame_bytes != 0 {
            return Err(EngineError::PartialFrame {
                frame_bytes,
                actual: bytes.len(),
            });
        }

        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let frames = samples.len() / self.channels;
        self.put_samples(&samples, frames)
    }

    /// Move up to `max_frames` processed frames into `out`.
    ///
    /// Also capped by the frames that fit in `out`. Returns frames copied.
    pub fn receive_samples<S: Sample>(&mut self, out: &mut [S], max_frames: usize) -> usize {
        let frames = self.output.receive_into(out, max_frames);
        self.delivered += frames as u64;
        frames
    }

    /// Fill `out` with little-endian i16 frames; returns bytes written
    pub fn receive_bytes(&mut self, out: &mut [u8]) -> usize {
        let max_frames = out.len() / (2 * self.channels);
        let mut samples = vec![0i16; max_frames * self.channels];
        let frames = self.receive_samples(&mut samples, max_frames);
        let count = frames * self.channels;

        for (dst, sample) in out.chunks_exact_mut(2).zip(&samples[..count]) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }
        count * 2
    }

    /// Drop up to `max_frames` processed frames; returns frames dropped
    pub fn receive_samples_discard(&mut self, max_frames: usize) -> usize {
        let frames = self.output.discard(max_frames);
        self.delivered += frames as u64;
        frames
    }

    // ---- Transform parameters ---------------------------------------------

    pub fn set_rate(&mut self, ratio: f64) -> Result<()> {
        self.params.set_rate(ratio)?;
        self.apply_params();
        Ok(())
    }

    pub fn set_tempo(&mut self, ratio: f64) -> Result<()> {
        self.params.set_tempo(ratio)?;
        self.apply_params();
        Ok(())
    }

    pub fn set_pitch(&mut self, ratio: f64) -> Result<()> {
        self.params.set_pitch(ratio)?;
        self.apply_params();
        Ok(())
    }

    /// Rate as percent delta (-50 .. +100)
    pub fn set_rate_change(&mut self, percent: f64) -> Result<()> {
        self.params.set_rate_change(percent)?;
        self.apply_params();
        Ok(())
    }

    /// Tempo as percent delta (-50 .. +100)
    pub fn set_tempo_change(&mut self, percent: f64) -> Result<()> {
        self.params.set_tempo_change(percent)?;
        self.apply_params();
        Ok(())
    }

    /// Pitch as octave delta (-1.0 .. +1.0)
    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<()> {
        self.params.set_pitch_octaves(octaves)?;
        self.apply_params();
        Ok(())
    }

    /// Pitch as semitone delta (-12 .. +12); accepts integers or fractions
    pub fn set_pitch_semitones(&mut self, semitones: impl Into<f64>) -> Result<()> {
        self.params.set_pitch_semitones(semitones.into())?;
        self.apply_params();
        Ok(())
    }

    #[inline]
    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.params.rate()
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.params.tempo()
    }

    #[inline]
    pub fn pitch(&self) -> f64 {
        self.params.pitch()
    }

    /// Expected output frames per input frame at the current parameters.
    ///
    /// Exact over a whole flushed stream, approximate over short windows.
    #[inline]
    pub fn input_output_ratio(&self) -> f64 {
        self.params.input_output_ratio()
    }

    // ---- Stream format ----------------------------------------------------

    /// Set channel count (1 ..= 16). Buffered samples are reinterpreted with
    /// the new frame size, not converted.
    pub fn set_channels(&mut self, channels: usize) -> Result<()> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(rejected("channels", channels as f64));
        }
        if channels != self.channels {
            debug!(from = self.channels, to = channels, "channel count changed");
        }
        self.channels = channels;
        self.stretch.set_channels(channels);
        self.transposer.set_channels(channels);
        self.output.set_channels(channels);
        Ok(())
    }

    /// Set sample rate in Hz. Affects stage lengths, not buffered samples.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(rejected("sample rate", sample_rate as f64));
        }
        self.sample_rate = sample_rate;
        self.stretch.set_sample_rate(sample_rate);
        Ok(())
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    // ---- Algorithm settings -----------------------------------------------

    /// Tune the time-stretch stage
    pub fn set_stretch_settings(&mut self, settings: StretchSettings) -> Result<()> {
        validate_ms("overlap ms", Some(settings.overlap_ms))?;
        validate_ms("sequence ms", settings.sequence_ms)?;
        validate_ms("seek window ms", settings.seek_window_ms)?;
        self.stretch.set_settings(settings);
        Ok(())
    }

    #[inline]
    pub fn stretch_settings(&self) -> StretchSettings {
        self.stretch.settings()
    }

    /// Enable or disable the anti-alias filter around resampling
    pub fn set_anti_alias(&mut self, enabled: bool) {
        self.transposer.set_anti_alias(enabled);
    }

    #[inline]
    pub fn anti_alias(&self) -> bool {
        self.transposer.anti_alias()
    }

    #[inline]
    pub fn stage_order(&self) -> StageOrder {
        self.order
    }

    // ---- Stream control ---------------------------------------------------

    /// End the stream: push everything still inside the pipeline out.
    ///
    /// Silence is fed through until the output holds every frame the stream
    /// is expected to yield, then the output is trimmed to exactly that
    /// count. Afterwards the pipeline starts a fresh stream. Flushing in the
    /// middle of a stream is allowed but leaves a gap of padding.
    pub fn flush(&mut self) {
        let expected_total = (self.expected_out + 0.5).floor() as u64;
        let still_expected = expected_total.saturating_sub(self.delivered) as usize;

        let budget = self.flush_budget_frames();
        let mut pushed = 0usize;
        while self.output.frames() < still_expected && pushed < budget {
            self.first_stage_input().put_silence(FLUSH_BLOCK_FRAMES);
            self.run_pipeline();
            pushed += FLUSH_BLOCK_FRAMES;
        }
        self.output.truncate_frames(still_expected);

        debug!(
            still_expected,
            ready = self.output.frames(),
            padding = pushed,
            "flushed stream"
        );

        self.stretch.clear();
        self.transposer.clear();
        self.expected_out = self.output.frames() as f64;
        self.delivered = 0;
    }

    /// Drop all buffered input and output, keep parameters
    pub fn clear(&mut self) {
        self.stretch.clear();
        self.transposer.clear();
        self.output.clear();
        self.expected_out = 0.0;
        self.delivered = 0;
    }

    // ---- Introspection ----------------------------------------------------

    /// Frames ready to be received
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.output.frames()
    }

    /// Frames inside the pipeline that have not reached the output
    #[inline]
    pub fn num_unprocessed_samples(&self) -> usize {
        self.stretch.pending_frames() + self.transposer.pending_frames()
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// True when no frames are ready to be received
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    // ---- Internals --------------------------------------------------------

    fn apply_params(&mut self) {
        let tempo = self.params.effective_tempo();
        let rate = self.params.effective_rate();
        self.stretch.set_tempo(tempo);
        self.transposer.set_rate(rate);

        let order = if rate <= 1.0 {
            StageOrder::TransposeFirst
        } else {
            StageOrder::StretchFirst
        };
        if order != self.order {
            debug!(?order, "stage order changed");
            self.order = order;
        }

        debug!(
            rate = self.params.rate(),
            tempo = self.params.tempo(),
            pitch = self.params.pitch(),
            effective_tempo = tempo,
            effective_rate = rate,
            "transform updated"
        );
    }

    fn first_stage_input(&mut self) -> &mut SampleFifo {
        match self.order {
            StageOrder::TransposeFirst => self.transposer.input_mut(),
            StageOrder::StretchFirst => self.stretch.input_mut(),
        }
    }

    fn run_pipeline(&mut self) {
        match self.order {
            StageOrder::TransposeFirst => {
                self.transposer.process(self.stretch.input_mut());
                self.stretch.process(&mut self.output);
            }
            StageOrder::StretchFirst => {
                self.stretch.process(self.transposer.input_mut());
                self.transposer.process(&mut self.output);
            }
        }
    }

    /// Upper bound on padding: several times the pipeline latency, measured
    /// in input frames, clamped to a fixed window
    fn flush_budget_frames(&self) -> usize {
        let stretch_latency = self.stretch.sample_req() as f64;
        let transposer_latency = self.transposer.latency_frames() as f64;
        let scale = self.params.effective_tempo().max(1.0) * self.params.effective_rate().max(1.0);
        let latency = (stretch_latency + transposer_latency) * scale;
        // Float to int casts saturate, so a huge latency lands on the cap
        ((4.0 * latency) as usize).clamp(FLUSH_MIN_BUDGET_FRAMES, FLUSH_MAX_BUDGET_FRAMES)
    }
}

fn validate_ms(name: &'static str, value: Option<u32>) -> Result<()> {
    match value {
        Some(ms) if ms == 0 || ms > 1000 => Err(rejected(name, ms as f64)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MAX_RATIO, MIN_RATIO};
    use approx::assert_relative_eq;

    /// Deterministic pseudo-random PCM (xorshift)
    fn noise(samples: usize, seed: u32) -> Vec<i16> {
        let mut state = seed.max(1);
        (0..samples)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 16) as i16 / 2
            })
            .collect()
    }

    fn drain(processor: &mut StreamProcessor) -> Vec<i16> {
        let mut all = Vec::new();
        let mut buffer = vec![0i16; 1024 * processor.channels()];
        loop {
            let frames = processor.receive_samples(&mut buffer, 1024);
            if frames == 0 {
                break;
            }
            all.extend_from_slice(&buffer[..frames * processor.channels()]);
        }
        all
    }

    #[test]
    fn test_defaults() {
        let processor = StreamProcessor::new();
        assert_eq!(processor.num_channels(), 2);
        assert_eq!(processor.sample_rate(), 44100);
        assert_eq!(processor.rate(), 1.0);
        assert_eq!(processor.tempo(), 1.0);
        assert_eq!(processor.pitch(), 1.0);
        assert!(processor.is_empty());
        assert_eq!(processor.num_unprocessed_samples(), 0);
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_sample_rate(44100).unwrap();

        processor.put_samples(&[0i16; 1000], 1000).unwrap();
        processor.flush();
        let out = drain(&mut processor);

        assert!(out.len() >= 1000);
        assert!(out.iter().all(|&s| s == 0));
        assert!(processor.is_empty());
    }

    #[test]
    fn test_double_tempo_halves_duration() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_tempo(2.0).unwrap();
        assert_relative_eq!(processor.input_output_ratio(), 0.5);

        let input = noise(44100, 7);
        for chunk in input.chunks(4096) {
            processor.put_samples(chunk, chunk.len()).unwrap();
        }
        processor.flush();
        let out = drain(&mut processor);

        let frames = out.len() as f64;
        assert!((frames - 22050.0).abs() <= 1.0, "got {frames} frames");
    }

    #[test]
    fn test_pitch_shift_keeps_duration() {
        let mut processor = StreamProcessor::new();
        processor.set_pitch_semitones(7).unwrap();
        assert_eq!(processor.stage_order(), StageOrder::StretchFirst);
        assert_relative_eq!(processor.input_output_ratio(), 1.0);

        let input = noise(2 * 30000, 11);
        for chunk in input.chunks(2 * 1000) {
            processor.put_samples(chunk, chunk.len() / 2).unwrap();
        }
        processor.flush();
        let out = drain(&mut processor);
        assert_eq!(out.len(), 2 * 30000);
    }

    #[test]
    fn test_slow_rate_lengthens_stream() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_rate_change(-50.0).unwrap();
        assert_eq!(processor.stage_order(), StageOrder::TransposeFirst);

        let input = noise(20000, 3);
        processor.put_samples(&input, input.len()).unwrap();
        processor.flush();
        let out = drain(&mut processor);
        assert_eq!(out.len(), 40000);
    }

    #[test]
    fn test_identity_reproduces_input_head() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        let input = noise(20000, 42);
        processor.put_samples(&input, input.len()).unwrap();
        processor.flush();
        let out = drain(&mut processor);

        assert_eq!(out.len(), input.len());
        assert_eq!(&out[..2000], &input[..2000]);
    }

    #[test]
    fn test_receive_is_capped() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.put_samples(&noise(10000, 5), 10000).unwrap();

        let ready = processor.num_samples();
        assert!(ready > 0);

        let mut small = [0i16; 10];
        assert_eq!(processor.receive_samples(&mut small, 100), 10);

        let mut big = vec![0i16; 100_000];
        let got = processor.receive_samples(&mut big, 5);
        assert_eq!(got, 5);
        assert_eq!(processor.num_samples(), ready - 15);

        let rest = processor.receive_samples(&mut big, usize::MAX);
        assert_eq!(rest, ready - 15);
        assert_eq!(processor.receive_samples(&mut big, 10), 0);
    }

    #[test]
    fn test_discard_counts_against_output() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        let input = noise(10000, 9);
        processor.put_samples(&input, input.len()).unwrap();

        let ready = processor.num_samples();
        assert_eq!(processor.receive_samples_discard(100), 100.min(ready));
        processor.flush();
        let rest = drain(&mut processor);
        assert_eq!(rest.len() + 100.min(ready), 10000);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut processor = StreamProcessor::new();
        let err = processor.put_samples(&[0i16; 7], 4).unwrap_err();
        assert_eq!(
            err,
            EngineError::LengthMismatch {
                expected: 8,
                actual: 7
            }
        );
        assert_eq!(processor.num_unprocessed_samples(), 0);
    }

    #[test]
    fn test_overflowing_frame_count_is_rejected() {
        let mut processor = StreamProcessor::new();
        let err = processor
            .put_samples::<i16>(&[], usize::MAX / 2 + 1)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::LengthMismatch {
                expected: usize::MAX,
                actual: 0
            }
        );
        assert_eq!(processor.num_unprocessed_samples(), 0);

        // Nothing was accounted, so a flush yields nothing
        processor.flush();
        assert_eq!(processor.num_samples(), 0);
    }

    #[test]
    fn test_flush_at_extreme_tempo_is_bounded() {
        let mut processor = StreamProcessor::new();
        processor.set_tempo(MAX_RATIO).unwrap();
        processor.set_rate(MAX_RATIO).unwrap();
        assert!(processor.set_pitch(MIN_RATIO).is_err());
        assert!(processor.flush_budget_frames() <= FLUSH_MAX_BUDGET_FRAMES);

        processor.put_samples(&noise(2 * 5000, 21), 5000).unwrap();
        processor.flush();
        assert!(processor.num_samples() <= 1);
        assert_eq!(processor.num_unprocessed_samples(), 0);

        // Output is expected now, but one stretch sequence needs more input
        // than the padding cap allows
        processor.set_rate(1.0).unwrap();
        processor.put_samples(&noise(2 * 5000, 22), 5000).unwrap();
        processor.flush();
        assert!(processor.num_samples() <= 5);
        assert_eq!(processor.num_unprocessed_samples(), 0);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let mut processor = StreamProcessor::new();
        assert!(processor.set_channels(0).is_err());
        assert!(processor.set_channels(MAX_CHANNELS + 1).is_err());
        assert!(processor.set_sample_rate(0).is_err());
        assert!(processor.set_tempo(-2.0).is_err());
        assert_eq!(processor.num_channels(), 2);
        assert_eq!(processor.sample_rate(), 44100);
        assert_eq!(processor.tempo(), 1.0);
    }

    #[test]
    fn test_clear_keeps_parameters() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_sample_rate(22050).unwrap();
        processor.set_tempo(1.5).unwrap();
        processor.set_pitch(0.8).unwrap();
        processor.set_rate(1.1).unwrap();
        processor.put_samples(&noise(30000, 1), 30000).unwrap();
        assert!(processor.num_samples() > 0);

        processor.clear();
        assert_eq!(processor.num_samples(), 0);
        assert_eq!(processor.num_unprocessed_samples(), 0);
        assert_eq!(processor.num_channels(), 1);
        assert_eq!(processor.sample_rate(), 22050);
        assert_eq!(processor.tempo(), 1.5);
        assert_eq!(processor.pitch(), 0.8);
        assert_eq!(processor.rate(), 1.1);
    }

    #[test]
    fn test_bytes_interface() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        let input = noise(5000, 13);
        let bytes: Vec<u8> = input.iter().flat_map(|s| s.to_le_bytes()).collect();

        assert_eq!(
            processor.put_bytes(&bytes[..3]),
            Err(EngineError::PartialFrame {
                frame_bytes: 2,
                actual: 3
            })
        );
        processor.set_channels(2).unwrap();
        assert_eq!(
            processor.put_bytes(&bytes[..6]),
            Err(EngineError::PartialFrame {
                frame_bytes: 4,
                actual: 6
            })
        );
        processor.set_channels(1).unwrap();
        assert_eq!(processor.num_unprocessed_samples(), 0);

        processor.put_bytes(&bytes).unwrap();
        processor.flush();

        let mut out = vec![0u8; 4096];
        let mut received = Vec::new();
        loop {
            let n = processor.receive_bytes(&mut out);
            if n == 0 {
                break;
            }
            assert_eq!(n % 2, 0);
            received.extend_from_slice(&out[..n]);
        }
        assert_eq!(received.len(), bytes.len());
        assert_eq!(&received[..1000], &bytes[..1000]);
    }

    #[test]
    fn test_second_stream_after_flush() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        processor.set_tempo(1.25).unwrap();

        processor.put_samples(&noise(10000, 2), 10000).unwrap();
        processor.flush();
        let first = drain(&mut processor);
        assert_eq!(first.len(), 8000);

        processor.put_samples(&noise(5000, 4), 5000).unwrap();
        processor.flush();
        let second = drain(&mut processor);
        assert_eq!(second.len(), 4000);
    }

    #[test]
    fn test_stretch_settings_validation() {
        let mut processor = StreamProcessor::new();
        let bad = StretchSettings {
            overlap_ms: 0,
            ..StretchSettings::default()
        };
        assert!(processor.set_stretch_settings(bad).is_err());

        let good = StretchSettings {
            sequence_ms: Some(60),
            quick_seek: true,
            ..StretchSettings::default()
        };
        processor.set_stretch_settings(good).unwrap();
        assert_eq!(processor.stretch_settings(), good);
    }

    #[test]
    fn test_channel_change_keeps_whole_frames() {
        let mut processor = StreamProcessor::new();
        processor.set_channels(1).unwrap();
        let input = noise(12345, 6);
        processor.put_samples(&input, 12345).unwrap();
        let ready = processor.num_samples();
        assert!(ready >= 30);

        processor.set_channels(3).unwrap();
        assert_eq!(processor.num_channels(), 3);
        assert_eq!(processor.num_samples(), ready / 3);

        // Mono samples come back regrouped as 3-channel frames, in order
        let mut buffer = vec![0i16; 3 * 10];
        assert_eq!(processor.receive_samples(&mut buffer, 10), 10);
        assert_eq!(&buffer[..], &input[..30]);
        assert_eq!(processor.num_samples(), ready / 3 - 10);
    }
}
