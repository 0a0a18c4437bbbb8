//! Time-stretch stage: tempo change without pitch change.
//!
//! Sequenced overlap-add with a correlation search (WSOLA). The input is cut
//! into sequences of `sequence_len` frames. Each new sequence starts at the
//! offset inside the seek window whose start best matches the tail of the
//! previous sequence; the two are cross-faded over `overlap_len` frames, and
//! the input advances by `tempo * (sequence_len - overlap_len)` frames per
//! sequence. Output per sequence is constant, so the duration scales by
//! `1 / tempo`.

use crate::fifo::SampleFifo;
use tracing::{debug, trace};

/// Default cross-fade length
pub const DEFAULT_OVERLAP_MS: u32 = 8;

// Auto-tuning: long sequences for slow tempo, short ones for fast tempo
const AUTO_TEMPO_LOW: f64 = 0.5;
const AUTO_TEMPO_HIGH: f64 = 2.0;
const AUTO_SEQUENCE_AT_LOW_MS: f64 = 90.0;
const AUTO_SEQUENCE_AT_HIGH_MS: f64 = 40.0;
const AUTO_SEEK_AT_LOW_MS: f64 = 20.0;
const AUTO_SEEK_AT_HIGH_MS: f64 = 15.0;

/// Coarse step of the quick seek
const QUICK_SEEK_STEP: usize = 8;

/// Tuning of the time-stretch stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StretchSettings {
    /// Sequence length in ms, `None` to follow the tempo automatically
    pub sequence_ms: Option<u32>,
    /// Seek window length in ms, `None` to follow the tempo automatically
    pub seek_window_ms: Option<u32>,
    /// Cross-fade length in ms
    pub overlap_ms: u32,
    /// Coarse-to-fine seek instead of a full scan
    pub quick_seek: bool,
}

impl Default for StretchSettings {
    fn default() -> Self {
        Self {
            sequence_ms: None,
            seek_window_ms: None,
            overlap_ms: DEFAULT_OVERLAP_MS,
            quick_seek: false,
        }
    }
}

/// Sequence length the auto mode picks for a tempo
pub fn auto_sequence_ms(tempo: f64) -> f64 {
    auto_interpolate(tempo, AUTO_SEQUENCE_AT_LOW_MS, AUTO_SEQUENCE_AT_HIGH_MS)
}

/// Seek window length the auto mode picks for a tempo
pub fn auto_seek_window_ms(tempo: f64) -> f64 {
    auto_interpolate(tempo, AUTO_SEEK_AT_LOW_MS, AUTO_SEEK_AT_HIGH_MS)
}

/// Linear between the two anchor tempos, clamped outside them
fn auto_interpolate(tempo: f64, at_low: f64, at_high: f64) -> f64 {
    let slope = (at_high - at_low) / (AUTO_TEMPO_HIGH - AUTO_TEMPO_LOW);
    let value = at_low + slope * (tempo - AUTO_TEMPO_LOW);
    value.clamp(at_high, at_low).round()
}

/// WSOLA time-stretch processor
pub struct TimeStretch {
    channels: usize,
    sample_rate: u32,
    tempo: f64,
    settings: StretchSettings,

    // Derived lengths, in frames
    overlap_len: usize,
    sequence_len: usize,
    seek_len: usize,
    nominal_skip: f64,
    sample_req: usize,

    input: SampleFifo,
    /// Tail of the previous sequence, waiting to be cross-faded
    mid_buffer: Vec<f32>,
    /// Pre-allocated cross-fade output
    scratch: Vec<f32>,
    /// Fractional part of the input advance carried between sequences
    skip_fract: f64,
    is_beginning: bool,
}

impl TimeStretch {
    /// Create a stretcher at tempo 1.0
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        let mut stretch = Self {
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
            tempo: 1.0,
            settings: StretchSettings::default(),
            overlap_len: 0,
            sequence_len: 0,
            seek_len: 0,
            nominal_skip: 0.0,
            sample_req: 0,
            input: SampleFifo::new(channels),
            mid_buffer: Vec::new(),
            scratch: Vec::new(),
            skip_fract: 0.0,
            is_beginning: true,
        };
        stretch.calculate_lengths();
        stretch
    }

    /// Set tempo (1.0 = unchanged, 2.0 = twice as fast)
    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
        self.calculate_lengths();
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.calculate_lengths();
    }

    /// Change channel count. Buffered input is reinterpreted, not converted.
    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.max(1);
        self.input.set_channels(self.channels);
        self.calculate_lengths();
        self.reset_sequence();
    }

    pub fn set_settings(&mut self, settings: StretchSettings) {
        self.settings = settings;
        self.calculate_lengths();
    }

    #[inline]
    pub fn settings(&self) -> StretchSettings {
        self.settings
    }

    /// Input FIFO feeding this stage
    #[inline]
    pub fn input_mut(&mut self) -> &mut SampleFifo {
        &mut self.input
    }

    /// Frames waiting in the input
    #[inline]
    pub fn pending_frames(&self) -> usize {
        self.input.frames()
    }

    /// Input frames needed before one sequence can be produced
    #[inline]
    pub fn sample_req(&self) -> usize {
        self.sample_req
    }

    #[inline]
    pub fn sequence_len(&self) -> usize {
        self.sequence_len
    }

    #[inline]
    pub fn seek_len(&self) -> usize {
        self.seek_len
    }

    #[inline]
    pub fn overlap_len(&self) -> usize {
        self.overlap_len
    }

    /// Process every complete sequence in the input
    pub fn process(&mut self, output: &mut SampleFifo) {
        let ch = self.channels;
        let overlap = self.overlap_len;
        let body = self.sequence_len - 2 * overlap;
        let mut sequences = 0usize;

        while self.input.frames() >= self.sample_req {
            let input = self.input.as_slice();

            let offset = if self.is_beginning {
                // Nothing to blend with yet, start the stream verbatim
                self.is_beginning = false;
                output.put(&input[..overlap * ch]);
                overlap
            } else {
                let best = seek_best_offset(
                    &self.mid_buffer,
                    input,
                    ch,
                    overlap,
                    self.seek_len,
                    self.settings.quick_seek,
                );
                cross_fade(
                    &mut self.scratch,
                    &self.mid_buffer,
                    &input[best * ch..(best + overlap) * ch],
                    ch,
                );
                output.put(&self.scratch);
                best + overlap
            };

            output.put(&input[offset * ch..(offset + body) * ch]);

            let tail = offset + body;
            self.mid_buffer
                .copy_from_slice(&input[tail * ch..(tail + overlap) * ch]);

            self.skip_fract += self.nominal_skip;
            let skip = self.skip_fract.floor();
            self.skip_fract -= skip;
            self.input.discard(skip as usize);
            sequences += 1;
        }

        if sequences > 0 {
            trace!(sequences, pending = self.input.frames(), "time-stretch pass");
        }
    }

    /// Drop buffered input and restart the sequence state
    pub fn clear(&mut self) {
        self.input.clear();
        self.reset_sequence();
    }

    fn reset_sequence(&mut self) {
        self.mid_buffer.fill(0.0);
        self.skip_fract = 0.0;
        self.is_beginning = true;
    }

    /// Recompute frame lengths from tempo, sample rate, and settings
    fn calculate_lengths(&mut self) {
        let rate = self.sample_rate as f64;

        let mut overlap = ((rate * self.settings.overlap_ms as f64) / 1000.0) as usize;
        overlap = overlap.max(16);
        overlap -= overlap % 8;

        let sequence_ms = self
            .settings
            .sequence_ms
            .map(f64::from)
            .unwrap_or_else(|| auto_sequence_ms(self.tempo));
        let seek_ms = self
            .settings
            .seek_window_ms
            .map(f64::from)
            .unwrap_or_else(|| auto_seek_window_ms(self.tempo));

        let sequence = ((rate * sequence_ms) / 1000.0) as usize;
        let seek = ((rate * seek_ms) / 1000.0) as usize;

        self.overlap_len = overlap;
        self.sequence_len = sequence.max(2 * overlap);
        self.seek_len = seek.max(1);
        self.nominal_skip = self.tempo * (self.sequence_len - self.overlap_len) as f64;

        let int_skip = (self.nominal_skip + 0.5) as usize;
        self.sample_req = (int_skip + self.overlap_len).max(self.sequence_len) + self.seek_len;

        let buffer_len = self.overlap_len * self.channels;
        if self.mid_buffer.len() != buffer_len {
            self.mid_buffer = vec![0.0; buffer_len];
            self.scratch = vec![0.0; buffer_len];
        }

        debug!(
            tempo = self.tempo,
            sequence = self.sequence_len,
            seek = self.seek_len,
            overlap = self.overlap_len,
            "time-stretch lengths"
        );
    }
}

/// Find the offset in `[0, seek_len)` whose first `overlap` frames correlate
/// best with `reference`.
fn seek_best_offset(
    reference: &[f32],
    input: &[f32],
    channels: usize,
    overlap: usize,
    seek_len: usize,
    quick: bool,
) -> usize {
    let score = |offset: usize| {
        normalized_correlation(reference, &input[offset * channels..(offset + overlap) * channels])
    };

    if !quick {
        return best_in(0..seek_len, score);
    }

    let coarse = best_in((0..seek_len).step_by(QUICK_SEEK_STEP), score);
    let low = coarse.saturating_sub(QUICK_SEEK_STEP - 1);
    let high = (coarse + QUICK_SEEK_STEP).min(seek_len);
    best_in(low..high, score)
}

/// First offset with the strictly highest score
fn best_in(offsets: impl Iterator<Item = usize>, score: impl Fn(usize) -> f64) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for offset in offsets {
        let value = score(offset);
        if value > best_score {
            best_score = value;
            best = offset;
        }
    }
    best
}

/// Cross-correlation normalized by the candidate's energy
fn normalized_correlation(reference: &[f32], candidate: &[f32]) -> f64 {
    let mut corr = 0.0f64;
    let mut energy = 0.0f64;
    for (&r, &c) in reference.iter().zip(candidate) {
        corr += r as f64 * c as f64;
        energy += c as f64 * c as f64;
    }
    if energy < 1e-12 {
        0.0
    } else {
        corr / energy.sqrt()
    }
}

/// Linear cross-fade from `fade_out` into `fade_in`
fn cross_fade(out: &mut [f32], fade_out: &[f32], fade_in: &[f32], channels: usize) {
    let frames = out.len() / channels;
    let scale = 1.0 / frames as f32;
    for frame in 0..frames {
        let gain_in = frame as f32 * scale;
        let gain_out = 1.0 - gain_in;
        for c in 0..channels {
            let i = frame * channels + c;
            out[i] = fade_in[i] * gain_in + fade_out[i] * gain_out;
        }
    }
}
