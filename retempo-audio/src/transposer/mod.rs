//! Rate transposer: varispeed resampling that changes speed and pitch together.
//!
//! Linear interpolation with a fractional read position carried across
//! calls. When downsampling (rate > 1) the input is band-limited first;
//! when upsampling (rate < 1) the interpolated output is smoothed after.

mod filter;

pub use filter::AntiAliasFilter;

use crate::fifo::SampleFifo;
use tracing::trace;

/// Linear-interpolating rate transposer
pub struct RateTransposer {
    channels: usize,
    rate: f64,
    /// Read position into whichever FIFO is being interpolated
    position: f64,
    anti_alias: bool,
    filter: AntiAliasFilter,
    input: SampleFifo,
    /// Between the filter and the interpolator
    staging: SampleFifo,
}

impl RateTransposer {
    pub fn new(channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            rate: 1.0,
            position: 0.0,
            anti_alias: true,
            filter: AntiAliasFilter::default(),
            input: SampleFifo::new(channels),
            staging: SampleFifo::new(channels),
        }
    }

    /// Set rate (1.0 = unchanged, 2.0 = twice as fast and an octave up)
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        // Keep the band below the lower of the two Nyquist frequencies
        self.filter.set_cutoff(0.5 / rate.max(1.0 / rate));
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_anti_alias(&mut self, enabled: bool) {
        self.anti_alias = enabled;
    }

    #[inline]
    pub fn anti_alias(&self) -> bool {
        self.anti_alias
    }

    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.max(1);
        self.input.set_channels(self.channels);
        self.staging.set_channels(self.channels);
        self.position = 0.0;
    }

    /// Input FIFO feeding this stage
    #[inline]
    pub fn input_mut(&mut self) -> &mut SampleFifo {
        &mut self.input
    }

    /// Frames held by this stage that have not reached the output yet
    #[inline]
    pub fn pending_frames(&self) -> usize {
        self.input.frames() + self.staging.frames()
    }

    /// Frames the stage holds back while filtering
    pub fn latency_frames(&self) -> usize {
        if self.filtering() {
            self.filter.len()
        } else {
            1
        }
    }

    /// Transpose everything the input allows into `output`
    pub fn process(&mut self, output: &mut SampleFifo) {
        let before = output.frames();

        if self.filtering() && self.rate > 1.0 {
            self.filter.process(&mut self.input, &mut self.staging);
            interpolate(&mut self.position, self.rate, &mut self.staging, output);
        } else if self.filtering() {
            interpolate(&mut self.position, self.rate, &mut self.input, &mut self.staging);
            self.filter.process(&mut self.staging, output);
        } else {
            // Leftovers from a filtered configuration go out first
            output.append(&mut self.staging);
            interpolate(&mut self.position, self.rate, &mut self.input, output);
        }

        trace!(
            rate = self.rate,
            produced = output.frames() - before,
            "rate transposer pass"
        );
    }

    /// Drop buffered samples and interpolation state
    pub fn clear(&mut self) {
        self.input.clear();
        self.staging.clear();
        self.position = 0.0;
    }

    #[inline]
    fn filtering(&self) -> bool {
        self.anti_alias && self.rate != 1.0
    }
}

/// Linear interpolation from `src` into `dst`, consuming the frames that are
/// no longer needed. The last frame stays behind as the left neighbour for
/// the next call.
fn interpolate(position: &mut f64, rate: f64, src: &mut SampleFifo, dst: &mut SampleFifo) {
    let frames = src.frames();
    let channels = src.channels();
    let data = src.as_slice();
    let mut out = Vec::with_capacity(((frames as f64 / rate) as usize + 1) * channels);

    while *position + 1.0 < frames as f64 {
        let index = *position as usize;
        let frac = (*position - index as f64) as f32;
        let left = &data[index * channels..(index + 1) * channels];
        let right = &data[(index + 1) * channels..(index + 2) * channels];
        for (&a, &b) in left.iter().zip(right) {
            out.push(a + (b - a) * frac);
        }
        *position += rate;
    }

    let consumed = (*position as usize).min(frames);
    src.discard(consumed);
    *position -= consumed as f64;
    dst.put(&out);
}
