//! Windowed-sinc FIR low-pass used to band-limit around resampling

use crate::fifo::SampleFifo;
use std::f64::consts::PI;

/// Anti-alias low-pass filter
#[derive(Debug, Clone)]
pub struct AntiAliasFilter {
    taps: Vec<f32>,
    /// Cutoff in cycles per sample (0.5 = Nyquist)
    cutoff: f64,
}

impl AntiAliasFilter {
    /// Default filter length in taps
    pub const DEFAULT_LENGTH: usize = 64;

    /// Create a filter with the given length, cutoff at Nyquist
    pub fn new(length: usize) -> Self {
        let mut filter = Self {
            taps: vec![0.0; length.max(8)],
            cutoff: 0.5,
        };
        filter.calculate_taps();
        filter
    }

    /// Set cutoff in cycles per sample, clamped to (0, 0.5]
    pub fn set_cutoff(&mut self, cutoff: f64) {
        let cutoff = cutoff.clamp(1e-4, 0.5);
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.calculate_taps();
        }
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Filter length; also the number of frames held back between calls
    #[inline]
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    #[inline]
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Filter as many frames as the input allows.
    ///
    /// Each output frame needs `len()` input frames, so `len() - 1` frames
    /// stay in `input` for the next call.
    pub fn process(&self, input: &mut SampleFifo, output: &mut SampleFifo) {
        let length = self.taps.len();
        let frames = input.frames();
        if frames < length {
            return;
        }

        let channels = input.channels();
        let produced = frames - length + 1;
        let src = input.as_slice();
        let mut filtered = Vec::with_capacity(produced * channels);

        for frame in 0..produced {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, &tap) in self.taps.iter().enumerate() {
                    acc += tap * src[(frame + k) * channels + c];
                }
                filtered.push(acc);
            }
        }

        input.discard(produced);
        output.put(&filtered);
    }

    /// Hamming-windowed sinc, normalized to unity DC gain
    fn calculate_taps(&mut self) {
        let length = self.taps.len();
        let center = (length - 1) as f64 / 2.0;
        let omega = 2.0 * self.cutoff;

        let mut raw: Vec<f64> = (0..length)
            .map(|n| {
                let x = n as f64 - center;
                let sinc = if x == 0.0 {
                    1.0
                } else {
                    (PI * omega * x).sin() / (PI * omega * x)
                };
                let window = 0.54 - 0.46 * (2.0 * PI * n as f64 / (length - 1) as f64).cos();
                omega * sinc * window
            })
            .collect();

        let sum: f64 = raw.iter().sum();
        for tap in raw.iter_mut() {
            *tap /= sum;
        }

        for (dst, src) in self.taps.iter_mut().zip(raw) {
            *dst = src as f32;
        }
    }
}

impl Default for AntiAliasFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}
