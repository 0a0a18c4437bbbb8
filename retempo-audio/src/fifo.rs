//! Interleaved sample FIFO shared by every pipeline stage
//!
//! Samples are stored as normalized `f32`, interleaved by channel. All counts
//! in the public API are in frames (one sample per channel). Consumed samples
//! are dropped lazily: the read cursor advances and the backing vector is
//! compacted once the dead prefix outgrows the live data.

use crate::sample::Sample;

/// First-in first-out buffer of interleaved frames
#[derive(Debug, Clone)]
pub struct SampleFifo {
    channels: usize,
    data: Vec<f32>,
    /// Index of the first unread sample in `data`
    start: usize,
}

impl SampleFifo {
    /// Create an empty FIFO for the given channel count
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            data: Vec::new(),
            start: 0,
        }
    }

    /// Channel count used to interpret frame boundaries
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of whole frames available for reading
    #[inline]
    pub fn frames(&self) -> usize {
        (self.data.len() - self.start) / self.channels
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.len() == self.start
    }

    /// Unread samples, interleaved
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data[self.start..]
    }

    /// Append interleaved samples. A trailing partial frame is ignored.
    pub fn put(&mut self, samples: &[f32]) {
        let whole = samples.len() - samples.len() % self.channels;
        self.compact();
        self.data.extend_from_slice(&samples[..whole]);
    }

    /// Append interleaved samples of any supported sample type
    pub fn put_converted<S: Sample>(&mut self, samples: &[S]) {
        let whole = samples.len() - samples.len() % self.channels;
        self.compact();
        self.data
            .extend(samples[..whole].iter().map(|s| s.to_f32()));
    }

    /// Append `frames` frames of silence
    pub fn put_silence(&mut self, frames: usize) {
        self.compact();
        self.data
            .resize(self.data.len() + frames * self.channels, 0.0);
    }

    /// Copy up to `max_frames` frames into `out` and remove them.
    ///
    /// The count is also capped by how many whole frames fit in `out`.
    /// Returns the number of frames moved.
    pub fn receive_into<S: Sample>(&mut self, out: &mut [S], max_frames: usize) -> usize {
        let frames = max_frames
            .min(self.frames())
            .min(out.len() / self.channels);
        let count = frames * self.channels;

        for (dst, src) in out[..count]
            .iter_mut()
            .zip(&self.data[self.start..self.start + count])
        {
            *dst = S::from_f32(*src);
        }

        self.advance(count);
        frames
    }

    /// Remove up to `max_frames` frames without copying them anywhere.
    /// Returns the number of frames removed.
    pub fn discard(&mut self, max_frames: usize) -> usize {
        let frames = max_frames.min(self.frames());
        self.advance(frames * self.channels);
        frames
    }

    /// Move every frame of `other` to the end of this FIFO
    pub fn append(&mut self, other: &mut SampleFifo) {
        if other.is_empty() {
            return;
        }
        self.put(other.as_slice());
        other.clear();
    }

    /// Keep at most `frames` frames, dropping the newest ones
    pub fn truncate_frames(&mut self, frames: usize) {
        if frames < self.frames() {
            self.data.truncate(self.start + frames * self.channels);
        }
    }

    /// Reinterpret the buffered samples with a new channel count.
    ///
    /// Samples are not rearranged; a trailing partial frame is dropped so the
    /// buffer stays a whole number of frames.
    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.max(1);
        let live = self.data.len() - self.start;
        self.data.truncate(self.start + live - live % self.channels);
    }

    /// Drop all buffered samples
    pub fn clear(&mut self) {
        self.data.clear();
        self.start = 0;
    }

    fn advance(&mut self, samples: usize) {
        self.start += samples;
        if self.start >= self.data.len() {
            self.clear();
        }
    }

    /// Reclaim the consumed prefix once it dominates the buffer
    fn compact(&mut self) {
        if self.start > 0 && self.start >= self.data.len() - self.start {
            self.data.drain(..self.start);
            self.start = 0;
        }
    }
}
