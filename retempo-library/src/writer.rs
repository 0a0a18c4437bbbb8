//! 16-bit PCM WAV output using hound

use hound::{SampleFormat, WavSpec};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while writing a WAV file
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<hound::Error> for WriteError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => WriteError::Io(io),
            other => WriteError::InvalidFormat(other.to_string()),
        }
    }
}

/// Incremental WAV writer for interleaved i16 frames
pub struct WavWriter {
    inner: hound::WavWriter<BufWriter<File>>,
    channels: u16,
    frames: u64,
}

impl WavWriter {
    /// Create (or truncate) `path` as a 16-bit PCM WAV file
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, WriteError> {
        if channels == 0 {
            return Err(WriteError::InvalidFormat("zero channels".into()));
        }
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let inner = hound::WavWriter::create(path, spec)?;
        debug!("Writing {:?}: {} Hz, {} ch", path, sample_rate, channels);
        Ok(Self {
            inner,
            channels,
            frames: 0,
        })
    }

    /// Append interleaved samples; a trailing partial frame is rejected
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), WriteError> {
        if samples.len() % self.channels as usize != 0 {
            return Err(WriteError::InvalidFormat(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                self.channels
            )));
        }
        let mut writer = self.inner.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            writer.write_sample(sample);
        }
        writer.flush()?;
        self.frames += (samples.len() / self.channels as usize) as u64;
        Ok(())
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Write the final header; returns the frame count
    pub fn finalize(self) -> Result<u64, WriteError> {
        self.inner.finalize()?;
        Ok(self.frames)
    }
}

/// Write a complete buffer to `path` in one go
pub fn write_wav(
    path: &Path,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<u64, WriteError> {
    let mut writer = WavWriter::create(path, sample_rate, channels)?;
    writer.write_samples(samples)?;
    writer.finalize()
}
