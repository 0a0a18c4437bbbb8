//! Streaming rate, tempo, and pitch processor for interleaved PCM audio
//!
//! This crate provides the transform pipeline:
//! - StreamProcessor: put/receive streaming API with flush and clear
//! - TimeStretch: WSOLA tempo change without pitch change
//! - RateTransposer: interpolating resampler with anti-alias filter
//! - ProcessorPool: generational handle table for hosts that hold ids

mod error;
mod fifo;
mod params;
mod pool;
mod processor;
mod sample;
pub mod stretch;
pub mod transposer;

pub use error::{EngineError, Result};
pub use fifo::SampleFifo;
pub use params::{
    octaves_to_ratio, percent_to_ratio, ratio_to_octaves, ratio_to_percent, ratio_to_semitones,
    semitones_to_ratio, TransformParams, MAX_RATIO, MIN_RATIO,
};
pub use pool::{Handle, ProcessorPool, SharedProcessorPool};
pub use processor::{
    StageOrder, StreamProcessor, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, MAX_CHANNELS,
    MAX_SAMPLE_RATE,
};
pub use sample::Sample;
pub use stretch::{StretchSettings, TimeStretch};
pub use transposer::{AntiAliasFilter, RateTransposer};

/// Library version, e.g. "0.1.0"
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Library version as `major * 10000 + minor * 100 + patch`
pub fn version_id() -> u32 {
    let mut parts = version_string()
        .split('.')
        .map(|part| part.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    major * 10000 + minor * 100 + patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_id_matches_string() {
        let parts: Vec<u32> = version_string()
            .split('.')
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(version_id(), parts[0] * 10000 + parts[1] * 100 + parts[2]);
    }
}
