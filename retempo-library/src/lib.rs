//! File I/O and settings for retempo - decoding, WAV output, config

mod config;
mod loader;
mod writer;

pub use config::Config;
pub use loader::{resample, AudioLoader, AudioMetadata, DecodedAudio, LoadError};
pub use writer::{write_wav, WavWriter, WriteError};
