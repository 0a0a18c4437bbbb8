//! Handle table of stream processors
//!
//! Hosts that cannot hold a `StreamProcessor` directly keep an opaque
//! `Handle` instead. Handles carry a generation, so a handle that outlives
//! its processor is rejected rather than aliasing a newer one in the same
//! slot.

use crate::error::{EngineError, Result};
use crate::processor::StreamProcessor;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opaque reference to a processor inside a `ProcessorPool`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Pack into a single integer for foreign callers; never 0
    #[inline]
    pub fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a value produced by `to_raw`. Any value is accepted; bogus ones
    /// simply fail lookup.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    processor: Option<StreamProcessor>,
}

/// Arena of processors addressed by generational handles
#[derive(Default)]
pub struct ProcessorPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ProcessorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live processor count
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a processor with default settings
    pub fn create(&mut self) -> Handle {
        let processor = StreamProcessor::new();
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.processor = Some(processor);
                Handle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 1,
                    processor: Some(processor),
                });
                Handle {
                    index,
                    generation: 1,
                }
            }
        };
        debug!(%handle, "processor created");
        handle
    }

    /// Release a processor. The handle and every copy of it become invalid.
    pub fn destroy(&mut self, handle: Handle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        slot.processor = None;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.free.push(handle.index);
        debug!(%handle, "processor destroyed");
        Ok(())
    }

    /// Borrow a live processor
    pub fn get(&self, handle: Handle) -> Result<&StreamProcessor> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.processor.as_ref())
            .ok_or_else(|| invalid(handle))
    }

    /// Mutably borrow a live processor
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut StreamProcessor> {
        self.slot_mut(handle)?
            .processor
            .as_mut()
            .ok_or_else(|| invalid(handle))
    }

    fn slot_mut(&mut self, handle: Handle) -> Result<&mut Slot> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.processor.is_some() => {
                Ok(slot)
            }
            _ => Err(invalid(handle)),
        }
    }

    // ---- Flat operations, handle first -------------------------------------

    pub fn put_samples(&mut self, handle: Handle, samples: &[i16], frames: usize) -> Result<()> {
        self.get_mut(handle)?.put_samples(samples, frames)
    }

    pub fn receive_samples(
        &mut self,
        handle: Handle,
        out: &mut [i16],
        max_frames: usize,
    ) -> Result<usize> {
        Ok(self.get_mut(handle)?.receive_samples(out, max_frames))
    }

    pub fn receive_samples_discard(&mut self, handle: Handle, max_frames: usize) -> Result<usize> {
        Ok(self.get_mut(handle)?.receive_samples_discard(max_frames))
    }

    pub fn set_rate(&mut self, handle: Handle, ratio: f64) -> Result<()> {
        self.get_mut(handle)?.set_rate(ratio)
    }

    pub fn set_tempo(&mut self, handle: Handle, ratio: f64) -> Result<()> {
        self.get_mut(handle)?.set_tempo(ratio)
    }

    pub fn set_pitch(&mut self, handle: Handle, ratio: f64) -> Result<()> {
        self.get_mut(handle)?.set_pitch(ratio)
    }

    pub fn set_rate_change(&mut self, handle: Handle, percent: f64) -> Result<()> {
        self.get_mut(handle)?.set_rate_change(percent)
    }

    pub fn set_tempo_change(&mut self, handle: Handle, percent: f64) -> Result<()> {
        self.get_mut(handle)?.set_tempo_change(percent)
    }

    pub fn set_pitch_octaves(&mut self, handle: Handle, octaves: f64) -> Result<()> {
        self.get_mut(handle)?.set_pitch_octaves(octaves)
    }

    pub fn set_pitch_semitones(
        &mut self,
        handle: Handle,
        semitones: impl Into<f64>,
    ) -> Result<()> {
        self.get_mut(handle)?.set_pitch_semitones(semitones)
    }

    pub fn set_channels(&mut self, handle: Handle, channels: usize) -> Result<()> {
        self.get_mut(handle)?.set_channels(channels)
    }

    pub fn set_sample_rate(&mut self, handle: Handle, sample_rate: u32) -> Result<()> {
        self.get_mut(handle)?.set_sample_rate(sample_rate)
    }

    pub fn input_output_ratio(&self, handle: Handle) -> Result<f64> {
        Ok(self.get(handle)?.input_output_ratio())
    }

    pub fn flush(&mut self, handle: Handle) -> Result<()> {
        self.get_mut(handle)?.flush();
        Ok(())
    }

    pub fn clear(&mut self, handle: Handle) -> Result<()> {
        self.get_mut(handle)?.clear();
        Ok(())
    }

    pub fn num_samples(&self, handle: Handle) -> Result<usize> {
        Ok(self.get(handle)?.num_samples())
    }

    pub fn num_unprocessed_samples(&self, handle: Handle) -> Result<usize> {
        Ok(self.get(handle)?.num_unprocessed_samples())
    }

    pub fn num_channels(&self, handle: Handle) -> Result<usize> {
        Ok(self.get(handle)?.num_channels())
    }

    /// 1 when no output is ready, 0 otherwise
    pub fn is_empty_flag(&self, handle: Handle) -> Result<i32> {
        Ok(self.get(handle)?.is_empty() as i32)
    }
}

fn invalid(handle: Handle) -> EngineError {
    warn!(%handle, "invalid processor handle");
    EngineError::InvalidHandle(handle)
}

/// Thread-safe, cloneable wrapper around a `ProcessorPool`
#[derive(Clone, Default)]
pub struct SharedProcessorPool {
    inner: Arc<Mutex<ProcessorPool>>,
}

impl SharedProcessorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Handle {
        self.inner.lock().create()
    }

    pub fn destroy(&self, handle: Handle) -> Result<()> {
        self.inner.lock().destroy(handle)
    }

    /// Run `f` on a processor while holding the pool lock
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&mut StreamProcessor) -> R) -> Result<R> {
        let mut pool = self.inner.lock();
        Ok(f(pool.get_mut(handle)?))
    }

    /// Lock the whole pool for a sequence of flat operations
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, ProcessorPool> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_handles_are_never_zero() {
        let mut pool = ProcessorPool::new();
        for _ in 0..4 {
            let handle = pool.create();
            assert_ne!(handle.to_raw(), 0);
            assert_eq!(Handle::from_raw(handle.to_raw()), handle);
        }
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut pool = ProcessorPool::new();
        let handle = pool.create();
        pool.destroy(handle).unwrap();

        assert_eq!(
            pool.num_samples(handle),
            Err(EngineError::InvalidHandle(handle))
        );
        assert!(pool.destroy(handle).is_err());

        // The slot is reused under a new generation
        let reused = pool.create();
        assert_ne!(reused, handle);
        assert!(pool.num_samples(handle).is_err());
        assert_eq!(pool.num_samples(reused), Ok(0));
    }

    #[test]
    fn test_unknown_handles_are_rejected() {
        let mut pool = ProcessorPool::new();
        assert!(pool.flush(Handle::from_raw(0)).is_err());
        assert!(pool.set_tempo(Handle::from_raw(u64::MAX), 1.5).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_instances_are_independent() {
        let mut pool = ProcessorPool::new();
        let a = pool.create();
        let b = pool.create();
        pool.set_tempo(a, 2.0).unwrap();
        pool.set_channels(b, 1).unwrap();

        assert_eq!(pool.input_output_ratio(a), Ok(0.5));
        assert_eq!(pool.input_output_ratio(b), Ok(1.0));
        assert_eq!(pool.num_channels(a), Ok(2));
        assert_eq!(pool.num_channels(b), Ok(1));
    }

    #[test]
    fn test_flat_round_trip() {
        let mut pool = ProcessorPool::new();
        let handle = pool.create();
        pool.set_channels(handle, 1).unwrap();
        pool.set_sample_rate(handle, 8000).unwrap();
        pool.set_pitch_semitones(handle, -3).unwrap();
        assert_eq!(pool.is_empty_flag(handle), Ok(1));

        pool.put_samples(handle, &[0i16; 8000], 8000).unwrap();
        pool.flush(handle).unwrap();
        assert_eq!(pool.is_empty_flag(handle), Ok(0));
        assert_eq!(pool.num_samples(handle), Ok(8000));

        let mut out = [1i16; 500];
        assert_eq!(pool.receive_samples(handle, &mut out, 500), Ok(500));
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(pool.receive_samples_discard(handle, 10_000), Ok(7500));
        assert_eq!(pool.is_empty_flag(handle), Ok(1));
    }

    #[test]
    fn test_shared_pool_across_threads() {
        let pool = SharedProcessorPool::new();
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let handle = pool.create();
                    pool.with(handle, |p| p.set_tempo(1.0 + i as f64 * 0.25))
                        .unwrap()
                        .unwrap();
                    handle
                })
            })
            .collect();

        let handles: Vec<Handle> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(pool.lock().len(), 4);
        for handle in handles {
            pool.destroy(handle).unwrap();
        }
        assert!(pool.lock().is_empty());
    }
}
