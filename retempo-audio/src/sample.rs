//! PCM sample formats accepted at the processor boundary

/// A PCM sample type that converts to and from the engine's internal
/// normalized `f32` representation.
pub trait Sample: Copy + Default + Send + 'static {
    /// Convert to a normalized float in [-1.0, 1.0]
    fn to_f32(self) -> f32;

    /// Convert from a normalized float, saturating out-of-range values
    fn from_f32(value: f32) -> Self;
}

impl Sample for i16 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self as f32 / 32768.0
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        // `as` saturates, so no explicit clamp is needed
        (value * 32768.0).round() as i16
    }
}

impl Sample for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}
