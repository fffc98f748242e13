//! Tolerance constants for sample comparisons.

/// Exact operations (passthrough, unity gain, offsets representable in f32).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Values below this count as silence (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;
