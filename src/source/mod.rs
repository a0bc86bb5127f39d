//! Noise source boundary.
//!
//! This module provides a trait-based abstraction over the underlying
//! jitter noise source, allowing for both a real timing-based source and
//! mock implementations for testing. The source is treated as a costly
//! black box: a fetch either returns raw bytes or fails, and is never
//! invoked concurrently with itself.

mod noise;
mod timer;

pub use noise::{MockNoise, NoiseError, NoiseSource};
pub use timer::TimerJitter;
