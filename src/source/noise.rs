//! Noise source trait and test double.

use thiserror::Error;

/// Errors that can occur at the noise source boundary.
#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("noise source unavailable: {0}")]
    Unavailable(String),
    #[error("noise fetch failed: {0}")]
    FetchFailed(String),
}

/// Trait for jitter noise source implementations.
///
/// A fetch fills the caller's buffer with raw noise bytes or fails.
/// Fetches are expensive; callers serialize them behind a shared lock,
/// so implementations never see concurrent invocations.
pub trait NoiseSource: Send {
    /// Fills `buf` entirely with fresh noise bytes.
    fn fetch(&mut self, buf: &mut [u8]) -> Result<(), NoiseError>;

    /// Short human-readable source name for diagnostics.
    fn name(&self) -> &str;
}

/// Mock noise source for testing.
///
/// Produces a deterministic per-fetch byte pattern (distinct across
/// fetches) and supports failure injection. NOT a source of entropy.
#[derive(Debug, Default)]
pub struct MockNoise {
    sequence: u64,
    failing: bool,
}

impl MockNoise {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose every fetch fails.
    pub fn failing() -> Self {
        Self {
            sequence: 0,
            failing: true,
        }
    }

    /// Toggles failure injection.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Returns the number of successful fetches so far.
    pub fn fetches(&self) -> u64 {
        self.sequence
    }
}

impl NoiseSource for MockNoise {
    fn fetch(&mut self, buf: &mut [u8]) -> Result<(), NoiseError> {
        if self.failing {
            return Err(NoiseError::FetchFailed("mock failure injected".into()));
        }
        self.sequence += 1;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = (self.sequence as u8)
                .wrapping_mul(31)
                .wrapping_add(i as u8);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fetch_fills_buffer() {
        let mut source = MockNoise::new();
        let mut buf = [0u8; 16];
        source.fetch(&mut buf).unwrap();
        assert_eq!(source.fetches(), 1);
        assert_ne!(buf, [0u8; 16]);
    }

    #[test]
    fn test_mock_fetches_are_distinct() {
        let mut source = MockNoise::new();
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        source.fetch(&mut first).unwrap();
        source.fetch(&mut second).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_mock_failure_injection() {
        let mut source = MockNoise::failing();
        let mut buf = [0u8; 16];
        assert!(matches!(
            source.fetch(&mut buf),
            Err(NoiseError::FetchFailed(_))
        ));
        assert_eq!(source.fetches(), 0);

        source.set_failing(false);
        assert!(source.fetch(&mut buf).is_ok());
    }
}
