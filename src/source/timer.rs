//! Timing-jitter noise source.
//!
//! Measures execution-time jitter of small variable workloads against
//! the monotonic clock. The jitter originates in CPU pipeline state
//! (branch prediction, cache pressure, interrupt coalescing) and clock
//! domain crossings. Raw deltas are conditioned through BLAKE3 before
//! leaving this module; consumers additionally apply their own
//! conservative crediting.

use super::noise::{NoiseError, NoiseSource};
use blake3::Hasher;
use std::collections::HashSet;
use std::hint::black_box;
use std::time::Instant;

/// Samples taken by the probe-time timer check.
const PROBE_SAMPLES: usize = 64;

/// Minimum distinct delta values the probe must observe.
const MIN_DISTINCT_DELTAS: usize = 8;

/// Timing samples gathered per requested output byte.
const OVERSAMPLE: usize = 4;

/// Measures one timing delta around a variable micro-workload.
///
/// The workload length varies with `round` to perturb pipeline and
/// cache state between samples.
fn measure_delta(round: usize) -> u64 {
    let start = Instant::now();
    let mut acc = 0x9e37_79b9_7f4a_7c15u64 ^ round as u64;
    for _ in 0..(round % 7) + 1 {
        acc = acc
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
    }
    black_box(acc);
    start.elapsed().as_nanos() as u64
}

/// Clock-jitter noise source.
///
/// Construction goes through [`TimerJitter::probe`], which verifies the
/// platform timer is fine-grained enough to produce usable jitter. Each
/// fetch collects oversampled timing deltas and squeezes them through a
/// BLAKE3 XOF, chained across fetches so repeated delta patterns can
/// never repeat output.
pub struct TimerJitter {
    /// Conditioning chain carried between fetches.
    chain: [u8; 32],
}

impl TimerJitter {
    /// Probes the platform timer and constructs the source.
    ///
    /// Fails with [`NoiseError::Unavailable`] when the timer is too
    /// coarse or stalled to deliver jitter. The probe samples also seed
    /// the conditioning chain.
    pub fn probe() -> Result<Self, NoiseError> {
        let deltas: Vec<u64> = (0..PROBE_SAMPLES).map(measure_delta).collect();

        let distinct = deltas.iter().collect::<HashSet<_>>().len();
        if distinct < MIN_DISTINCT_DELTAS {
            return Err(NoiseError::Unavailable(format!(
                "timer too coarse: {} distinct deltas in {} samples",
                distinct, PROBE_SAMPLES
            )));
        }

        let mut hasher = Hasher::new();
        for delta in &deltas {
            hasher.update(&delta.to_le_bytes());
        }
        let chain = *hasher.finalize().as_bytes();

        tracing::debug!(distinct, "timer jitter source probe passed");
        Ok(Self { chain })
    }
}

impl NoiseSource for TimerJitter {
    fn fetch(&mut self, buf: &mut [u8]) -> Result<(), NoiseError> {
        let samples = buf.len() * OVERSAMPLE;

        let mut hasher = Hasher::new();
        hasher.update(&self.chain);

        let mut stuck = true;
        let mut prev = 0u64;
        for round in 0..samples {
            let delta = measure_delta(round);
            if round > 0 && delta != prev {
                stuck = false;
            }
            prev = delta;
            hasher.update(&delta.to_le_bytes());
        }
        if stuck {
            return Err(NoiseError::FetchFailed(
                "timer stalled: identical deltas across entire fetch".into(),
            ));
        }

        // First 32 XOF bytes advance the chain, the rest fill the caller's
        // buffer. The chain update keeps consecutive fetches distinct.
        let mut reader = hasher.finalize_xof();
        reader.fill(&mut self.chain);
        reader.fill(buf);
        Ok(())
    }

    fn name(&self) -> &str {
        "timer-jitter"
    }
}

impl std::fmt::Debug for TimerJitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerJitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_succeeds_on_host() {
        let source = TimerJitter::probe();
        assert!(source.is_ok());
    }

    #[test]
    fn test_fetch_fills_requested_length() {
        let mut source = TimerJitter::probe().unwrap();
        let mut buf = [0u8; 40];
        source.fetch(&mut buf).unwrap();
        assert_ne!(buf, [0u8; 40]);
    }

    #[test]
    fn test_consecutive_fetches_differ() {
        let mut source = TimerJitter::probe().unwrap();
        let mut first = [0u8; 40];
        let mut second = [0u8; 40];
        source.fetch(&mut first).unwrap();
        source.fetch(&mut second).unwrap();
        assert_ne!(first, second);
    }
}
