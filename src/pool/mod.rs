//! Prefetch slot pool.
//!
//! A fixed, power-of-two sized array of slots shared lock-free between
//! one background filler and arbitrarily many consumers, plus the
//! atomic cursor that hands each consumer call its candidate slot in
//! round-robin order.

mod slot;

pub use slot::{Slot, SlotState};

use crate::config::ConfigError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-size pool of prefetched entropy slots.
pub struct SlotPool {
    slots: Box<[Slot]>,
    cursor: AtomicUsize,
}

impl SlotPool {
    /// Creates a pool with `blocks` slots, all `Empty`.
    ///
    /// `blocks` must be a power of two and at least 4 (the refill
    /// heuristic divides the pool into quarters).
    pub(crate) fn new(blocks: usize) -> Result<Self, ConfigError> {
        if !blocks.is_power_of_two() {
            return Err(ConfigError::PoolNotPowerOfTwo(blocks));
        }
        if blocks < 4 {
            return Err(ConfigError::PoolTooSmall(blocks));
        }
        let slots: Box<[Slot]> = (0..blocks).map(|_| Slot::new()).collect();
        Ok(Self {
            slots,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Advances the shared consumer cursor and returns the slot index
    /// it lands on. Advanced exactly once per pool-path request, so
    /// concurrent callers receive distinct indices mod the pool size.
    pub(crate) fn advance_cursor(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::SeqCst) & self.mask()
    }

    /// Returns the slot at `index`.
    pub(crate) fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    /// All slots, in index order.
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Whether draining `index` should trigger a refill pass: roughly
    /// every quarter of the pool, skipping the very first slot. A
    /// deliberate load-spreading heuristic, kept as-is.
    pub(crate) fn refill_due(&self, index: usize) -> bool {
        index % (self.slots.len() / 4) == 0 && index != 0
    }

    /// Wipes every block and forces every slot to `Empty`.
    pub(crate) fn wipe_all(&self) {
        for slot in self.slots.iter() {
            slot.wipe();
        }
    }

    #[cfg(test)]
    pub(crate) fn cursor_position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crediting::SEED_BYTES;

    #[test]
    fn test_pool_size_must_be_power_of_two() {
        assert!(matches!(
            SlotPool::new(6),
            Err(ConfigError::PoolNotPowerOfTwo(6))
        ));
    }

    #[test]
    fn test_pool_size_minimum() {
        assert!(matches!(SlotPool::new(2), Err(ConfigError::PoolTooSmall(2))));
        assert!(SlotPool::new(4).is_ok());
    }

    #[test]
    fn test_cursor_round_robin() {
        let pool = SlotPool::new(8).unwrap();
        let first: Vec<usize> = (0..8).map(|_| pool.advance_cursor()).collect();
        assert_eq!(first, vec![0, 1, 2, 3, 4, 5, 6, 7]);

        // Wraps modulo the pool size.
        assert_eq!(pool.advance_cursor(), 0);
    }

    #[test]
    fn test_refill_heuristic_quarters() {
        let pool = SlotPool::new(8).unwrap();
        let due: Vec<usize> = (0..8).filter(|&i| pool.refill_due(i)).collect();
        assert_eq!(due, vec![2, 4, 6]);

        let pool = SlotPool::new(16).unwrap();
        let due: Vec<usize> = (0..16).filter(|&i| pool.refill_due(i)).collect();
        assert_eq!(due, vec![4, 8, 12]);
    }

    #[test]
    fn test_wipe_all_resets_every_slot() {
        let pool = SlotPool::new(4).unwrap();
        for slot in pool.slots() {
            assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
            assert!(slot.commit_fill(&[0x55; SEED_BYTES], 20, || true));
        }

        pool.wipe_all();
        for slot in pool.slots() {
            assert_eq!(slot.state(), SlotState::Empty);
            assert!(slot.block_is_wiped());
        }
    }
}
