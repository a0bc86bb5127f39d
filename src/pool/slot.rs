//! Per-slot state machine.

use crate::crediting::SEED_BYTES;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use zeroize::Zeroize;

/// Lifecycle state of one slot.
///
/// Every transition is a compare-and-swap executed by exactly one of
/// the background filler or a consumer; a lost CAS means another actor
/// moved the slot first and is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    /// No data buffered; claimable by the filler.
    Empty = 0,
    /// The filler owns the slot and a noise fetch is in flight.
    Filling = 1,
    /// The block holds a seed and its credited bits.
    Filled = 2,
    /// A consumer owns the slot and is copying the block out.
    Reading = 3,
}

impl SlotState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SlotState::Empty,
            1 => SlotState::Filling,
            2 => SlotState::Filled,
            3 => SlotState::Reading,
            _ => unreachable!("invalid slot state tag"),
        }
    }
}

/// One prefetched seed plus its crediting metadata.
struct SeedBlock {
    buf: [u8; SEED_BYTES],
    bits: u32,
}

impl SeedBlock {
    fn wipe(&mut self) {
        self.buf.zeroize();
        self.bits = 0;
    }
}

/// One buffered unit of prefetched entropy plus its state tag.
///
/// The state tag is the synchronization point: whoever wins a CAS on it
/// owns the block until it hands the slot on. The block mutex is
/// uncontended on the fill and drain paths; it only ever serializes
/// against the unconditional wipe performed on disable.
pub struct Slot {
    state: AtomicU8,
    block: Mutex<SeedBlock>,
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SlotState::Empty as u8),
            block: Mutex::new(SeedBlock {
                buf: [0u8; SEED_BYTES],
                bits: 0,
            }),
        }
    }

    /// Current state tag.
    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Attempts the `from → to` transition.
    pub(crate) fn try_claim(&self, from: SlotState, to: SlotState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Commits a completed fill and marks the slot `Filled`.
    ///
    /// `valid` is evaluated under the block lock; when it reports the
    /// fill stale (async collection disabled while the fetch was in
    /// flight) nothing is written and the caller reverts the slot.
    /// Caller must hold the `Filling` claim.
    pub(crate) fn commit_fill(
        &self,
        bytes: &[u8; SEED_BYTES],
        bits: u32,
        valid: impl FnOnce() -> bool,
    ) -> bool {
        let mut block = self.block.lock();
        if !valid() {
            return false;
        }
        block.buf.copy_from_slice(bytes);
        block.bits = bits;
        self.state.store(SlotState::Filled as u8, Ordering::SeqCst);
        true
    }

    /// Reverts a claimed `Filling` slot to `Empty` after a failed or
    /// invalidated fetch. A lost CAS means a wipe already reset it.
    pub(crate) fn revert_fill(&self) {
        let _ = self.state.compare_exchange(
            SlotState::Filling as u8,
            SlotState::Empty as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Copies the block out, wipes it, and hands the slot back to
    /// `Empty`. Caller must have won the `Filled → Reading` claim.
    pub(crate) fn drain(&self) -> ([u8; SEED_BYTES], u32) {
        let mut block = self.block.lock();
        let out = (block.buf, block.bits);
        block.wipe();
        let _ = self.state.compare_exchange(
            SlotState::Reading as u8,
            SlotState::Empty as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        out
    }

    /// Wipes the block and forces the slot to `Empty` regardless of its
    /// current state. Used when async collection is disabled.
    pub(crate) fn wipe(&self) {
        let mut block = self.block.lock();
        block.wipe();
        self.state.store(SlotState::Empty as u8, Ordering::SeqCst);
    }

    /// True when the block holds no residual data.
    #[cfg(test)]
    pub(crate) fn block_is_wiped(&self) -> bool {
        let block = self.block.lock();
        block.bits == 0 && block.buf.iter().all(|&b| b == 0)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_starts_empty_and_wiped() {
        let slot = Slot::new();
        assert_eq!(slot.state(), SlotState::Empty);
        assert!(slot.block_is_wiped());
    }

    #[test]
    fn test_claim_succeeds_once() {
        let slot = Slot::new();
        assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert!(!slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert_eq!(slot.state(), SlotState::Filling);
    }

    #[test]
    fn test_commit_fill_publishes_block() {
        let slot = Slot::new();
        assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert!(slot.commit_fill(&[0xAB; SEED_BYTES], 20, || true));
        assert_eq!(slot.state(), SlotState::Filled);
        assert!(!slot.block_is_wiped());
    }

    #[test]
    fn test_stale_fill_is_discarded() {
        let slot = Slot::new();
        assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert!(!slot.commit_fill(&[0xAB; SEED_BYTES], 20, || false));
        slot.revert_fill();
        assert_eq!(slot.state(), SlotState::Empty);
        assert!(slot.block_is_wiped());
    }

    #[test]
    fn test_drain_returns_block_and_wipes() {
        let slot = Slot::new();
        assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert!(slot.commit_fill(&[0x42; SEED_BYTES], 20, || true));
        assert!(slot.try_claim(SlotState::Filled, SlotState::Reading));

        let (buf, bits) = slot.drain();
        assert_eq!(buf, [0x42; SEED_BYTES]);
        assert_eq!(bits, 20);
        assert_eq!(slot.state(), SlotState::Empty);
        assert!(slot.block_is_wiped());
    }

    #[test]
    fn test_wipe_forces_empty_from_any_state() {
        let slot = Slot::new();
        assert!(slot.try_claim(SlotState::Empty, SlotState::Filling));
        assert!(slot.commit_fill(&[0x42; SEED_BYTES], 20, || true));

        slot.wipe();
        assert_eq!(slot.state(), SlotState::Empty);
        assert!(slot.block_is_wiped());
    }
}
