//! Striped table of 32-bit lock words
//!
//! Every grid cell hashes to one slot; a slot is `0` when free and `1`
//! when held. Distinct cells may share a slot, which only adds contention.
//!
//! The CAS and the releasing store are relaxed. Ordering for the critical
//! section comes from an acquire fence after a successful CAS and a release
//! fence before the store that frees the slot.

use crate::error::{Error, Result};
use std::sync::atomic::{fence, AtomicU32, Ordering};

/// Odd constant XOR-ed into every slot index
pub const HASH_SALT: u32 = 0x9E37_79B9;

/// log2 of a cell's byte alignment (8-byte pairs)
pub const CELL_ALIGN_SHIFT: u32 = 3;

const FREE: u32 = 0;
const HELD: u32 = 1;

/// View of a lock region inside an arena
#[derive(Debug, Clone, Copy)]
pub struct LockTable<'a> {
    slots: &'a [AtomicU32],
    mask: u32,
}

impl<'a> LockTable<'a> {
    /// Wrap `slots`; the length must be a power of two no larger than `2^24`.
    pub fn new(slots: &'a [AtomicU32]) -> Result<Self> {
        let len = slots.len();
        if len == 0 || !len.is_power_of_two() || len > 1 << 24 {
            return Err(Error::invalid_config(format!(
                "lock table length {len} is not a power of two in 1..=2^24"
            )));
        }
        Ok(Self {
            slots,
            mask: (len - 1) as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn size_bits(&self) -> u32 {
        self.slots.len().trailing_zeros()
    }

    /// Slot for a byte address
    #[inline]
    pub fn hash(&self, address: u64) -> usize {
        let key = (address >> CELL_ALIGN_SHIFT) as u32 & self.mask;
        (key ^ (HASH_SALT & self.mask)) as usize
    }

    /// One CAS attempt; never waits.
    #[inline]
    pub fn try_acquire(&self, slot: usize) -> bool {
        let acquired = self.slots[slot]
            .compare_exchange(FREE, HELD, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok();
        if acquired {
            fence(Ordering::Acquire);
        }
        acquired
    }

    /// Free `slot`. Returns `false` if it was not held.
    #[inline]
    pub fn release(&self, slot: usize) -> bool {
        fence(Ordering::Release);
        self.slots[slot].swap(FREE, Ordering::Relaxed) == HELD
    }

    pub fn is_held(&self, slot: usize) -> bool {
        self.slots[slot].load(Ordering::Relaxed) != FREE
    }

    /// Slots currently held; zero between dispatches.
    pub fn held_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.load(Ordering::Relaxed) != FREE)
            .count()
    }
}
