//! Allocation bookkeeping for the CPU backend

use crate::arena::Arena;
use crate::error::{BackendError, Result};

/// Largest arena the CPU backend hands out (4 GiB of words)
pub const MAX_ARENA_WORDS: usize = 1 << 30;

/// Running totals of arena allocations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub arenas: u64,
    pub total_words: usize,
    pub largest_words: usize,
}

/// Allocates arenas and keeps [`AllocationStats`] current.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    stats: AllocationStats,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed arena, refusing sizes above [`MAX_ARENA_WORDS`]
    pub fn allocate(&mut self, words: usize) -> Result<Arena> {
        if words > MAX_ARENA_WORDS {
            return Err(BackendError::AllocationTooLarge {
                requested: words,
                limit: MAX_ARENA_WORDS,
            });
        }

        let arena = Arena::zeroed(words);
        self.stats.arenas += 1;
        self.stats.total_words += words;
        self.stats.largest_words = self.stats.largest_words.max(words);
        Ok(arena)
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_tracks_allocations() {
        let mut ledger = AllocationLedger::new();
        let a = ledger.allocate(64).unwrap();
        let b = ledger.allocate(256).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 256);

        let stats = ledger.stats();
        assert_eq!(stats.arenas, 2);
        assert_eq!(stats.total_words, 320);
        assert_eq!(stats.largest_words, 256);
    }

    #[test]
    fn test_ledger_rejects_oversized_arena() {
        let mut ledger = AllocationLedger::new();
        let err = ledger.allocate(MAX_ARENA_WORDS + 1).unwrap_err();
        assert!(matches!(err, BackendError::AllocationTooLarge { .. }));
        assert_eq!(ledger.stats().arenas, 0);
    }
}
