//! Zeroed shared arenas of 32-bit atomic words
//!
//! A workload carves one arena into named [`Region`]s (lock table, grid,
//! counters). Every word is an [`AtomicU32`], so concurrent groups share the
//! arena through `&Arena` and pick their own orderings.
//!
//! ```rust
//! use std::sync::atomic::Ordering;
//! use widelock_backends::{Arena, Region};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let arena = Arena::zeroed(64);
//! let counters = Region::new(16, 8);
//!
//! arena.region(counters)?[1].fetch_add(5, Ordering::Relaxed);
//! assert_eq!(arena.snapshot(counters)?, vec![0, 5, 0, 0, 0, 0, 0, 0]);
//!
//! arena.zero(counters)?;
//! assert!(arena.snapshot(counters)?.iter().all(|&w| w == 0));
//! # Ok(())
//! # }
//! ```

use crate::error::{BackendError, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Word range inside an [`Arena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// First word
    pub offset: usize,
    /// Length in words
    pub len: usize,
}

impl Region {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last word
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Fixed-size, zero-initialised block of atomic words
///
/// All accesses are bounds-checked against the arena length.
#[derive(Debug)]
pub struct Arena {
    words: Box<[AtomicU32]>,
}

impl Arena {
    /// Allocate `len` words, all zero
    pub fn zeroed(len: usize) -> Self {
        let words = std::iter::repeat_with(|| AtomicU32::new(0)).take(len).collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Borrow the words of `region`
    pub fn region(&self, region: Region) -> Result<&[AtomicU32]> {
        self.check(region)?;
        Ok(&self.words[region.offset..region.end()])
    }

    /// Reset every word of `region` to zero
    ///
    /// Callers must not run this while a dispatch is touching the region.
    pub fn zero(&self, region: Region) -> Result<()> {
        for word in self.region(region)? {
            word.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy the current contents of `region`
    pub fn snapshot(&self, region: Region) -> Result<Vec<u32>> {
        Ok(self
            .region(region)?
            .iter()
            .map(|word| word.load(Ordering::Relaxed))
            .collect())
    }

    fn check(&self, region: Region) -> Result<()> {
        match region.offset.checked_add(region.len) {
            Some(end) if end <= self.words.len() => Ok(()),
            _ => Err(BackendError::ArenaOutOfBounds {
                offset: region.offset,
                len: region.len,
                arena_len: self.words.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_allocation() {
        let arena = Arena::zeroed(128);
        assert_eq!(arena.len(), 128);
        assert!(!arena.is_empty());
        assert!(arena.snapshot(Region::new(0, 128)).unwrap().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_region_bounds() {
        let arena = Arena::zeroed(16);
        assert!(arena.region(Region::new(8, 8)).is_ok());
        assert!(arena.region(Region::new(16, 0)).is_ok());

        let err = arena.region(Region::new(12, 8)).unwrap_err();
        assert!(matches!(
            err,
            BackendError::ArenaOutOfBounds {
                offset: 12,
                len: 8,
                arena_len: 16
            }
        ));

        assert!(arena.region(Region::new(usize::MAX, 2)).is_err());
        assert!(arena.zero(Region::new(16, 1)).is_err());
        assert!(arena.snapshot(Region::new(15, 2)).is_err());
    }

    #[test]
    fn test_zero_only_touches_region() {
        let arena = Arena::zeroed(8);
        let all = Region::new(0, 8);
        for (i, word) in arena.region(all).unwrap().iter().enumerate() {
            word.store(i as u32 + 1, Ordering::Relaxed);
        }

        arena.zero(Region::new(2, 4)).unwrap();
        assert_eq!(arena.snapshot(all).unwrap(), vec![1, 2, 0, 0, 0, 0, 7, 8]);
    }

    #[test]
    fn test_shared_across_threads() {
        let arena = Arena::zeroed(4);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let words = arena.region(Region::new(0, 4)).unwrap();
                    for _ in 0..1000 {
                        words[1].fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(arena.snapshot(Region::new(1, 1)).unwrap(), vec![4000]);
    }

    #[test]
    fn test_region_helpers() {
        let region = Region::new(4, 12);
        assert_eq!(region.end(), 16);
        assert!(!region.is_empty());
        assert!(Region::default().is_empty());
    }
}
