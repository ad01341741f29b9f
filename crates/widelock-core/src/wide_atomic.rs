//! 64-bit read-modify-write on pairs of 32-bit words
//!
//! [`WideAtomic`] guards each grid cell with its [`LockTable`] slot and runs
//! an arbitrary update under the lock:
//!
//! 1. hash the cell's address to a slot
//! 2. acquire it according to the [`LockStrategy`]
//! 3. read both halves, compute the new value, write both halves
//! 4. re-read and rewrite until the cell holds the intended value
//! 5. release
//!
//! The group entry point, [`WideAtomic::group_rmw`], drives all lanes of a
//! lock-step group at once. Under [`LockStrategy::Cooperative`] the group
//! loops over its unfinished lanes, one CAS attempt each per round, until
//! every lane is done; a lane that wins its slot finishes its update and
//! drops out while its siblings keep retrying.

use crate::grid::{cell_address, SharedGrid};
use crate::lock_table::LockTable;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Lanes tracked by one cooperative `done` mask
pub const MAX_GROUP_LANES: usize = 64;

/// Verify rewrites allowed per update when no lock is held
pub const UNPROTECTED_VERIFY_LIMIT: u32 = 64;

// Failed acquisition rounds between yields.
const SPINS_BEFORE_YIELD: u32 = 64;

/// How lanes acquire a cell's lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Lock-step group retries with a per-lane `done` mask
    #[default]
    Cooperative,
    /// Each lane spins on its own slot until it wins
    IndependentSpin,
    /// No locking; exists to show the race instrumentation firing
    Unprotected,
}

impl LockStrategy {
    pub const ALL: [LockStrategy; 3] = [Self::Cooperative, Self::IndependentSpin, Self::Unprotected];

    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Unprotected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cooperative => "cooperative",
            Self::IndependentSpin => "independent_spin",
            Self::Unprotected => "unprotected",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cooperative" => Ok(Self::Cooperative),
            "independent_spin" | "independent" | "spin" => Ok(Self::IndependentSpin),
            "unprotected" | "none" => Ok(Self::Unprotected),
            other => Err(format!("unknown lock strategy '{other}'")),
        }
    }
}

/// Result of one lane's update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RmwOutcome {
    /// Value read under the lock
    pub previous: u64,
    /// Value the update produced (not written when equal to `previous`)
    pub written: u64,
    /// Extra writes needed before the re-read matched
    pub verify_retries: u32,
}

/// Counters for one [`WideAtomic::group_rmw`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Lanes that completed an update
    pub updates: u32,
    /// Failed CAS attempts
    pub contended_attempts: u64,
    pub verify_retries: u32,
    /// Releases that found the slot already free
    pub release_violations: u32,
}

/// Per-lane update logic run inside the critical section.
///
/// `update` receives the current value and returns the value to store.
/// `finish` runs after the write is verified and before the lock is
/// released.
pub trait CriticalSection {
    fn update(&mut self, lane: usize, cell: usize, current: u64) -> u64;

    fn finish(&mut self, _lane: usize, _cell: usize, _outcome: &RmwOutcome) {}
}

impl<F> CriticalSection for F
where
    F: FnMut(usize, usize, u64) -> u64,
{
    fn update(&mut self, lane: usize, cell: usize, current: u64) -> u64 {
        self(lane, cell, current)
    }
}

/// Wide atomic operations over a [`SharedGrid`], addressed by cell index
#[derive(Debug, Clone, Copy)]
pub struct WideAtomic<'a> {
    grid: SharedGrid<'a>,
    locks: LockTable<'a>,
    strategy: LockStrategy,
}

impl<'a> WideAtomic<'a> {
    pub fn new(grid: SharedGrid<'a>, locks: LockTable<'a>, strategy: LockStrategy) -> Self {
        Self { grid, locks, strategy }
    }

    pub fn grid(&self) -> &SharedGrid<'a> {
        &self.grid
    }

    pub fn locks(&self) -> &LockTable<'a> {
        &self.locks
    }

    pub fn strategy(&self) -> LockStrategy {
        self.strategy
    }

    /// Lock slot guarding `cell`
    #[inline]
    pub fn slot(&self, cell: usize) -> usize {
        self.locks.hash(cell_address(cell))
    }

    // ============================================================================================
    // Scalar operations
    // ============================================================================================

    pub fn load(&self, cell: usize) -> u64 {
        self.rmw(cell, |current| current).previous
    }

    pub fn store(&self, cell: usize, value: u64) {
        self.rmw(cell, |_| value);
    }

    /// Wrapping add; returns the previous value
    pub fn fetch_add(&self, cell: usize, delta: u64) -> u64 {
        self.rmw(cell, |current| current.wrapping_add(delta)).previous
    }

    /// Store `desired` if the cell holds `expected`. Returns whether it did
    /// and the value observed.
    pub fn compare_exchange(&self, cell: usize, expected: u64, desired: u64) -> (bool, u64) {
        let previous = self
            .rmw(cell, |current| if current == expected { desired } else { current })
            .previous;
        (previous == expected, previous)
    }

    /// Unsigned max; returns the previous value
    pub fn fetch_max(&self, cell: usize, value: u64) -> u64 {
        self.rmw(cell, |current| current.max(value)).previous
    }

    /// Run `op` on one cell under its lock
    pub fn rmw(&self, cell: usize, op: impl FnMut(u64) -> u64) -> RmwOutcome {
        let mut section = Capture {
            op,
            outcome: RmwOutcome::default(),
        };
        self.group_rmw(&[cell], &mut section);
        section.outcome
    }

    // ============================================================================================
    // Group operations
    // ============================================================================================

    /// Unsigned max of `values[lane]` into `cells[lane]` for every lane.
    ///
    /// Previous values are written to `previous`, in lane order.
    pub fn group_fetch_max(&self, cells: &[usize], values: &[u64], previous: &mut Vec<u64>) -> GroupStats {
        previous.clear();
        previous.resize(cells.len(), 0);
        let mut section = GroupMax { values, previous };
        self.group_rmw(cells, &mut section)
    }

    /// Read every lane's cell under its lock into `values`, in lane order
    pub fn group_load(&self, cells: &[usize], values: &mut Vec<u64>) -> GroupStats {
        values.clear();
        values.resize(cells.len(), 0);
        let mut section = |lane: usize, _cell: usize, current: u64| {
            values[lane] = current;
            current
        };
        self.group_rmw(cells, &mut section)
    }

    /// Run `section` for lane `i` on `cells[i]`, for every lane.
    ///
    /// Lanes beyond [`MAX_GROUP_LANES`] are processed as further groups.
    pub fn group_rmw<C>(&self, cells: &[usize], section: &mut C) -> GroupStats
    where
        C: CriticalSection + ?Sized,
    {
        let mut stats = GroupStats::default();
        for (index, chunk) in cells.chunks(MAX_GROUP_LANES).enumerate() {
            let base = index * MAX_GROUP_LANES;
            match self.strategy {
                LockStrategy::Cooperative => self.cooperative(base, chunk, section, &mut stats),
                LockStrategy::IndependentSpin => self.independent(base, chunk, section, &mut stats),
                LockStrategy::Unprotected => {
                    for (lane, &cell) in chunk.iter().enumerate() {
                        self.critical(base + lane, cell, section, &mut stats);
                    }
                }
            }
        }
        stats
    }

    fn cooperative<C>(&self, base: usize, cells: &[usize], section: &mut C, stats: &mut GroupStats)
    where
        C: CriticalSection + ?Sized,
    {
        let all_done = if cells.len() == MAX_GROUP_LANES {
            u64::MAX
        } else {
            (1u64 << cells.len()) - 1
        };
        let mut done = 0u64;
        let mut failed_rounds = 0u32;

        while done != all_done {
            for (lane, &cell) in cells.iter().enumerate() {
                let bit = 1u64 << lane;
                if done & bit != 0 {
                    continue;
                }
                let slot = self.slot(cell);
                if self.locks.try_acquire(slot) {
                    self.critical(base + lane, cell, section, stats);
                    if !self.locks.release(slot) {
                        stats.release_violations += 1;
                    }
                    done |= bit;
                } else {
                    stats.contended_attempts += 1;
                }
            }
            if done != all_done {
                failed_rounds += 1;
                backoff(failed_rounds);
            }
        }
    }

    fn independent<C>(&self, base: usize, cells: &[usize], section: &mut C, stats: &mut GroupStats)
    where
        C: CriticalSection + ?Sized,
    {
        for (lane, &cell) in cells.iter().enumerate() {
            let slot = self.slot(cell);
            let mut failed = 0u32;
            while !self.locks.try_acquire(slot) {
                stats.contended_attempts += 1;
                failed += 1;
                backoff(failed);
            }
            self.critical(base + lane, cell, section, stats);
            if !self.locks.release(slot) {
                stats.release_violations += 1;
            }
        }
    }

    fn critical<C>(&self, lane: usize, cell: usize, section: &mut C, stats: &mut GroupStats)
    where
        C: CriticalSection + ?Sized,
    {
        let (low, high) = self.grid.load_halves(cell);
        let previous = join(low, high);
        let desired = section.update(lane, cell, previous);
        let verify_retries = if desired == previous {
            0
        } else {
            self.write_verified(cell, desired)
        };

        stats.updates += 1;
        stats.verify_retries += verify_retries;
        section.finish(
            lane,
            cell,
            &RmwOutcome {
                previous,
                written: desired,
                verify_retries,
            },
        );
    }

    /// Write both halves, then re-read; rewrite until they match.
    fn write_verified(&self, cell: usize, desired: u64) -> u32 {
        let limit = if self.strategy.is_protected() {
            u32::MAX
        } else {
            UNPROTECTED_VERIFY_LIMIT
        };

        let mut rewrites = 0;
        loop {
            self.grid.store_halves(cell, desired as u32, (desired >> 32) as u32);
            let (low, high) = self.grid.load_halves(cell);
            if join(low, high) == desired || rewrites >= limit {
                return rewrites;
            }
            rewrites += 1;
        }
    }
}

#[inline]
fn join(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

#[inline]
fn backoff(failed: u32) {
    // The holder may be descheduled on an oversubscribed host.
    if failed % SPINS_BEFORE_YIELD == 0 {
        std::thread::yield_now();
    } else {
        std::hint::spin_loop();
    }
}

struct Capture<F> {
    op: F,
    outcome: RmwOutcome,
}

impl<F: FnMut(u64) -> u64> CriticalSection for Capture<F> {
    fn update(&mut self, _lane: usize, _cell: usize, current: u64) -> u64 {
        (self.op)(current)
    }

    fn finish(&mut self, _lane: usize, _cell: usize, outcome: &RmwOutcome) {
        self.outcome = *outcome;
    }
}

struct GroupMax<'v> {
    values: &'v [u64],
    previous: &'v mut Vec<u64>,
}

impl CriticalSection for GroupMax<'_> {
    fn update(&mut self, lane: usize, _cell: usize, current: u64) -> u64 {
        self.previous[lane] = current;
        current.max(self.values[lane])
    }
}
