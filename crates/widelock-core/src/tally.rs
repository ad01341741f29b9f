//! Race-class error counters

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counters in the tally region
pub const ERROR_CLASS_COUNT: usize = 64;

/// Violations the workload instrumentation can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceClass {
    /// A second worker entered a cell's critical section before the first left
    OverlappingCriticalSection = 0,
    /// The post-write re-read disagreed and the value was written again
    StoreVerifyRetry = 1,
    /// After release, the cell held less than the value just written
    RegressedValue = 2,
    /// A lock slot was freed while not held
    ReleaseWithoutHold = 3,
}

impl RaceClass {
    pub const ALL: [RaceClass; 4] = [
        RaceClass::OverlappingCriticalSection,
        RaceClass::StoreVerifyRetry,
        RaceClass::RegressedValue,
        RaceClass::ReleaseWithoutHold,
    ];

    pub const fn code(self) -> usize {
        self as usize
    }

    pub fn from_code(code: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::OverlappingCriticalSection => "overlapping_critical_section",
            Self::StoreVerifyRetry => "store_verify_retry",
            Self::RegressedValue => "regressed_value",
            Self::ReleaseWithoutHold => "release_without_hold",
        }
    }
}

/// Relaxed atomic counters, one per class code
#[derive(Debug, Clone, Copy)]
pub struct ErrorTally<'a> {
    counters: &'a [AtomicU32],
}

impl<'a> ErrorTally<'a> {
    pub fn new(counters: &'a [AtomicU32]) -> Result<Self> {
        if counters.len() != ERROR_CLASS_COUNT {
            return Err(Error::invalid_config(format!(
                "error tally needs {ERROR_CLASS_COUNT} counters, got {}",
                counters.len()
            )));
        }
        Ok(Self { counters })
    }

    #[inline]
    pub fn record(&self, class: RaceClass) {
        self.counters[class.code()].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_n(&self, class: RaceClass, count: u32) {
        if count > 0 {
            self.counters[class.code()].fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn count(&self, class: RaceClass) -> u32 {
        self.counters[class.code()].load(Ordering::Relaxed)
    }

    /// Current value of all counters, indexed by class code
    pub fn snapshot(&self) -> Vec<u32> {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}
