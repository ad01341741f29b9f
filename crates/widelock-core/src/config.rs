//! Trial configuration
//!
//! [`TrialConfig`] is validated once, before any arena is allocated. Named
//! presets cover the common runs and [`TrialConfig::from_env`] overlays
//! `WIDELOCK_*` variables on top of one.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WIDELOCK_PROFILE` | preset: `smoke` (default) or `stress` |
//! | `WIDELOCK_GRID_WIDTH` / `WIDELOCK_GRID_HEIGHT` | `grid_width` / `grid_height` |
//! | `WIDELOCK_ITERATIONS` | `iterations_per_worker` |
//! | `WIDELOCK_WORKERS` | `worker_count` |
//! | `WIDELOCK_TRIALS` | `trial_count` |
//! | `WIDELOCK_QUANTIZE_DEPTH` | `quantize_depth` |
//! | `WIDELOCK_LOCK_TABLE_BITS` | `lock_table_size_bits` |
//! | `WIDELOCK_GROUP_SIZE` | `group_size` |
//! | `WIDELOCK_DISPATCHES` | `dispatches_per_trial` |
//! | `WIDELOCK_STRATEGY` | `strategy` |
//! | `WIDELOCK_SEED` | `seed` |
//! | `WIDELOCK_DWELL` | `critical_section_dwell` |

use crate::error::{Error, Result};
use crate::wide_atomic::LockStrategy;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use widelock_backends::MAX_GROUP_SIZE;

/// Upper bound on records per dispatch and on grid cells
pub const MAX_WORKLOAD_ITEMS: u64 = 1 << 28;

/// Largest lock table, `2^24` slots
pub const MAX_LOCK_TABLE_BITS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub iterations_per_worker: u32,
    pub worker_count: u32,
    pub trial_count: u32,
    /// 24-bit fixed-point depth instead of raw float bits
    pub quantize_depth: bool,
    pub lock_table_size_bits: u32,
    /// Lanes per lock-step group
    pub group_size: u32,
    /// Workload reruns per trial, all checked against one oracle result
    pub dispatches_per_trial: u32,
    pub strategy: LockStrategy,
    pub seed: u64,
    /// Spin iterations inside each critical section
    pub critical_section_dwell: u32,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self::for_smoke()
    }
}

impl TrialConfig {
    /// Small, fast run for tests and CI
    pub fn for_smoke() -> Self {
        Self {
            grid_width: 64,
            grid_height: 64,
            iterations_per_worker: 64,
            worker_count: 1024,
            trial_count: 4,
            quantize_depth: true,
            lock_table_size_bits: 12,
            group_size: 32,
            dispatches_per_trial: 2,
            strategy: LockStrategy::Cooperative,
            seed: 0x5EED,
            critical_section_dwell: 0,
        }
    }

    /// Few cells, many writers: contention ratio 2048
    pub fn for_stress() -> Self {
        Self {
            grid_width: 16,
            grid_height: 16,
            iterations_per_worker: 256,
            worker_count: 2048,
            trial_count: 8,
            quantize_depth: true,
            lock_table_size_bits: 6,
            group_size: 32,
            dispatches_per_trial: 3,
            strategy: LockStrategy::Cooperative,
            seed: 0x5EED,
            critical_section_dwell: 16,
        }
    }

    /// Preset named by `WIDELOCK_PROFILE` with per-field overrides.
    ///
    /// Unknown profiles and unparsable values are configuration errors.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("WIDELOCK_PROFILE") {
            Ok(profile) => match profile.trim().to_ascii_lowercase().as_str() {
                "smoke" | "" => Self::for_smoke(),
                "stress" => Self::for_stress(),
                other => return Err(Error::invalid_config(format!("unknown profile '{other}'"))),
            },
            Err(_) => Self::for_smoke(),
        };

        env_override("WIDELOCK_GRID_WIDTH", &mut config.grid_width)?;
        env_override("WIDELOCK_GRID_HEIGHT", &mut config.grid_height)?;
        env_override("WIDELOCK_ITERATIONS", &mut config.iterations_per_worker)?;
        env_override("WIDELOCK_WORKERS", &mut config.worker_count)?;
        env_override("WIDELOCK_TRIALS", &mut config.trial_count)?;
        env_override("WIDELOCK_QUANTIZE_DEPTH", &mut config.quantize_depth)?;
        env_override("WIDELOCK_LOCK_TABLE_BITS", &mut config.lock_table_size_bits)?;
        env_override("WIDELOCK_GROUP_SIZE", &mut config.group_size)?;
        env_override("WIDELOCK_DISPATCHES", &mut config.dispatches_per_trial)?;
        env_override("WIDELOCK_STRATEGY", &mut config.strategy)?;
        env_override("WIDELOCK_SEED", &mut config.seed)?;
        env_override("WIDELOCK_DWELL", &mut config.critical_section_dwell)?;

        Ok(config)
    }

    pub fn with_strategy(mut self, strategy: LockStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject anything outside the supported ranges
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("grid_width", self.grid_width),
            ("grid_height", self.grid_height),
            ("iterations_per_worker", self.iterations_per_worker),
            ("worker_count", self.worker_count),
            ("trial_count", self.trial_count),
            ("dispatches_per_trial", self.dispatches_per_trial),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::invalid_config(format!("{name} must be positive")));
            }
        }

        if !(1..=MAX_LOCK_TABLE_BITS).contains(&self.lock_table_size_bits) {
            return Err(Error::invalid_config(format!(
                "lock_table_size_bits must be in 1..={MAX_LOCK_TABLE_BITS}, got {}",
                self.lock_table_size_bits
            )));
        }

        if !(1..=MAX_GROUP_SIZE).contains(&self.group_size) {
            return Err(Error::invalid_config(format!(
                "group_size must be in 1..={MAX_GROUP_SIZE}, got {}",
                self.group_size
            )));
        }

        if self.total_records() as u64 > MAX_WORKLOAD_ITEMS || self.cell_count() as u64 > MAX_WORKLOAD_ITEMS {
            return Err(Error::invalid_config(format!(
                "workload of {} records over {} cells exceeds {MAX_WORKLOAD_ITEMS}",
                self.total_records(),
                self.cell_count()
            )));
        }

        Ok(())
    }

    /// Records consumed by one dispatch
    pub fn total_records(&self) -> usize {
        self.worker_count as usize * self.iterations_per_worker as usize
    }

    pub fn cell_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Records per grid cell
    pub fn contention_ratio(&self) -> f64 {
        self.total_records() as f64 / self.cell_count().max(1) as f64
    }
}

fn env_override<T>(key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|err| Error::invalid_config(format!("{key}={raw}: {err}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};

    static ENV_LOCK: Mutex<()> = const_mutex(());

    const KEYS: [&str; 13] = [
        "WIDELOCK_PROFILE",
        "WIDELOCK_GRID_WIDTH",
        "WIDELOCK_GRID_HEIGHT",
        "WIDELOCK_ITERATIONS",
        "WIDELOCK_WORKERS",
        "WIDELOCK_TRIALS",
        "WIDELOCK_QUANTIZE_DEPTH",
        "WIDELOCK_LOCK_TABLE_BITS",
        "WIDELOCK_GROUP_SIZE",
        "WIDELOCK_DISPATCHES",
        "WIDELOCK_STRATEGY",
        "WIDELOCK_SEED",
        "WIDELOCK_DWELL",
    ];

    fn reset_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_presets_validate() {
        TrialConfig::for_smoke().validate().unwrap();
        TrialConfig::for_stress().validate().unwrap();
        assert!(TrialConfig::for_stress().contention_ratio() >= 256.0);
        assert_eq!(TrialConfig::default(), TrialConfig::for_smoke());
    }

    #[test]
    fn test_rejects_zero_fields() {
        let mut config = TrialConfig::for_smoke();
        config.worker_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker_count"));

        let mut config = TrialConfig::for_smoke();
        config.dispatches_per_trial = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_bits_and_groups() {
        for bits in [0, 25] {
            let mut config = TrialConfig::for_smoke();
            config.lock_table_size_bits = bits;
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        for group_size in [0, 65] {
            let mut config = TrialConfig::for_smoke();
            config.group_size = group_size;
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        let mut config = TrialConfig::for_smoke();
        config.lock_table_size_bits = 24;
        config.group_size = 64;
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_oversized_workload() {
        let mut config = TrialConfig::for_smoke();
        config.worker_count = u32::MAX;
        config.iterations_per_worker = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        let _guard = ENV_LOCK.lock();
        reset_env();
        env::set_var("WIDELOCK_PROFILE", "stress");
        env::set_var("WIDELOCK_WORKERS", "96");
        env::set_var("WIDELOCK_STRATEGY", "unprotected");
        env::set_var("WIDELOCK_QUANTIZE_DEPTH", "false");
        env::set_var("WIDELOCK_SEED", "12345");

        let config = TrialConfig::from_env();
        reset_env();

        let config = config.unwrap();
        assert_eq!(config.grid_width, TrialConfig::for_stress().grid_width);
        assert_eq!(config.worker_count, 96);
        assert_eq!(config.strategy, LockStrategy::Unprotected);
        assert!(!config.quantize_depth);
        assert_eq!(config.seed, 12345);
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let _guard = ENV_LOCK.lock();
        reset_env();

        env::set_var("WIDELOCK_GROUP_SIZE", "lots");
        let err = TrialConfig::from_env().unwrap_err();
        reset_env();
        assert!(err.to_string().contains("WIDELOCK_GROUP_SIZE"));

        env::set_var("WIDELOCK_PROFILE", "marathon");
        let err = TrialConfig::from_env().unwrap_err();
        reset_env();
        assert!(err.to_string().contains("marathon"));
    }

    #[test]
    fn test_from_env_defaults_to_smoke() {
        let _guard = ENV_LOCK.lock();
        reset_env();
        assert_eq!(TrialConfig::from_env().unwrap(), TrialConfig::for_smoke());
    }
}
