//! Launch geometry and per-group execution context

use std::fmt;

// ================================================================================================
// Launch Configuration
// ================================================================================================

/// Grid dimensions (number of groups)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridDim {
    /// One-dimensional grid
    pub const fn linear(x: u32) -> Self {
        Self { x, y: 1, z: 1 }
    }

    pub const fn total_groups(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl fmt::Display for GridDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Group dimensions (lanes per group)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl BlockDim {
    pub const fn linear(x: u32) -> Self {
        Self { x, y: 1, z: 1 }
    }

    pub const fn total_lanes(&self) -> u32 {
        self.x * self.y * self.z
    }
}

impl fmt::Display for BlockDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Geometry of one dispatch.
///
/// `active_lanes` caps the global lane index: the last group of a linear
/// launch may be partially filled, and its trailing lanes do not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid: GridDim,
    pub block: BlockDim,
    pub active_lanes: u64,
}

impl LaunchConfig {
    pub const fn new(grid: GridDim, block: BlockDim, active_lanes: u64) -> Self {
        Self {
            grid,
            block,
            active_lanes,
        }
    }

    /// `workers` lanes packed into groups of `group_size`.
    ///
    /// ```rust
    /// use widelock_backends::LaunchConfig;
    ///
    /// let config = LaunchConfig::linear(100, 32);
    /// assert_eq!(config.grid.x, 4);
    /// assert_eq!(config.active_lanes, 100);
    /// ```
    pub fn linear(workers: u32, group_size: u32) -> Self {
        let group_size = group_size.max(1);
        let groups = workers.div_ceil(group_size);
        Self::new(GridDim::linear(groups), BlockDim::linear(group_size), workers as u64)
    }

    pub const fn total_groups(&self) -> u64 {
        self.grid.total_groups()
    }

    /// Lane slots across all groups, including inactive trailing lanes
    pub const fn total_lanes(&self) -> u64 {
        self.grid.total_groups() * self.block.total_lanes() as u64
    }
}

impl fmt::Display for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid={}, block={}, active_lanes={}",
            self.grid, self.block, self.active_lanes
        )
    }
}

// ================================================================================================
// Group Context
// ================================================================================================

/// Positional information handed to a kernel for one group.
#[derive(Debug, Clone, Copy)]
pub struct GroupContext {
    /// Linear group index within the grid
    pub group_index: u64,
    pub grid_dim: GridDim,
    pub block_dim: BlockDim,
    active_lanes: u32,
}

impl GroupContext {
    pub fn new(group_index: u64, config: &LaunchConfig) -> Self {
        let width = config.block.total_lanes() as u64;
        let first = group_index * width;
        let active = config.active_lanes.saturating_sub(first).min(width) as u32;
        Self {
            group_index,
            grid_dim: config.grid,
            block_dim: config.block,
            active_lanes: active,
        }
    }

    /// Global index of the group's first lane
    pub fn first_lane(&self) -> u64 {
        self.group_index * self.block_dim.total_lanes() as u64
    }

    /// Lanes in this group that take part in the dispatch
    pub fn active_lanes(&self) -> u32 {
        self.active_lanes
    }

    /// Global index of `lane`, a lane position within the group
    pub fn global_lane_index(&self, lane: u32) -> u64 {
        self.first_lane() + lane as u64
    }

    /// Global indices of every active lane, in lane order
    pub fn lane_ids(&self) -> impl Iterator<Item = u64> {
        let first = self.first_lane();
        (0..self.active_lanes as u64).map(move |lane| first + lane)
    }
}

/// Outcome of a completed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub groups: u64,
    pub lanes: u64,
    pub duration_us: u64,
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_and_block_dims() {
        let grid = GridDim { x: 2, y: 3, z: 4 };
        assert_eq!(grid.total_groups(), 24);
        assert_eq!(grid.to_string(), "(2, 3, 4)");

        let block = BlockDim { x: 8, y: 4, z: 1 };
        assert_eq!(block.total_lanes(), 32);
        assert_eq!(BlockDim::linear(64).total_lanes(), 64);
    }

    #[test]
    fn test_linear_launch_rounds_up() {
        let config = LaunchConfig::linear(1000, 32);
        assert_eq!(config.grid.x, 32);
        assert_eq!(config.block.x, 32);
        assert_eq!(config.total_lanes(), 1024);
        assert_eq!(config.active_lanes, 1000);
        assert_eq!(config.to_string(), "grid=(32, 1, 1), block=(32, 1, 1), active_lanes=1000");
    }

    #[test]
    fn test_partial_last_group() {
        let config = LaunchConfig::linear(70, 32);
        assert_eq!(GroupContext::new(0, &config).active_lanes(), 32);
        assert_eq!(GroupContext::new(1, &config).active_lanes(), 32);

        let last = GroupContext::new(2, &config);
        assert_eq!(last.active_lanes(), 6);
        assert_eq!(last.first_lane(), 64);
        assert_eq!(last.lane_ids().collect::<Vec<_>>(), (64..70).collect::<Vec<_>>());
        assert_eq!(last.global_lane_index(5), 69);
    }

    #[test]
    fn test_single_lane_groups() {
        let config = LaunchConfig::linear(3, 1);
        assert_eq!(config.total_groups(), 3);
        let ctx = GroupContext::new(2, &config);
        assert_eq!(ctx.lane_ids().collect::<Vec<_>>(), vec![2]);
    }
}
