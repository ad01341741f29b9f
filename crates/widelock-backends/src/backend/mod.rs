//! Backend abstraction

mod traits;
mod types;

pub use traits::{Backend, Kernel};
pub use types::{BlockDim, DispatchStats, GridDim, GroupContext, LaunchConfig};
