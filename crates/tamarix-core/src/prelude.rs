//! Convenience re-exports for working with the ecosystem model.

pub use crate::config::TaskConfig;
pub use crate::error::{Error, Result};
pub use crate::model::{CostParams, EnvParams, TransitionModel};
pub use crate::state::{ExpectedState, Reach, RiverState};
pub use crate::topology::RiverNetwork;
pub use crate::types::{ActionVec, HabitatCell, ModeFlags, ReachAction};
