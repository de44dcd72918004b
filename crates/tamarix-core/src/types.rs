//! Shared types used across the Tamarix crates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The content of a single habitat slot.
///
/// The discriminants match the wire encoding of observation vectors:
/// an external controller sends one integer per habitat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HabitatCell {
    /// Occupied by the invasive tamarisk plant.
    Invaded = 1,
    /// Occupied by the native plant species.
    Native = 2,
    /// Unoccupied.
    Empty = 3,
}

impl HabitatCell {
    /// Decodes a raw observation value.
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            1 => Ok(HabitatCell::Invaded),
            2 => Ok(HabitatCell::Native),
            3 => Ok(HabitatCell::Empty),
            other => Err(Error::InvalidHabitat(other)),
        }
    }

    /// The wire encoding of this cell.
    pub fn to_raw(self) -> i32 {
        self as i32
    }
}

/// A management action applied to one reach for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReachAction {
    /// Leave the reach alone.
    Nothing = 0,
    /// Attempt to clear invaded habitats.
    Eradicate = 1,
    /// Attempt to plant natives in empty habitats.
    Restore = 2,
    /// Clear invaded habitats and replant in one pass.
    EradicateRestore = 3,
}

impl ReachAction {
    /// Decodes a raw action value.
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            0 => Ok(ReachAction::Nothing),
            1 => Ok(ReachAction::Eradicate),
            2 => Ok(ReachAction::Restore),
            3 => Ok(ReachAction::EradicateRestore),
            other => Err(Error::InvalidAction(other)),
        }
    }

    /// The wire encoding of this action.
    pub fn to_raw(self) -> i32 {
        self as i32
    }
}

/// One action per reach, indexed by reach index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionVec(pub Vec<ReachAction>);

impl ActionVec {
    /// An all-`Nothing` action over the given number of reaches.
    pub fn nothing(num_reaches: usize) -> Self {
        Self(vec![ReachAction::Nothing; num_reaches])
    }

    /// Decodes a flat integer action vector.
    pub fn from_raw(values: &[i32]) -> Result<Self> {
        values
            .iter()
            .map(|&v| ReachAction::from_raw(v))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Encodes the actions as a flat integer vector.
    pub fn to_raw(&self) -> Vec<i32> {
        self.0.iter().map(|a| a.to_raw()).collect()
    }

    /// The action at the given reach index.
    pub fn at(&self, reach: usize) -> ReachAction {
        self.0[reach]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Opaque mode switches injected by the surrounding agent logic.
///
/// No state machine: just one boolean per flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    /// While set, incoming trajectories are not recorded.
    pub learning_frozen: bool,
    /// While set, no probing actions are proposed.
    pub exploring_frozen: bool,
}

impl ModeFlags {
    pub fn freeze_learning(&mut self) {
        self.learning_frozen = true;
    }

    pub fn unfreeze_learning(&mut self) {
        self.learning_frozen = false;
    }

    pub fn freeze_exploring(&mut self) {
        self.exploring_frozen = true;
    }

    pub fn unfreeze_exploring(&mut self) {
        self.exploring_frozen = false;
    }
}
