//! River state — the materialized contents of every reach at one step.
//!
//! A state is built fresh from each incoming observation vector and is
//! immutable afterwards. Reaches live in an arena indexed by reach index;
//! parent/child links are indices into that arena, mirroring the topology.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topology::RiverNetwork;
use crate::types::{HabitatCell, ReachAction};

/// One reach's habitats plus its cached composition counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reach {
    /// The reach's index within the network.
    pub index: usize,
    /// The habitat slots, in observation order.
    pub habitats: Vec<HabitatCell>,
    /// Habitats occupied by the invasive plant.
    pub invaded_count: usize,
    /// Habitats occupied by the native plant.
    pub native_count: usize,
    /// Unoccupied habitats.
    pub empty_count: usize,
    /// Parent reach index, `None` for the root reach.
    pub parent: Option<usize>,
    /// Child reach indices, ascending.
    pub children: Vec<usize>,
}

impl Reach {
    fn new(
        index: usize,
        habitats: Vec<HabitatCell>,
        parent: Option<usize>,
        children: Vec<usize>,
    ) -> Self {
        let invaded_count = habitats.iter().filter(|&&h| h == HabitatCell::Invaded).count();
        let native_count = habitats.iter().filter(|&&h| h == HabitatCell::Native).count();
        let empty_count = habitats.len() - invaded_count - native_count;
        Self {
            index,
            habitats,
            invaded_count,
            native_count,
            empty_count,
            parent,
            children,
        }
    }

    /// Whether the action can legally be applied to this reach.
    pub fn allows(&self, action: ReachAction) -> bool {
        match action {
            ReachAction::Nothing => true,
            ReachAction::Eradicate | ReachAction::EradicateRestore => self.invaded_count > 0,
            ReachAction::Restore => self.empty_count > 0,
        }
    }

    /// All valid actions at this reach.
    ///
    /// Restore comes first: callers probing for informative actions try
    /// restoration before anything else.
    pub fn valid_actions(&self) -> Vec<ReachAction> {
        let mut actions = Vec::with_capacity(4);
        if self.empty_count > 0 {
            actions.push(ReachAction::Restore);
        }
        if self.invaded_count > 0 {
            actions.push(ReachAction::Eradicate);
            actions.push(ReachAction::EradicateRestore);
        }
        actions.push(ReachAction::Nothing);
        actions
    }
}

/// An immutable snapshot of the whole river.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverState {
    reaches: Vec<Reach>,
    reach_size: usize,
}

impl RiverState {
    /// Slices a flat observation vector into per-reach habitat blocks.
    ///
    /// Block `i` covers `observation[i * reach_size .. (i + 1) * reach_size]`.
    pub fn from_observation(network: &RiverNetwork, observation: &[i32]) -> Result<Self> {
        let expected = network.num_habitats();
        if observation.len() != expected {
            return Err(Error::ObservationSize {
                expected,
                actual: observation.len(),
            });
        }

        let reach_size = network.reach_size();
        let mut reaches = Vec::with_capacity(network.num_reaches());
        for index in 0..network.num_reaches() {
            let block = &observation[index * reach_size..(index + 1) * reach_size];
            let habitats = block
                .iter()
                .map(|&v| HabitatCell::from_raw(v))
                .collect::<Result<Vec<_>>>()?;
            reaches.push(Reach::new(
                index,
                habitats,
                network.parent(index),
                network.children(index).to_vec(),
            ));
        }

        Ok(Self { reaches, reach_size })
    }

    /// Builds a state directly from per-reach habitat cells.
    ///
    /// Used by the transition model when materializing a sampled successor.
    pub fn from_cells(network: &RiverNetwork, cells: &[HabitatCell]) -> Result<Self> {
        let raw: Vec<i32> = cells.iter().map(|c| c.to_raw()).collect();
        Self::from_observation(network, &raw)
    }

    /// All reaches in index order.
    pub fn reaches(&self) -> &[Reach] {
        &self.reaches
    }

    /// The reach at the given index.
    pub fn reach(&self, index: usize) -> &Reach {
        &self.reaches[index]
    }

    pub fn num_reaches(&self) -> usize {
        self.reaches.len()
    }

    /// Habitat slots per reach.
    pub fn reach_size(&self) -> usize {
        self.reach_size
    }

    /// The state re-flattened to the observation encoding.
    pub fn to_observation(&self) -> Vec<i32> {
        self.reaches
            .iter()
            .flat_map(|r| r.habitats.iter().map(|h| h.to_raw()))
            .collect()
    }

    /// Total invaded habitats over all reaches.
    pub fn total_invaded(&self) -> usize {
        self.reaches.iter().map(|r| r.invaded_count).sum()
    }

    /// Total empty habitats over all reaches.
    pub fn total_empty(&self) -> usize {
        self.reaches.iter().map(|r| r.empty_count).sum()
    }
}

/// The analytic counterpart of [`RiverState`]: fractional expected habitat
/// counts per reach, produced by the model's expectation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedState {
    /// Expected invaded habitats per reach.
    pub invaded: Vec<f64>,
    /// Expected native habitats per reach.
    pub native: Vec<f64>,
    /// Expected empty habitats per reach.
    pub empty: Vec<f64>,
}

impl ExpectedState {
    pub fn num_reaches(&self) -> usize {
        self.invaded.len()
    }
}
