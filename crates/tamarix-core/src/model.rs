//! The stochastic transition model of the river ecosystem.
//!
//! Two coupled passes drive every transition. The *action pass* applies the
//! chosen management action to each habitat independently: plants die, get
//! eradicated or get replanted, one uniform draw per habitat. The
//! *germination pass* then fills habitats that are empty after the action
//! pass: each reach feels colonization pressure from its own plants and, with
//! flow-dependent weights, from its parent, siblings and children, mixed with
//! an exogenous seed source.
//!
//! The same probability tables back three views of a transition: drawing a
//! concrete successor ([`TransitionModel::sample_next`]), the analytic
//! expectation ([`TransitionModel::expected_next_state`]) and scoring how
//! well the parameters explain an observed successor
//! ([`TransitionModel::evaluate_transition`]) — the fitness signal the
//! genetic search maximizes.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::{ExpectedState, Reach, RiverState};
use crate::topology::RiverNetwork;
use crate::types::{ActionVec, HabitatCell, ReachAction};

/// Number of scalar (non-per-reach) transition parameters in a gene vector.
pub const SCALAR_GENE_COUNT: usize = 7;

/// Exogenous germination is considered active while any reach's exogenous
/// ratio sits below this threshold.
const EXO_ACTIVATED_THRESHOLD: f64 = 0.98;

/// Neighbour pressure is normalized by this multiple of the reach size.
const PRESSURE_NORM_FACTOR: f64 = 5.0;

/// The transition-dynamics parameters, every rate in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvParams {
    /// Chance that an endogenous germination grows the invasive plant.
    pub endo_invasive: f64,
    /// Flow weight for pressure travelling downstream (parent to child).
    /// Never exceeds 0.5; gene values are halved on the way in.
    pub upstream_rate: f64,
    /// Flow weight for pressure travelling upstream (child to parent).
    pub downstream_rate: f64,
    /// Chance that eradicating one invaded habitat succeeds.
    pub eradication_rate: f64,
    /// Chance that restoring one empty habitat succeeds.
    pub restoration_rate: f64,
    /// Chance that an invaded habitat dies back on its own.
    pub death_rate_invaded: f64,
    /// Chance that a native habitat dies back on its own.
    pub death_rate_native: f64,
    /// Per-reach chance that a germination event is exogenous.
    pub exo_ratio: Vec<f64>,
    /// Per-reach chance that an exogenous germination is invasive.
    pub exo_invasive: Vec<f64>,
}

impl EnvParams {
    /// The default parameter set from the original task description.
    pub fn defaults(num_reaches: usize) -> Self {
        Self {
            endo_invasive: 0.6,
            upstream_rate: 0.5,
            downstream_rate: 0.1,
            eradication_rate: 0.85,
            restoration_rate: 0.65,
            death_rate_invaded: 0.2,
            death_rate_native: 0.2,
            exo_ratio: vec![0.7; num_reaches],
            exo_invasive: vec![0.5; num_reaches],
        }
    }

    /// Draws every parameter uniformly from its domain.
    pub fn random<R: Rng + ?Sized>(num_reaches: usize, rng: &mut R) -> Self {
        Self {
            endo_invasive: rng.gen::<f64>(),
            // The upstream weight never exceeds 0.5.
            upstream_rate: rng.gen::<f64>() / 2.0,
            downstream_rate: rng.gen::<f64>(),
            eradication_rate: rng.gen::<f64>(),
            restoration_rate: rng.gen::<f64>(),
            death_rate_invaded: rng.gen::<f64>(),
            death_rate_native: rng.gen::<f64>(),
            exo_ratio: (0..num_reaches).map(|_| rng.gen::<f64>()).collect(),
            exo_invasive: (0..num_reaches).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    /// Gene-vector length for a network with `num_reaches` reaches.
    pub fn gene_count(num_reaches: usize) -> usize {
        SCALAR_GENE_COUNT + 2 * num_reaches
    }

    /// Builds parameters from a flat gene vector in [0, 1].
    ///
    /// Layout: the seven scalar rates, then `num_reaches` exogenous-ratio
    /// genes, then `num_reaches` exogenous-invasive genes. The upstream gene
    /// is halved so the stored rate stays within [0, 0.5].
    pub fn from_genes(genes: &[f64], num_reaches: usize) -> Result<Self> {
        let expected = Self::gene_count(num_reaches);
        if genes.len() != expected {
            return Err(Error::InvalidChromosome {
                expected,
                actual: genes.len(),
            });
        }
        Ok(Self {
            endo_invasive: genes[0],
            upstream_rate: genes[1] / 2.0,
            downstream_rate: genes[2],
            eradication_rate: genes[3],
            restoration_rate: genes[4],
            death_rate_invaded: genes[5],
            death_rate_native: genes[6],
            exo_ratio: genes[SCALAR_GENE_COUNT..SCALAR_GENE_COUNT + num_reaches].to_vec(),
            exo_invasive: genes[SCALAR_GENE_COUNT + num_reaches..].to_vec(),
        })
    }

    /// Average L1 distance to another parameter set, in [0, 1].
    pub fn distance(&self, other: &EnvParams) -> f64 {
        let mut total = (self.endo_invasive - other.endo_invasive).abs()
            + (self.upstream_rate - other.upstream_rate).abs()
            + (self.downstream_rate - other.downstream_rate).abs()
            + (self.eradication_rate - other.eradication_rate).abs()
            + (self.restoration_rate - other.restoration_rate).abs()
            + (self.death_rate_invaded - other.death_rate_invaded).abs()
            + (self.death_rate_native - other.death_rate_native).abs();
        for (a, b) in self.exo_ratio.iter().zip(&other.exo_ratio) {
            total += (a - b).abs();
        }
        for (a, b) in self.exo_invasive.iter().zip(&other.exo_invasive) {
            total += (a - b).abs();
        }
        total / Self::gene_count(self.exo_ratio.len()) as f64
    }

    /// True while any reach still looks like it receives exogenous seeds.
    pub fn exogenous_activated(&self) -> bool {
        self.exo_ratio.iter().any(|&r| r < EXO_ACTIVATED_THRESHOLD)
    }
}

/// The eight linear cost coefficients, in equation-system column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostParams {
    /// Per invaded habitat.
    pub habitat_invaded: f64,
    /// Per empty habitat.
    pub habitat_empty: f64,
    /// Per reach containing at least one invaded habitat.
    pub invaded_reach: f64,
    /// Flat cost of one eradication.
    pub eradicate: f64,
    /// Flat cost of one restoration (also of one eradicate-and-restore).
    pub restore: f64,
    /// Per invaded habitat in an eradicated reach.
    pub variable_eradicate: f64,
    /// Per empty habitat in a restored reach.
    pub variable_restore: f64,
    /// Per invaded habitat in an eradicate-and-restored reach.
    pub variable_eradicate_restore: f64,
}

impl CostParams {
    /// The true coefficients of the original task, used as ground truth in
    /// synthetic experiments.
    pub fn defaults() -> Self {
        Self {
            habitat_invaded: 0.1,
            habitat_empty: 0.5,
            invaded_reach: 10.0,
            eradicate: 0.5,
            restore: 0.9,
            variable_eradicate: 0.4,
            variable_restore: 0.4,
            variable_eradicate_restore: 0.8,
        }
    }

    /// Coefficients in equation-system column order.
    pub fn to_array(self) -> [f64; 8] {
        [
            self.habitat_invaded,
            self.habitat_empty,
            self.invaded_reach,
            self.eradicate,
            self.restore,
            self.variable_eradicate,
            self.variable_restore,
            self.variable_eradicate_restore,
        ]
    }

    /// Builds coefficients from equation-system column order.
    pub fn from_array(values: [f64; 8]) -> Self {
        Self {
            habitat_invaded: values[0],
            habitat_empty: values[1],
            invaded_reach: values[2],
            eradicate: values[3],
            restore: values[4],
            variable_eradicate: values[5],
            variable_restore: values[6],
            variable_eradicate_restore: values[7],
        }
    }
}

/// A parameterized transition model for one river network.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    network: Arc<RiverNetwork>,
    params: EnvParams,
    costs: Option<CostParams>,
}

impl TransitionModel {
    /// A model with the given dynamics and no fitted costs yet.
    pub fn new(network: Arc<RiverNetwork>, params: EnvParams) -> Self {
        Self {
            network,
            params,
            costs: None,
        }
    }

    /// A model built from a chromosome's gene vector.
    pub fn from_genes(network: Arc<RiverNetwork>, genes: &[f64]) -> Result<Self> {
        let params = EnvParams::from_genes(genes, network.num_reaches())?;
        Ok(Self::new(network, params))
    }

    pub fn network(&self) -> &RiverNetwork {
        &self.network
    }

    pub fn params(&self) -> &EnvParams {
        &self.params
    }

    /// Injects fitted cost coefficients, enabling the cost queries.
    pub fn set_cost_params(&mut self, costs: CostParams) {
        self.costs = Some(costs);
    }

    pub fn cost_params(&self) -> Option<&CostParams> {
        self.costs.as_ref()
    }

    fn require_costs(&self) -> Result<&CostParams> {
        self.costs.as_ref().ok_or(Error::ParametersNotSet)
    }

    // ---- transition sampling ------------------------------------------------

    /// Samples a successor state.
    ///
    /// One uniform draw per habitat in the action pass, then one per habitat
    /// left empty in the germination pass. Never mutates `state`.
    pub fn sample_next<R: Rng + ?Sized>(
        &self,
        state: &RiverState,
        actions: &ActionVec,
        rng: &mut R,
    ) -> Result<RiverState> {
        let mut cells: Vec<HabitatCell> = Vec::with_capacity(self.network.num_habitats());
        for reach in state.reaches() {
            let action = actions.at(reach.index);
            for &habitat in &reach.habitats {
                let draw = rng.gen::<f64>();
                cells.push(self.apply_action_to_cell(habitat, action, draw));
            }
        }

        let after_action = RiverState::from_cells(&self.network, &cells)?;

        // Germination fills habitats that are empty after the action pass.
        let invaded: Vec<f64> = after_action
            .reaches()
            .iter()
            .map(|r| r.invaded_count as f64)
            .collect();
        let native: Vec<f64> = after_action
            .reaches()
            .iter()
            .map(|r| r.native_count as f64)
            .collect();
        let use_exo = self.params.exogenous_activated();
        let probs = self.germination_probabilities(&invaded, &native, use_exo);

        let reach_size = self.network.reach_size();
        for reach in after_action.reaches() {
            if reach.empty_count == 0 {
                continue;
            }
            let Some(invasive_chance) = probs[reach.index] else {
                continue;
            };
            for (offset, &habitat) in reach.habitats.iter().enumerate() {
                if habitat == HabitatCell::Empty {
                    cells[reach.index * reach_size + offset] =
                        if rng.gen::<f64>() < invasive_chance {
                            HabitatCell::Invaded
                        } else {
                            HabitatCell::Native
                        };
                }
            }
        }

        RiverState::from_cells(&self.network, &cells)
    }

    /// The action-pass update for one habitat, given one uniform draw.
    ///
    /// For eradicate-and-restore on an invaded habitat, clearing is tested
    /// before conversion to native: cleared within `e(1 - s)`, converted
    /// within `e`, untouched beyond.
    fn apply_action_to_cell(
        &self,
        habitat: HabitatCell,
        action: ReachAction,
        draw: f64,
    ) -> HabitatCell {
        let p = &self.params;
        match (action, habitat) {
            (ReachAction::Nothing, HabitatCell::Native)
            | (ReachAction::Eradicate, HabitatCell::Native)
            | (ReachAction::Restore, HabitatCell::Native)
            | (ReachAction::EradicateRestore, HabitatCell::Native) => {
                if draw < p.death_rate_native {
                    HabitatCell::Empty
                } else {
                    HabitatCell::Native
                }
            }
            (ReachAction::Nothing, HabitatCell::Invaded)
            | (ReachAction::Restore, HabitatCell::Invaded) => {
                if draw < p.death_rate_invaded {
                    HabitatCell::Empty
                } else {
                    HabitatCell::Invaded
                }
            }
            (ReachAction::Eradicate, HabitatCell::Invaded) => {
                if draw < p.eradication_rate {
                    HabitatCell::Empty
                } else {
                    HabitatCell::Invaded
                }
            }
            (ReachAction::EradicateRestore, HabitatCell::Invaded) => {
                if draw < p.eradication_rate * (1.0 - p.restoration_rate) {
                    HabitatCell::Empty
                } else if draw < p.eradication_rate {
                    HabitatCell::Native
                } else {
                    HabitatCell::Invaded
                }
            }
            (ReachAction::Restore, HabitatCell::Empty) => {
                if draw < p.restoration_rate {
                    HabitatCell::Native
                } else {
                    HabitatCell::Empty
                }
            }
            (_, HabitatCell::Empty) => HabitatCell::Empty,
        }
    }

    /// Per-reach chance that a germinating empty habitat turns invasive.
    ///
    /// `None` marks a reach with zero total pressure; its empties stay empty.
    /// `invaded`/`native` are the (possibly fractional) post-action counts.
    fn germination_probabilities(
        &self,
        invaded: &[f64],
        native: &[f64],
        use_exogenous: bool,
    ) -> Vec<Option<f64>> {
        let p = &self.params;
        let norm = PRESSURE_NORM_FACTOR * self.network.reach_size() as f64;
        let up_sq = p.upstream_rate * p.upstream_rate;
        let cross = p.upstream_rate * p.downstream_rate;
        let down_sq = p.downstream_rate * p.downstream_rate;

        (0..self.network.num_reaches())
            .map(|index| {
                let exo_invasive_weight = if use_exogenous {
                    p.exo_ratio[index] * p.exo_invasive[index]
                } else {
                    0.0
                };
                let exo_native_weight = if use_exogenous {
                    p.exo_ratio[index] * (1.0 - p.exo_invasive[index])
                } else {
                    0.0
                };
                let endo_ratio = 1.0 - p.exo_ratio[index];
                let endo_invasive_weight = endo_ratio * p.endo_invasive;
                let endo_native_weight = endo_ratio * (1.0 - p.endo_invasive);

                let mut invasive_score = invaded[index];
                let mut native_score = native[index];
                if let Some(parent) = self.network.parent(index) {
                    invasive_score += invaded[parent] * up_sq;
                    native_score += native[parent] * up_sq;
                    for sibling in self.network.siblings(index) {
                        invasive_score += invaded[sibling] * cross;
                        native_score += native[sibling] * cross;
                    }
                }
                for &child in self.network.children(index) {
                    invasive_score += invaded[child] * down_sq;
                    native_score += native[child] * down_sq;
                }

                let invasive_chance =
                    exo_invasive_weight + endo_invasive_weight * invasive_score / norm;
                let native_chance = exo_native_weight + endo_native_weight * native_score / norm;
                let sum = invasive_chance + native_chance;
                if sum > 0.0 {
                    Some(invasive_chance / sum)
                } else {
                    None
                }
            })
            .collect()
    }

    // ---- expectation --------------------------------------------------------

    /// The analytic expectation of the successor's per-reach composition.
    ///
    /// Unlike the sampling and scoring paths, the expectation always mixes
    /// the exogenous terms in, regardless of the activation gate.
    pub fn expected_next_state(&self, state: &RiverState, actions: &ActionVec) -> ExpectedState {
        let num_reaches = self.network.num_reaches();
        let p = &self.params;

        let mut invaded = vec![0.0; num_reaches];
        let mut native = vec![0.0; num_reaches];
        let mut empty = vec![0.0; num_reaches];
        for reach in state.reaches() {
            let reach_invaded = reach.invaded_count as f64;
            let reach_native = reach.native_count as f64;
            let reach_empty = reach.empty_count as f64;

            let mut deaths_invaded = 0.0;
            let deaths_native = reach_native * p.death_rate_native;
            let mut growths_native = 0.0;
            match actions.at(reach.index) {
                ReachAction::Nothing => {
                    deaths_invaded = reach_invaded * p.death_rate_invaded;
                }
                ReachAction::Eradicate => {
                    deaths_invaded = reach_invaded * p.eradication_rate;
                }
                ReachAction::Restore => {
                    deaths_invaded = reach_invaded * p.death_rate_invaded;
                    growths_native = reach_empty * p.restoration_rate;
                }
                ReachAction::EradicateRestore => {
                    deaths_invaded = reach_invaded * p.eradication_rate;
                    growths_native = deaths_invaded * p.restoration_rate;
                }
            }

            invaded[reach.index] = reach_invaded - deaths_invaded;
            native[reach.index] = reach_native - deaths_native + growths_native;
            empty[reach.index] = reach_empty - growths_native + deaths_invaded + deaths_native;
        }

        let probs = self.germination_probabilities(&invaded, &native, true);
        for index in 0..num_reaches {
            if let Some(invasive_chance) = probs[index] {
                invaded[index] += empty[index] * invasive_chance;
                native[index] += empty[index] * (1.0 - invasive_chance);
                empty[index] = 0.0;
            }
        }

        ExpectedState {
            invaded,
            native,
            empty,
        }
    }

    /// Expected value of the successor state: the sum of per-reach state
    /// values of the analytic expectation. Requires fitted cost parameters.
    pub fn expected_next_state_value(
        &self,
        state: &RiverState,
        actions: &ActionVec,
    ) -> Result<f64> {
        let expected = self.expected_next_state(state, actions);
        let mut value = 0.0;
        for index in 0..expected.num_reaches() {
            value += self.reach_value(expected.invaded[index], expected.empty[index])?;
        }
        Ok(value)
    }

    /// Value of one reach's (possibly fractional) composition: negated
    /// holding costs, with the invaded-reach cost smoothed by a tanh ramp so
    /// fractional expectations grade continuously.
    pub fn reach_value(&self, invaded: f64, empty: f64) -> Result<f64> {
        let costs = self.require_costs()?;
        let mut value = 0.0;
        value -= costs.invaded_reach * ((2.5 * invaded - 3.0).tanh() + 1.0) / 2.0;
        value -= costs.habitat_invaded * invaded;
        value -= costs.habitat_empty * empty;
        Ok(value)
    }

    // ---- transition scoring -------------------------------------------------

    /// Scores how well this model explains an observed transition, in [0, 1].
    ///
    /// For every habitat the model's probability of each outcome category is
    /// computed analytically (action pass, then expected germination), the
    /// probability `p` assigned to the observed category is read off, and
    /// `-(1 - p/2)^2 - (p/2)^2` is accumulated; the total is normalized to
    /// `2 * (1 + total / num_habitats)`. Deterministic in its inputs.
    pub fn evaluate_transition(
        &self,
        state: &RiverState,
        actions: &ActionVec,
        observed_next: &RiverState,
    ) -> f64 {
        let reach_size = self.network.reach_size();
        let num_reaches = self.network.num_reaches();
        let num_habitats = self.network.num_habitats();
        let p = &self.params;

        // Per-habitat outcome distribution after the action pass.
        let mut prob_invaded = vec![0.0; num_habitats];
        let mut prob_native = vec![0.0; num_habitats];
        let mut prob_empty = vec![0.0; num_habitats];
        // Per-reach expected composition, for germination pressure.
        let mut reach_invaded = vec![0.0; num_reaches];
        let mut reach_native = vec![0.0; num_reaches];

        for reach in state.reaches() {
            let action = actions.at(reach.index);
            for (offset, &habitat) in reach.habitats.iter().enumerate() {
                let (inv, nat, emp) = match (action, habitat) {
                    (_, HabitatCell::Native) => {
                        (0.0, 1.0 - p.death_rate_native, p.death_rate_native)
                    }
                    (ReachAction::Eradicate, HabitatCell::Invaded) => {
                        (1.0 - p.eradication_rate, 0.0, p.eradication_rate)
                    }
                    (ReachAction::EradicateRestore, HabitatCell::Invaded) => (
                        1.0 - p.eradication_rate,
                        p.eradication_rate * p.restoration_rate,
                        p.eradication_rate * (1.0 - p.restoration_rate),
                    ),
                    (_, HabitatCell::Invaded) => {
                        (1.0 - p.death_rate_invaded, 0.0, p.death_rate_invaded)
                    }
                    (ReachAction::Restore, HabitatCell::Empty) => {
                        (0.0, p.restoration_rate, 1.0 - p.restoration_rate)
                    }
                    (_, HabitatCell::Empty) => (0.0, 0.0, 1.0),
                };

                let habitat_index = reach.index * reach_size + offset;
                prob_invaded[habitat_index] = inv;
                prob_native[habitat_index] = nat;
                prob_empty[habitat_index] = emp;
                reach_invaded[reach.index] += inv;
                reach_native[reach.index] += nat;
            }
        }

        // Expected germination moves each habitat's empty mass to the two
        // occupied categories.
        let use_exo = p.exogenous_activated();
        let probs = self.germination_probabilities(&reach_invaded, &reach_native, use_exo);
        for index in 0..num_reaches {
            if let Some(invasive_chance) = probs[index] {
                for offset in 0..reach_size {
                    let habitat_index = index * reach_size + offset;
                    prob_invaded[habitat_index] += prob_empty[habitat_index] * invasive_chance;
                    prob_native[habitat_index] +=
                        prob_empty[habitat_index] * (1.0 - invasive_chance);
                    prob_empty[habitat_index] = 0.0;
                }
            }
        }

        // Quadratic score of the probability assigned to what was observed.
        let mut total = 0.0;
        for reach in observed_next.reaches() {
            for (offset, &habitat) in reach.habitats.iter().enumerate() {
                let habitat_index = reach.index * reach_size + offset;
                let prediction = match habitat {
                    HabitatCell::Invaded => prob_invaded[habitat_index],
                    HabitatCell::Native => prob_native[habitat_index],
                    HabitatCell::Empty => prob_empty[habitat_index],
                };
                total += -(1.0 - prediction / 2.0).powi(2) - (prediction / 2.0).powi(2);
            }
        }

        2.0 * (1.0 + total / num_habitats as f64)
    }

    // ---- costs and rewards --------------------------------------------------

    /// Reward (negated cost) of one action at one reach; an invalid action
    /// earns the penalty.
    pub fn single_action_reward(&self, reach: &Reach, action: ReachAction) -> Result<f64> {
        let costs = self.require_costs()?;
        let cost = match action {
            ReachAction::Nothing => 0.0,
            ReachAction::Eradicate => {
                if reach.invaded_count == 0 {
                    return Ok(self.network.penalty());
                }
                costs.eradicate + costs.variable_eradicate * reach.invaded_count as f64
            }
            ReachAction::Restore => {
                if reach.empty_count == 0 {
                    return Ok(self.network.penalty());
                }
                costs.restore + costs.variable_restore * reach.empty_count as f64
            }
            ReachAction::EradicateRestore => {
                if reach.invaded_count == 0 {
                    return Ok(self.network.penalty());
                }
                costs.restore + costs.variable_eradicate_restore * reach.invaded_count as f64
            }
        };
        Ok(-cost)
    }

    /// Cost of one action at one reach (negated [`Self::single_action_reward`]).
    pub fn single_action_cost(&self, reach: &Reach, action: ReachAction) -> Result<f64> {
        self.single_action_reward(reach, action).map(|r| -r)
    }

    /// Reward of a whole action vector; exceeding the budget earns the penalty.
    pub fn action_reward(&self, state: &RiverState, actions: &ActionVec) -> Result<f64> {
        let mut reward = 0.0;
        for reach in state.reaches() {
            reward += self.single_action_reward(reach, actions.at(reach.index))?;
        }
        if reward.abs() > self.network.budget() {
            return Ok(self.network.penalty());
        }
        Ok(reward)
    }

    /// Cost of a whole action vector (negated [`Self::action_reward`]).
    pub fn action_cost(&self, state: &RiverState, actions: &ActionVec) -> Result<f64> {
        self.action_reward(state, actions).map(|r| -r)
    }

    /// Holding cost of the state itself: per-reach invasion cost plus
    /// per-habitat occupancy costs.
    pub fn state_cost(&self, state: &RiverState) -> Result<f64> {
        let costs = self.require_costs()?;
        let mut cost = 0.0;
        for reach in state.reaches() {
            if reach.invaded_count > 0 {
                cost += costs.invaded_reach + costs.habitat_invaded * reach.invaded_count as f64;
            }
            cost += costs.habitat_empty * reach.empty_count as f64;
        }
        Ok(cost)
    }

    /// Full step reward: action reward minus holding costs, floored at the
    /// penalty.
    pub fn reward(&self, state: &RiverState, actions: &ActionVec) -> Result<f64> {
        let reward = self.action_reward(state, actions)? - self.state_cost(state)?;
        Ok(reward.max(self.network.penalty()))
    }

    // ---- one-step planning --------------------------------------------------

    /// Brute-force best action over the valid-action cross-product,
    /// maximizing expected next-state value plus action reward.
    pub fn best_action(&self, state: &RiverState) -> Result<ActionVec> {
        let mut assignment = ActionVec::nothing(state.num_reaches());
        let mut best: Option<(ActionVec, f64)> = None;
        self.search_best_action(state, 0, &mut assignment, &mut best)?;
        // At least the all-nothing assignment is always explored.
        Ok(best.map(|(a, _)| a).unwrap_or(assignment))
    }

    fn search_best_action(
        &self,
        state: &RiverState,
        position: usize,
        assignment: &mut ActionVec,
        best: &mut Option<(ActionVec, f64)>,
    ) -> Result<()> {
        if position == state.num_reaches() {
            let score = self.expected_next_state_value(state, assignment)?
                + self.action_reward(state, assignment)?;
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                *best = Some((assignment.clone(), score));
            }
            return Ok(());
        }
        for action in state.reach(position).valid_actions() {
            assignment.0[position] = action;
            self.search_best_action(state, position + 1, assignment, best)?;
        }
        assignment.0[position] = ReachAction::Nothing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn linear_network() -> Arc<RiverNetwork> {
        // reach 1 -> reach 0 -> sink 2
        Arc::new(RiverNetwork::from_edge_list(&[(1, 0), (0, 2)], 4, 100.0, -10_000.0).unwrap())
    }

    fn zero_pressure_params(num_reaches: usize) -> EnvParams {
        EnvParams {
            endo_invasive: 0.0,
            upstream_rate: 0.0,
            downstream_rate: 0.0,
            eradication_rate: 1.0,
            restoration_rate: 0.0,
            death_rate_invaded: 0.0,
            death_rate_native: 0.0,
            // Ratio 1.0 zeroes the endogenous weights and trips the
            // activation gate, so nothing germinates anywhere.
            exo_ratio: vec![1.0; num_reaches],
            exo_invasive: vec![0.0; num_reaches],
        }
    }

    #[test]
    fn nothing_on_empty_river_stays_empty() {
        let net = linear_network();
        let model = TransitionModel::new(net.clone(), zero_pressure_params(2));
        let mut state = RiverState::from_observation(&net, &[3; 8]).unwrap();
        let actions = ActionVec::nothing(2);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            state = model.sample_next(&state, &actions, &mut rng).unwrap();
            assert_eq!(state.total_empty(), 8, "no spurious growth");
        }
    }

    #[test]
    fn eradicate_touches_only_target_reach() {
        let net = linear_network();
        // Deterministic: eradication always succeeds, nothing else moves,
        // no colonization pressure.
        let model = TransitionModel::new(net.clone(), zero_pressure_params(2));
        let state = RiverState::from_observation(&net, &[1, 1, 3, 3, 2, 2, 3, 3]).unwrap();
        let actions =
            ActionVec(vec![ReachAction::Eradicate, ReachAction::Nothing]);
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..10 {
            let next = model.sample_next(&state, &actions, &mut rng).unwrap();
            assert_eq!(next.reach(0).invaded_count, 0);
            assert_eq!(next.reach(0).empty_count, 4);
            // Reach 1 is untouched by the action pass and feels no pressure.
            assert_eq!(next.reach(1).habitats, state.reach(1).habitats);
        }
    }

    #[test]
    fn combined_action_clears_before_converting() {
        let net = linear_network();
        let mut params = zero_pressure_params(2);
        params.eradication_rate = 1.0;
        params.restoration_rate = 1.0;
        let model = TransitionModel::new(net.clone(), params);
        let state = RiverState::from_observation(&net, &[1, 1, 1, 1, 2, 2, 2, 2]).unwrap();
        let actions = ActionVec(vec![ReachAction::EradicateRestore, ReachAction::Nothing]);
        let mut rng = StdRng::seed_from_u64(3);
        // e = 1, s = 1: the clearing band e(1-s) is empty, so every invaded
        // habitat converts straight to native.
        let next = model.sample_next(&state, &actions, &mut rng).unwrap();
        assert_eq!(next.reach(0).native_count, 4);
        assert_eq!(next.reach(0).invaded_count, 0);
    }

    #[test]
    fn germination_fills_from_neighbour_pressure() {
        let net = linear_network();
        let mut params = zero_pressure_params(2);
        // Purely endogenous, invasive-leaning germination with flow.
        params.exo_ratio = vec![0.0; 2];
        params.endo_invasive = 1.0;
        params.upstream_rate = 0.5;
        params.downstream_rate = 0.5;
        let model = TransitionModel::new(net.clone(), params);
        let state = RiverState::from_observation(&net, &[1, 1, 1, 1, 3, 3, 3, 3]).unwrap();
        let actions = ActionVec::nothing(2);
        let mut rng = StdRng::seed_from_u64(11);
        let next = model.sample_next(&state, &actions, &mut rng).unwrap();
        // Reach 1's empties feel its parent's invasive pressure and the
        // invasive-only germination mix fills them all with tamarisk.
        assert_eq!(next.reach(1).invaded_count, 4);
    }

    #[test]
    fn expected_state_conserves_mass() {
        let net = linear_network();
        let model = TransitionModel::new(net.clone(), EnvParams::defaults(2));
        let state = RiverState::from_observation(&net, &[1, 2, 3, 1, 2, 2, 3, 3]).unwrap();
        let actions = ActionVec(vec![ReachAction::Eradicate, ReachAction::Restore]);
        let expected = model.expected_next_state(&state, &actions);
        for index in 0..2 {
            let mass =
                expected.invaded[index] + expected.native[index] + expected.empty[index];
            assert!((mass - 4.0).abs() < 1e-9, "reach {} mass {}", index, mass);
        }
    }

    #[test]
    fn perfect_model_scores_near_one() {
        let net = linear_network();
        // Fully deterministic dynamics: natives persist, eradication always
        // works, nothing germinates.
        let model = TransitionModel::new(net.clone(), zero_pressure_params(2));
        let state = RiverState::from_observation(&net, &[1, 1, 2, 2, 2, 2, 3, 3]).unwrap();
        let actions = ActionVec(vec![ReachAction::Eradicate, ReachAction::Nothing]);
        let mut rng = StdRng::seed_from_u64(5);
        let next = model.sample_next(&state, &actions, &mut rng).unwrap();
        let score = model.evaluate_transition(&state, &actions, &next);
        // Every habitat is predicted with probability 1: score = 2(1 - 0.5).
        assert!((score - 1.0).abs() < 1e-9, "score {}", score);
    }

    #[test]
    fn scoring_prefers_the_generating_parameters() {
        let net = linear_network();
        let truth = TransitionModel::new(net.clone(), EnvParams::defaults(2));
        // A model with every rate pushed away from the truth.
        let wrong = TransitionModel::new(
            net.clone(),
            EnvParams {
                endo_invasive: 0.05,
                upstream_rate: 0.49,
                downstream_rate: 0.9,
                eradication_rate: 0.05,
                restoration_rate: 0.05,
                death_rate_invaded: 0.95,
                death_rate_native: 0.95,
                exo_ratio: vec![0.05; 2],
                exo_invasive: vec![0.95; 2],
            },
        );
        let mut rng = StdRng::seed_from_u64(99);

        let state = RiverState::from_observation(&net, &[1, 1, 2, 3, 2, 2, 3, 1]).unwrap();
        let actions = ActionVec(vec![ReachAction::Eradicate, ReachAction::Nothing]);
        let mut true_total = 0.0;
        let mut wrong_total = 0.0;
        for _ in 0..200 {
            let next = truth.sample_next(&state, &actions, &mut rng).unwrap();
            true_total += truth.evaluate_transition(&state, &actions, &next);
            wrong_total += wrong.evaluate_transition(&state, &actions, &next);
        }
        assert!(
            true_total > wrong_total,
            "generating parameters should explain their own samples best ({} vs {})",
            true_total,
            wrong_total
        );
    }

    #[test]
    fn cost_queries_need_fitted_parameters() {
        let net = linear_network();
        let mut model = TransitionModel::new(net.clone(), EnvParams::defaults(2));
        let state = RiverState::from_observation(&net, &[1, 1, 3, 3, 2, 2, 3, 3]).unwrap();
        let actions = ActionVec::nothing(2);

        assert_eq!(
            model.action_cost(&state, &actions).unwrap_err(),
            Error::ParametersNotSet
        );
        assert_eq!(
            model
                .expected_next_state_value(&state, &actions)
                .unwrap_err(),
            Error::ParametersNotSet
        );

        model.set_cost_params(CostParams::defaults());
        assert!(model.action_cost(&state, &actions).is_ok());
        assert!(model.reward(&state, &actions).is_ok());
    }

    #[test]
    fn invalid_action_earns_penalty() {
        let net = linear_network();
        let mut model = TransitionModel::new(net.clone(), EnvParams::defaults(2));
        model.set_cost_params(CostParams::defaults());
        // Reach 1 has no invaded habitats: eradicating it is invalid.
        let state = RiverState::from_observation(&net, &[1, 1, 3, 3, 2, 2, 2, 2]).unwrap();
        let reward = model
            .single_action_reward(state.reach(1), ReachAction::Eradicate)
            .unwrap();
        assert_eq!(reward, net.penalty());
    }

    #[test]
    fn gene_roundtrip_and_length_check() {
        let genes: Vec<f64> = (0..EnvParams::gene_count(2)).map(|i| i as f64 / 11.0).collect();
        let params = EnvParams::from_genes(&genes, 2).unwrap();
        assert_eq!(params.endo_invasive, genes[0]);
        assert_eq!(params.upstream_rate, genes[1] / 2.0);
        assert_eq!(params.exo_ratio, &genes[7..9]);
        assert_eq!(params.exo_invasive, &genes[9..11]);

        assert_eq!(
            EnvParams::from_genes(&genes[..5], 2).unwrap_err(),
            Error::InvalidChromosome {
                expected: 11,
                actual: 5
            }
        );
    }

    #[test]
    fn distance_is_zero_on_self() {
        let params = EnvParams::defaults(3);
        assert_eq!(params.distance(&params), 0.0);
        let mut other = params.clone();
        other.eradication_rate = 0.0;
        assert!(params.distance(&other) > 0.0);
    }
}
