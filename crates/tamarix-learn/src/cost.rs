//! Active recovery of the hidden linear cost coefficients.
//!
//! Each observed (state, action, reward) triple yields one linear equation in
//! the eight cost coefficients. The estimator accumulates independent
//! equations — proposing actions chosen to produce rank-raising rows — and
//! solves the 8x8 system exactly once it is full.

use ndarray::{Array1, Array2};
use tamarix_core::error::Result;
use tamarix_core::model::CostParams;
use tamarix_core::state::RiverState;
use tamarix_core::types::{ActionVec, ReachAction};

use crate::linalg;

/// Number of cost coefficients, and therefore rows needed to solve.
pub const COST_FEATURES: usize = 8;

/// Builds and solves the cost equation system from observed rewards.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    matrix: Array2<f64>,
    rhs: Array1<f64>,
    fill: usize,
    solved: Option<CostParams>,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostEstimator {
    pub fn new() -> Self {
        Self {
            matrix: Array2::zeros((COST_FEATURES, COST_FEATURES)),
            rhs: Array1::zeros(COST_FEATURES),
            fill: 0,
            solved: None,
        }
    }

    /// Rows inserted so far. Always equals the matrix rank.
    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn is_solved(&self) -> bool {
        self.solved.is_some()
    }

    /// The solved coefficients, once all eight equations are in.
    pub fn cost_params(&self) -> Option<CostParams> {
        self.solved
    }

    /// The feature row of a (state, action) pair, in coefficient column order.
    pub fn feature_row(state: &RiverState, actions: &ActionVec) -> Array1<f64> {
        let mut row = Array1::zeros(COST_FEATURES);
        row[0] = state.total_invaded() as f64;
        row[1] = state.total_empty() as f64;
        for reach in state.reaches() {
            if reach.invaded_count > 0 {
                row[2] += 1.0;
            }
            match actions.at(reach.index) {
                ReachAction::Nothing => {}
                ReachAction::Eradicate => {
                    row[3] += 1.0;
                    row[5] += reach.invaded_count as f64;
                }
                ReachAction::Restore => {
                    row[4] += 1.0;
                    row[6] += reach.empty_count as f64;
                }
                ReachAction::EradicateRestore => {
                    row[4] += 1.0;
                    row[7] += reach.invaded_count as f64;
                }
            }
        }
        row
    }

    /// Picks an action whose reward would contribute a new independent
    /// equation.
    ///
    /// On an empty system the first probe restores at the first reach with an
    /// empty habitat and leaves the rest alone. Later probes search reach by
    /// reach over each reach's valid actions, restore first, and accept the
    /// first complete assignment whose row raises the rank. When no such
    /// assignment exists (or the system is already solved) the all-nothing
    /// action is returned.
    pub fn propose_action(&self, state: &RiverState) -> ActionVec {
        let fallback = ActionVec::nothing(state.num_reaches());
        if self.solved.is_some() || self.fill == COST_FEATURES {
            return fallback;
        }

        if self.fill == 0 {
            if let Some(first_empty) = state.reaches().iter().position(|r| r.empty_count > 0) {
                let mut actions = vec![ReachAction::Nothing; state.num_reaches()];
                actions[first_empty] = ReachAction::Restore;
                let seed = ActionVec(actions);
                if self.raises_rank(&Self::feature_row(state, &seed)) {
                    return seed;
                }
            }
        }

        let mut assignment = Vec::with_capacity(state.num_reaches());
        match self.search(state, 0, &mut assignment) {
            Some(actions) => actions,
            None => fallback,
        }
    }

    fn search(
        &self,
        state: &RiverState,
        reach: usize,
        assignment: &mut Vec<ReachAction>,
    ) -> Option<ActionVec> {
        if reach == state.num_reaches() {
            let candidate = ActionVec(assignment.clone());
            let row = Self::feature_row(state, &candidate);
            if self.raises_rank(&row) {
                return Some(candidate);
            }
            return None;
        }
        for action in state.reach(reach).valid_actions() {
            assignment.push(action);
            if let Some(found) = self.search(state, reach + 1, assignment) {
                return Some(found);
            }
            assignment.pop();
        }
        None
    }

    /// Whether adding the row would push the rank to `fill + 1`.
    fn raises_rank(&self, row: &Array1<f64>) -> bool {
        if linalg::norm(row) == 0.0 {
            return false;
        }
        let mut candidate = Array2::zeros((self.fill + 1, COST_FEATURES));
        for r in 0..self.fill {
            candidate.row_mut(r).assign(&self.matrix.row(r));
        }
        candidate.row_mut(self.fill).assign(row);
        linalg::rank(candidate.view()) == self.fill + 1
    }

    /// Feeds one observed reward into the system.
    ///
    /// Returns whether the equation was inserted. Rows that would not raise
    /// the rank are dropped, and the call is a no-op once the coefficients are
    /// solved. The eighth inserted row triggers the exact solve; the reward
    /// sign is flipped because rewards are negated costs.
    pub fn observe(
        &mut self,
        state: &RiverState,
        actions: &ActionVec,
        reward: f64,
    ) -> Result<bool> {
        if self.solved.is_some() {
            return Ok(false);
        }
        let row = Self::feature_row(state, actions);
        if !self.raises_rank(&row) {
            return Ok(false);
        }
        self.matrix.row_mut(self.fill).assign(&row);
        self.rhs[self.fill] = -reward;
        self.fill += 1;

        if self.fill == COST_FEATURES {
            let solution = linalg::solve(self.matrix.view(), &self.rhs)?;
            let mut values = [0.0; COST_FEATURES];
            for (slot, v) in values.iter_mut().zip(solution.iter()) {
                *slot = *v;
            }
            self.solved = Some(CostParams::from_array(values));
        }
        Ok(true)
    }
}
