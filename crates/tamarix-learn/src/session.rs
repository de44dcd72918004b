//! Session glue between the environment loop and the two learners.
//!
//! A session receives the per-step observation/reward stream, records it
//! into the trajectory corpus, feeds rewards to the cost estimator, and
//! answers each step with either a probing action (while the cost system is
//! still being filled) or the fitted model's best action. The caller's mode
//! flags can freeze recording and probing independently.

use std::sync::Arc;

use rand::Rng;

use tamarix_core::error::Result;
use tamarix_core::model::TransitionModel;
use tamarix_core::state::RiverState;
use tamarix_core::topology::RiverNetwork;
use tamarix_core::types::{ActionVec, ModeFlags};

use crate::corpus::TrajectoryCorpus;
use crate::cost::CostEstimator;
use crate::genetic::{GeneticSearch, SearchConfig};

/// Drives trajectory recording, cost probing and model fitting for one task.
#[derive(Debug, Clone)]
pub struct LearnerSession {
    network: Arc<RiverNetwork>,
    corpus: TrajectoryCorpus,
    search: GeneticSearch,
    estimator: CostEstimator,
    flags: ModeFlags,
    model: Option<TransitionModel>,
    pending: Option<(RiverState, ActionVec)>,
}

impl LearnerSession {
    pub fn new(network: Arc<RiverNetwork>) -> Self {
        Self::with_config(network, SearchConfig::default())
    }

    pub fn with_config(network: Arc<RiverNetwork>, config: SearchConfig) -> Self {
        Self {
            search: GeneticSearch::with_config(Arc::clone(&network), config),
            network,
            corpus: TrajectoryCorpus::new(),
            estimator: CostEstimator::new(),
            flags: ModeFlags::default(),
            model: None,
            pending: None,
        }
    }

    pub fn mode(&self) -> ModeFlags {
        self.flags
    }

    pub fn mode_mut(&mut self) -> &mut ModeFlags {
        &mut self.flags
    }

    pub fn corpus(&self) -> &TrajectoryCorpus {
        &self.corpus
    }

    pub fn estimator(&self) -> &CostEstimator {
        &self.estimator
    }

    /// The fitted model, available after the first successful [`fit`].
    ///
    /// [`fit`]: LearnerSession::fit
    pub fn model(&self) -> Option<&TransitionModel> {
        self.model.as_ref()
    }

    /// Drops all recorded experience and restarts the genetic search for a
    /// fresh fitting run. The cost estimator and any fitted model are kept.
    pub fn reinitialise(&mut self) {
        self.corpus.clear();
        self.search.reinitialise();
        self.pending = None;
    }

    /// Starts a new episode from its first observation and picks an action.
    pub fn begin_episode(&mut self, observation: &[i32]) -> Result<ActionVec> {
        let state = RiverState::from_observation(&self.network, observation)?;
        if !self.flags.learning_frozen {
            self.corpus.start_episode();
            self.corpus.add_state(state.clone());
        }
        self.choose(state)
    }

    /// Feeds the reward earned by the previous action together with the next
    /// observation, and picks the next action.
    pub fn step(&mut self, reward: f64, observation: &[i32]) -> Result<ActionVec> {
        let state = RiverState::from_observation(&self.network, observation)?;
        self.settle_reward(reward)?;
        if !self.flags.learning_frozen {
            self.corpus.add_state(state.clone());
        }
        self.choose(state)
    }

    /// Feeds the final reward of an episode.
    pub fn end_episode(&mut self, reward: f64) -> Result<()> {
        self.settle_reward(reward)
    }

    /// Runs the genetic search over the recorded corpus and rebuilds the
    /// fitted model, carrying solved cost coefficients over.
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        generations: usize,
        rng: &mut R,
    ) -> Result<&TransitionModel> {
        let best = self.search.evolve(&self.corpus, generations, rng)?;
        let mut model = TransitionModel::from_genes(Arc::clone(&self.network), best.genes())?;
        if let Some(costs) = self.estimator.cost_params() {
            model.set_cost_params(costs);
        }
        Ok(self.model.insert(model))
    }

    /// Resolves the pending (state, action) pair against its reward.
    fn settle_reward(&mut self, reward: f64) -> Result<()> {
        if let Some((state, actions)) = self.pending.take() {
            if !self.flags.exploring_frozen && !self.estimator.is_solved() {
                let inserted = self.estimator.observe(&state, &actions, reward)?;
                if inserted && self.estimator.is_solved() {
                    if let (Some(model), Some(costs)) =
                        (self.model.as_mut(), self.estimator.cost_params())
                    {
                        model.set_cost_params(costs);
                    }
                }
            }
        }
        Ok(())
    }

    /// Picks the next action: a probe while the cost system is unsolved and
    /// probing is allowed, the fitted model's best action otherwise.
    fn choose(&mut self, state: RiverState) -> Result<ActionVec> {
        let actions = if !self.flags.exploring_frozen && !self.estimator.is_solved() {
            self.estimator.propose_action(&state)
        } else if let Some(model) = &self.model {
            model.best_action(&state)?
        } else {
            ActionVec::nothing(state.num_reaches())
        };
        if !self.flags.learning_frozen {
            self.corpus.add_action(actions.clone());
        }
        self.pending = Some((state, actions.clone()));
        Ok(actions)
    }
}
