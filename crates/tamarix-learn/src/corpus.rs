//! Trajectory corpus — recorded experience the genetic search fits against.
//!
//! Episodes are sequences of states with the action taken at each step. An
//! episode with `n` states contributes `n - 1` scorable transitions; states
//! and actions are appended as they arrive from the controller.

use serde::{Deserialize, Serialize};
use tamarix_core::state::RiverState;
use tamarix_core::types::ActionVec;

/// One recorded episode: `states[i]`, `actions[i]` led to `states[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub states: Vec<RiverState>,
    pub actions: Vec<ActionVec>,
}

impl Episode {
    /// Number of scorable (state, action, next state) triples.
    pub fn num_transitions(&self) -> usize {
        self.states.len().saturating_sub(1).min(self.actions.len())
    }
}

/// Accumulated episodes across a data-collection phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryCorpus {
    episodes: Vec<Episode>,
}

impl TrajectoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh episode; subsequent states and actions land in it.
    pub fn start_episode(&mut self) {
        self.episodes.push(Episode::default());
    }

    /// Records a state in the current episode.
    pub fn add_state(&mut self, state: RiverState) {
        self.current_episode().states.push(state);
    }

    /// Records the action taken from the most recent state.
    pub fn add_action(&mut self, actions: ActionVec) {
        self.current_episode().actions.push(actions);
    }

    fn current_episode(&mut self) -> &mut Episode {
        if self.episodes.is_empty() {
            self.episodes.push(Episode::default());
        }
        // Non-empty by the check above.
        let last = self.episodes.len() - 1;
        &mut self.episodes[last]
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Total scorable transitions over all episodes.
    pub fn total_transitions(&self) -> usize {
        self.episodes.iter().map(Episode::num_transitions).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_transitions() == 0
    }

    /// Drops all recorded experience.
    pub fn clear(&mut self) {
        self.episodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamarix_core::topology::RiverNetwork;

    fn state(net: &RiverNetwork, fill: i32) -> RiverState {
        RiverState::from_observation(net, &vec![fill; net.num_habitats()]).unwrap()
    }

    #[test]
    fn transitions_count_per_episode() {
        let net = RiverNetwork::from_edge_list(&[(1, 0), (0, 2)], 2, 10.0, -1.0).unwrap();
        let mut corpus = TrajectoryCorpus::new();
        assert!(corpus.is_empty());

        corpus.start_episode();
        corpus.add_state(state(&net, 3));
        corpus.add_action(ActionVec::nothing(2));
        corpus.add_state(state(&net, 3));
        assert_eq!(corpus.total_transitions(), 1);

        corpus.start_episode();
        corpus.add_state(state(&net, 2));
        // A lone state yields no transition.
        assert_eq!(corpus.total_transitions(), 1);

        corpus.clear();
        assert!(corpus.is_empty());
    }

    #[test]
    fn implicit_first_episode() {
        let net = RiverNetwork::from_edge_list(&[(1, 0), (0, 2)], 2, 10.0, -1.0).unwrap();
        let mut corpus = TrajectoryCorpus::new();
        corpus.add_state(state(&net, 3));
        assert_eq!(corpus.episodes().len(), 1);
    }
}
