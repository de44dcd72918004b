//! End-to-end learning tests against a simulated river.
//!
//! A ground-truth transition model plays the environment; the learners only
//! see observations and rewards. The cost estimator must recover the exact
//! cost coefficients through its own probing, and the session must wire the
//! whole loop together.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use tamarix_core::model::{CostParams, EnvParams, TransitionModel};
use tamarix_core::state::RiverState;
use tamarix_core::topology::RiverNetwork;
use tamarix_core::types::ActionVec;
use tamarix_learn::cost::CostEstimator;
use tamarix_learn::genetic::SearchConfig;
use tamarix_learn::{GeneticSearch, LearnerSession, TrajectoryCorpus};

/// Helper: four reaches in a branching tree, two habitats each.
fn four_reach_network() -> Arc<RiverNetwork> {
    Arc::new(
        RiverNetwork::from_edge_list(&[(0, 4), (1, 0), (2, 1), (3, 1)], 2, 10_000.0, -100_000.0)
            .unwrap(),
    )
}

/// Helper: the environment model with the true dynamics and costs.
fn ground_truth(network: &Arc<RiverNetwork>) -> TransitionModel {
    let mut model = TransitionModel::new(Arc::clone(network), EnvParams::defaults(4));
    model.set_cost_params(CostParams::defaults());
    model
}

/// Helper: observations diverse enough for eight independent cost equations.
fn probe_observations() -> Vec<Vec<i32>> {
    vec![
        vec![3; 8],
        vec![1; 8],
        vec![1, 1, 1, 2, 2, 2, 2, 2],
        vec![1, 2, 2, 2, 2, 2, 2, 2],
        vec![3, 2, 2, 2, 2, 2, 2, 2],
        vec![1, 3, 2, 3, 1, 2, 3, 1],
    ]
}

#[test]
fn estimator_recovers_costs_from_probed_rewards() {
    let network = four_reach_network();
    let truth = ground_truth(&network);
    let mut estimator = CostEstimator::new();

    // Cycle the observation pool until the system solves. Each pass must
    // insert at least one equation while any independent row is reachable.
    'outer: for _ in 0..10 {
        for obs in probe_observations() {
            let state = RiverState::from_observation(&network, &obs).unwrap();
            let probe = estimator.propose_action(&state);
            let reward = truth.reward(&state, &probe).unwrap();
            estimator.observe(&state, &probe, reward).unwrap();
            if estimator.is_solved() {
                break 'outer;
            }
        }
    }

    assert!(estimator.is_solved(), "probing never filled the system");
    let recovered = estimator.cost_params().unwrap().to_array();
    for (got, want) in recovered.iter().zip(CostParams::defaults().to_array()) {
        assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
    }
}

#[test]
fn session_solves_costs_and_fits_a_model() {
    let network = four_reach_network();
    let truth = ground_truth(&network);
    let config = SearchConfig {
        population_size: 20,
        ..SearchConfig::default()
    };
    let mut session = LearnerSession::with_config(Arc::clone(&network), config);
    let mut rng = StdRng::seed_from_u64(21);

    for _ in 0..10 {
        let pool = probe_observations();
        let mut actions = session.begin_episode(&pool[0]).unwrap();
        let mut current = RiverState::from_observation(&network, &pool[0]).unwrap();
        for obs in pool.iter().skip(1) {
            let reward = truth.reward(&current, &actions).unwrap();
            actions = session.step(reward, obs).unwrap();
            current = RiverState::from_observation(&network, obs).unwrap();
        }
        session.end_episode(truth.reward(&current, &actions).unwrap()).unwrap();
        if session.estimator().is_solved() {
            break;
        }
    }

    assert!(session.estimator().is_solved());
    assert!(session.corpus().total_transitions() >= 5);

    let model = session.fit(2, &mut rng).unwrap();
    // The fitted model carries the solved coefficients straight away.
    let fitted = model.cost_params().unwrap().to_array();
    for (got, want) in fitted.iter().zip(CostParams::defaults().to_array()) {
        assert!((got - want).abs() < 1e-6);
    }
    // With costs in place the model can plan.
    let state = RiverState::from_observation(&network, &[1, 3, 2, 3, 1, 2, 3, 1]).unwrap();
    let planned = session.model().unwrap().best_action(&state);
    assert!(planned.is_ok());
}

#[test]
fn evolution_tracks_the_generating_dynamics() {
    let network = four_reach_network();
    let truth = ground_truth(&network);
    let mut rng = StdRng::seed_from_u64(22);

    // Record a handful of episodes under the true dynamics.
    let mut corpus = TrajectoryCorpus::new();
    for _ in 0..4 {
        corpus.start_episode();
        let mut state =
            RiverState::from_observation(&network, &[1, 2, 3, 1, 2, 3, 1, 2]).unwrap();
        corpus.add_state(state.clone());
        for _ in 0..5 {
            let actions = ActionVec::nothing(4);
            let next = truth.sample_next(&state, &actions, &mut rng).unwrap();
            corpus.add_action(actions);
            corpus.add_state(next.clone());
            state = next;
        }
    }

    let config = SearchConfig {
        population_size: 24,
        ..SearchConfig::default()
    };
    let mut search = GeneticSearch::with_config(Arc::clone(&network), config);

    let first = search.evolve(&corpus, 1, &mut rng).unwrap();
    let first_score = search.fitness(&first, &corpus).unwrap();
    let later = search.evolve(&corpus, 5, &mut rng).unwrap();
    let later_score = search.fitness(&later, &corpus).unwrap();

    // Elitism makes the best score non-decreasing across generations.
    assert!(later_score >= first_score - 1e-12);
    // Scores are normalized transition scores.
    assert!((0.0..=1.0).contains(&later_score));
}
