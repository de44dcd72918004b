//! Fit transition parameters to a synthetic corpus.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use tamarix_core::prelude::*;
use tamarix_learn::genetic::SearchConfig;
use tamarix_learn::{GeneticSearch, TrajectoryCorpus};

pub fn run(
    config: &TaskConfig,
    generations: u64,
    population: usize,
    episodes: usize,
    out: Option<&str>,
    seed: u64,
) -> Result<()> {
    let network = Arc::new(config.build_network()?);
    let truth = EnvParams::defaults(network.num_reaches());
    let model = TransitionModel::new(Arc::clone(&network), truth.clone());
    let mut rng = StdRng::seed_from_u64(seed);

    println!(
        "{} recording {} episodes under hidden dynamics...",
        "→".blue(),
        episodes.to_string().cyan()
    );
    let corpus = record_corpus(&model, &network, episodes, &mut rng)?;
    println!(
        "  {} transitions recorded",
        corpus.total_transitions().to_string().cyan()
    );

    let search_config = SearchConfig {
        population_size: population,
        ..SearchConfig::default()
    };
    let mut search = GeneticSearch::with_config(Arc::clone(&network), search_config);

    let pb = ProgressBar::new(generations);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} generations")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut best = search.evolve(&corpus, 0, &mut rng)?;
    for _ in 0..generations {
        best = search.evolve(&corpus, 1, &mut rng)?;
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let score = search.fitness(&best, &corpus)?;
    let fitted = EnvParams::from_genes(best.genes(), network.num_reaches())?;

    println!();
    println!(
        "{} best fitness {} after {} generations",
        "✓".green().bold(),
        format!("{:.4}", score).green(),
        search.generation()
    );
    println!("  {:<22} {:>8} {:>8}", "parameter", "fitted", "true");
    for (name, got, want) in [
        ("endogenous invasive", fitted.endo_invasive, truth.endo_invasive),
        ("upstream rate", fitted.upstream_rate, truth.upstream_rate),
        ("downstream rate", fitted.downstream_rate, truth.downstream_rate),
        ("eradication rate", fitted.eradication_rate, truth.eradication_rate),
        ("restoration rate", fitted.restoration_rate, truth.restoration_rate),
        ("invaded death rate", fitted.death_rate_invaded, truth.death_rate_invaded),
        ("native death rate", fitted.death_rate_native, truth.death_rate_native),
    ] {
        println!(
            "  {:<22} {:>8} {:>8}",
            name,
            format!("{:.4}", got).yellow(),
            format!("{:.4}", want).green()
        );
    }
    println!(
        "  {:<22} {}",
        "parameter distance",
        format!("{:.4}", fitted.distance(&truth)).cyan()
    );

    if let Some(path) = out {
        std::fs::write(path, serde_json::to_string_pretty(&fitted)?)?;
        println!("  fitted parameters written to {}", path.cyan());
    }
    Ok(())
}

/// Records episodes under the hidden model, mixing in random management so
/// the corpus covers the action-dependent rates.
fn record_corpus(
    model: &TransitionModel,
    network: &Arc<RiverNetwork>,
    episodes: usize,
    rng: &mut StdRng,
) -> Result<TrajectoryCorpus> {
    let mut corpus = TrajectoryCorpus::new();
    for _ in 0..episodes {
        corpus.start_episode();
        let mut state = random_state(network, rng)?;
        corpus.add_state(state.clone());
        for _ in 0..10 {
            let actions = random_actions(&state, rng);
            let next = model.sample_next(&state, &actions, rng)?;
            corpus.add_action(actions);
            corpus.add_state(next.clone());
            state = next;
        }
    }
    Ok(corpus)
}

fn random_state(network: &Arc<RiverNetwork>, rng: &mut StdRng) -> Result<RiverState> {
    let observation: Vec<i32> = (0..network.num_habitats())
        .map(|_| rng.gen_range(1..=3))
        .collect();
    Ok(RiverState::from_observation(network, &observation)?)
}

fn random_actions(state: &RiverState, rng: &mut StdRng) -> ActionVec {
    let actions = state
        .reaches()
        .iter()
        .map(|reach| {
            let valid = reach.valid_actions();
            valid[rng.gen_range(0..valid.len())]
        })
        .collect();
    ActionVec(actions)
}
