//! Recover the hidden cost coefficients through active probing.

use anyhow::{bail, Result};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use tamarix_core::prelude::*;
use tamarix_learn::CostEstimator;

pub fn run(config: &TaskConfig, max_steps: usize, seed: u64) -> Result<()> {
    let network = Arc::new(config.build_network()?);
    let mut truth = TransitionModel::new(
        Arc::clone(&network),
        EnvParams::defaults(network.num_reaches()),
    );
    truth.set_cost_params(CostParams::defaults());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut estimator = CostEstimator::new();
    let mut steps = 0usize;
    while !estimator.is_solved() {
        if steps >= max_steps {
            bail!(
                "cost system still rank {} after {} probes",
                estimator.fill(),
                steps
            );
        }
        let observation: Vec<i32> = (0..network.num_habitats())
            .map(|_| rng.gen_range(1..=3))
            .collect();
        let state = RiverState::from_observation(&network, &observation)?;
        let probe = estimator.propose_action(&state);
        let reward = truth.reward(&state, &probe)?;
        let before = estimator.fill();
        estimator.observe(&state, &probe, reward)?;
        steps += 1;
        if estimator.fill() > before {
            println!(
                "{} equation {} after {} probes",
                "→".blue(),
                estimator.fill().to_string().cyan(),
                steps
            );
        }
    }

    let recovered = estimator
        .cost_params()
        .map(CostParams::to_array)
        .unwrap_or_default();
    let wanted = CostParams::defaults().to_array();

    println!();
    println!(
        "{} solved in {} probes",
        "✓".green().bold(),
        steps.to_string().cyan()
    );
    println!("  {:<28} {:>10} {:>10}", "coefficient", "recovered", "true");
    let names = [
        "per invaded habitat",
        "per empty habitat",
        "per invaded reach",
        "eradication (fixed)",
        "restoration (fixed)",
        "eradication (per habitat)",
        "restoration (per habitat)",
        "eradicate-restore (per habitat)",
    ];
    for ((name, got), want) in names.iter().zip(recovered).zip(wanted) {
        println!(
            "  {:<28} {:>10} {:>10}",
            name,
            format!("{:.4}", got).yellow(),
            format!("{:.4}", want).green()
        );
    }
    Ok(())
}
