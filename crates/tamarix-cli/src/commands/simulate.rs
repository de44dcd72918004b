//! Roll a ground-truth model forward and print the invasion front.

use anyhow::Result;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use tamarix_core::prelude::*;

pub fn run(config: &TaskConfig, steps: u64, manage: bool, seed: u64) -> Result<()> {
    let network = Arc::new(config.build_network()?);
    let mut model = TransitionModel::new(
        Arc::clone(&network),
        EnvParams::defaults(network.num_reaches()),
    );
    model.set_cost_params(CostParams::defaults());
    let mut rng = StdRng::seed_from_u64(seed);

    println!(
        "{} {} reaches, {} habitats each, budget {}",
        "river".green().bold(),
        network.num_reaches(),
        network.reach_size(),
        network.budget()
    );

    let mut state = RiverState::from_observation(&network, &initial_observation(&network))?;
    println!("  start  {}", render(&state));

    for step in 1..=steps {
        let actions = if manage {
            management_action(&state)
        } else {
            ActionVec::nothing(network.num_reaches())
        };
        let reward = model.reward(&state, &actions)?;
        state = model.sample_next(&state, &actions, &mut rng)?;
        println!(
            "  {:>4}   {}  reward {}",
            step,
            render(&state),
            format!("{:8.2}", reward).yellow()
        );
    }

    println!();
    println!(
        "{} {} of {} habitats invaded after {} steps",
        "done".green().bold(),
        state.total_invaded().to_string().red(),
        network.num_habitats(),
        steps
    );
    Ok(())
}

/// Invasion seeded at the root reach, natives and bare ground downstream.
fn initial_observation(network: &RiverNetwork) -> Vec<i32> {
    let mut observation = Vec::with_capacity(network.num_habitats());
    for reach in 0..network.num_reaches() {
        for slot in 0..network.reach_size() {
            let cell = if reach == network.root_reach() {
                HabitatCell::Invaded
            } else if slot % 2 == 0 {
                HabitatCell::Native
            } else {
                HabitatCell::Empty
            };
            observation.push(cell.to_raw());
        }
    }
    observation
}

/// Eradicate-and-restore wherever the invader has taken hold.
fn management_action(state: &RiverState) -> ActionVec {
    let mut actions = Vec::with_capacity(state.num_reaches());
    for reach in state.reaches() {
        if reach.invaded_count > 0 {
            actions.push(ReachAction::EradicateRestore);
        } else {
            actions.push(ReachAction::Nothing);
        }
    }
    ActionVec(actions)
}

fn render(state: &RiverState) -> String {
    let mut out = String::new();
    for (i, reach) in state.reaches().iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        for habitat in &reach.habitats {
            let glyph = match habitat {
                HabitatCell::Invaded => "I".red().to_string(),
                HabitatCell::Native => "N".green().to_string(),
                HabitatCell::Empty => ".".dimmed().to_string(),
            };
            out.push_str(&glyph);
        }
    }
    out
}
