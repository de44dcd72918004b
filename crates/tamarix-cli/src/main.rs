//! Tamarix CLI - simulate, fit and probe river invasion models.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tamarix")]
#[command(author, version, about = "River-network invasive species toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Task configuration file (keyword format); a demo river when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Seed for all random draws
    #[arg(long, global = true, default_value = "42")]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll a ground-truth model forward and print each state
    Simulate {
        /// Number of steps to simulate
        #[arg(short, long, default_value = "20")]
        steps: u64,

        /// Eradicate-and-restore the most invaded reach each step
        #[arg(short, long)]
        manage: bool,
    },

    /// Fit transition parameters to a synthetic corpus with the genetic search
    Fit {
        /// Generations to evolve
        #[arg(short, long, default_value = "50")]
        generations: u64,

        /// Population size
        #[arg(short, long, default_value = "200")]
        population: usize,

        /// Recorded episodes in the synthetic corpus
        #[arg(short, long, default_value = "10")]
        episodes: usize,

        /// Write the fitted parameters to a JSON file
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Recover the hidden cost coefficients through active probing
    Costs {
        /// Maximum probing steps before giving up
        #[arg(short, long, default_value = "200")]
        max_steps: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { steps, manage } => {
            commands::simulate::run(&config, steps, manage, cli.seed)
        }
        Commands::Fit {
            generations,
            population,
            episodes,
            out,
        } => commands::fit::run(&config, generations, population, episodes, out.as_deref(), cli.seed),
        Commands::Costs { max_steps } => commands::costs::run(&config, max_steps, cli.seed),
    }
}
