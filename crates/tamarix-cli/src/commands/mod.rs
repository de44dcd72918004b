//! CLI command implementations.

pub mod costs;
pub mod fit;
pub mod simulate;

use anyhow::{Context, Result};
use tamarix_core::prelude::*;

/// Loads a task configuration from a file, or the built-in demo river.
pub fn load_config(path: Option<&str>) -> Result<TaskConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading task configuration {:?}", path))?;
            TaskConfig::parse(&text).with_context(|| format!("parsing {:?}", path))
        }
        // The seven-reach branching river of the original task.
        None => Ok(TaskConfig {
            reach_size: 4,
            discount: 0.9,
            reward_min: -10_000.0,
            reward_max: 0.0,
            budget: 100.0,
            edges: vec![(6, 7), (4, 6), (5, 6), (0, 4), (1, 4), (2, 5), (3, 5)],
        }),
    }
}
