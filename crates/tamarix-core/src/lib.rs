//! # Tamarix Core
//!
//! The ecosystem model for a branching river network contested by an invasive
//! plant (tamarisk) and a native species.
//!
//! A river is a rooted tree of *reaches*, each holding a fixed number of
//! habitat slots. Each slot is invaded, native or empty. A management action
//! is chosen per reach each step, and the environment evolves under a
//! stochastic transition model:
//!
//! - **Topology** ([`topology::RiverNetwork`]) — the immutable tree structure,
//!   built once per task from a `(child, parent)` edge list.
//! - **State** ([`state::RiverState`]) — a snapshot of every habitat slot,
//!   materialized from a flat observation vector.
//! - **Model** ([`model::TransitionModel`]) — samples successor states,
//!   scores how well its parameters explain an observed transition, and
//!   prices actions once cost coefficients have been fitted.
//!
//! The fitting machinery (genetic parameter search, cost-coefficient
//! estimation) lives in the `tamarix-learn` crate.

pub mod config;
pub mod error;
pub mod model;
pub mod state;
pub mod topology;
pub mod types;

pub mod prelude;

pub use error::{Error, Result};
