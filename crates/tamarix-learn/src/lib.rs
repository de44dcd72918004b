//! # Tamarix Learn
//!
//! Fits the two classes of unknowns in the river ecosystem from observed
//! experience:
//!
//! - [`genetic`] — a population-based search over the transition model's
//!   parameter space, scored against a [`corpus`] of recorded trajectories.
//! - [`cost`] — an active experiment designer that picks probing actions
//!   keeping an 8x8 equation system linearly independent, then solves it
//!   exactly for the management-cost coefficients.
//! - [`session`] — glue that records trajectories, proposes probes and
//!   hands back a fully parameterized model, honoring the caller's
//!   freeze/unfreeze mode flags.

pub mod corpus;
pub mod cost;
pub mod genetic;
pub mod linalg;
pub mod session;

pub use corpus::TrajectoryCorpus;
pub use cost::CostEstimator;
pub use genetic::GeneticSearch;
pub use session::LearnerSession;
