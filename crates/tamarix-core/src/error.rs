//! Error types for Tamarix operations.
//!
//! Provides structured error handling instead of panics.

use std::error::Error as StdError;
use std::fmt;

/// Result type for Tamarix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying the ecosystem model.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The edge list does not describe a single rooted tree.
    MalformedTopology(String),
    /// An observation vector's length does not match the network.
    ObservationSize { expected: usize, actual: usize },
    /// A raw observation value is not a known habitat encoding.
    InvalidHabitat(i32),
    /// A raw action value is outside the 0-3 range.
    InvalidAction(i32),
    /// Cost queries were made before cost coefficients were fitted.
    ParametersNotSet,
    /// The final cost equation system is numerically near-singular.
    IllConditionedSystem(String),
    /// A fitting run was requested on an empty or too-small corpus.
    InsufficientData(String),
    /// A gene vector does not match the model's parameter layout.
    InvalidChromosome { expected: usize, actual: usize },
    /// The task configuration string could not be parsed.
    MalformedConfig(String),
    /// Serializing or deserializing model data failed.
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedTopology(msg) => write!(f, "Malformed topology: {}", msg),
            Error::ObservationSize { expected, actual } => write!(
                f,
                "Observation size mismatch: expected {} habitat values, got {}",
                expected, actual
            ),
            Error::InvalidHabitat(v) => write!(f, "Invalid habitat value: {}", v),
            Error::InvalidAction(v) => write!(f, "Invalid action value: {}", v),
            Error::ParametersNotSet => {
                write!(f, "Cost parameters have not been fitted yet")
            }
            Error::IllConditionedSystem(msg) => {
                write!(f, "Cost equation system is ill-conditioned: {}", msg)
            }
            Error::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            Error::InvalidChromosome { expected, actual } => write!(
                f,
                "Chromosome length mismatch: expected {} genes, got {}",
                expected, actual
            ),
            Error::MalformedConfig(msg) => write!(f, "Malformed task configuration: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl StdError for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
