//! Error types

use thiserror::Error;

/// Errors raised while configuring, building or querying a model.
///
/// Numerically degenerate situations (empty normalizers, zero emissions)
/// are never reported here, they resolve to zero rows or skipped steps.
#[derive(Error, Debug)]
pub enum HmmError {
    #[error("highest order must be 1 or greater, got {0}")]
    InvalidOrder(usize),

    #[error("smoothing parameter must be a non-negative finite number, got {0}")]
    InvalidSmoothing(f64),

    #[error("unknown distribution `{0}`, expected `uniform` or `random`")]
    UnknownDistribution(String),

    #[error("cannot take a suffix of length {requested} from a state of order {order}")]
    SuffixTooLong { requested: usize, order: usize },

    #[error("{single_states} single states at order {order} give more composite states than fit in memory")]
    StateSpaceTooLarge { single_states: usize, order: usize },

    #[error("training pair {index} has {observations} observations but {states} states")]
    MismatchedLengths {
        index: usize,
        observations: usize,
        states: usize,
    },

    #[error("observation {0} is not part of the observation vocabulary")]
    UnknownObservation(String),

    #[error("state {0} is not part of the single-state vocabulary")]
    UnknownState(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for model operations
pub type HmmResult<T> = Result<T, HmmError>;
