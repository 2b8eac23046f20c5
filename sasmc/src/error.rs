//! Crate-wide error type.

use thiserror::Error;

/// Errors raised by the Monte Carlo engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A run or histogram configuration option is missing or out of range.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// The measured vectors are inconsistent with each other or non-physical.
    #[error("invalid measurement data: {0}")]
    DataInvalid(String),
    /// The normal matrix of the scaling/background fit is not invertible.
    #[error("scaling/background normal equations are ill-conditioned")]
    IllConditioned,
    /// The form-factor kernel failed or produced non-finite values.
    #[error("kernel failure: {0}")]
    KernelFailure(String),
    /// A reloaded repetition disagrees with its stored optimization state.
    #[error("reload mismatch for '{name}': stored {stored:e}, recomputed {computed:e}")]
    ReloadMismatch {
        /// Quantity that failed the consistency check.
        name: String,
        /// Value read back from the result store.
        stored: f64,
        /// Value recomputed from the reloaded ensemble.
        computed: f64,
    },
    /// Two repetitions disagree on the bin edges of a histogram range.
    #[error("bin edges for '{parameter}' differ between repetitions {first} and {second}")]
    BinEdgeMismatch {
        /// Parameter of the affected histogram range.
        parameter: String,
        /// Repetition the edges were taken from.
        first: usize,
        /// Repetition that disagrees.
        second: usize,
    },
    /// The run was cancelled cooperatively.
    #[error("run cancelled")]
    Cancelled,
    /// A path/name pair is missing from the result store.
    #[error("no entry '{name}' under '{path}' in the result store")]
    MissingEntry {
        /// Group path that was looked up.
        path: String,
        /// Entry name that was looked up.
        name: String,
    },
    /// A stored entry has a different type or shape than expected.
    #[error("entry '{name}' under '{path}' has an unexpected type or shape")]
    WrongType {
        /// Group path of the offending entry.
        path: String,
        /// Name of the offending entry.
        name: String,
    },
    /// Underlying I/O failure while reading or writing a result file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Result-file (de)serialization failure.
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

/// Type alias for `Result` with this crate's [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
