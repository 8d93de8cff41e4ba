//! Errors raised while estimating label noise and fitting on pruned data.
use thiserror::Error;

/// Result type of every fallible learning call in this crate.
pub type LearningResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed inputs: shape mismatch, labels that are not `0, 1, ..., K-1`,
    /// bad option values.
    #[error("Invalid input: {0}")]
    InputValidation(String),
    /// A supplied (or derived) noise matrix is unusable, e.g. its trace
    /// does not exceed 1 or it is singular.
    #[error("Invalid noise matrix: {0}")]
    InvalidNoiseMatrix(String),
    /// Too few examples to cross-validate or to calibrate.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// The estimated fraction of correctly labeled examples of a class is
    /// zero or undefined, so its sample weight would be infinite.
    #[error("Class {class} has estimated self-accuracy {accuracy}; its sample weight is undefined")]
    DegenerateClass { class: usize, accuracy: f64 },
    /// The pluggable classifier failed, or returned a malformed output.
    #[error("Classifier error: {0}")]
    Classifier(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
