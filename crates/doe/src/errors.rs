use std::path::PathBuf;
use thiserror::Error;

/// A result type for design of experiments
pub type Result<T> = std::result::Result<T, DoeError>;

/// An error when building or emitting a design of experiments
#[derive(Error, Debug)]
pub enum DoeError {
    /// When sampling parameters or factor definitions are invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// When no NOLH table can handle the requested number of factors
    #[error(
        "No NOLH table for {factors} factors: built-in tables handle at most {largest} factors, \
         provide an external table with at least {factors} columns"
    )]
    NoNolhTable {
        /// Requested number of factors
        factors: usize,
        /// Largest number of factors handled by built-in tables
        largest: usize,
    },
    /// When an external NOLH table file cannot be read
    #[error("Cannot read NOLH table {path:?}: {reason}")]
    MissingTable {
        /// Table file
        path: PathBuf,
        /// Underlying read failure
        reason: String,
    },
    /// When an external NOLH table file is rejected
    #[error("Malformed NOLH table {path:?} at line {line}: {reason}")]
    MalformedTable {
        /// Table file
        path: PathBuf,
        /// 1-based line number of the offending row
        line: usize,
        /// What is wrong with the row
        reason: String,
    },
    /// When the configuration collaborator fails to persist an experiment
    #[error("Cannot persist configuration #{index}: {reason}")]
    Persist {
        /// Index of the experiment being persisted
        index: usize,
        /// Failure reported by the collaborator
        reason: String,
    },
    /// When a stop was requested while a design was being computed
    #[error("Design computation cancelled")]
    Cancelled,
    /// When IO fails
    #[error("IO error")]
    Io(#[from] std::io::Error),
    /// When design table reading or writing fails
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// When a `linfa` error occurs
    #[error(transparent)]
    Linfa(#[from] linfa::error::Error),
}

impl DoeError {
    /// Whether the error only reflects a cooperative stop request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DoeError::Cancelled)
    }
}
