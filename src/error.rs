//! Crate-wide error type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a repack run.
#[derive(Error, Debug)]
pub enum RepackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Input error in '{path}': {message}")]
    Input { path: PathBuf, message: String },

    #[error("Parse error in '{path}' at row {row}: {message}")]
    Parse {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, RepackError>;
