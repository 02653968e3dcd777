//! Fatal errors: the environment failures that stop a run immediately.
//!
//! Everything the compiler can recover from (bad regions, unknown
//! variables, buffer pressure) is a [`crate::diagnostic::Diagnostic`]
//! collected into the run report instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {message}")]
    Config { path: PathBuf, message: String },

    #[error("cannot serialize layout manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("too many source files (limit {0})")]
    TooManyFiles(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
