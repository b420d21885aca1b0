//! Error types for the fatal paths: data file and report output.
//!
//! Per-entry network and parse failures are not errors here; they travel as
//! values inside probe results and reports.

use std::path::PathBuf;
use thiserror::Error;

/// Failures loading or saving the navigation data file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unexpected layout in {path}: {message}")]
    Shape { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data file: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Failures persisting a rendered report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to create results directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}
