use std::{io, path::PathBuf};

use thiserror::Error;

/// Input rejected before any worker is spawned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid URL.")]
    EmptyUrl,
}

/// Anything that went wrong inside the fetch/transcode pipeline
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to capture {0} of the fetch engine")]
    MissingPipe(&'static str),

    #[error("I/O error while talking to the fetch engine: {0}")]
    Io(#[from] io::Error),

    #[error("{detail}")]
    Exited { code: Option<i32>, detail: String },

    #[error("download cancelled")]
    Cancelled,
}

/// The transcode tool could not be made reachable
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("ffmpeg not found on PATH nor in {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
