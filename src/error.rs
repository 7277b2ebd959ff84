use std::path::PathBuf;

use thiserror::Error;

use crate::subprocess::ProcessError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("FITS error in {path}: {message}")]
    Fits { path: PathBuf, message: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("External command failed: {0}")]
    Process(#[from] ProcessError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Remote copy error: {0}")]
    Remote(String),

    #[error("Astronomy error: {0}")]
    Astronomy(String),
}

impl Error {
    pub fn fits(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Fits {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Connection-level failures that a bounded retry may clear.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(e) => e.is_connect() || e.is_timeout(),
            Error::Http(msg) => msg.contains("429") || msg.starts_with('5'),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
