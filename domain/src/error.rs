//! Errors raised while loading scenario files

use std::path::PathBuf;

use parley_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML domain file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON domain file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported domain file {0}; expected a .toml or .json extension")]
    UnsupportedFormat(PathBuf),

    #[error("invalid preference profile: {0}")]
    Profile(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, DomainFileError>;
