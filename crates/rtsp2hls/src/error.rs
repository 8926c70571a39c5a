use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Can not prepare {}: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl TranscodeError {
    pub(crate) fn unavailable<P>(path: P) -> impl FnOnce(std::io::Error) -> Self
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        move |source| Self::ResourceUnavailable { path, source }
    }
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;
