use thiserror::Error;

/// Stable category of an [`Error`], for callers that map failures to
/// transport-level responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BackendUnavailable,
    Input,
    Io,
    Serialization,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Rendering backend unavailable ({component}): {source}")]
    BackendUnavailable {
        component: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid input: {0}")]
    Input(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write document: {0}")]
    Serialization(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::Input(_) => ErrorKind::Input,
            Error::Io(_) => ErrorKind::Io,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
