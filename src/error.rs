use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VibeError {
    #[error("{}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("project discovery failed: {0}")]
    Discovery(String),

    #[error("invalid model '{0}': expected <provider>/<model_name>")]
    InvalidModel(String),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stage extraction failed: {0}")]
    Extraction(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("invalid arguments: {0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VibeError {
    /// CLI exit code: 2 for environment/transport failures the caller may
    /// retry by re-invoking, 1 for everything the user must fix first.
    pub fn exit_code(&self) -> i32 {
        match self {
            VibeError::Transport(_) | VibeError::MissingCredential(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, VibeError>;
