use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in quizdedup-core.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Database file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Malformed quiz database {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Duplicate record id {0} in collection")]
    DuplicateId(u64),

    #[error("Backup path must differ from the database path: {0}")]
    BackupPathConflict(PathBuf),

    #[error("Backup write to {path} failed: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidInput = 3,
    FileSystemError = 4,
}

impl QuizError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) => ExitCode::NotFound,
            Self::Malformed { .. }
            | Self::NotAnObject { .. }
            | Self::DuplicateId(_)
            | Self::Validation(_)
            | Self::Json(_) => ExitCode::InvalidInput,
            Self::BackupFailed { .. } | Self::Io(_) => ExitCode::FileSystemError,
            Self::BackupPathConflict(_)
            | Self::Config(_)
            | Self::TomlParse(_)
            | Self::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;
