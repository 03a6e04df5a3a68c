//! Settings error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection '{0}' not found")]
    NotFound(String),
    #[error("connection '{0}' already exists")]
    DuplicateId(String),
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("no data directory could be determined for this user")]
    NoDataDir,
}

impl SettingsError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl From<SettingsError> for String {
    fn from(e: SettingsError) -> String {
        e.to_string()
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;
