//! CMJ-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, JanitorError>;

/// Top-level error type for chat-media-janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    #[error("[CMJ-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[CMJ-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[CMJ-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[CMJ-2001] disk usage query failure for {path}: {details}")]
    DiskQuery { path: PathBuf, details: String },

    #[error("[CMJ-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[CMJ-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[CMJ-3001] candidate store unavailable: {details}")]
    StoreUnavailable { details: String },

    #[error("[CMJ-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CMJ-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl JanitorError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "CMJ-1001",
            Self::MissingConfig { .. } => "CMJ-1002",
            Self::ConfigParse { .. } => "CMJ-1003",
            Self::DiskQuery { .. } => "CMJ-2001",
            Self::Serialization { .. } => "CMJ-2101",
            Self::Sql { .. } => "CMJ-2102",
            Self::StoreUnavailable { .. } => "CMJ-3001",
            Self::Io { .. } => "CMJ-3002",
            Self::Runtime { .. } => "CMJ-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiskQuery { .. }
                | Self::Sql { .. }
                | Self::StoreUnavailable { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for JanitorError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for JanitorError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for JanitorError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<JanitorError> {
        vec![
            JanitorError::InvalidConfig {
                details: String::new(),
            },
            JanitorError::MissingConfig {
                path: PathBuf::new(),
            },
            JanitorError::ConfigParse {
                context: "",
                details: String::new(),
            },
            JanitorError::DiskQuery {
                path: PathBuf::new(),
                details: String::new(),
            },
            JanitorError::Serialization {
                context: "",
                details: String::new(),
            },
            JanitorError::Sql {
                context: "",
                details: String::new(),
            },
            JanitorError::StoreUnavailable {
                details: String::new(),
            },
            JanitorError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            JanitorError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_cmj_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("CMJ-"),
                "code {} must start with CMJ-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = JanitorError::DiskQuery {
            path: PathBuf::from("/srv/media"),
            details: "not a mount".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("CMJ-2001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("/srv/media"),
            "display should contain the path: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            JanitorError::StoreUnavailable {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            JanitorError::DiskQuery {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !JanitorError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !JanitorError::MissingConfig {
                path: PathBuf::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = JanitorError::io(
            "/state/retention_last.fp",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "CMJ-3002");
        assert!(err.to_string().contains("retention_last.fp"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: JanitorError = json_err.into();
        assert_eq!(err.code(), "CMJ-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: JanitorError = toml_err.into();
        assert_eq!(err.code(), "CMJ-1003");
    }
}
