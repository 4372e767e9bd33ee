//! Error handling for CTD extraction and aggregation.
//!
//! Archive-scoped failures (unreadable archives, unknown column layouts) are
//! contained by the aggregator and turned into skipped archives. Everything
//! else surfaces to the caller and aborts the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input folder not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Archive '{archive_id}' could not be read: {reason}")]
    ArchiveRead { archive_id: String, reason: String },

    #[error("No registered layout for '{member}' in archive '{archive_id}': {reason}")]
    UnknownLayout {
        archive_id: String,
        member: String,
        reason: String,
    },

    #[error("Output could not be written to {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CtdError {
    /// Create an archive read error from any displayable cause
    pub fn archive_read(archive_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::ArchiveRead {
            archive_id: archive_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an unknown layout error for one archive member
    pub fn unknown_layout(
        archive_id: impl Into<String>,
        member: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnknownLayout {
            archive_id: archive_id.into(),
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// Create an output write error for a destination path
    pub fn output_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure only invalidates the archive it came from.
    pub fn is_archive_scoped(&self) -> bool {
        matches!(
            self,
            CtdError::ArchiveRead { .. } | CtdError::UnknownLayout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CtdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_scoped_classification() {
        assert!(CtdError::archive_read("pacific", "bad zip").is_archive_scoped());
        assert!(CtdError::unknown_layout("pacific", "a.csv", "no header").is_archive_scoped());
        assert!(!CtdError::output_write("/tmp/x.csv", "denied").is_archive_scoped());
        assert!(
            !CtdError::Configuration {
                message: "bad".to_string()
            }
            .is_archive_scoped()
        );
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = CtdError::unknown_layout("indian", "cast_01.csv", "no column header line");
        let message = err.to_string();
        assert!(message.contains("indian"));
        assert!(message.contains("cast_01.csv"));
    }
}
