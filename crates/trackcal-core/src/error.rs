//! Errors raised while turning raw tracker issues into tasks.
//!
//! Malformed duration tokens and unknown facet fields are not errors: they
//! are tolerated and only reported through tracing.

use thiserror::Error;

/// Why a raw issue could not become a [`crate::task::Task`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {id} has no deadline")]
    MissingDeadline { id: String },

    #[error("task {id}: cannot read {field} value {raw}")]
    InvalidDate {
        id: String,
        field: &'static str,
        raw: String,
    },
}

impl TaskError {
    /// Readable id of the issue that was rejected.
    pub fn task_id(&self) -> &str {
        match self {
            Self::MissingDeadline { id } | Self::InvalidDate { id, .. } => id,
        }
    }
}
