//! Error types for the schedule data sources.

use crate::api::ApiError;
use thiserror::Error;

/// Errors raised by the local and remote schedule sources.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Local storage failure.
    #[error("local storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Backend client failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Embedded JSON column or wire document failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A persisted tag column holds an unknown value.
    #[error("corrupted row: {message}")]
    Corrupt { message: String },

    /// The user-scope identifier is empty; a session error, not transient.
    #[error("target user is empty")]
    EmptyUser,

    /// A date is outside the representable instant range.
    #[error("invalid date: {millis}")]
    InvalidDate { millis: i64 },

    /// A required foreign-key lookup returned nothing. This is corrupted
    /// state, distinct from not-found as a normal outcome.
    #[error("corrupted reference: {entity} {uid} is missing for class {class_uid}")]
    MissingJoin {
        entity: &'static str,
        uid: String,
        class_uid: String,
    },
}

impl ScheduleError {
    /// True for failures that indicate corrupted state rather than an
    /// expected outcome.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ScheduleError::MissingJoin { .. } | ScheduleError::Corrupt { .. }
        )
    }
}
