//! Error types for the backend API client.

use serde::Deserialize;
use thiserror::Error;

/// Named failure kinds mapped from the HTTP status of a remote error
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    BadRequest,
    Unauthorized,
    InsufficientBalance,
    PermissionDenied,
    NotFound,
    Unprocessable,
    RateLimited,
    Internal,
    Overloaded,
    Unexpected,
}

impl RemoteErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => RemoteErrorKind::BadRequest,
            401 => RemoteErrorKind::Unauthorized,
            402 => RemoteErrorKind::InsufficientBalance,
            403 => RemoteErrorKind::PermissionDenied,
            404 => RemoteErrorKind::NotFound,
            422 => RemoteErrorKind::Unprocessable,
            429 => RemoteErrorKind::RateLimited,
            500 => RemoteErrorKind::Internal,
            529 => RemoteErrorKind::Overloaded,
            _ => RemoteErrorKind::Unexpected,
        }
    }

    /// Kinds that a caller may reasonably retry. No retry happens at this
    /// layer; retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteErrorKind::RateLimited | RemoteErrorKind::Internal | RemoteErrorKind::Overloaded
        )
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RemoteErrorKind::BadRequest => "bad request",
            RemoteErrorKind::Unauthorized => "unauthorized",
            RemoteErrorKind::InsufficientBalance => "insufficient balance",
            RemoteErrorKind::PermissionDenied => "permission denied",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Unprocessable => "unprocessable entity",
            RemoteErrorKind::RateLimited => "rate limited, retry later",
            RemoteErrorKind::Internal => "internal error, retry later",
            RemoteErrorKind::Overloaded => "overloaded, retry later",
            RemoteErrorKind::Unexpected => "unexpected error",
        };
        f.write_str(text)
    }
}

/// Wire form of the backend error envelope returned with non-success
/// statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u16,
    #[serde(rename = "type", default)]
    pub error_type: String,
}

/// Errors that can occur during backend client operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connectivity is absent; raised before any network attempt and never
    /// retried automatically.
    #[error("offline: network connectivity is unavailable")]
    Offline,

    /// Transport-level failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// Caller-contract violation, raised synchronously before any I/O.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The backend returned a structured error envelope.
    #[error("remote error ({kind}, status {code}): {message}")]
    Remote {
        kind: RemoteErrorKind,
        code: u16,
        error_type: String,
        message: String,
    },

    /// A response body did not match the caller-supplied schema.
    #[error("decode error: {message}")]
    Decode { message: String },
}

impl ApiError {
    pub fn remote(status: u16, envelope: ErrorEnvelope) -> Self {
        ApiError::Remote {
            kind: RemoteErrorKind::from_status(status),
            code: status,
            error_type: envelope.error_type,
            message: envelope.message,
        }
    }

    /// True for failures a caller may retry: transient transport errors and
    /// the retry-advisable remote kinds.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } => true,
            ApiError::Remote { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidArgument {
            message: format!("invalid endpoint URL: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RemoteErrorKind::from_status(400), RemoteErrorKind::BadRequest);
        assert_eq!(RemoteErrorKind::from_status(401), RemoteErrorKind::Unauthorized);
        assert_eq!(
            RemoteErrorKind::from_status(402),
            RemoteErrorKind::InsufficientBalance
        );
        assert_eq!(
            RemoteErrorKind::from_status(403),
            RemoteErrorKind::PermissionDenied
        );
        assert_eq!(RemoteErrorKind::from_status(404), RemoteErrorKind::NotFound);
        assert_eq!(RemoteErrorKind::from_status(422), RemoteErrorKind::Unprocessable);
        assert_eq!(RemoteErrorKind::from_status(429), RemoteErrorKind::RateLimited);
        assert_eq!(RemoteErrorKind::from_status(500), RemoteErrorKind::Internal);
        assert_eq!(RemoteErrorKind::from_status(529), RemoteErrorKind::Overloaded);
        assert_eq!(RemoteErrorKind::from_status(418), RemoteErrorKind::Unexpected);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ApiError::remote(429, ErrorEnvelope::default()).is_retryable());
        assert!(ApiError::remote(500, ErrorEnvelope::default()).is_retryable());
        assert!(ApiError::remote(529, ErrorEnvelope::default()).is_retryable());
        assert!(!ApiError::remote(404, ErrorEnvelope::default()).is_retryable());
        assert!(!ApiError::Offline.is_retryable());
    }

    #[test]
    fn test_envelope_decoding() {
        let envelope: ErrorEnvelope = serde_json::from_str(
            r#"{"message":"Document not found","code":404,"type":"document_not_found"}"#,
        )
        .unwrap();
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.error_type, "document_not_found");
    }
}
