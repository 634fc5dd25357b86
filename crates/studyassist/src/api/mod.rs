//! Backend-as-a-service HTTP client.
//!
//! Covers authenticated calls with a memoized transport, the tagged request
//! parameter union and its per-mode encodings, document helpers for the
//! remote store, the structured error envelope, and resumable chunked upload.

mod client;
mod config;
mod databases;
mod error;
mod params;
mod upload;

pub use client::{AlwaysOnline, ApiClient, ConnectionChecker, TransferProgress};
pub use config::ApiConfig;
pub use databases::DocumentList;
pub use error::{ApiError, ErrorEnvelope, RemoteErrorKind};
pub use params::{to_json_body, to_query_pairs, InputFile, Param, Params};
pub use upload::{UploadProgress, CHUNK_SIZE};
