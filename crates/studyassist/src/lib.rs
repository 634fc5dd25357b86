//! Data-access and backend-client layer for the Study Assistant app.
//!
//! This crate covers the plumbing between the feature modules and their data:
//! the generic backend-as-a-service client (authenticated calls, chunked file
//! upload, document helpers), the query/permission string DSLs consumed by the
//! remote document store, realtime channel topics, and the base/custom
//! schedule data sources with their read-time class enrichment.
//!
//! Local storage is embedded SQLite; remote storage is a document store
//! reached through [`api::ApiClient`]. Both schedule sources expose the same
//! operations and return reactive streams that re-emit the full current state
//! on every underlying change.

pub mod api;
pub mod directory;
pub mod permission;
pub mod query;
pub mod realtime;
pub mod schedule;
pub mod watch;

pub use api::{ApiClient, ApiConfig, ApiError};
pub use permission::{Permission, Role};
pub use query::Query;
