//! Promstat Core - Shared types for out-of-process web server metrics
//!
//! This crate provides the domain types shared between the wire protocol
//! (promstat-protocol) and the aggregation daemon (promstatd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod schema;
pub mod scope;

// Re-exports for convenience
pub use config::{StatusConfig, DEFAULT_NAMESPACE, DEFAULT_SOCKET_TIMEOUT_SECS};
pub use error::{SchemaError, SchemaResult};
pub use schema::{Buckets, LabelNames, DEFAULT_SIZE_BUCKETS, DEFAULT_TIME_BUCKETS};
pub use scope::MetricScope;
