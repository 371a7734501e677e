//! timekeep-core - Core library for Timekeep
//!
//! This crate provides the in-memory time tracking engine shared by the
//! Timekeep MCP server:
//!
//! - **model**: Session and TaskRecord entities
//! - **registry**: concurrency-safe session store and lifecycle operations
//! - **retention**: age/inactivity expiry policy
//! - **cleanup**: periodic background sweep
//! - **clock**: monotonic tick source for durations
//! - **timezone**: timezone identifier resolution
//! - **format**: human-readable duration formatting

pub mod cleanup;
pub mod clock;
pub mod error;
pub mod format;
pub mod model;
pub mod registry;
pub mod retention;
pub mod timezone;

// Re-export commonly used types
pub use error::{Error, Result};
pub use model::{Session, TaskRecord, TaskStatus};
pub use registry::SessionRegistry;
