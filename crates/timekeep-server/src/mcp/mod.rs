//! MCP (Model Context Protocol) server implementation.
//!
//! Provides the time tracking tools over stdio for AI assistant
//! integration.

pub mod server;
pub mod tools;

pub use server::TimekeepServer;
