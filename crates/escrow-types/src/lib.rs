//! Common types module for the Micro-Job escrow service.
//!
//! This module defines the core data types and structures shared by the
//! escrow state machine, the storage layer and the HTTP API. Keeping them
//! in one crate ensures every component agrees on the shape of an order
//! and on the wire format of requests and responses.

/// Actor identity and role types for transition authorization.
pub mod actor;
/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order lifecycle types including status, settlement and dispute outcomes.
pub mod order;

// Re-export all types for convenient access
pub use actor::*;
pub use api::*;
pub use order::*;
