//! Domain Layer - Core types with no I/O.
//!
//! Market data values and the session state vocabulary. All types here
//! are pure Rust with serialization support.

/// Order book depth update types.
pub mod order_book;

/// Connection lifecycle phases and close reasons.
pub mod session;
