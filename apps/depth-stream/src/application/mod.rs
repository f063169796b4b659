//! Application Layer - Port definitions.
//!
//! The contracts that the stream session depends on, kept separate from
//! the adapters that implement them so the session can be driven by a
//! scripted transport in tests.

/// Port interfaces for external systems (streaming transport).
pub mod ports;
