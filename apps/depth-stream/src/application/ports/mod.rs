//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TransportPort` / `ConnectionPort`: Streaming connection to the feed

mod transport_port;

pub use transport_port::{ConnectionPort, Frame, TransportError, TransportPort};
