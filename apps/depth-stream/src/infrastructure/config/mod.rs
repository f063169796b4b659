//! Configuration Module
//!
//! Configuration loading for the depth stream client.

mod settings;

pub use settings::{ClientSettings, ConfigError, DEFAULT_SYMBOL, ReconnectSettings};
