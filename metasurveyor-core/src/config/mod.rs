//! Configuration types consumed by the engine.
//!
//! - `ConnectionConfig`: where a collector connects (no credentials)
//! - `EngineConfig`: retry, matching and statistics settings loaded from JSON
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords or credentials.
//! Drivers obtain secrets through their own channels.

mod connection;
mod engine;

pub use connection::ConnectionConfig;
pub use engine::EngineConfig;
