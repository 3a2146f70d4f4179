//! Ties the identity pool, credential exchanger, and upstream driver
//! together into the single entry point the rest of the gateway calls:
//! hand it a protobuf-encoded payload, get back decoded text or a typed,
//! categorized failure.

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{CoreError, Result};
