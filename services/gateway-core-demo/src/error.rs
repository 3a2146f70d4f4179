//! Service-specific error types

use thiserror::Error;

/// Errors surfaced by the demonstration binary's own plumbing — config
/// loading. Listener-bind failures are reported via `anyhow` context at
/// the call site in `main`, and core request failures are
/// `gateway_core::CoreError`, rendered separately by the
/// `/internal/drive` handler.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
