//! Error types for the border routing engine.

use thiserror::Error;

/// Errors surfaced by the routing engine.
///
/// None of these abort the engine; transient failures are retried on the
/// next policy evaluation or the next scheduled transmission.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgs(&'static str),

    #[error("routing manager is not initialized")]
    InvalidState,

    #[error("out of buffers: {0}")]
    NoBufs(&'static str),

    #[error("malformed ND message: {0}")]
    Parse(&'static str),

    #[error("infrastructure interface send failed: {0}")]
    Tx(#[from] std::io::Error),

    #[error("network data publish failed")]
    NetDataPublish,
}

pub type Result<T> = std::result::Result<T, Error>;
