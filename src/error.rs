//! Error taxonomy for the public API boundary.

use thiserror::Error;

/// Errors surfaced by a caller-initiated operation (`send`, `send_request`,
/// `open`, ...). Background failures (parser resync, reopen attempts) are
/// logged and never reach this type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("timeout reached")]
    Timeout,
    #[error("{0}")]
    Remote(String),
    #[error("port is closed")]
    Closed,
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
