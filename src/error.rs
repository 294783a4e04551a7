use std::fmt;

use crate::config::TOKEN_LENGTH;

/// Errors are `Clone` so a single coalesced fetch result can be handed to
/// every waiter of that fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Connection(String),
    Authentication,
    Timeout,
    UnknownDevice(String),
    UnsupportedCommand { device_id: String, command: String },
    InvalidToken(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(msg) => write!(f, "connection error: {msg}"),
            Error::Authentication => write!(f, "authentication error: gateway rejected the token"),
            Error::Timeout => write!(f, "refresh timeout (no response from gateway)"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
            Error::UnsupportedCommand { device_id, command } => {
                write!(f, "device {device_id} does not support {command}")
            }
            Error::InvalidToken(len) => {
                write!(f, "invalid token length: {len} (expected {TOKEN_LENGTH})")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
