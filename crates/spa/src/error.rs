use thiserror::Error;

use crate::containers::SimpleStr;
use crate::lifecycle::State;
use crate::version::VersionMismatch;

/// Type tags carried by [`Error::InvalidArgs`]. Fixed capacity so the error
/// can be raised on the real-time thread.
pub type TypeTags = heapless::String<32>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Version(#[from] VersionMismatch),
    #[error("no port named \"{name}\"")]
    PortNotFound { name: SimpleStr },
    #[error("accessed element {accessed}, but the size is only {size}")]
    OutOfRange { accessed: usize, size: usize },
    #[error("framed channel contains corrupted data: frame needs {expected} bytes, {available} available")]
    CorruptedChannel { expected: usize, available: usize },
    #[error("invalid args \"{found}\" supplied to port \"{port}\"")]
    InvalidArgs {
        port: &'static str,
        found: TypeTags,
    },
    #[error("malformed control message: {0}")]
    Malformed(&'static str),
    #[error("port kind is not supported by this binder")]
    UnsupportedPort,
    #[error("initial port needs a concrete value from the host")]
    InitialUnbound,
    #[error("port \"{name}\" must be bound before init")]
    Unbound { name: SimpleStr },
    #[error("binding rejected: {0}")]
    Rejected(&'static str),
    #[error("cannot {operation} a plugin that is {state}")]
    InvalidTransition {
        state: State,
        operation: &'static str,
    },
    #[error("plugin panicked during {0}")]
    Panicked(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds [`Error::InvalidArgs`] without allocating; tags beyond the
    /// fixed capacity are cut off.
    pub fn invalid_args(port: &'static str, found: &str) -> Self {
        let mut tags = TypeTags::new();
        for tag in found.chars() {
            if tags.push(tag).is_err() {
                break;
            }
        }
        Error::InvalidArgs { port, found: tags }
    }

    /// Errors after which the instance's control stream or state can no
    /// longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorruptedChannel { .. } | Error::Panicked(_)
        )
    }
}

/// A port failed to bind during instantiation.
#[derive(Debug, Error)]
#[error("failed to bind port \"{port}\": {source}")]
pub struct BindError {
    pub port: String,
    #[source]
    pub source: Error,
}

impl BindError {
    pub fn new(port: impl Into<String>, source: Error) -> Self {
        Self {
            port: port.into(),
            source,
        }
    }
}
