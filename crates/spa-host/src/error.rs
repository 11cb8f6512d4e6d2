use std::path::PathBuf;

use spa::{BindError, VersionMismatch};
use thiserror::Error;

/// Errors that can occur while loading or driving a plugin. None of them is
/// fatal to the host process.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("plugin module not found at {0}")]
    MissingModule(PathBuf),
    #[error("failed to load plugin module {path}: {source}")]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("{path} does not export `{symbol}`: {source}")]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("plugin module returned no descriptor for index {0}")]
    NullDescriptor(u64),
    #[error(transparent)]
    Version(#[from] VersionMismatch),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("plugin error: {0}")]
    Plugin(#[from] spa::Error),
    #[error("plugin exposes no control input channel")]
    NoControlChannel,
    #[error("invalid host configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
