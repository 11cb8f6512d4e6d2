//! Host side of the spa plugin ABI.
//!
//! Loads plugin modules, checks their ABI version, binds their ports to host
//! buffers through [`HostBinder`] and drives processing blocks. Failures are
//! reported as [`HostError`] and never take the host process down.

mod binder;
mod config;
mod error;
mod host;
mod loader;
mod metadata;

pub use binder::{HostBinder, HostPorts};
pub use config::{default_plugin_dir, HostConfig};
pub use error::HostError;
pub use host::Host;
pub use loader::{LoadedModule, ModuleLoader};
pub use metadata::PluginMetadata;
