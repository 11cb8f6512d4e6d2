use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::HostError;

/// Host settings, read from a JSON file. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Frames per block, bound to the plugin's buffer size port.
    pub block_size: u32,
    pub sample_rate: i64,
    /// Largest encoded control message the host will send or accept.
    pub max_message: usize,
    /// Ring size for channel ports that leave the choice to the host by
    /// declaring a capacity of zero.
    pub channel_capacity: usize,
    /// How long `save`/`load`/`restore` wait for the plugin to finish.
    pub ticket_timeout_ms: u64,
    /// Where bare module names are looked up. Defaults to
    /// [`default_plugin_dir`].
    pub plugin_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            block_size: 10,
            sample_rate: 48_000,
            max_message: spa::port::DEFAULT_MAX_MESSAGE,
            channel_capacity: 4096,
            ticket_timeout_ms: 5_000,
            plugin_dir: None,
        }
    }
}

impl HostConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn plugin_dir(&self) -> Option<PathBuf> {
        self.plugin_dir.clone().or_else(default_plugin_dir)
    }
}

/// Per-user plugin directory, e.g. `~/.local/share/spa/plugins` on Linux.
pub fn default_plugin_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("spa").join("plugins"))
}
