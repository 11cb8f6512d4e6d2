use serde::Serialize;
use spa::{unique_name, AbiVersion, Descriptor, Hoster, License, Properties};

/// Owned snapshot of a descriptor's metadata, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginMetadata {
    pub unique_name: String,
    pub label: String,
    pub name: String,
    pub project: String,
    pub hoster: Hoster,
    pub authors: String,
    pub license: License,
    pub description: String,
    pub version: String,
    pub abi_version: AbiVersion,
    pub ports: Vec<String>,
    pub save_formats: Vec<String>,
    pub save_has: bool,
    pub load_has: bool,
    pub restore_has: bool,
    pub ui_ext: bool,
    pub properties: Properties,
}

impl PluginMetadata {
    pub fn from_descriptor(descriptor: &dyn Descriptor, abi_version: AbiVersion) -> Self {
        let (major, minor, patch) = descriptor.version();
        Self {
            unique_name: unique_name(descriptor, "::"),
            label: descriptor.label().to_owned(),
            name: descriptor.name().to_owned(),
            project: descriptor.project().to_owned(),
            hoster: descriptor.hoster(),
            authors: descriptor.authors().to_owned(),
            license: descriptor.license(),
            description: descriptor.description_line().to_owned(),
            version: format!("{major}.{minor}.{patch}"),
            abi_version,
            ports: descriptor
                .port_names()
                .iter()
                .map(|name| name.as_str().to_owned())
                .collect(),
            save_formats: descriptor
                .save_formats()
                .iter()
                .map(|format| format.as_str().to_owned())
                .collect(),
            save_has: descriptor.save_has(),
            load_has: descriptor.load_has(),
            restore_has: descriptor.restore_has(),
            ui_ext: descriptor.ui_ext(),
            properties: descriptor.properties(),
        }
    }
}
