//! Stereo gain plugin used to exercise spa hosts.
//!
//! The gain starts at zero and is changed by sending `/gain f` on the `osc`
//! port. Other paths are rejected without interrupting processing.

mod plugin;

pub use plugin::{GainPlugin, GainState};

use spa::prelude::*;

pub const PORT_NAMES: [&str; 5] = ["in", "out", "buffersize", "samplecount", "osc"];

#[derive(Debug, Default, Clone, Copy)]
pub struct GainDescriptor;

impl Descriptor for GainDescriptor {
    fn hoster(&self) -> Hoster {
        Hoster::Localhost
    }

    fn organization_url(&self) -> &str {
        ""
    }

    fn project_url(&self) -> &str {
        "spa"
    }

    fn label(&self) -> &str {
        "gain"
    }

    fn project(&self) -> &str {
        "spa"
    }

    fn name(&self) -> &str {
        "Stereo Gain"
    }

    fn authors(&self) -> &str {
        "spa contributors"
    }

    fn license(&self) -> License {
        License::Gpl3
    }

    fn description_line(&self) -> &str {
        "Scales a stereo signal by a gain set over OSC"
    }

    fn port_names(&self) -> SimpleVec<SimpleStr> {
        PORT_NAMES.iter().map(|&name| SimpleStr::from(name)).collect()
    }

    fn instantiate(&self) -> ModuleBox<dyn Plugin> {
        ModuleBox::new(Box::new(GainPlugin::new()))
    }

    fn save_formats(&self) -> SimpleVec<SimpleStr> {
        SimpleVec::from(vec![SimpleStr::from("json")])
    }

    fn save_has(&self) -> bool {
        true
    }

    fn load_has(&self) -> bool {
        true
    }

    fn restore_has(&self) -> bool {
        true
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }

    fn properties(&self) -> Properties {
        Properties {
            realtime_dependency: false,
            hard_rt_capable: true,
        }
    }
}

spa::export_descriptor!(GainDescriptor);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lists_every_port() {
        let descriptor = GainDescriptor;
        let names = descriptor.port_names();
        let names: Vec<&str> = names.as_slice().iter().map(SimpleStr::as_str).collect();
        assert_eq!(names, PORT_NAMES);

        let mut plugin = descriptor.instantiate();
        for name in PORT_NAMES {
            assert!(plugin.port(name).is_ok(), "missing port {name}");
        }
        assert!(matches!(
            plugin.port("sidechain"),
            Err(Error::PortNotFound { .. })
        ));
    }

    #[test]
    fn identification() {
        let descriptor = GainDescriptor;
        assert_eq!(
            spa::unique_name(&descriptor, "/"),
            "localhost/spa/master"
        );
        assert!(descriptor.properties().hard_rt_capable);
        assert!(descriptor.description_line().len() <= 80);
    }

    #[test]
    fn entry_point_only_knows_index_zero() {
        unsafe {
            assert!(spa_descriptor(1).is_null());
            let export = spa_descriptor(0);
            assert!(!export.is_null());
            assert_eq!((*export).abi_version, spa::ABI_VERSION);
            assert_eq!((*export).descriptor().label(), "gain");
            spa::DescriptorExport::release(export);
        }
    }
}
