//! Plugin and descriptor contracts, plus the exported entry point.

use std::ffi::{c_ulong, c_void};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::containers::{ModuleBox, SimpleStr, SimpleVec};
use crate::error::Result;
use crate::port::Port;
use crate::ticket::Operation;
use crate::version::{AbiVersion, ABI_VERSION, LEAST_ABI_VERSION};

/// Host-chosen identifier pairing an asynchronous request with its checks,
/// e.g. an increasing counter or a timestamp.
pub type Ticket = u64;

/// One processing unit. Created by [`Descriptor::instantiate`] and driven by
/// the host through [`crate::lifecycle::Instance`].
pub trait Plugin: Send {
    /// The port called `name`, or [`crate::Error::PortNotFound`].
    fn port(&mut self, name: &str) -> Result<&mut dyn Port>;

    /// One processing cycle. Called on the real-time thread: must not
    /// allocate, lock or block.
    fn run(&mut self) -> Result<()>;

    /// Allocate everything that depends on initial ports.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Real-time safe.
    fn activate(&mut self) {}

    fn deactivate(&mut self) {}

    /// Request a save to `path`. Returns whether the request was accepted,
    /// not whether it completed.
    fn save(&mut self, path: &str, ticket: Ticket) -> bool {
        let _ = (path, ticket);
        false
    }

    fn load(&mut self, path: &str, ticket: Ticket) -> bool {
        let _ = (path, ticket);
        false
    }

    /// Reapply saved state unchanged while picking up changed ports.
    fn restore(&mut self, ticket: Ticket) -> bool {
        let _ = ticket;
        false
    }

    fn save_check(&mut self, path: &str, ticket: Ticket) -> bool {
        let _ = (path, ticket);
        false
    }

    fn load_check(&mut self, path: &str, ticket: Ticket) -> bool {
        let _ = (path, ticket);
        false
    }

    fn restore_check(&mut self, ticket: Ticket) -> bool {
        let _ = ticket;
        false
    }

    /// Whether the request for `ticket` finished unsuccessfully, so the host
    /// can stop polling the matching `*_check`.
    fn request_failed(&mut self, operation: Operation, ticket: Ticket) -> bool {
        let _ = (operation, ticket);
        false
    }

    fn ui_ext_show(&mut self, show: bool) {
        let _ = show;
    }

    /// Network port the plugin listens on for remote control, if any.
    fn net_port(&self) -> Option<u16> {
        None
    }

    /// Identifier of the plugin's main window in the window system, if any.
    fn window_id(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum License {
    /// GPL 3.0 or any later version.
    Gpl3,
    Gpl2,
    Lgpl3,
    Lgpl21,
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            License::Gpl3 => "GPL-3.0-or-later",
            License::Gpl2 => "GPL-2.0-or-later",
            License::Lgpl3 => "LGPL-3.0-or-later",
            License::Lgpl21 => "LGPL-2.1-or-later",
        })
    }
}

/// Where the plugin's source is primarily hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hoster {
    /// Not published yet.
    Localhost,
    Github,
    Gitlab,
    Sourceforge,
    /// See [`Descriptor::hoster_other`].
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    /// Output depends on something outside the plugin, e.g. a hardware
    /// device, so it must not be cached or delayed.
    pub realtime_dependency: bool,
    /// No syscalls and no slow algorithms on the processing path.
    pub hard_rt_capable: bool,
}

/// Immutable, process-lifetime metadata and factory for one plugin type.
///
/// `hoster`, `organization_url`, `project_url`, `branch` and `label` together
/// identify the plugin uniquely; see [`unique_name`].
pub trait Descriptor: Send + Sync {
    fn hoster(&self) -> Hoster;

    /// Full URL of the hoster when [`Descriptor::hoster`] is `Other`.
    fn hoster_other(&self) -> &str {
        ""
    }

    fn organization_url(&self) -> &str;

    fn project_url(&self) -> &str;

    fn branch(&self) -> &str {
        "master"
    }

    /// Stable identifier, unique inside the project.
    fn label(&self) -> &str;

    fn project(&self) -> &str;

    fn name(&self) -> &str;

    fn authors(&self) -> &str {
        ""
    }

    fn organizations(&self) -> &str {
        ""
    }

    fn license(&self) -> License;

    /// At most 80 characters.
    fn description_line(&self) -> &str {
        ""
    }

    fn description_full(&self) -> &str {
        ""
    }

    /// Names of the ports the plugin exposes, in binding order.
    fn port_names(&self) -> SimpleVec<SimpleStr>;

    fn instantiate(&self) -> ModuleBox<dyn Plugin>;

    /// File extensions `load` understands.
    fn save_formats(&self) -> SimpleVec<SimpleStr> {
        SimpleVec::new()
    }

    fn save_has(&self) -> bool {
        false
    }

    fn load_has(&self) -> bool {
        false
    }

    fn restore_has(&self) -> bool {
        false
    }

    fn ui_ext(&self) -> bool {
        false
    }

    /// Version of the plugin itself, unrelated to the ABI version.
    fn version(&self) -> (u32, u32, u32) {
        (0, 0, 0)
    }

    fn properties(&self) -> Properties {
        Properties::default()
    }
}

/// World-unique identification string, suitable for save files.
pub fn unique_name(descriptor: &dyn Descriptor, sep: &str) -> String {
    let mut name = String::from(match descriptor.hoster() {
        Hoster::Localhost => "localhost",
        Hoster::Github => "github.com",
        Hoster::Gitlab => "gitlab.com",
        Hoster::Sourceforge => "sourceforge.net",
        Hoster::Other => descriptor.hoster_other(),
    });
    name.push_str(sep);
    if !descriptor.organization_url().is_empty() {
        name.push_str(descriptor.organization_url());
        name.push_str(sep);
    }
    name.push_str(descriptor.project_url());
    name.push_str(sep);
    name.push_str(descriptor.branch());
    name
}

/// Name of the symbol every plugin module exports.
pub const DESCRIPTOR_SYMBOL: &str = "spa_descriptor";

/// Signature of [`DESCRIPTOR_SYMBOL`]. The argument is the plugin index
/// inside the module; only 0 is defined.
pub type DescriptorLoader = unsafe extern "C" fn(index: c_ulong) -> *mut DescriptorExport;

/// Record returned by the entry point.
///
/// The ABI versions are plain data, so a host can run the version check
/// before it touches the descriptor trait object.
#[repr(C)]
pub struct DescriptorExport {
    pub abi_version: AbiVersion,
    pub least_abi_version: AbiVersion,
    descriptor: *mut c_void,
    release: unsafe extern "C" fn(*mut DescriptorExport),
}

unsafe extern "C" fn release_export(export: *mut DescriptorExport) {
    let export = Box::from_raw(export);
    drop(Box::from_raw(
        export.descriptor as *mut ModuleBox<dyn Descriptor>,
    ));
}

impl DescriptorExport {
    /// Leaks a new export record carrying the ABI versions of this crate.
    pub fn new(descriptor: Box<dyn Descriptor>) -> *mut DescriptorExport {
        Self::with_versions(descriptor, ABI_VERSION, LEAST_ABI_VERSION)
    }

    pub fn with_versions(
        descriptor: Box<dyn Descriptor>,
        abi_version: AbiVersion,
        least_abi_version: AbiVersion,
    ) -> *mut DescriptorExport {
        let descriptor = Box::new(ModuleBox::new(descriptor));
        Box::into_raw(Box::new(DescriptorExport {
            abi_version,
            least_abi_version,
            descriptor: Box::into_raw(descriptor).cast(),
            release: release_export,
        }))
    }

    /// # Safety
    /// Only call after the ABI versions were found compatible.
    pub unsafe fn descriptor(&self) -> &dyn Descriptor {
        &**(self.descriptor as *const ModuleBox<dyn Descriptor>)
    }

    /// Frees the record and its descriptor through the module that made them.
    ///
    /// # Safety
    /// `export` must come from a [`DescriptorLoader`] and must not be used
    /// afterwards.
    pub unsafe fn release(export: *mut DescriptorExport) {
        ((*export).release)(export)
    }
}

/// Exports `$descriptor` (an expression evaluating to a [`Descriptor`]) under
/// [`DESCRIPTOR_SYMBOL`].
///
/// ```ignore
/// spa::export_descriptor!(GainDescriptor);
/// ```
#[macro_export]
macro_rules! export_descriptor {
    ($descriptor:expr) => {
        /// Plugin entry point.
        ///
        /// # Safety
        /// The returned record must be released with
        /// `DescriptorExport::release`.
        #[no_mangle]
        pub unsafe extern "C" fn spa_descriptor(
            index: ::std::ffi::c_ulong,
        ) -> *mut $crate::plugin::DescriptorExport {
            if index != 0 {
                return ::std::ptr::null_mut();
            }
            $crate::plugin::DescriptorExport::new(::std::boxed::Box::new($descriptor))
        }
    };
}
