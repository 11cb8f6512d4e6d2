use std::ffi::c_ulong;

use gain_plugin::GainDescriptor;
use spa::{AbiVersion, DescriptorExport, VersionMismatch, ABI_VERSION};
use spa_host::{Host, HostConfig, HostError, LoadedModule, ModuleLoader};

unsafe extern "C" fn ancient_plugin(_index: c_ulong) -> *mut DescriptorExport {
    DescriptorExport::with_versions(
        Box::new(GainDescriptor),
        AbiVersion::new(0, 0, 1),
        AbiVersion::new(0, 0, 1),
    )
}

unsafe extern "C" fn demanding_plugin(_index: c_ulong) -> *mut DescriptorExport {
    DescriptorExport::with_versions(
        Box::new(GainDescriptor),
        AbiVersion::new(9, 0, 0),
        AbiVersion::new(9, 0, 0),
    )
}

unsafe extern "C" fn empty_module(_index: c_ulong) -> *mut DescriptorExport {
    std::ptr::null_mut()
}

#[test]
fn missing_module_is_reported_and_host_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libnothing.so");
    match Host::open(&path, HostConfig::default()) {
        Err(HostError::MissingModule(missing)) => assert_eq!(missing, path),
        other => panic!("unexpected result: {:?}", other.map(|host| host.metadata().clone())),
    }

    let module = unsafe { LoadedModule::from_loader(gain_plugin::spa_descriptor, None, None) };
    assert!(Host::instantiate(module.unwrap(), HostConfig::default()).is_ok());
}

#[test]
fn bare_names_are_looked_up_in_search_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let file_name = ModuleLoader::library_file_name("gain_plugin");
    assert!(file_name.contains("gain_plugin"));
    std::fs::write(dir.path().join(&file_name), b"").unwrap();

    let loader = ModuleLoader::new().with_search_dir(dir.path());
    assert_eq!(
        loader.resolve("gain_plugin").unwrap(),
        dir.path().join(file_name)
    );
    assert!(matches!(
        loader.resolve("reverb"),
        Err(HostError::MissingModule(_))
    ));
}

#[test]
fn garbage_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(ModuleLoader::library_file_name("broken"));
    std::fs::write(&path, b"not a shared object").unwrap();
    assert!(matches!(
        LoadedModule::open(&path),
        Err(HostError::LibraryLoad { .. })
    ));
}

#[cfg(target_os = "linux")]
#[test]
fn library_without_entry_point_is_refused() {
    let libc = [
        "/lib/x86_64-linux-gnu/libc.so.6",
        "/lib/aarch64-linux-gnu/libc.so.6",
        "/usr/lib/libc.so.6",
        "/lib64/libc.so.6",
    ]
    .into_iter()
    .find(|path| std::path::Path::new(path).exists());
    let Some(libc) = libc else {
        return;
    };
    match LoadedModule::open(libc) {
        Err(HostError::MissingSymbol { symbol, .. }) => assert_eq!(symbol, "spa_descriptor"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn old_plugin_is_refused() {
    let err = unsafe { LoadedModule::from_loader(ancient_plugin, None, None) }.unwrap_err();
    match err {
        HostError::Version(VersionMismatch::PluginTooOld { plugin, host_least }) => {
            assert_eq!(plugin, AbiVersion::new(0, 0, 1));
            assert!(host_least <= ABI_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn plugin_requiring_newer_host_is_refused() {
    let err = unsafe { LoadedModule::from_loader(demanding_plugin, None, None) }.unwrap_err();
    assert!(matches!(
        err,
        HostError::Version(VersionMismatch::HostTooOld { .. })
    ));
    assert!(err.to_string().contains("9.0.0"));
}

#[test]
fn null_descriptor_is_an_error() {
    assert!(matches!(
        unsafe { LoadedModule::from_loader(empty_module, None, None) },
        Err(HostError::NullDescriptor(0))
    ));
}
