use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use spa::plugin::{DescriptorLoader, DESCRIPTOR_SYMBOL};
use spa::version::check_plugin;
use spa::{AbiVersion, Descriptor, DescriptorExport};

use crate::HostError;

/// Finds plugin modules by path or by bare name in a list of directories.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    search_dirs: Vec<PathBuf>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Platform file name of the module called `name`, e.g.
    /// `libgain_plugin.so` on Linux.
    pub fn library_file_name(name: &str) -> String {
        format!("{DLL_PREFIX}{name}{DLL_SUFFIX}")
    }

    /// An existing path is used as is; otherwise `module` is treated as a
    /// module name and looked up in the search directories.
    pub fn resolve(&self, module: impl AsRef<Path>) -> Result<PathBuf, HostError> {
        let module = module.as_ref();
        if module.exists() {
            return Ok(module.to_path_buf());
        }
        if let Some(name) = module.to_str() {
            let file_name = Self::library_file_name(name);
            for dir in &self.search_dirs {
                let candidate = dir.join(&file_name);
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }
        Err(HostError::MissingModule(module.to_path_buf()))
    }

    pub fn load(&self, module: impl AsRef<Path>) -> Result<LoadedModule, HostError> {
        LoadedModule::open(self.resolve(module)?)
    }
}

struct ExportGuard(NonNull<DescriptorExport>);

// SAFETY: the export only exposes a `Descriptor`, which is `Send + Sync`.
unsafe impl Send for ExportGuard {}
unsafe impl Sync for ExportGuard {}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        unsafe { DescriptorExport::release(self.0.as_ptr()) };
    }
}

/// A version-checked plugin module. Keeps the library mapped for as long as
/// the descriptor is reachable.
pub struct LoadedModule {
    // Released before the library is unmapped.
    export: ExportGuard,
    library: Option<Library>,
    path: Option<PathBuf>,
}

impl LoadedModule {
    /// Loads the module at `path`, resolves its entry point and checks the ABI
    /// versions it reports.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HostError::MissingModule(path.to_path_buf()));
        }

        let library = unsafe { Library::new(path) }.map_err(|source| HostError::LibraryLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let loader = unsafe {
            *library
                .get::<DescriptorLoader>(DESCRIPTOR_SYMBOL.as_bytes())
                .map_err(|source| HostError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: DESCRIPTOR_SYMBOL,
                    source,
                })?
        };

        tracing::info!(path = %path.display(), "loaded plugin module");
        unsafe { Self::from_loader(loader, Some(library), Some(path.to_path_buf())) }
    }

    /// Wraps an entry point that is already linked into the process, or one
    /// resolved from `library`.
    ///
    /// # Safety
    /// `loader` must follow the [`DescriptorLoader`] contract and, when it
    /// comes from `library`, must not outlive it.
    pub unsafe fn from_loader(
        loader: DescriptorLoader,
        library: Option<Library>,
        path: Option<PathBuf>,
    ) -> Result<Self, HostError> {
        let export = NonNull::new(loader(0)).ok_or(HostError::NullDescriptor(0))?;
        let (abi_version, least_abi_version) = {
            let export = export.as_ref();
            (export.abi_version, export.least_abi_version)
        };

        if let Err(mismatch) = check_plugin(abi_version, least_abi_version) {
            // Past the version fields the record layout cannot be trusted, so
            // the export is leaked rather than released.
            tracing::warn!(%mismatch, "refusing plugin module");
            return Err(mismatch.into());
        }

        Ok(Self {
            export: ExportGuard(export),
            library,
            path,
        })
    }

    pub fn descriptor(&self) -> &dyn Descriptor {
        unsafe { self.export.0.as_ref().descriptor() }
    }

    pub fn abi_version(&self) -> AbiVersion {
        unsafe { self.export.0.as_ref().abi_version }
    }

    /// `None` for modules linked into the host process.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("label", &self.descriptor().label())
            .finish()
    }
}
