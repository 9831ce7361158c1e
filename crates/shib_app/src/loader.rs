//! Shared-library modules.
#![expect(unsafe_code, reason = "loading shared libraries and resolving their entry points")]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::Path;

use libloading::Library;
use shib_utils::collections::HashVecMap;
use shib_utils::{Hash64, HashString64};

use crate::module::{CREATE_MODULE, CreateModuleFn, INIT_MODULE, InitModuleFn, SHUTDOWN_MODULE, ShutdownModuleFn};
use crate::{AppError, LOG_CHANNEL};

/// File name of the module `name` on this platform.
///
/// ```
/// use shib_app::loader::module_file_name;
///
/// let file = module_file_name("Graphics");
/// assert!(file.contains("GraphicsModule"));
/// ```
pub fn module_file_name(name: &str) -> String {
    format!("{DLL_PREFIX}{name}Module{DLL_SUFFIX}")
}

/// Extracts the module name from a library path.
///
/// Returns `None` for files that do not follow `<Name>Module<ext>`.
/// The platform `lib` prefix is optional.
///
/// ```
/// use std::path::Path;
/// use shib_app::loader::{module_file_name, module_name_from_path};
///
/// let path = Path::new("bin").join(module_file_name("Graphics"));
/// assert_eq!(module_name_from_path(&path), Some("Graphics"));
/// assert_eq!(module_name_from_path(Path::new("bin/readme.txt")), None);
/// ```
pub fn module_name_from_path(path: &Path) -> Option<&str> {
    let file = path.file_name()?.to_str()?;
    let stem = file.strip_suffix(DLL_SUFFIX)?.strip_suffix("Module")?;
    let name = if DLL_PREFIX.is_empty() {
        stem
    } else {
        stem.strip_prefix(DLL_PREFIX).unwrap_or(stem)
    };
    (!name.is_empty()).then_some(name)
}

// -----------------------------------------------------------------------------
// DynamicModule

/// A loaded module library.
pub struct DynamicModule {
    path: String,
    library: Library,
}

impl DynamicModule {
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The `CreateModule` entry point.
    pub fn create_fn(&self) -> Option<CreateModuleFn> {
        // SAFETY: modules built with `export_module!` export `CreateModule`
        // with exactly this signature.
        unsafe { self.symbol::<CreateModuleFn>(CREATE_MODULE) }
    }

    /// The optional `InitModule` entry point.
    pub fn init_fn(&self) -> Option<InitModuleFn> {
        // SAFETY: see `create_fn`.
        unsafe { self.symbol::<InitModuleFn>(INIT_MODULE) }
    }

    /// The optional `ShutdownModule` entry point.
    pub fn shutdown_fn(&self) -> Option<ShutdownModuleFn> {
        // SAFETY: see `create_fn`.
        unsafe { self.symbol::<ShutdownModuleFn>(SHUTDOWN_MODULE) }
    }

    /// # Safety
    ///
    /// `F` must be the type of the exported symbol, and the returned
    /// function must not be called after the library is unloaded.
    unsafe fn symbol<F: Copy>(&self, name: &str) -> Option<F> {
        // SAFETY: forwarded to the caller.
        unsafe { self.library.get::<F>(name.as_bytes()) }
            .ok()
            .map(|symbol| *symbol)
    }
}

// -----------------------------------------------------------------------------
// DynamicLoader

/// Owns the module libraries, keyed by module name.
///
/// Libraries stay loaded until [`unload_module`](Self::unload_module)
/// or [`clear`](Self::clear). Everything created from a library's code
/// must be dropped before it is unloaded.
#[derive(Default)]
pub struct DynamicLoader {
    modules: HashVecMap<HashString64, DynamicModule>,
}

impl DynamicLoader {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the library at `path` as the module `name`.
    pub fn load_module(&mut self, path: &Path, name: &str) -> Result<&DynamicModule, AppError> {
        let key = HashString64::new(String::from(name));
        if self.modules.contains_key(&key.hash()) {
            return Err(AppError::DuplicateModule(String::from(name)));
        }

        // SAFETY: loading a library runs its initializers. Module
        // libraries are trusted parts of the engine.
        let library = unsafe { Library::new(path) }.map_err(|source| {
            log::error!(target: LOG_CHANNEL, "failed to load '{}': {source}", path.display());
            AppError::LibraryLoad {
                module: String::from(name),
                source,
            }
        })?;
        log::info!(target: LOG_CHANNEL, "loaded module '{name}' from '{}'", path.display());

        let module = DynamicModule {
            path: path.display().to_string(),
            library,
        };
        let index = self
            .modules
            .try_insert(key, module)
            .map_err(|_| AppError::DuplicateModule(String::from(name)))?;
        self.modules
            .get_index(index)
            .map(|(_, module)| module)
            .ok_or_else(|| AppError::DuplicateModule(String::from(name)))
    }

    #[inline]
    pub fn get_module(&self, name: Hash64) -> Option<&DynamicModule> {
        self.modules.get(&name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates over the loaded modules in load order.
    pub fn modules(&self) -> impl Iterator<Item = (&HashString64, &DynamicModule)> {
        self.modules.iter()
    }

    /// Calls `ShutdownModule` and unloads the library.
    ///
    /// Returns `false` if no such module is loaded.
    pub fn unload_module(&mut self, name: Hash64) -> bool {
        let Some((key, module)) = self.modules.remove(&name) else {
            return false;
        };
        if let Some(shutdown) = module.shutdown_fn() {
            shutdown();
        }
        drop(module);
        log::info!(target: LOG_CHANNEL, "unloaded module '{key}'");
        true
    }

    /// Unloads every library, most recent first.
    pub fn clear(&mut self) {
        let names: Vec<Hash64> = self.modules.keys().map(HashString64::hash).collect();
        for name in names.into_iter().rev() {
            self.unload_module(name);
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{DynamicLoader, module_file_name, module_name_from_path};
    use crate::AppError;

    #[test]
    fn module_names_round_trip() {
        let path = Path::new("modules").join(module_file_name("Physics"));
        assert_eq!(module_name_from_path(&path), Some("Physics"));

        let bare = format!("AudioModule{}", std::env::consts::DLL_SUFFIX);
        assert_eq!(module_name_from_path(Path::new(&bare)), Some("Audio"));

        assert_eq!(module_name_from_path(Path::new("Physics.cfg")), None);
        let unnamed = format!("Module{}", std::env::consts::DLL_SUFFIX);
        assert_eq!(module_name_from_path(Path::new(&unnamed)), None);
    }

    #[test]
    fn missing_libraries_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(module_file_name("Ghost"));

        let mut loader = DynamicLoader::new();
        let err = loader.load_module(&path, "Ghost").err().unwrap();
        assert!(matches!(err, AppError::LibraryLoad { ref module, .. } if module == "Ghost"));
        assert!(loader.is_empty());
        assert!(!loader.unload_module(shib_utils::Hash64::of_str("Ghost")));
    }
}
