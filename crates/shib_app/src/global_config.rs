//! Reflected classes loaded from config files at startup.

use alloc::boxed::Box;
use core::any::Any;

use shib_reflect::attribute::Attribute;
use shib_reflect::serialize::JsonReader;
use shib_reflect::{ClassDefinition, ReflectionManager, TypeName, impl_type_name};
use shib_utils::Hash64;
use shib_utils::hash::NoOpHashMap;

use crate::config::ConfigLoader;
use crate::{AppError, LOG_CHANNEL};

// -----------------------------------------------------------------------------
// GlobalConfigAttribute

/// Marks a class as a global config.
///
/// The app creates one instance with the class's default constructor
/// and loads it from the config `file`. When loading fails the instance
/// keeps its default values, unless the config is `fatal`, in which
/// case bootstrap fails.
///
/// # Examples
///
/// ```
/// use shib_app::GlobalConfigAttribute;
/// use shib_reflect::prelude::*;
///
/// #[derive(Default)]
/// struct WindowConfig { width: u32 }
///
/// impl_type_name!(WindowConfig = "WindowConfig");
///
/// let mut reflection = ReflectionManager::new();
/// ReflectionDefinition::<WindowConfig>::new()
///     .class_attrs(&[&GlobalConfigAttribute::new("window")])
///     .var("width", field!(WindowConfig, width), &[])
///     .default_ctor()
///     .finish(&mut reflection.registrar());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalConfigAttribute {
    file: &'static str,
    fatal: bool,
}

impl_type_name!(GlobalConfigAttribute = "Shibboleth::GlobalConfigAttribute");

impl Attribute for GlobalConfigAttribute {}

impl GlobalConfigAttribute {
    /// A config loaded from `file`, defaulted on failure.
    #[inline]
    pub const fn new(file: &'static str) -> Self {
        Self { file, fatal: false }
    }

    /// A config loaded from `file` that must load.
    #[inline]
    pub const fn fatal(file: &'static str) -> Self {
        Self { file, fatal: true }
    }

    #[inline]
    pub const fn file(&self) -> &'static str {
        self.file
    }

    #[inline]
    pub const fn is_fatal(&self) -> bool {
        self.fatal
    }
}

// -----------------------------------------------------------------------------
// GlobalConfigs

/// The loaded global configs, keyed by type hash.
#[derive(Default)]
pub struct GlobalConfigs {
    configs: NoOpHashMap<Hash64, Box<dyn Any>>,
}

impl GlobalConfigs {
    #[inline]
    pub fn get<T: TypeName>(&self) -> Option<&T> {
        self.configs.get(&T::TYPE_HASH)?.downcast_ref::<T>()
    }

    #[inline]
    pub fn contains(&self, hash: Hash64) -> bool {
        self.configs.contains_key(&hash)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.configs.clear();
    }

    /// Drops the configs whose type is no longer registered.
    pub(crate) fn retain_defined(&mut self, reflection: &ReflectionManager) {
        self.configs.retain(|hash, _| reflection.is_defined(*hash));
    }

    /// Creates and loads every global config not loaded yet.
    pub(crate) fn create_all(&mut self, reflection: &ReflectionManager, loader: &ConfigLoader) -> Result<(), AppError> {
        let Some(bucket) = reflection.get_attribute_bucket(GlobalConfigAttribute::TYPE_HASH) else {
            return Ok(());
        };
        for definition in bucket {
            if self.contains(definition.hash()) {
                continue;
            }
            let Some(attr) = definition.get_class_attr::<GlobalConfigAttribute>() else {
                continue;
            };
            match create_config(definition, attr, reflection, loader) {
                Ok(config) => {
                    self.configs.insert(definition.hash(), config);
                }
                Err(err) if attr.is_fatal() => {
                    log::error!(target: LOG_CHANNEL, "{err}");
                    return Err(err);
                }
                Err(err) => log::warn!(target: LOG_CHANNEL, "{err}"),
            }
        }
        Ok(())
    }
}

/// Creates the config and loads it.
///
/// A load failure on a non-fatal config returns a freshly defaulted
/// instance, the partly loaded one is dropped.
fn create_config(
    definition: &ClassDefinition,
    attr: &GlobalConfigAttribute,
    reflection: &ReflectionManager,
    loader: &ConfigLoader,
) -> Result<Box<dyn Any>, AppError> {
    let name = definition.name().as_str();
    let create = || {
        definition.create(()).ok_or_else(|| AppError::GlobalConfigCreate {
            name: String::from(name),
            reason: "no default constructor",
        })
    };
    let mut config = create()?;

    let result = loader.load(attr.file()).and_then(|json| match json {
        Some(json) => definition
            .load(&mut JsonReader::new(&json), &mut *config, reflection)
            .map_err(|source| AppError::GlobalConfig {
                file: String::from(attr.file()),
                source,
            }),
        None => Err(AppError::GlobalConfigCreate {
            name: String::from(name),
            reason: "config file not found",
        }),
    });

    match result {
        Ok(()) => {
            log::info!(target: LOG_CHANNEL, "loaded global config '{name}' from '{}'", attr.file());
            Ok(config)
        }
        Err(err) if attr.is_fatal() => Err(err),
        Err(err) => {
            log::warn!(target: LOG_CHANNEL, "{err}, keeping the defaults of '{name}'");
            drop(config);
            create()
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use shib_reflect::prelude::*;

    use super::{GlobalConfigAttribute, GlobalConfigs};
    use crate::ConfigLoader;

    #[derive(Default)]
    struct WindowConfig {
        width: u32,
        height: u32,
    }

    impl_type_name!(WindowConfig = "Test::WindowConfig");

    fn reflection() -> ReflectionManager {
        let mut reflection = ReflectionManager::new();
        reflection.register_attribute_bucket_for::<GlobalConfigAttribute>();
        ReflectionDefinition::<WindowConfig>::new()
            .class_attrs(&[&GlobalConfigAttribute::new("window")])
            .var("width", field!(WindowConfig, width), &[])
            .var("height", field!(WindowConfig, height), &[])
            .default_ctor()
            .finish(&mut reflection.module_registrar("Window"));
        reflection
    }

    #[test]
    fn failed_loads_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("window.cfg"), r#"{ "width": 1920, "height": "bad" }"#).unwrap();
        let reflection = reflection();

        let mut configs = GlobalConfigs::default();
        configs.create_all(&reflection, &ConfigLoader::new(dir.path())).unwrap();

        let window = configs.get::<WindowConfig>().unwrap();
        assert_eq!((window.width, window.height), (0, 0));
    }

    #[test]
    fn configs_of_unloaded_types_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("window.cfg"), r#"{ "width": 1920, "height": 1080 }"#).unwrap();
        let mut reflection = reflection();

        let mut configs = GlobalConfigs::default();
        configs.create_all(&reflection, &ConfigLoader::new(dir.path())).unwrap();
        assert_eq!(configs.get::<WindowConfig>().map(|window| window.height), Some(1080));

        reflection.unload_module(Hash64::of_str("Window"));
        configs.retain_defined(&reflection);
        assert!(configs.is_empty());
    }
}
