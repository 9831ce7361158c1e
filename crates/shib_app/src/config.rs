//! Config files and the engine config.
//!
//! Configs are JSON files under a config root (`cfg/` by default). A
//! config named `name` lives in `<root>/<name>.cfg` and may be
//! overridden per build in `<root>/overrides/<build>/<name>.cfg`. The
//! override is merged over the base key by key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppError, LOG_CHANNEL};

/// Key of the engine section in the app config.
pub const ENGINE_CONFIG_KEY: &str = "engine";

/// Name of the app config.
pub const APP_CONFIG: &str = "app";

// -----------------------------------------------------------------------------
// EngineConfig

/// Bootstrap settings, read from the `engine` object of `app.cfg`.
///
/// Every field is optional.
///
/// ```json
/// {
///     "engine": {
///         "module_directories": ["bin/modules"],
///         "module_load_order": ["Core", "Graphics"],
///         "manager_creation_order": ["Shibboleth::LogManager"],
///         "main_loop": "Shibboleth::MainLoop"
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directories scanned for dynamic modules.
    pub module_directories: Vec<String>,
    /// Modules whose managers are created and notified first.
    pub module_load_order: Vec<String>,
    /// Modules shut down first, in this order.
    pub module_unload_order: Vec<String>,
    /// Managers created before any other, by type name.
    pub manager_creation_order: Vec<String>,
    /// Directory made current before modules load.
    pub working_dir: Option<String>,
    /// Type name of the main loop, the first registered one if absent.
    pub main_loop: Option<String>,
    pub no_load_modules: bool,
    pub no_managers: bool,
    pub no_main_loop: bool,
}

impl EngineConfig {
    /// Reads the engine section of an app config.
    ///
    /// A config without the section yields the defaults.
    pub fn from_app_config(app_config: &Value) -> Result<Self, AppError> {
        match app_config.get(ENGINE_CONFIG_KEY) {
            Some(engine) => Self::deserialize(engine).map_err(AppError::EngineConfig),
            None => Ok(Self::default()),
        }
    }
}

// -----------------------------------------------------------------------------
// merge_json

/// Merges `overlay` into `base`.
///
/// Objects merge recursively, any other value replaces the one in `base`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shib_app::config::merge_json;
///
/// let mut base = json!({ "window": { "width": 800, "height": 600 }, "vsync": true });
/// merge_json(&mut base, json!({ "window": { "width": 1920 }, "vsync": false }));
/// assert_eq!(base, json!({ "window": { "width": 1920, "height": 600 }, "vsync": false }));
/// ```
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_objects(base, overlay),
        (base, overlay) => *base = overlay,
    }
}

fn merge_objects(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_json(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ConfigLoader

/// Reads config files with their build overrides.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    build: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new("cfg")
    }
}

impl ConfigLoader {
    /// A loader reading from `root` with the overrides of the current
    /// build (`Debug` or `Release`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let build = if cfg!(debug_assertions) { "Debug" } else { "Release" };
        Self::with_build(root, build)
    }

    /// A loader reading from `root` with the overrides of `build`.
    pub fn with_build(root: impl Into<PathBuf>, build: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            build: build.into(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn build(&self) -> &str {
        &self.build
    }

    /// Path of the config `name`.
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.cfg"))
    }

    /// Path of the build override of the config `name`.
    pub fn override_path(&self, name: &str) -> PathBuf {
        self.root
            .join("overrides")
            .join(&self.build)
            .join(format!("{name}.cfg"))
    }

    /// Loads the config `name` merged with its build override.
    ///
    /// Returns `Ok(None)` if neither file exists.
    pub fn load(&self, name: &str) -> Result<Option<Value>, AppError> {
        let base = read_json(&self.config_path(name))?;
        let overlay = read_json(&self.override_path(name))?;
        Ok(match (base, overlay) {
            (Some(mut base), Some(overlay)) => {
                log::debug!(target: LOG_CHANNEL, "applying '{}' override of config '{name}'", self.build);
                merge_json(&mut base, overlay);
                Some(base)
            }
            (base, overlay) => base.or(overlay),
        })
    }

    /// Loads `app.cfg`, then merges every `*.cfg` path of `args` over it.
    ///
    /// Other arguments are ignored.
    pub fn load_app_config<S: AsRef<str>>(&self, args: &[S]) -> Result<Value, AppError> {
        let mut config = self.load(APP_CONFIG)?.unwrap_or_else(|| {
            log::warn!(
                target: LOG_CHANNEL,
                "'{}' not found, using defaults",
                self.config_path(APP_CONFIG).display(),
            );
            Value::Object(Map::new())
        });

        for arg in args.iter().map(AsRef::as_ref).filter(|arg| arg.ends_with(".cfg")) {
            match read_json(Path::new(arg))? {
                Some(extra) => merge_json(&mut config, extra),
                None => log::warn!(target: LOG_CHANNEL, "config '{arg}' not found"),
            }
        }
        Ok(config)
    }
}

/// Reads a JSON file, `Ok(None)` if it does not exist.
fn read_json(path: &Path) -> Result<Option<Value>, AppError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AppError::ConfigRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| {
            log::error!(target: LOG_CHANNEL, "malformed config '{}': {source}", path.display());
            AppError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::tempdir;

    use super::{ConfigLoader, EngineConfig, merge_json};
    use crate::AppError;

    #[test]
    fn override_merges_key_by_key() {
        let dir = tempdir().unwrap();
        let overrides = dir.path().join("overrides").join("Debug");
        fs::create_dir_all(&overrides).unwrap();
        fs::write(
            dir.path().join("graphics.cfg"),
            r#"{ "window": { "width": 800, "height": 600 }, "adapters": [0, 1] }"#,
        )
        .unwrap();
        fs::write(overrides.join("graphics.cfg"), r#"{ "window": { "width": 1280 }, "adapters": [2] }"#).unwrap();

        let loader = ConfigLoader::with_build(dir.path(), "Debug");
        let config = loader.load("graphics").unwrap().unwrap();
        assert_eq!(
            config,
            json!({ "window": { "width": 1280, "height": 600 }, "adapters": [2] })
        );

        let release = ConfigLoader::with_build(dir.path(), "Release");
        assert_eq!(release.load("graphics").unwrap().unwrap()["window"]["width"], 800);
        assert!(loader.load("missing").unwrap().is_none());
    }

    #[test]
    fn malformed_configs_name_the_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.cfg"), "{ not json").unwrap();

        let err = ConfigLoader::new(dir.path()).load("broken").unwrap_err();
        assert!(matches!(&err, AppError::ConfigParse { path, .. } if path.ends_with("broken.cfg")));
        assert!(err.to_string().contains("broken.cfg"));
    }

    #[test]
    fn command_line_configs_merge_over_app_config() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("app.cfg"),
            r#"{ "engine": { "module_load_order": ["Core"], "no_main_loop": true } }"#,
        )
        .unwrap();
        let extra = dir.path().join("extra.cfg");
        fs::write(&extra, r#"{ "engine": { "no_managers": true } }"#).unwrap();

        let loader = ConfigLoader::new(dir.path());
        let args = [String::from("--verbose"), extra.display().to_string()];
        let config = loader.load_app_config(&args).unwrap();

        let engine = EngineConfig::from_app_config(&config).unwrap();
        assert_eq!(engine.module_load_order, ["Core"]);
        assert!(engine.no_main_loop);
        assert!(engine.no_managers);
        assert!(!engine.no_load_modules);
    }

    #[test]
    fn missing_app_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load_app_config::<&str>(&[]).unwrap();
        assert_eq!(EngineConfig::from_app_config(&config).unwrap(), EngineConfig::default());
    }

    #[test]
    fn scalars_replace_objects() {
        let mut base = json!({ "a": { "b": 1 } });
        merge_json(&mut base, json!({ "a": 2 }));
        assert_eq!(base, json!({ "a": 2 }));
    }
}
