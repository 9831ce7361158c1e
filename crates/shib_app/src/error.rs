use std::io;
use std::path::PathBuf;

use shib_reflect::LoadError;
use thiserror::Error;

/// A bootstrap failure.
///
/// Every variant is fatal to [`App::init`](crate::App::init). The app
/// logs the error where it is raised and unwinds whatever was already
/// created.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// A config file exists but could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },
    /// A config file is not valid JSON.
    #[error("malformed config '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The engine section of the app config has the wrong shape.
    #[error("invalid engine config: {0}")]
    EngineConfig(#[source] serde_json::Error),
    /// A global config flagged fatal failed to load.
    #[error("failed to load global config '{file}': {source}")]
    GlobalConfig { file: String, source: LoadError },
    /// A global config flagged fatal has no file or no default constructor.
    #[error("cannot create global config '{name}': {reason}")]
    GlobalConfigCreate { name: String, reason: &'static str },
    /// `working_dir` could not be applied.
    #[error("failed to set working directory to '{}': {source}", path.display())]
    WorkingDir { path: PathBuf, source: io::Error },
    /// A module directory could not be listed.
    #[error("failed to read module directory '{}': {source}", path.display())]
    ModuleDirectory { path: PathBuf, source: io::Error },
    /// A shared library failed to load.
    #[error("failed to load module '{module}': {source}")]
    LibraryLoad {
        module: String,
        source: libloading::Error,
    },
    /// A module library lacks a required entry point.
    #[error("module '{module}' does not export '{symbol}'")]
    MissingSymbol {
        module: String,
        symbol: &'static str,
    },
    /// Two modules share a name.
    #[error("module '{0}' is loaded twice")]
    DuplicateModule(String),
    /// A module hook returned `false`.
    #[error("module '{module}' failed during {phase}")]
    ModuleInit { module: String, phase: &'static str },
    /// Definitions are still waiting for bases once every module registered.
    #[error("types never received their bases: {}", names.join(", "))]
    PendingDefinitions { names: Vec<String> },
    /// A name in `manager_creation_order` has no reflection.
    #[error("unknown manager '{0}' in manager_creation_order")]
    UnknownManager(String),
    /// A manager definition cannot produce a `dyn Manager`.
    #[error("cannot create manager '{0}'")]
    ManagerCreate(String),
    /// A manager hook returned `false`.
    #[error("manager '{manager}' failed during {stage}")]
    ManagerInit {
        manager: String,
        stage: &'static str,
    },
    /// No main loop is registered, or the configured one is unknown.
    #[error("no main loop registered as '{0}'")]
    MissingMainLoop(String),
    /// The main loop could not be created or initialized.
    #[error("main loop '{0}' failed to initialize")]
    MainLoopInit(String),
}
