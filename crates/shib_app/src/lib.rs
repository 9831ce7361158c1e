//! Engine bootstrap.
//!
//! The [`App`] loads modules, lets them register their reflection in
//! phases, creates the [`Manager`] services they declare, loads global
//! configs, then runs the [`MainLoop`] until asked to quit.
//!
//! # Examples
//!
//! ```
//! use shib_app::{App, EngineConfig, MainLoop, ManagerContext, Module, StaticModule};
//! use shib_reflect::prelude::*;
//!
//! #[derive(Default)]
//! struct Frames(u32);
//!
//! impl MainLoop for Frames {
//!     fn update(&mut self, _: &ManagerContext<'_>) -> bool {
//!         self.0 += 1;
//!         self.0 < 3
//!     }
//! }
//!
//! impl_type_name!(Frames = "Frames");
//!
//! struct GameModule;
//!
//! impl Module for GameModule {
//!     fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
//!         ReflectionDefinition::<Frames>::new()
//!             .interface::<dyn MainLoop>(trait_cast!(Frames => dyn MainLoop))
//!             .default_ctor()
//!             .finish(registrar);
//!         true
//!     }
//! }
//!
//! let mut app = App::new(EngineConfig::default());
//! app.add_static_module(StaticModule::new("Game", || Box::new(GameModule)));
//! app.init().unwrap();
//! app.run();
//! app.destroy();
//! ```

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod app;
mod error;
mod global_config;
mod manager;

pub mod config;
pub mod loader;
pub mod module;

// -----------------------------------------------------------------------------
// Top-level exports

pub use app::App;
pub use config::{ConfigLoader, EngineConfig};
pub use error::AppError;
pub use global_config::{GlobalConfigAttribute, GlobalConfigs};
pub use loader::DynamicLoader;
pub use manager::{MainLoop, Manager, ManagerContext};
pub use module::{Module, StaticModule};

#[doc(hidden)]
pub mod __macro_exports {
    pub use alloc::boxed::Box;

    #[cfg(feature = "auto_register")]
    pub use inventory;
}

/// Log target used by the bootstrap.
pub const LOG_CHANNEL: &str = "App";
