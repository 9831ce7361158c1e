//! Engine services: managers and the main loop.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use serde_json::Value;
use shib_reflect::{ClassDefinition, ReflectionManager, TypeName, impl_type_name};
use shib_utils::Hash64;

use crate::global_config::GlobalConfigs;

// -----------------------------------------------------------------------------
// Manager

/// A singleton service created by the app.
///
/// A manager is any reflected class that registers `dyn Manager` as an
/// interface and has a default constructor. The app creates one
/// instance of each, in the order described by
/// [`EngineConfig`](crate::EngineConfig).
///
/// # Examples
///
/// ```
/// use shib_app::Manager;
/// use shib_reflect::prelude::*;
///
/// #[derive(Default)]
/// struct InputManager;
///
/// impl Manager for InputManager {}
///
/// impl_type_name!(InputManager = "Shibboleth::InputManager");
///
/// let mut reflection = ReflectionManager::new();
/// ReflectionDefinition::<InputManager>::new()
///     .interface::<dyn Manager>(trait_cast!(InputManager => dyn Manager))
///     .default_ctor()
///     .finish(&mut reflection.registrar());
/// ```
pub trait Manager: Any + Send + Sync {
    /// Runs right after creation.
    fn init(&mut self, context: &ManagerContext<'_>) -> bool {
        let _ = context;
        true
    }

    /// Runs for the main thread after [`init`](Self::init), and for any
    /// other thread that joins the engine.
    fn init_thread(&mut self, thread: ThreadId) -> bool {
        let _ = thread;
        true
    }

    /// Runs once after every module and manager is initialized.
    fn init_all_modules_loaded(&mut self, context: &ManagerContext<'_>) -> bool {
        let _ = context;
        true
    }

    /// Runs for each initialized thread before the app is destroyed.
    fn destroy_thread(&mut self, thread: ThreadId) {
        let _ = thread;
    }
}

impl_type_name!(dyn Manager = "Shibboleth::IManager");

// -----------------------------------------------------------------------------
// MainLoop

/// Drives the app between [`App::init`](crate::App::init) and
/// [`App::destroy`](crate::App::destroy).
///
/// Registered like a [`Manager`], with `dyn MainLoop` as interface.
pub trait MainLoop: Any + Send {
    fn init(&mut self, context: &ManagerContext<'_>) -> bool {
        let _ = context;
        true
    }

    /// Runs one frame, `false` stops the app.
    fn update(&mut self, context: &ManagerContext<'_>) -> bool;

    fn destroy(&mut self, context: &ManagerContext<'_>) {
        let _ = context;
    }
}

impl_type_name!(dyn MainLoop = "Shibboleth::IMainLoop");

// -----------------------------------------------------------------------------
// ManagerSlot

/// A created manager with its definition.
pub(crate) struct ManagerSlot {
    pub(crate) definition: Arc<ClassDefinition>,
    /// Empty while the manager is being called.
    pub(crate) manager: Option<Box<dyn Manager>>,
}

impl ManagerSlot {
    #[inline]
    pub(crate) fn hash(&self) -> Hash64 {
        self.definition.hash()
    }
}

// -----------------------------------------------------------------------------
// ManagerContext

/// What a manager can see of the app.
///
/// Managers are created one at a time, so a manager can query the
/// managers created before it. The manager being called is not
/// visible to itself.
pub struct ManagerContext<'a> {
    pub(crate) reflection: &'a ReflectionManager,
    pub(crate) managers: &'a [ManagerSlot],
    pub(crate) configs: &'a GlobalConfigs,
    pub(crate) app_config: &'a Value,
    pub(crate) quit: &'a AtomicBool,
}

impl<'a> ManagerContext<'a> {
    #[inline]
    pub fn reflection(&self) -> &'a ReflectionManager {
        self.reflection
    }

    /// The merged app config.
    #[inline]
    pub fn app_config(&self) -> &'a Value {
        self.app_config
    }

    /// Returns the manager of type `T`.
    pub fn get_manager<T: Manager + TypeName>(&self) -> Option<&'a T> {
        let manager: &dyn Any = self.get_manager_by_hash(T::TYPE_HASH)?;
        manager.downcast_ref::<T>()
    }

    /// Returns the manager whose type hash is `hash`.
    pub fn get_manager_by_hash(&self, hash: Hash64) -> Option<&'a dyn Manager> {
        self.managers
            .iter()
            .find(|slot| slot.hash() == hash)?
            .manager
            .as_deref()
    }

    #[inline]
    pub fn has_manager(&self, hash: Hash64) -> bool {
        self.managers.iter().any(|slot| slot.hash() == hash)
    }

    /// Returns the loaded global config of type `T`.
    #[inline]
    pub fn get_config<T: TypeName>(&self) -> Option<&'a T> {
        self.configs.get::<T>()
    }

    /// Asks the app to leave its main loop.
    #[inline]
    pub fn quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_quitting(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}
