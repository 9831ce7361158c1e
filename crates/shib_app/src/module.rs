//! Engine modules.
//!
//! A module contributes reflection, managers and main loops to the app.
//! It is either linked in ([`StaticModule`]) or loaded from a shared
//! library named `<Name>Module<ext>` that exports the entry points
//! [`CREATE_MODULE`], and optionally [`INIT_MODULE`] and
//! [`SHUTDOWN_MODULE`].
//!
//! Hooks return `bool` instead of `Result` so the signature does not
//! depend on error types of the loading binary.

use alloc::boxed::Box;

use shib_reflect::{ReflectionManager, Registrar};

/// Symbol of the [`CreateModuleFn`] entry point.
pub const CREATE_MODULE: &str = "CreateModule";

/// Symbol of the optional [`InitModuleFn`] entry point.
pub const INIT_MODULE: &str = "InitModule";

/// Symbol of the optional [`ShutdownModuleFn`] entry point.
pub const SHUTDOWN_MODULE: &str = "ShutdownModule";

/// Creates the module object, `None` on failure.
pub type CreateModuleFn = fn() -> Option<Box<dyn Module>>;

/// Runs once after the library is loaded.
pub type InitModuleFn = fn() -> bool;

/// Runs right before the library is unloaded.
pub type ShutdownModuleFn = fn();

// -----------------------------------------------------------------------------
// Module

/// The hooks the app calls while bootstrapping.
///
/// The app runs each phase on every module before starting the next,
/// in this order:
///
/// 1. [`pre_init`](Self::pre_init)
/// 2. [`init_reflection_enums`](Self::init_reflection_enums)
/// 3. [`init_reflection_attributes`](Self::init_reflection_attributes)
/// 4. [`init_non_owned_enums`](Self::init_non_owned_enums)
/// 5. [`init_non_owned_attributes`](Self::init_non_owned_attributes)
/// 6. [`init_reflection_classes`](Self::init_reflection_classes)
/// 7. [`init_non_owned_classes`](Self::init_non_owned_classes)
/// 8. managers are created
/// 9. [`post_init`](Self::post_init)
///
/// The registrar handed to the reflection phases tags every definition
/// with the module, so [`ReflectionManager::unload_module`] can drop
/// them when the module goes away. "Non-owned" phases register types
/// declared by other crates.
pub trait Module {
    /// Prepares the module, typically by registering type buckets.
    fn pre_init(&mut self, reflection: &mut ReflectionManager) -> bool {
        let _ = reflection;
        true
    }

    fn init_reflection_enums(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    fn init_reflection_attributes(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    fn init_non_owned_enums(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    fn init_non_owned_attributes(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    fn init_non_owned_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
        let _ = registrar;
        true
    }

    /// Runs once every manager exists.
    fn post_init(&mut self) -> bool {
        true
    }

    /// Runs before the module's reflection is unloaded.
    fn shutdown(&mut self) {}
}

// -----------------------------------------------------------------------------
// StaticModule

/// A module linked into the executable.
///
/// With the `auto_register` feature, modules declared through
/// [`static_module!`](crate::static_module) are collected by
/// [`StaticModule::collected`].
#[derive(Clone, Copy)]
pub struct StaticModule {
    pub name: &'static str,
    pub create: fn() -> Box<dyn Module>,
}

impl StaticModule {
    #[inline]
    pub const fn new(name: &'static str, create: fn() -> Box<dyn Module>) -> Self {
        Self { name, create }
    }

    /// Every module declared with `static_module!` in the final binary.
    #[cfg(feature = "auto_register")]
    pub fn collected() -> impl Iterator<Item = &'static StaticModule> {
        inventory::iter::<StaticModule>.into_iter()
    }
}

impl core::fmt::Debug for StaticModule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("StaticModule").field(&self.name).finish()
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(StaticModule);

/// Declares a linked-in module.
///
/// The module type must implement [`Default`].
///
/// ```
/// use shib_app::{Module, static_module};
///
/// #[derive(Default)]
/// struct CoreModule;
///
/// impl Module for CoreModule {}
///
/// static_module!("Core", CoreModule);
/// ```
#[cfg(feature = "auto_register")]
#[macro_export]
macro_rules! static_module {
    ($name:expr, $ty:ty) => {
        $crate::__macro_exports::inventory::submit! {
            $crate::StaticModule::new($name, || {
                $crate::__macro_exports::Box::new(<$ty as ::core::default::Default>::default())
            })
        }
    };
}

/// Exports the entry points of a dynamic module.
///
/// The module type must implement [`Default`]. The optional second and
/// third arguments become `InitModule` and `ShutdownModule`.
///
/// The loading binary must be built with the same compiler as the
/// module, the entry points use the Rust ABI.
#[macro_export]
macro_rules! export_module {
    ($ty:ty $(, init = $init:expr)? $(, shutdown = $shutdown:expr)? $(,)?) => {
        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub fn CreateModule() -> ::core::option::Option<$crate::__macro_exports::Box<dyn $crate::Module>> {
            ::core::option::Option::Some($crate::__macro_exports::Box::new(
                <$ty as ::core::default::Default>::default(),
            ))
        }

        $(
            #[allow(non_snake_case)]
            #[unsafe(no_mangle)]
            pub fn InitModule() -> bool {
                let init: fn() -> bool = $init;
                init()
            }
        )?

        $(
            #[allow(non_snake_case)]
            #[unsafe(no_mangle)]
            pub fn ShutdownModule() {
                let shutdown: fn() = $shutdown;
                shutdown()
            }
        )?
    };
}
