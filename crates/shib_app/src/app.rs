use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use std::path::Path;
use std::thread::{self, ThreadId};

use serde_json::Value;
use shib_reflect::{ClassDefinition, ReflectionManager, Registrar, TypeName};
use shib_utils::{Hash64, HashString64};

use crate::config::{ConfigLoader, EngineConfig};
use crate::global_config::{GlobalConfigAttribute, GlobalConfigs};
use crate::loader::{DynamicLoader, module_name_from_path};
use crate::manager::{MainLoop, Manager, ManagerContext, ManagerSlot};
use crate::module::{CREATE_MODULE, Module, StaticModule};
use crate::{AppError, LOG_CHANNEL};

const MANAGER_BUCKET: Hash64 = <dyn Manager>::TYPE_HASH;
const MAIN_LOOP_BUCKET: Hash64 = <dyn MainLoop>::TYPE_HASH;

type Phase = fn(&mut dyn Module, &mut Registrar<'_>) -> bool;

/// Reflection phases, each run on every module before the next starts.
const REFLECTION_PHASES: [(&str, Phase); 6] = [
    ("init_reflection_enums", |module, registrar| module.init_reflection_enums(registrar)),
    ("init_reflection_attributes", |module, registrar| {
        module.init_reflection_attributes(registrar)
    }),
    ("init_non_owned_enums", |module, registrar| module.init_non_owned_enums(registrar)),
    ("init_non_owned_attributes", |module, registrar| {
        module.init_non_owned_attributes(registrar)
    }),
    ("init_reflection_classes", |module, registrar| module.init_reflection_classes(registrar)),
    ("init_non_owned_classes", |module, registrar| module.init_non_owned_classes(registrar)),
];

// -----------------------------------------------------------------------------
// Services

/// The state managers can see through a [`ManagerContext`].
#[derive(Default)]
struct Services {
    reflection: ReflectionManager,
    managers: Vec<ManagerSlot>,
    configs: GlobalConfigs,
    app_config: Value,
    quit: AtomicBool,
}

impl Services {
    fn context(&self) -> ManagerContext<'_> {
        ManagerContext {
            reflection: &self.reflection,
            managers: &self.managers,
            configs: &self.configs,
            app_config: &self.app_config,
            quit: &self.quit,
        }
    }

    fn has_manager(&self, hash: Hash64) -> bool {
        self.managers.iter().any(|slot| slot.hash() == hash)
    }

    /// Calls `init_all_modules_loaded` on the manager `hash`, if created.
    fn notify_all_modules_loaded(&mut self, hash: Hash64) -> Result<(), AppError> {
        let Some(index) = self.managers.iter().position(|slot| slot.hash() == hash) else {
            return Ok(());
        };
        let Some(mut manager) = self.managers[index].manager.take() else {
            return Ok(());
        };
        let ok = manager.init_all_modules_loaded(&self.context());
        let slot = &mut self.managers[index];
        slot.manager = Some(manager);
        if ok {
            Ok(())
        } else {
            Err(AppError::ManagerInit {
                manager: slot.definition.name().to_string(),
                stage: "init_all_modules_loaded",
            })
        }
    }
}

struct LoadedModule {
    name: HashString64,
    module: Box<dyn Module>,
}

// -----------------------------------------------------------------------------
// App

/// The engine application.
///
/// [`init`](Self::init) bootstraps everything, [`run`](Self::run)
/// drives the main loop, and [`destroy`](Self::destroy) tears it all
/// down in reverse. Dropping an app without calling `destroy` still
/// releases everything, but skips the shutdown hooks.
pub struct App {
    engine: EngineConfig,
    config_loader: ConfigLoader,
    static_modules: Vec<StaticModule>,
    main_thread: ThreadId,
    main_loop: Option<Box<dyn MainLoop>>,
    services: Services,
    modules: Vec<LoadedModule>,
    /// Dropped last, the other fields may hold code from these libraries.
    loader: DynamicLoader,
}

impl App {
    /// Creates an app from an engine config, with an empty app config.
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            config_loader: ConfigLoader::default(),
            static_modules: Vec::new(),
            main_thread: thread::current().id(),
            main_loop: None,
            services: Services {
                app_config: Value::Object(serde_json::Map::new()),
                ..Services::default()
            },
            modules: Vec::new(),
            loader: DynamicLoader::new(),
        }
    }

    /// Creates an app from `app.cfg` and the `*.cfg` files named in `args`.
    ///
    /// The engine config is read from the `"engine"` key of the merged
    /// document.
    pub fn from_args<S: AsRef<str>>(config_loader: ConfigLoader, args: &[S]) -> Result<Self, AppError> {
        let app_config = config_loader.load_app_config(args)?;
        let engine = EngineConfig::from_app_config(&app_config)?;
        let mut app = Self::new(engine).with_config_loader(config_loader);
        app.services.app_config = app_config;
        Ok(app)
    }

    /// Replaces where global configs are read from.
    pub fn with_config_loader(mut self, config_loader: ConfigLoader) -> Self {
        self.config_loader = config_loader;
        self
    }

    /// Adds a linked-in module, loaded before the dynamic ones.
    pub fn add_static_module(&mut self, module: StaticModule) {
        self.static_modules.push(module);
    }

    #[inline]
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    #[inline]
    pub fn app_config(&self) -> &Value {
        &self.services.app_config
    }

    #[inline]
    pub fn reflection(&self) -> &ReflectionManager {
        &self.services.reflection
    }

    #[inline]
    pub fn reflection_mut(&mut self) -> &mut ReflectionManager {
        &mut self.services.reflection
    }

    #[inline]
    pub fn loader(&self) -> &DynamicLoader {
        &self.loader
    }

    /// The view of the app handed to managers.
    #[inline]
    pub fn context(&self) -> ManagerContext<'_> {
        self.services.context()
    }

    #[inline]
    pub fn get_manager<T: Manager + TypeName>(&self) -> Option<&T> {
        self.services.context().get_manager::<T>()
    }

    #[inline]
    pub fn get_config<T: TypeName>(&self) -> Option<&T> {
        self.services.configs.get::<T>()
    }

    #[inline]
    pub fn manager_count(&self) -> usize {
        self.services.managers.len()
    }

    /// Names of the loaded modules, in load order.
    pub fn module_names(&self) -> impl Iterator<Item = &HashString64> {
        self.modules.iter().map(|loaded| &loaded.name)
    }

    /// Asks [`run`](Self::run) to return after the current frame.
    #[inline]
    pub fn quit(&self) {
        self.services.quit.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_quitting(&self) -> bool {
        self.services.quit.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Bootstrap

    /// Bootstraps the app.
    ///
    /// Every error is fatal. Managers created before the failure are
    /// dropped, [`destroy`](Self::destroy) releases the rest.
    pub fn init(&mut self) -> Result<(), AppError> {
        log::info!(target: LOG_CHANNEL, "Initializing app");
        let result = self.bootstrap();
        match &result {
            Ok(()) => log::info!(target: LOG_CHANNEL, "App successfully initialized"),
            Err(err) => {
                log::error!(target: LOG_CHANNEL, "App failed to initialize: {err}");
                self.main_loop = None;
                self.services.configs.clear();
                self.services.managers.clear();
            }
        }
        result
    }

    fn bootstrap(&mut self) -> Result<(), AppError> {
        self.register_builtin_buckets();
        self.apply_working_dir()?;

        if !self.engine.no_load_modules {
            self.load_modules()?;
        }
        if !self.engine.no_managers {
            self.create_managers()?;
        }
        for loaded in &mut self.modules {
            if !loaded.module.post_init() {
                return Err(AppError::ModuleInit {
                    module: loaded.name.to_string(),
                    phase: "post_init",
                });
            }
        }
        self.init_all_modules_loaded()?;

        if !self.engine.no_main_loop {
            self.create_main_loop()?;
        }
        Ok(())
    }

    fn register_builtin_buckets(&mut self) {
        let reflection = &mut self.services.reflection;
        for bucket in [MANAGER_BUCKET, MAIN_LOOP_BUCKET] {
            if reflection.get_type_bucket(bucket).is_none() {
                reflection.register_type_bucket(bucket);
            }
        }
        if reflection.get_attribute_bucket(GlobalConfigAttribute::TYPE_HASH).is_none() {
            reflection.register_attribute_bucket_for::<GlobalConfigAttribute>();
        }
    }

    fn apply_working_dir(&self) -> Result<(), AppError> {
        let Some(dir) = &self.engine.working_dir else {
            return Ok(());
        };
        std::env::set_current_dir(dir).map_err(|source| AppError::WorkingDir {
            path: dir.into(),
            source,
        })?;
        log::info!(target: LOG_CHANNEL, "working directory set to '{dir}'");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Modules

    fn load_modules(&mut self) -> Result<(), AppError> {
        let mut statics = self.static_modules.clone();
        #[cfg(feature = "auto_register")]
        statics.extend(StaticModule::collected().copied());

        for module in statics {
            self.add_module(HashString64::new(module.name), (module.create)())?;
        }
        for dir in self.engine.module_directories.clone() {
            self.load_module_directory(Path::new(&dir))?;
        }
        if self.modules.is_empty() {
            log::warn!(target: LOG_CHANNEL, "no modules loaded");
        }

        for loaded in &mut self.modules {
            if !loaded.module.pre_init(&mut self.services.reflection) {
                return Err(AppError::ModuleInit {
                    module: loaded.name.to_string(),
                    phase: "pre_init",
                });
            }
        }
        for (phase, run) in REFLECTION_PHASES {
            for loaded in &mut self.modules {
                let mut registrar = self.services.reflection.module_registrar(loaded.name.clone());
                if !run(&mut *loaded.module, &mut registrar) {
                    return Err(AppError::ModuleInit {
                        module: loaded.name.to_string(),
                        phase,
                    });
                }
            }
        }

        let reflection = &self.services.reflection;
        if reflection.pending_count() > 0 {
            let names = reflection.pending().map(|definition| definition.name().to_string()).collect();
            return Err(AppError::PendingDefinitions { names });
        }
        Ok(())
    }

    /// Loads every `<Name>Module` library in `dir`, sorted by path.
    fn load_module_directory(&mut self, dir: &Path) -> Result<(), AppError> {
        let entries = std::fs::read_dir(dir).map_err(|source| AppError::ModuleDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| AppError::ModuleDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let Some(name) = module_name_from_path(&path) else {
                continue;
            };
            let name = String::from(name);
            let library = self.loader.load_module(&path, &name)?;
            let create = library.create_fn().ok_or_else(|| AppError::MissingSymbol {
                module: name.clone(),
                symbol: CREATE_MODULE,
            })?;
            let init = library.init_fn();

            if let Some(init) = init
                && !init()
            {
                return Err(AppError::ModuleInit {
                    module: name,
                    phase: "InitModule",
                });
            }
            let module = create().ok_or_else(|| AppError::ModuleInit {
                module: name.clone(),
                phase: "CreateModule",
            })?;
            self.add_module(HashString64::new(name), module)?;
        }
        Ok(())
    }

    fn add_module(&mut self, name: HashString64, module: Box<dyn Module>) -> Result<(), AppError> {
        if self.modules.iter().any(|loaded| loaded.name.hash() == name.hash()) {
            return Err(AppError::DuplicateModule(name.to_string()));
        }
        log::info!(target: LOG_CHANNEL, "added module '{name}'");
        self.modules.push(LoadedModule { name, module });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Managers

    /// Creates the managers of the `module_load_order` modules, in order.
    fn load_order_managers(&self) -> Vec<Arc<ClassDefinition>> {
        let reflection = &self.services.reflection;
        self.engine
            .module_load_order
            .iter()
            .filter_map(|module| reflection.get_module_type_bucket(MANAGER_BUCKET, Hash64::of_str(module)))
            .flatten()
            .cloned()
            .collect()
    }

    /// Creates `manager_creation_order`, then the managers of the
    /// `module_load_order` modules, then every remaining one.
    fn create_managers(&mut self) -> Result<(), AppError> {
        let reflection = &self.services.reflection;
        let mut order = Vec::new();
        for name in &self.engine.manager_creation_order {
            let definition = reflection
                .get_reflection(Hash64::of_str(name))
                .ok_or_else(|| AppError::UnknownManager(name.clone()))?;
            order.push(definition.clone());
        }
        order.extend(self.load_order_managers());
        if let Some(bucket) = reflection.get_type_bucket(MANAGER_BUCKET) {
            order.extend(bucket.iter().cloned());
        }

        for definition in order {
            if !self.services.has_manager(definition.hash()) {
                self.create_manager(definition)?;
            }
        }
        Ok(())
    }

    fn create_manager(&mut self, definition: Arc<ClassDefinition>) -> Result<(), AppError> {
        let name = definition.name().as_str();
        let mut manager = definition
            .create_t::<dyn Manager, ()>(())
            .ok_or_else(|| AppError::ManagerCreate(String::from(name)))?;

        let stage = if !manager.init(&self.services.context()) {
            Some("init")
        } else if !manager.init_thread(self.main_thread) {
            Some("init_thread")
        } else {
            None
        };
        if let Some(stage) = stage {
            return Err(AppError::ManagerInit {
                manager: String::from(name),
                stage,
            });
        }

        log::info!(target: LOG_CHANNEL, "created manager '{name}'");
        self.services.managers.push(ManagerSlot {
            definition,
            manager: Some(manager),
        });
        Ok(())
    }

    /// Runs `init_all_modules_loaded` on the load-order managers, loads
    /// the global configs, then runs it on every other manager.
    fn init_all_modules_loaded(&mut self) -> Result<(), AppError> {
        let first_wave: Vec<Hash64> = self.load_order_managers().iter().map(|definition| definition.hash()).collect();
        for hash in &first_wave {
            self.services.notify_all_modules_loaded(*hash)?;
        }

        self.services
            .configs
            .create_all(&self.services.reflection, &self.config_loader)?;

        let second_wave: Vec<Hash64> = self
            .services
            .managers
            .iter()
            .map(ManagerSlot::hash)
            .filter(|hash| !first_wave.contains(hash))
            .collect();
        for hash in second_wave {
            self.services.notify_all_modules_loaded(hash)?;
        }
        Ok(())
    }

    fn create_main_loop(&mut self) -> Result<(), AppError> {
        let bucket = self.services.reflection.get_type_bucket(MAIN_LOOP_BUCKET).unwrap_or(&[]);
        let definition = match &self.engine.main_loop {
            Some(name) => bucket.iter().find(|definition| definition.hash() == Hash64::of_str(name)),
            None => bucket.first(),
        };
        let definition = definition.cloned().ok_or_else(|| {
            let name = self.engine.main_loop.as_deref().unwrap_or(<dyn MainLoop>::TYPE_NAME);
            AppError::MissingMainLoop(String::from(name))
        })?;

        let name = definition.name().as_str();
        let mut main_loop = definition
            .create_t::<dyn MainLoop, ()>(())
            .ok_or_else(|| AppError::MainLoopInit(String::from(name)))?;
        if !main_loop.init(&self.services.context()) {
            return Err(AppError::MainLoopInit(String::from(name)));
        }
        log::info!(target: LOG_CHANNEL, "created main loop '{name}'");
        self.main_loop = Some(main_loop);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Run

    /// Updates the main loop until it returns `false` or the app quits.
    pub fn run(&mut self) {
        let Some(main_loop) = self.main_loop.as_mut() else {
            log::warn!(target: LOG_CHANNEL, "run called without a main loop");
            return;
        };
        while !self.services.quit.load(Ordering::Relaxed) {
            if !main_loop.update(&self.services.context()) {
                break;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Teardown

    /// Drops the managers and global configs of module `name`, shuts
    /// the module down and unloads its reflection and library.
    ///
    /// Managers and configs of other modules whose type derives from a
    /// type of `name` are dropped as well.
    pub fn unload_module(&mut self, name: Hash64) {
        self.services.reflection.unload_module(name);
        let reflection = &self.services.reflection;
        self.services
            .managers
            .retain(|slot| reflection.is_defined(slot.hash()));
        self.services.configs.retain_defined(reflection);

        if let Some(index) = self.modules.iter().position(|loaded| loaded.name.hash() == name) {
            let mut loaded = self.modules.remove(index);
            loaded.module.shutdown();
            log::info!(target: LOG_CHANNEL, "shut down module '{}'", loaded.name);
        }
        self.loader.unload_module(name);
    }

    /// Tears the app down.
    ///
    /// Modules named in `module_unload_order` go first, in that order.
    /// The remaining managers are then dropped and the remaining modules
    /// shut down, both most recent first. Calling it twice is harmless.
    pub fn destroy(&mut self) {
        let thread = self.main_thread;
        for slot in &mut self.services.managers {
            if let Some(manager) = slot.manager.as_mut() {
                manager.destroy_thread(thread);
            }
        }
        if let Some(mut main_loop) = self.main_loop.take() {
            main_loop.destroy(&self.services.context());
        }
        self.services.configs.clear();

        for module in self.engine.module_unload_order.clone() {
            self.unload_module(Hash64::of_str(&module));
        }

        while let Some(slot) = self.services.managers.pop() {
            drop(slot);
        }
        while let Some(mut loaded) = self.modules.pop() {
            loaded.module.shutdown();
            log::info!(target: LOG_CHANNEL, "shut down module '{}'", loaded.name);
        }
        self.services.reflection.destroy();
        self.loader.clear();
        log::info!(target: LOG_CHANNEL, "App destroyed");
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use shib_reflect::prelude::*;

    use super::App;
    use crate::{
        AppError, ConfigLoader, EngineConfig, GlobalConfigAttribute, MainLoop, Manager, ManagerContext, Module,
        StaticModule,
    };

    std::thread_local! {
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(event: &str) {
        EVENTS.with_borrow_mut(|events| events.push(String::from(event)));
    }

    fn take_events() -> Vec<String> {
        EVENTS.with_borrow_mut(core::mem::take)
    }

    macro_rules! test_manager {
        ($ty:ident = $name:literal) => {
            #[derive(Default)]
            struct $ty;

            impl_type_name!($ty = $name);

            impl Manager for $ty {
                fn init(&mut self, _: &ManagerContext<'_>) -> bool {
                    record(concat!("init ", stringify!($ty)));
                    true
                }

                fn init_all_modules_loaded(&mut self, _: &ManagerContext<'_>) -> bool {
                    record(concat!("loaded ", stringify!($ty)));
                    true
                }
            }
        };
    }

    macro_rules! register_manager {
        ($registrar:expr, $ty:ty) => {
            ReflectionDefinition::<$ty>::new()
                .interface::<dyn Manager>(trait_cast!($ty => dyn Manager))
                .default_ctor()
                .finish($registrar)
        };
    }

    test_manager!(Log = "Test::Log");
    test_manager!(Audio = "Test::Audio");
    test_manager!(Physics = "Test::Physics");

    #[derive(Default)]
    struct Broken;

    impl_type_name!(Broken = "Test::Broken");

    impl Manager for Broken {
        fn init(&mut self, _: &ManagerContext<'_>) -> bool {
            false
        }
    }

    struct CoreModule;

    impl Module for CoreModule {
        fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
            register_manager!(registrar, Log);
            register_manager!(registrar, Audio);
            true
        }

        fn shutdown(&mut self) {
            record("shutdown Core");
        }
    }

    struct GameModule;

    impl Module for GameModule {
        fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
            register_manager!(registrar, Physics);
            true
        }

        fn shutdown(&mut self) {
            record("shutdown Game");
        }
    }

    struct BrokenModule;

    impl Module for BrokenModule {
        fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
            register_manager!(registrar, Broken);
            true
        }
    }

    fn headless(engine: EngineConfig) -> EngineConfig {
        EngineConfig {
            no_main_loop: true,
            ..engine
        }
    }

    fn app_with_core_and_game(engine: EngineConfig) -> App {
        let mut app = App::new(headless(engine));
        app.add_static_module(StaticModule::new("Core", || Box::new(CoreModule)));
        app.add_static_module(StaticModule::new("Game", || Box::new(GameModule)));
        app
    }

    #[test]
    fn managers_follow_the_configured_order() {
        take_events();
        let mut app = app_with_core_and_game(EngineConfig {
            module_load_order: vec![String::from("Game")],
            manager_creation_order: vec![String::from("Test::Audio")],
            ..EngineConfig::default()
        });
        app.init().unwrap();

        assert_eq!(app.manager_count(), 3);
        assert!(app.get_manager::<Physics>().is_some());
        assert_eq!(
            take_events(),
            [
                "init Audio",
                "init Physics",
                "init Log",
                "loaded Physics",
                "loaded Audio",
                "loaded Log",
            ]
        );

        let names: Vec<&str> = app.module_names().map(|name| name.as_str()).collect();
        assert_eq!(names, ["Core", "Game"]);
        app.destroy();
    }

    #[test]
    fn destroy_honors_the_unload_order() {
        let mut app = app_with_core_and_game(EngineConfig {
            module_unload_order: vec![String::from("Core")],
            ..EngineConfig::default()
        });
        app.init().unwrap();
        take_events();

        app.destroy();
        assert_eq!(take_events(), ["shutdown Core", "shutdown Game"]);
        assert_eq!(app.manager_count(), 0);
        assert!(app.reflection().get_reflection_of::<Log>().is_none());

        app.destroy();
        assert!(take_events().is_empty());
    }

    #[test]
    fn unloading_a_module_drops_its_managers() {
        let mut app = app_with_core_and_game(EngineConfig::default());
        app.init().unwrap();
        assert_eq!(app.manager_count(), 3);

        app.unload_module(Hash64::of_str("Game"));
        assert_eq!(app.manager_count(), 2);
        assert!(app.get_manager::<Physics>().is_none());
        assert!(app.reflection().get_reflection_of::<Physics>().is_none());
        assert!(app.get_manager::<Audio>().is_some());
        app.destroy();
    }

    #[test]
    fn failing_managers_abort_bootstrap() {
        let mut app = App::new(headless(EngineConfig {
            manager_creation_order: vec![String::from("Test::Audio"), String::from("Test::Broken")],
            ..EngineConfig::default()
        }));
        app.add_static_module(StaticModule::new("Core", || Box::new(CoreModule)));
        app.add_static_module(StaticModule::new("Broken", || Box::new(BrokenModule)));

        let err = app.init().unwrap_err();
        assert!(matches!(
            err,
            AppError::ManagerInit { ref manager, stage: "init" } if manager == "Test::Broken"
        ));
        assert_eq!(app.manager_count(), 0);
        app.destroy();
    }

    #[test]
    fn unknown_managers_are_fatal() {
        let mut app = app_with_core_and_game(EngineConfig {
            manager_creation_order: vec![String::from("Test::Missing")],
            ..EngineConfig::default()
        });
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::UnknownManager(ref name) if name == "Test::Missing"));
    }

    #[test]
    fn duplicate_modules_are_fatal() {
        let mut app = App::new(headless(EngineConfig::default()));
        app.add_static_module(StaticModule::new("Core", || Box::new(CoreModule)));
        app.add_static_module(StaticModule::new("Core", || Box::new(CoreModule)));
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::DuplicateModule(ref name) if name == "Core"));
    }

    #[test]
    fn missing_module_directories_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(headless(EngineConfig {
            module_directories: vec![dir.path().join("missing").display().to_string()],
            ..EngineConfig::default()
        }));
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::ModuleDirectory { .. }));
    }

    #[test]
    fn module_directories_skip_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a module").unwrap();

        let mut app = App::new(headless(EngineConfig {
            module_directories: vec![dir.path().display().to_string()],
            ..EngineConfig::default()
        }));
        app.init().unwrap();
        assert!(app.loader().is_empty());
        app.destroy();
    }

    #[test]
    fn bases_that_never_register_are_fatal() {
        #[derive(Default)]
        struct Orphan {
            parent: Parent,
        }

        #[derive(Default)]
        struct Parent;

        impl_type_name!(Orphan = "Test::Orphan");
        impl_type_name!(Parent = "Test::Parent");

        struct OrphanModule;

        impl Module for OrphanModule {
            fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
                ReflectionDefinition::<Orphan>::new()
                    .base::<Parent>(field!(Orphan, parent))
                    .finish(registrar);
                true
            }
        }

        let mut app = App::new(headless(EngineConfig::default()));
        app.add_static_module(StaticModule::new("Orphans", || Box::new(OrphanModule)));
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::PendingDefinitions { ref names } if names == &["Test::Orphan"]));
    }

    #[test]
    fn flags_skip_stages() {
        let mut app = app_with_core_and_game(EngineConfig {
            no_load_modules: true,
            ..EngineConfig::default()
        });
        app.init().unwrap();
        assert_eq!(app.module_names().count(), 0);
        assert_eq!(app.manager_count(), 0);

        let mut app = app_with_core_and_game(EngineConfig {
            no_managers: true,
            ..EngineConfig::default()
        });
        app.init().unwrap();
        assert_eq!(app.module_names().count(), 2);
        assert_eq!(app.manager_count(), 0);
        app.destroy();
    }

    // -------------------------------------------------------------------------
    // Main loop

    #[derive(Default)]
    struct Counter {
        frames: u32,
    }

    impl_type_name!(Counter = "Test::Counter");

    impl MainLoop for Counter {
        fn update(&mut self, context: &ManagerContext<'_>) -> bool {
            self.frames += 1;
            record("frame");
            if self.frames == 2 {
                context.quit();
            }
            self.frames < 5
        }

        fn destroy(&mut self, _: &ManagerContext<'_>) {
            record("destroy Counter");
        }
    }

    struct LoopModule;

    impl Module for LoopModule {
        fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
            ReflectionDefinition::<Counter>::new()
                .interface::<dyn MainLoop>(trait_cast!(Counter => dyn MainLoop))
                .default_ctor()
                .finish(registrar);
            true
        }
    }

    #[test]
    fn main_loop_runs_until_quit() {
        take_events();
        let mut app = App::new(EngineConfig::default());
        app.add_static_module(StaticModule::new("Loop", || Box::new(LoopModule)));
        app.init().unwrap();

        app.run();
        assert!(app.is_quitting());
        app.destroy();
        assert_eq!(take_events(), ["frame", "frame", "destroy Counter"]);
    }

    #[test]
    fn unknown_main_loops_are_fatal() {
        let mut app = App::new(EngineConfig {
            main_loop: Some(String::from("Test::Elsewhere")),
            ..EngineConfig::default()
        });
        app.add_static_module(StaticModule::new("Loop", || Box::new(LoopModule)));
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::MissingMainLoop(ref name) if name == "Test::Elsewhere"));
    }

    // -------------------------------------------------------------------------
    // Global configs

    #[derive(Default)]
    struct WindowConfig {
        width: u32,
        height: u32,
    }

    impl_type_name!(WindowConfig = "Test::WindowConfig");

    #[derive(Default)]
    struct AudioConfig {
        volume: f32,
    }

    impl_type_name!(AudioConfig = "Test::AudioConfig");

    #[derive(Default)]
    struct Checker;

    impl_type_name!(Checker = "Test::Checker");

    impl Manager for Checker {
        fn init(&mut self, context: &ManagerContext<'_>) -> bool {
            context.get_config::<WindowConfig>().is_none()
        }

        fn init_all_modules_loaded(&mut self, context: &ManagerContext<'_>) -> bool {
            context.get_config::<WindowConfig>().is_some_and(|config| config.width == 1920)
        }
    }

    struct ConfigModule {
        fatal_audio: bool,
    }

    impl Module for ConfigModule {
        fn init_reflection_classes(&mut self, registrar: &mut Registrar<'_>) -> bool {
            ReflectionDefinition::<WindowConfig>::new()
                .class_attrs(&[&GlobalConfigAttribute::new("window")])
                .var("width", field!(WindowConfig, width), &[])
                .var("height", field!(WindowConfig, height), &[&OptionalAttribute])
                .default_ctor()
                .finish(registrar);

            let audio = if self.fatal_audio {
                GlobalConfigAttribute::fatal("audio")
            } else {
                GlobalConfigAttribute::new("audio")
            };
            ReflectionDefinition::<AudioConfig>::new()
                .class_attrs(&[&audio])
                .var("volume", field!(AudioConfig, volume), &[])
                .default_ctor()
                .finish(registrar);

            register_manager!(registrar, Checker);
            true
        }
    }

    fn config_app(dir: &std::path::Path, fatal_audio: bool) -> App {
        let mut app = App::new(headless(EngineConfig::default())).with_config_loader(ConfigLoader::new(dir));
        let create: fn() -> Box<dyn Module> = if fatal_audio {
            || Box::new(ConfigModule { fatal_audio: true })
        } else {
            || Box::new(ConfigModule { fatal_audio: false })
        };
        app.add_static_module(StaticModule::new("Config", create));
        app
    }

    #[test]
    fn global_configs_load_before_the_second_wave() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("window.cfg"), r#"{ "width": 1920 }"#).unwrap();

        let mut app = config_app(dir.path(), false);
        app.init().unwrap();

        let window = app.get_config::<WindowConfig>().unwrap();
        assert_eq!((window.width, window.height), (1920, 0));
        // Missing and not fatal: kept at its defaults.
        assert_eq!(app.get_config::<AudioConfig>().unwrap().volume, 0.0);
        app.destroy();
        assert!(app.get_config::<WindowConfig>().is_none());
    }

    #[test]
    fn unloading_a_module_drops_its_configs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("window.cfg"), r#"{ "width": 1920 }"#).unwrap();

        let mut app = config_app(dir.path(), false);
        app.init().unwrap();
        assert!(app.get_config::<WindowConfig>().is_some());

        app.unload_module(Hash64::of_str("Config"));
        assert!(app.get_config::<WindowConfig>().is_none());
        assert!(app.get_config::<AudioConfig>().is_none());
        assert_eq!(app.manager_count(), 0);
        app.destroy();
    }

    #[test]
    fn fatal_global_configs_must_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("window.cfg"), r#"{ "width": 1920 }"#).unwrap();

        let mut app = config_app(dir.path(), true);
        let err = app.init().unwrap_err();
        assert!(matches!(err, AppError::GlobalConfigCreate { ref name, .. } if name == "Test::AudioConfig"));
        assert_eq!(app.manager_count(), 0);
        assert!(app.get_config::<WindowConfig>().is_none());
    }

    #[test]
    fn from_args_reads_the_engine_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.cfg"),
            r#"{ "engine": { "no_main_loop": true, "module_load_order": ["Game"] } }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("extra.cfg"), r#"{ "engine": { "no_managers": true } }"#).unwrap();

        let extra = dir.path().join("extra.cfg").display().to_string();
        let app = App::from_args(ConfigLoader::new(dir.path()), &["--verbose", extra.as_str()]).unwrap();
        let engine = app.engine_config();
        assert!(engine.no_main_loop && engine.no_managers);
        assert_eq!(engine.module_load_order, ["Game"]);
        assert_eq!(app.app_config()["engine"]["no_managers"], true);
    }
}
