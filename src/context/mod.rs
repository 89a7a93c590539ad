// Wrench Context
// Per-VM extension state: the registry and its arenas, loaded native
// providers, host callbacks and a handful of user-facing settings.

mod hooks;
pub mod source;

use std::any::Any;
use std::fmt;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::loader::{NativeModuleProvider, ProviderId, StaticModule};
use crate::registry::{Registry, SourceText};
use crate::vm::{FinalizerFn, ForeignMethodFn};

pub use hooks::{GlobalHooks, GlobalInitHook, GlobalQuitHook};
pub use source::{default_file_free, default_file_read, FileFreeFn, FileReadFn};

pub const USER_DATA_SLOTS: usize = 16;

/// Longest last-error message kept, in bytes
pub const MAX_ERROR_LEN: usize = 4095;

pub struct Context {
    registry: Registry,
    error: String,
    base_path: String,
    script_extension: String,
    command_line: Vec<String>,
    user_data: [Option<Box<dyn Any>>; USER_DATA_SLOTS],
    file_read: FileReadFn,
    file_free: FileFreeFn,
    foreign_library_loading: bool,
    static_modules: FxHashMap<String, StaticModule>,
    /// Initialized providers in load order
    providers: Vec<Box<dyn NativeModuleProvider>>,
    torn_down: bool,
}

impl Context {
    /// Create a context and run the global init hooks, if given. A failing
    /// hook tears the context down again (without global quit hooks).
    pub fn new<I, S>(config: ContextConfig, args: I, hooks: Option<&GlobalHooks>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = Context {
            registry: Registry::new(config.node_arena_size, config.source_arena_size),
            error: String::new(),
            base_path: config.resolved_base_path().to_string(),
            script_extension: config.script_extension.clone(),
            command_line: args.into_iter().map(Into::into).collect(),
            user_data: std::array::from_fn(|_| None),
            file_read: default_file_read,
            file_free: default_file_free,
            foreign_library_loading: config.foreign_library_loading,
            static_modules: FxHashMap::default(),
            providers: Vec::new(),
            torn_down: false,
        };

        if let Some(hooks) = hooks {
            if let Err(err) = hooks.run_init(&mut ctx) {
                warn!("global init hook failed: {}", err);
                return Err(err);
            }
        }

        debug!("context created ({:?})", ctx.registry);
        Ok(ctx)
    }

    /// Run global quit hooks (if given), then quit and unload every provider
    pub fn shutdown(mut self, hooks: Option<&GlobalHooks>) {
        if let Some(hooks) = hooks {
            hooks.run_quit();
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let attached: Vec<ProviderId> = self.registry.attached_providers().collect();
        for id in &attached {
            let provider = &self.providers[id.0];
            debug!("quitting module \"{}\"", provider.name());
            provider.quit();
        }

        for (index, provider) in self.providers.iter().enumerate() {
            if !attached.contains(&ProviderId(index)) {
                warn!(
                    "provider \"{}\" never registered its module, quitting anyway",
                    provider.name()
                );
                provider.quit();
            }
        }

        for provider in self.providers.drain(..) {
            provider.unload();
        }
    }

    // ==================== Errors ====================

    /// Last recorded diagnostic; empty when nothing has failed yet
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Overwrite the last-error string, truncating long messages
    pub fn set_error(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        if message.len() > MAX_ERROR_LEN {
            let mut end = MAX_ERROR_LEN;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        self.error = message;
    }

    pub(crate) fn record(&mut self, err: Error) -> Error {
        debug!("{}", err);
        self.set_error(err.to_string());
        err
    }

    // ==================== Settings ====================

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn set_base_path(&mut self, path: impl Into<String>) {
        self.base_path = path.into();
    }

    pub fn script_extension(&self) -> &str {
        &self.script_extension
    }

    pub fn command_line(&self) -> &[String] {
        &self.command_line
    }

    /// Replace the stored arguments as a unit
    pub fn set_command_line<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_line = args.into_iter().map(Into::into).collect();
    }

    pub fn foreign_library_loading(&self) -> bool {
        self.foreign_library_loading
    }

    pub fn set_foreign_library_loading(&mut self, enabled: bool) {
        self.foreign_library_loading = enabled;
    }

    pub fn file_read_callback(&self) -> FileReadFn {
        self.file_read
    }

    pub fn set_file_read_callback(&mut self, callback: FileReadFn) {
        self.file_read = callback;
    }

    pub fn file_free_callback(&self) -> FileFreeFn {
        self.file_free
    }

    pub fn set_file_free_callback(&mut self, callback: FileFreeFn) {
        self.file_free = callback;
    }

    // ==================== User Data ====================

    fn check_slot(slot: usize) {
        assert!(
            slot < USER_DATA_SLOTS,
            "user data slot {} out of range (0..{})",
            slot,
            USER_DATA_SLOTS
        );
    }

    pub fn set_user_data<T: Any>(&mut self, slot: usize, value: T) {
        Self::check_slot(slot);
        self.user_data[slot] = Some(Box::new(value));
    }

    /// `None` when the slot is empty or holds another type
    pub fn user_data<T: Any>(&self, slot: usize) -> Option<&T> {
        Self::check_slot(slot);
        self.user_data[slot].as_ref()?.downcast_ref()
    }

    pub fn user_data_mut<T: Any>(&mut self, slot: usize) -> Option<&mut T> {
        Self::check_slot(slot);
        self.user_data[slot].as_mut()?.downcast_mut()
    }

    pub fn take_user_data(&mut self, slot: usize) -> Option<Box<dyn Any>> {
        Self::check_slot(slot);
        self.user_data[slot].take()
    }

    // ==================== Registry ====================

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn module_source(&self, name: &str) -> Option<&str> {
        self.registry.module_source(name)
    }

    pub fn begin_module(&mut self, name: &str) -> Result<()> {
        self.registry.begin_module(name).map_err(|e| self.record(e))
    }

    pub fn code(&mut self, source: &str) -> Result<()> {
        self.registry.code(source).map_err(|e| self.record(e))
    }

    pub fn code_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.registry.code_fmt(args).map_err(|e| self.record(e))
    }

    pub fn end_module(&mut self) -> Result<()> {
        self.registry.end_module().map_err(|e| self.record(e))
    }

    pub fn register_module(&mut self, name: &str, source: Option<&str>) -> Result<()> {
        self.registry
            .register_module(name, source)
            .map_err(|e| self.record(e))
    }

    pub fn register_module_static(&mut self, name: &str, source: &'static str) -> Result<()> {
        self.registry
            .register_module_static(name, source)
            .map_err(|e| self.record(e))
    }

    pub fn register_class(
        &mut self,
        module: &str,
        class: &str,
        allocate: Option<ForeignMethodFn>,
        finalize: Option<FinalizerFn>,
    ) -> Result<()> {
        self.registry
            .register_class(module, class, allocate, finalize)
            .map_err(|e| self.record(e))
    }

    pub fn register_method(
        &mut self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
        method: ForeignMethodFn,
    ) -> Result<()> {
        self.registry
            .register_method(module, class, is_static, signature, method)
            .map_err(|e| self.record(e))
    }

    // ==================== Providers ====================

    /// Make a statically linked module loadable by name. Replaces any
    /// earlier module with the same name that has not been loaded yet.
    pub fn add_static_module(&mut self, module: StaticModule) {
        let name = module.name().to_string();
        debug!("static module \"{}\" available", name);
        self.static_modules.insert(name, module);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Initialized provider for `name`, if any
    pub fn loaded_provider(&self, name: &str) -> Option<ProviderId> {
        self.providers
            .iter()
            .position(|p| p.name() == name)
            .map(ProviderId)
    }

    fn find_provider(&mut self, name: &str) -> Result<Box<dyn NativeModuleProvider>> {
        if let Some(module) = self.static_modules.get(name) {
            return Ok(Box::new(module.clone()));
        }

        if !self.foreign_library_loading {
            return Err(Error::ModuleNotFound {
                module: name.to_string(),
            });
        }

        self.open_library(name)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn open_library(&mut self, name: &str) -> Result<Box<dyn NativeModuleProvider>> {
        let library = crate::loader::DynamicLibrary::open(name, &self.base_path)?;
        Ok(Box::new(library))
    }

    #[cfg(target_arch = "wasm32")]
    fn open_library(&mut self, name: &str) -> Result<Box<dyn NativeModuleProvider>> {
        Err(Error::ModuleNotFound {
            module: name.to_string(),
        })
    }

    /// Run the init routine of a provider named `name`.
    ///
    /// `Ok(None)` when nothing provides the module. Init failure unloads the
    /// provider and is returned as an error. On success the provider is
    /// attached to the module if its init registered one.
    /// A provider already initialized under `name` is returned as is and its
    /// init is not run again.
    pub fn load_native_module(&mut self, name: &str) -> Result<Option<ProviderId>> {
        if let Some(id) = self.loaded_provider(name) {
            debug!("native module \"{}\" already initialized", name);
            return Ok(Some(id));
        }

        let provider = match self.find_provider(name) {
            Ok(provider) => provider,
            Err(err @ Error::ModuleNotFound { .. }) => {
                debug!("no native provider for \"{}\": {}", name, err);
                return Ok(None);
            }
            Err(err) => {
                // A missing library is not fatal, the file fallback may still work
                self.record(err);
                return Ok(None);
            }
        };

        if let Err(err) = provider.init(self) {
            provider.unload();
            return Err(self.record(err));
        }

        let id = ProviderId(self.providers.len());
        self.providers.push(provider);
        debug!("initialized native module \"{}\"", name);

        if let Some(index) = self.registry.find_module(name) {
            if self.registry.module_provider(index).is_none() {
                self.registry.attach_provider(index, id);
            }
        }
        Ok(Some(id))
    }

    // ==================== Source Files ====================

    /// Read a module's script through the file callbacks and register it.
    /// A registered module without source gets the file's text. Returns the
    /// registered module name.
    pub fn load_source_file(&mut self, name: &str) -> Result<String> {
        let module = source::strip_script_extension(name, &self.script_extension).to_string();

        let text = (self.file_read)(self, name).map_err(|e| self.record(e))?;
        let copied = self.registry.copy_source(&text);
        (self.file_free)(self, text);
        let source = SourceText::Arena(copied.map_err(|e| self.record(e))?);

        match self.registry.find_module(&module) {
            Some(index) => {
                if self.registry.module_source(&module).is_none() {
                    self.registry.set_module_source(index, source);
                }
            }
            None => {
                self.registry
                    .insert_module(&module, |_| Ok(Some(source)))
                    .map_err(|e| self.record(e))?;
            }
        }

        debug!("loaded source file for module \"{}\"", module);
        Ok(module)
    }

    /// Attach an initialized provider to `module` if nothing else claimed it
    pub(crate) fn adopt_provider(&mut self, module: &str, id: ProviderId) {
        if self.registry.attached_providers().any(|p| p == id) {
            return;
        }
        if let Some(index) = self.registry.find_module(module) {
            if self.registry.module_provider(index).is_none() {
                self.registry.attach_provider(index, id);
            }
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("registry", &self.registry)
            .field("base_path", &self.base_path)
            .field("command_line", &self.command_line)
            .field("foreign_library_loading", &self.foreign_library_loading)
            .field("providers", &self.provider_names())
            .field("error", &self.error)
            .finish()
    }
}
