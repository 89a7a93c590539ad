// Wrench Native Module Loader
// Providers run native module init/quit routines. A module can come from a
// statically linked table of function pointers or from a shared library opened
// at runtime.

#[cfg(not(target_arch = "wasm32"))]
pub mod dylib;
pub mod static_module;

use std::ffi::c_void;

use crate::context::Context;
use crate::error::Result;

#[cfg(not(target_arch = "wasm32"))]
pub use dylib::DynamicLibrary;
pub use static_module::StaticModule;

/// Exported `<name>Init`. Receives the Context as an opaque pointer and
/// returns false to abort the load.
pub type LibraryInitFn = unsafe extern "C" fn(*mut c_void) -> bool;

/// Exported `<name>Quit`
pub type LibraryQuitFn = extern "C" fn();

/// Position of an initialized provider in its Context's load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(pub(crate) usize);

impl ProviderId {
    pub fn index(&self) -> usize {
        self.0
    }
}

pub fn init_symbol(module: &str) -> String {
    format!("{}Init", module)
}

pub fn quit_symbol(module: &str) -> String {
    format!("{}Quit", module)
}

/// Source of native code for one module
pub trait NativeModuleProvider {
    fn name(&self) -> &str;

    /// Register the module's source, classes and methods. An error aborts
    /// the load and the provider is unloaded without `quit`.
    fn init(&self, ctx: &mut Context) -> Result<()>;

    /// Called once at Context teardown
    fn quit(&self) {}

    /// Release the provider after every provider has quit
    fn unload(self: Box<Self>) {}
}

/// Recover the Context passed to an exported `<name>Init`.
///
/// # Safety
///
/// `ctx` must be the pointer handed to the init routine by this crate, and
/// the reference must not outlive that call.
pub unsafe fn context_from_raw<'a>(ctx: *mut c_void) -> &'a mut Context {
    &mut *(ctx as *mut Context)
}
