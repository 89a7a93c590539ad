// Wrench
// Native extension registry and module loader for an embedded Wren VM

pub mod arena;
pub mod bridge;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod loader;
pub mod registry;
pub mod vm;

pub use config::ContextConfig;
pub use context::{Context, GlobalHooks};
pub use error::{Error, ErrorKind, Result};
pub use loader::{NativeModuleProvider, StaticModule};
pub use registry::Registry;
pub use vm::{ForeignClassMethods, ForeignMethodFn, LoadModuleResult, SlotExt, Slots, VmCallbacks};
