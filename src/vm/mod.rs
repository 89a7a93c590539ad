// Wrench Host VM Boundary
// The scripting VM is an external dependency. This module describes only what
// the registry needs from it: slot-based value marshaling for native methods,
// and the hooks the VM calls while resolving and binding modules.

pub mod slots;

pub use slots::SlotExt;

/// Module names the VM provides itself. They never reach the registry.
pub const BUILTIN_MODULES: [&str; 2] = ["meta", "random"];

pub fn is_builtin_module(name: &str) -> bool {
    BUILTIN_MODULES.contains(&name)
}

/// Type tag of a VM slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Bool,
    Num,
    Foreign,
    List,
    Map,
    Null,
    String,
    Unknown,
}

/// Slot-based value marshaling offered by the VM to native methods.
/// Slot 0 holds the receiver on entry and the return value on exit.
pub trait Slots {
    fn slot_count(&self) -> usize;
    fn ensure_slots(&mut self, count: usize);
    fn slot_type(&self, slot: usize) -> SlotType;

    fn get_slot_bool(&self, slot: usize) -> bool;
    fn set_slot_bool(&mut self, slot: usize, value: bool);

    fn get_slot_double(&self, slot: usize) -> f64;
    fn set_slot_double(&mut self, slot: usize, value: f64);

    fn get_slot_string(&self, slot: usize) -> &str;
    fn set_slot_string(&mut self, slot: usize, value: &str);

    fn set_slot_null(&mut self, slot: usize);

    /// Abort the current fiber with the value in `slot` as the error
    fn abort_fiber(&mut self, slot: usize);
}

/// Native implementation of a foreign method (or a foreign class allocator)
pub type ForeignMethodFn = fn(&mut dyn Slots);

/// Called by the VM when a foreign object's storage is released
pub type FinalizerFn = fn(&mut [u8]);

/// Allocate/finalize pair returned when the VM binds a foreign class.
/// `None` means the VM's default behavior applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignClassMethods {
    pub allocate: Option<ForeignMethodFn>,
    pub finalize: Option<FinalizerFn>,
}

/// Outcome of a module load request. `source == None` reports the module
/// as not found through the VM's own error channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadModuleResult {
    pub source: Option<String>,
}

impl LoadModuleResult {
    pub fn found(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.source.is_some()
    }
}

/// Kinds of diagnostics the VM reports through [`VmCallbacks::error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmErrorKind {
    Compile,
    Runtime,
    StackTrace,
}

/// Hooks a VM invokes during its module-resolution protocol
pub trait VmCallbacks {
    /// Canonical name for `name` as imported from `importer`
    fn resolve_module(&mut self, importer: &str, name: &str) -> String;

    fn load_module(&mut self, name: &str) -> LoadModuleResult;

    /// `None` tells the VM nobody outside it provides the method
    fn bind_foreign_method(
        &mut self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
    ) -> Option<ForeignMethodFn>;

    fn bind_foreign_class(&mut self, module: &str, class: &str) -> ForeignClassMethods;

    fn write(&mut self, text: &str);

    fn error(&mut self, kind: VmErrorKind, module: Option<&str>, line: i32, message: &str);
}
