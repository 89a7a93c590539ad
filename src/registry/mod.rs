// Wrench Registry
// Module -> Class -> Method records for natively implemented code.
//
// Lookups are linear scans over ordered lists. Binding removes the matched
// method (and a class once it has no methods left), so the lists shrink as the
// VM resolves foreign declarations. Modules are never removed so their source
// stays queryable.

mod record;

use std::fmt::{self, Write as _};
use std::mem::size_of;

use log::debug;

use crate::arena::{Arena, ArenaKind, ArenaRef, ArenaWriter};
use crate::error::Result;
use crate::loader::ProviderId;
use crate::vm::{FinalizerFn, ForeignClassMethods, ForeignMethodFn};

pub(crate) use record::{ClassRecord, MethodRecord, ModuleRecord};
pub use record::SourceText;

/// Module currently assembled through begin_module/code/end_module
struct ModuleBuild {
    module: ModuleRecord,
    /// Source arena mark when the build started
    base: usize,
}

#[derive(Clone, Copy)]
enum Target {
    Building,
    Listed(usize),
}

pub struct Registry {
    nodes: Arena,
    sources: Arena,
    modules: Vec<ModuleRecord>,
    building: Option<ModuleBuild>,
}

impl Registry {
    pub fn new(node_arena_size: usize, source_arena_size: usize) -> Self {
        Self {
            nodes: Arena::new(ArenaKind::Node, node_arena_size),
            sources: Arena::new(ArenaKind::Source, source_arena_size),
            modules: Vec::new(),
            building: None,
        }
    }

    pub fn node_arena(&self) -> &Arena {
        &self.nodes
    }

    pub fn source_arena(&self) -> &Arena {
        &self.sources
    }

    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// Name of the module between begin_module and end_module, if any
    pub fn building_module(&self) -> Option<&str> {
        self.building
            .as_ref()
            .map(|build| self.nodes.str(build.module.name))
    }

    // ==================== Lookup ====================

    pub fn find_module(&self, name: &str) -> Option<usize> {
        self.modules
            .iter()
            .position(|module| self.nodes.bytes(module.name) == name.as_bytes())
    }

    fn find_class_in(&self, module: &ModuleRecord, name: &str) -> Option<usize> {
        module
            .classes
            .iter()
            .position(|class| self.nodes.bytes(class.name) == name.as_bytes())
    }

    fn find_method_in(&self, class: &ClassRecord, is_static: bool, signature: &str) -> Option<usize> {
        class.methods.iter().position(|method| {
            method.is_static == is_static && self.nodes.bytes(method.signature) == signature.as_bytes()
        })
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.find_module(name).is_some()
    }

    pub fn contains_class(&self, module: &str, class: &str) -> bool {
        self.find_module(module)
            .and_then(|m| self.find_class_in(&self.modules[m], class))
            .is_some()
    }

    pub fn contains_method(&self, module: &str, class: &str, is_static: bool, signature: &str) -> bool {
        let Some(m) = self.find_module(module) else {
            return false;
        };
        let Some(c) = self.find_class_in(&self.modules[m], class) else {
            return false;
        };
        self.find_method_in(&self.modules[m].classes[c], is_static, signature)
            .is_some()
    }

    pub fn source_text(&self, source: &SourceText) -> &str {
        match source {
            SourceText::Arena(span) => self.sources.str(*span),
            SourceText::Static(text) => text,
        }
    }

    /// Source of a registered module. `None` when the module is unknown or
    /// was registered without source.
    pub fn module_source(&self, name: &str) -> Option<&str> {
        let module = &self.modules[self.find_module(name)?];
        module.source.as_ref().map(|source| self.source_text(source))
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|module| self.nodes.str(module.name))
            .collect()
    }

    /// Classes still waiting to be bound, in registration order
    pub fn class_names(&self, module: &str) -> Option<Vec<&str>> {
        let module = &self.modules[self.find_module(module)?];
        Some(
            module
                .classes
                .iter()
                .map(|class| self.nodes.str(class.name))
                .collect(),
        )
    }

    /// Methods still waiting to be bound
    pub fn method_count(&self, module: &str, class: &str) -> Option<usize> {
        let m = self.find_module(module)?;
        let c = self.find_class_in(&self.modules[m], class)?;
        Some(self.modules[m].classes[c].methods.len())
    }

    // ==================== Source Allocation ====================

    /// Deep-copy a complete source text into the source arena
    pub fn copy_source(&mut self, text: &str) -> Result<ArenaRef> {
        // The builder owns the arena tail between begin_module and end_module
        assert!(
            self.building.is_none(),
            "cannot allocate source code while module \"{}\" is being built",
            self.building_module().unwrap_or_default()
        );
        self.sources.alloc_str(text)
    }

    // ==================== Module Builder ====================

    pub fn begin_module(&mut self, name: &str) -> Result<()> {
        assert!(
            self.find_module(name).is_none(),
            "module \"{}\" is already registered",
            name
        );
        if let Some(current) = self.building_module() {
            panic!(
                "begin_module(\"{}\") called while \"{}\" is still being built",
                name, current
            );
        }

        let base = self.sources.mark();
        self.nodes.allocate(size_of::<ModuleRecord>(), true)?;
        let name_ref = self.nodes.alloc_str(name)?;

        self.building = Some(ModuleBuild {
            module: ModuleRecord::new(name_ref, None),
            base,
        });
        debug!("begin module \"{}\"", name);
        Ok(())
    }

    fn assert_building(&self, operation: &str) {
        assert!(
            self.building.is_some(),
            "{}() called outside of begin_module()/end_module()",
            operation
        );
    }

    pub fn code(&mut self, source: &str) -> Result<()> {
        self.assert_building("code");
        self.sources.append(source.as_bytes())
    }

    /// Formatted variant of [`Registry::code`]; use with `format_args!`
    pub fn code_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.assert_building("code_fmt");
        let mut writer = ArenaWriter::new(&mut self.sources);
        let formatted = writer.write_fmt(args);
        match (formatted, writer.finish()) {
            (_, Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
            (Err(_), Ok(())) => panic!("a formatting trait implementation returned an error"),
        }
    }

    /// Seal the module being built and append it to the module list.
    /// Build state is cleared whether or not this succeeds.
    pub fn end_module(&mut self) -> Result<()> {
        let Some(mut build) = self.building.take() else {
            panic!("end_module() called without begin_module()");
        };

        let span = self.sources.terminate_from(build.base)?;
        assert!(
            !self.sources.bytes(span).contains(&0),
            "source of module \"{}\" contains a NUL byte",
            self.nodes.str(build.module.name)
        );

        build.module.source = Some(SourceText::Arena(span));
        debug!(
            "end module \"{}\" ({} bytes of source)",
            self.nodes.str(build.module.name),
            span.len()
        );
        self.modules.push(build.module);
        Ok(())
    }

    // ==================== Registration ====================

    /// Register a module, copying `source` into the source arena so callers
    /// may pass transient buffers. `None` defers to the file fallback.
    pub fn register_module(&mut self, name: &str, source: Option<&str>) -> Result<()> {
        self.insert_module(name, |registry| match source {
            Some(text) => registry.copy_source(text).map(|span| Some(SourceText::Arena(span))),
            None => Ok(None),
        })
        .map(|_| ())
    }

    /// Register a module whose source outlives the registry, without copying
    pub fn register_module_static(&mut self, name: &str, source: &'static str) -> Result<()> {
        self.insert_module(name, |_| Ok(Some(SourceText::Static(source))))
            .map(|_| ())
    }

    pub(crate) fn insert_module<F>(&mut self, name: &str, source: F) -> Result<usize>
    where
        F: FnOnce(&mut Self) -> Result<Option<SourceText>>,
    {
        assert!(
            self.find_module(name).is_none(),
            "module \"{}\" is already registered",
            name
        );

        self.nodes.allocate(size_of::<ModuleRecord>(), true)?;
        let name_ref = self.nodes.alloc_str(name)?;
        let source = source(self)?;

        self.modules.push(ModuleRecord::new(name_ref, source));
        debug!("registered module \"{}\"", name);
        Ok(self.modules.len() - 1)
    }

    pub(crate) fn set_module_source(&mut self, index: usize, source: SourceText) {
        self.modules[index].source = Some(source);
    }

    fn resolve_target(&self, module: &str, require_same_name: bool) -> Target {
        if let Some(build) = &self.building {
            if require_same_name {
                let building = self.nodes.str(build.module.name);
                assert_eq!(
                    building, module,
                    "registering into \"{}\" while \"{}\" is being built",
                    module, building
                );
            }
            return Target::Building;
        }

        match self.find_module(module) {
            Some(index) => Target::Listed(index),
            None => panic!("module \"{}\" is not registered", module),
        }
    }

    fn target(&self, target: Target) -> &ModuleRecord {
        match target {
            Target::Building => match &self.building {
                Some(build) => &build.module,
                None => unreachable!("no module is being built"),
            },
            Target::Listed(index) => &self.modules[index],
        }
    }

    fn target_mut(&mut self, target: Target) -> &mut ModuleRecord {
        match target {
            Target::Building => match &mut self.building {
                Some(build) => &mut build.module,
                None => unreachable!("no module is being built"),
            },
            Target::Listed(index) => &mut self.modules[index],
        }
    }

    /// Declare a foreign class in the module being built, or else in the
    /// registered module named `module`.
    pub fn register_class(
        &mut self,
        module: &str,
        class: &str,
        allocate: Option<ForeignMethodFn>,
        finalize: Option<FinalizerFn>,
    ) -> Result<()> {
        let target = self.resolve_target(module, false);
        assert!(
            self.find_class_in(self.target(target), class).is_none(),
            "class \"{}\" is already registered in module \"{}\"",
            class,
            module
        );

        self.nodes.allocate(size_of::<ClassRecord>(), true)?;
        let name = self.nodes.alloc_str(class)?;

        self.target_mut(target)
            .classes
            .push(ClassRecord::new(name, allocate, finalize));
        debug!("registered class {}.{}", module, class);
        Ok(())
    }

    pub fn register_method(
        &mut self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
        method: ForeignMethodFn,
    ) -> Result<()> {
        let target = self.resolve_target(module, true);
        let record = self.target(target);
        let Some(class_index) = self.find_class_in(record, class) else {
            panic!("class \"{}\" is not registered in module \"{}\"", class, module);
        };
        assert!(
            self.find_method_in(&record.classes[class_index], is_static, signature)
                .is_none(),
            "{}method {}.{}.{} is already registered",
            if is_static { "static " } else { "" },
            module,
            class,
            signature
        );

        self.nodes.allocate(size_of::<MethodRecord>(), true)?;
        let signature_ref = self.nodes.alloc_str(signature)?;

        self.target_mut(target).classes[class_index]
            .methods
            .push(MethodRecord::new(signature_ref, is_static, method));
        debug!(
            "registered {}method {}.{}.{}",
            if is_static { "static " } else { "" },
            module,
            class,
            signature
        );
        Ok(())
    }

    // ==================== Binding ====================

    /// Remove and return a method. A class whose last method is taken is
    /// removed from its module. `None` when nothing matches, including a
    /// method that was already taken.
    pub fn take_method(
        &mut self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
    ) -> Option<ForeignMethodFn> {
        let m = self.find_module(module)?;
        let c = self.find_class_in(&self.modules[m], class)?;
        let k = self.find_method_in(&self.modules[m].classes[c], is_static, signature)?;

        let record = &mut self.modules[m];
        let method = record.classes[c].methods.remove(k);
        if record.classes[c].methods.is_empty() {
            record.classes.remove(c);
        }
        Some(method.method)
    }

    pub fn class_methods(&self, module: &str, class: &str) -> Option<ForeignClassMethods> {
        let m = self.find_module(module)?;
        let c = self.find_class_in(&self.modules[m], class)?;
        let record = &self.modules[m].classes[c];
        Some(ForeignClassMethods {
            allocate: record.allocate,
            finalize: record.finalize,
        })
    }

    // ==================== Providers ====================

    pub(crate) fn attach_provider(&mut self, index: usize, provider: ProviderId) {
        self.modules[index].provider = Some(provider);
    }

    pub(crate) fn module_provider(&self, index: usize) -> Option<ProviderId> {
        self.modules[index].provider
    }

    /// Providers attached to modules, in module registration order
    pub(crate) fn attached_providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.modules.iter().filter_map(|module| module.provider)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.module_names())
            .field("building", &self.building_module())
            .field("nodes", &self.nodes)
            .field("sources", &self.sources)
            .finish()
    }
}
