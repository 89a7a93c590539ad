// Wrench VM Bridge
// Default answers to the VM's module-resolution callbacks, backed by the
// Context's registry, native providers and script files.

use log::{debug, error};

use crate::context::Context;
use crate::error::Error;
use crate::vm::{
    is_builtin_module, ForeignClassMethods, ForeignMethodFn, LoadModuleResult, VmCallbacks,
    VmErrorKind,
};

/// Plain-text rendering of a VM diagnostic
pub fn format_vm_error(kind: VmErrorKind, module: Option<&str>, line: i32, message: &str) -> String {
    let module = module.unwrap_or("?");
    match kind {
        VmErrorKind::Compile => format!("[{} line {}] {}", module, line, message),
        VmErrorKind::Runtime => message.to_string(),
        VmErrorKind::StackTrace => format!("[{} line {}] in {}", module, line, message),
    }
}

impl VmCallbacks for Context {
    fn resolve_module(&mut self, _importer: &str, name: &str) -> String {
        name.to_string()
    }

    fn load_module(&mut self, name: &str) -> LoadModuleResult {
        if is_builtin_module(name) {
            return LoadModuleResult::not_found();
        }

        if let Some(source) = self.module_source(name) {
            debug!("module \"{}\" served from the registry", name);
            return LoadModuleResult::found(source);
        }

        // A module whose provider already ran only lacks its source file
        let attached = self
            .registry()
            .find_module(name)
            .and_then(|index| self.registry().module_provider(index));

        let provider = match attached {
            Some(id) => Some(id),
            None => match self.load_native_module(name) {
                Ok(provider) => provider,
                Err(_) => return LoadModuleResult::not_found(),
            },
        };

        if provider.is_some() {
            if let Some(source) = self.module_source(name) {
                return LoadModuleResult::found(source);
            }
        }

        match self.load_source_file(name) {
            Ok(module) => {
                if let Some(id) = provider {
                    self.adopt_provider(&module, id);
                }
                match self.module_source(&module) {
                    Some(source) => LoadModuleResult::found(source),
                    None => LoadModuleResult::not_found(),
                }
            }
            Err(_) => {
                self.record(Error::ModuleNotFound {
                    module: name.to_string(),
                });
                LoadModuleResult::not_found()
            }
        }
    }

    fn bind_foreign_method(
        &mut self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
    ) -> Option<ForeignMethodFn> {
        if is_builtin_module(module) {
            return None;
        }

        match self
            .registry_mut()
            .take_method(module, class, is_static, signature)
        {
            Some(method) => Some(method),
            None => panic!(
                "foreign {}method {}.{}.{} is not registered",
                if is_static { "static " } else { "" },
                module,
                class,
                signature
            ),
        }
    }

    fn bind_foreign_class(&mut self, module: &str, class: &str) -> ForeignClassMethods {
        if is_builtin_module(module) {
            return ForeignClassMethods::default();
        }

        match self.registry().class_methods(module, class) {
            Some(methods) => methods,
            None => panic!("foreign class {}.{} is not registered", module, class),
        }
    }

    fn write(&mut self, text: &str) {
        print!("{}", text);
    }

    fn error(&mut self, kind: VmErrorKind, module: Option<&str>, line: i32, message: &str) {
        let text = format_vm_error(kind, module, line, message);
        error!("{}", text);
        print_vm_error(kind, &text);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn print_vm_error(kind: VmErrorKind, text: &str) {
    use colored::Colorize;

    match kind {
        VmErrorKind::Compile => eprintln!("{} {}", "COMPILE ERROR".red().bold(), text),
        VmErrorKind::Runtime => eprintln!("{} {}", "RUNTIME ERROR:".red().bold(), text),
        VmErrorKind::StackTrace => eprintln!("{}", text.dimmed()),
    }
}

#[cfg(target_arch = "wasm32")]
fn print_vm_error(kind: VmErrorKind, text: &str) {
    match kind {
        VmErrorKind::Compile => eprintln!("COMPILE ERROR {}", text),
        VmErrorKind::Runtime => eprintln!("RUNTIME ERROR: {}", text),
        VmErrorKind::StackTrace => eprintln!("{}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::error::Result;
    use crate::loader::StaticModule;
    use crate::vm::slots::tests::{SlotValue, TestSlots};
    use crate::vm::{SlotExt, Slots};

    fn context() -> Context {
        let config = ContextConfig::default().base_path("/nonexistent/");
        Context::new(config, Vec::<String>::new(), None).unwrap()
    }

    fn add(slots: &mut dyn Slots) {
        let sum = slots.get_slot_int(1) + slots.get_slot_int(2);
        slots.set_slot_int(0, sum);
    }

    fn allocate_point(slots: &mut dyn Slots) {
        slots.set_slot_null(0);
    }

    fn init_math(ctx: &mut Context) -> Result<()> {
        ctx.begin_module("math")?;
        ctx.code("class Math {\n")?;
        ctx.code("foreign static add(a, b)\n")?;
        ctx.code("}\n")?;
        ctx.register_class("math", "Math", None, None)?;
        ctx.register_method("math", "Math", true, "add(_,_)", add)?;
        ctx.end_module()
    }

    fn panicking_read(_: &Context, name: &str) -> Result<String> {
        panic!("file system touched for \"{}\"", name);
    }

    #[test]
    fn test_builtin_modules_are_left_to_the_vm() {
        let mut ctx = context();
        ctx.set_file_read_callback(panicking_read);
        assert!(!ctx.load_module("meta").is_found());
        assert!(!ctx.load_module("random").is_found());
        assert!(ctx.bind_foreign_method("random", "Random", false, "seed_()").is_none());
        assert!(ctx.bind_foreign_class("meta", "Meta").allocate.is_none());
    }

    #[test]
    fn test_resolve_is_identity() {
        let mut ctx = context();
        assert_eq!(ctx.resolve_module("main", "image"), "image");
    }

    #[test]
    fn test_registered_source_wins() {
        let mut ctx = context();
        ctx.set_file_read_callback(panicking_read);
        ctx.register_module("util", Some("class Util {}")).unwrap();

        let loaded = ctx.load_module("util");
        assert_eq!(loaded.source.as_deref(), Some("class Util {}"));
    }

    #[test]
    fn test_provider_source_skips_file_system() {
        let mut ctx = context();
        ctx.set_file_read_callback(panicking_read);
        ctx.add_static_module(StaticModule::new("math", init_math));

        let loaded = ctx.load_module("math");
        assert_eq!(
            loaded.source.as_deref(),
            Some("class Math {\nforeign static add(a, b)\n}\n")
        );
        assert_eq!(ctx.provider_count(), 1);

        let method = ctx.bind_foreign_method("math", "Math", true, "add(_,_)").unwrap();
        let mut slots = TestSlots::with(vec![
            SlotValue::Null,
            SlotValue::Num(2.0),
            SlotValue::Num(3.0),
        ]);
        method(&mut slots);
        assert_eq!(slots.values[0], SlotValue::Num(5.0));
    }

    fn read_point(_: &Context, name: &str) -> Result<String> {
        assert_eq!(name, "point");
        Ok("foreign class Point { construct new() {} }".to_string())
    }

    fn init_point_classes(ctx: &mut Context) -> Result<()> {
        ctx.register_module("point", None)?;
        ctx.register_class("point", "Point", Some(allocate_point), None)
    }

    #[test]
    fn test_file_fallback_fills_provider_module() {
        let mut ctx = context();
        ctx.set_file_read_callback(read_point);
        ctx.add_static_module(StaticModule::new("point", init_point_classes));

        let loaded = ctx.load_module("point");
        assert_eq!(
            loaded.source.as_deref(),
            Some("foreign class Point { construct new() {} }")
        );

        let class = ctx.bind_foreign_class("point", "Point");
        assert_eq!(class.allocate.map(|f| f as usize), Some(allocate_point as usize));
        assert!(class.finalize.is_none());
    }

    fn read_script(_: &Context, _: &str) -> Result<String> {
        Ok("System.print(1)".to_string())
    }

    #[test]
    fn test_file_fallback_auto_registers() {
        let mut ctx = context();
        ctx.set_foreign_library_loading(false);
        ctx.set_file_read_callback(read_script);

        assert!(!ctx.registry().contains_module("script"));
        let loaded = ctx.load_module("script");
        assert_eq!(loaded.source.as_deref(), Some("System.print(1)"));
        assert!(ctx.registry().contains_module("script"));
    }

    #[test]
    fn test_repeated_import_reuses_provider() {
        let mut ctx = context();
        ctx.add_static_module(StaticModule::new("point", init_point_classes));

        // No point.wren on disk: the provider runs but the load still fails
        assert!(!ctx.load_module("point").is_found());
        assert_eq!(ctx.provider_count(), 1);
        assert_eq!(ctx.error(), "Module \"point\" not found");

        assert!(!ctx.load_module("point").is_found());
        assert_eq!(ctx.provider_count(), 1);
        assert!(ctx.registry().contains_class("point", "Point"));

        // Once the script shows up the already attached provider is kept
        ctx.set_file_read_callback(read_point);
        assert!(ctx.load_module("point").is_found());
        assert_eq!(ctx.provider_count(), 1);
    }

    #[test]
    fn test_unknown_module_is_not_found() {
        let mut ctx = context();
        let loaded = ctx.load_module("nowhere");
        assert!(!loaded.is_found());
        assert_eq!(ctx.error(), "Module \"nowhere\" not found");
    }

    fn init_refuses(_: &mut Context) -> Result<()> {
        Err(Error::InitFailed {
            module: "gpu".into(),
        })
    }

    #[test]
    fn test_failed_init_reports_not_found() {
        let mut ctx = context();
        ctx.set_file_read_callback(panicking_read);
        ctx.add_static_module(StaticModule::new("gpu", init_refuses));

        assert!(!ctx.load_module("gpu").is_found());
        assert_eq!(ctx.error(), "Module \"gpu\" failed to initialize");
    }

    #[test]
    fn test_method_binds_once() {
        let mut ctx = context();
        ctx.add_static_module(StaticModule::new("math", init_math));
        ctx.load_module("math");

        assert!(ctx.bind_foreign_method("math", "Math", true, "add(_,_)").is_some());
        assert!(!ctx.registry().contains_class("math", "Math"));
        assert!(ctx.registry().contains_module("math"));
    }

    #[test]
    #[should_panic(expected = "foreign static method math.Math.add(_,_) is not registered")]
    fn test_second_bind_panics() {
        let mut ctx = context();
        ctx.add_static_module(StaticModule::new("math", init_math));
        ctx.load_module("math");

        ctx.bind_foreign_method("math", "Math", true, "add(_,_)");
        ctx.bind_foreign_method("math", "Math", true, "add(_,_)");
    }

    #[test]
    #[should_panic(expected = "foreign class image.Image is not registered")]
    fn test_unknown_class_panics() {
        let mut ctx = context();
        ctx.bind_foreign_class("image", "Image");
    }

    #[test]
    fn test_error_formats() {
        assert_eq!(
            format_vm_error(VmErrorKind::Compile, Some("main"), 3, "Expect ')'."),
            "[main line 3] Expect ')'."
        );
        assert_eq!(
            format_vm_error(VmErrorKind::Runtime, None, 0, "Null does not implement 'x'."),
            "Null does not implement 'x'."
        );
        assert_eq!(
            format_vm_error(VmErrorKind::StackTrace, Some("image"), 12, "Image.load(_)"),
            "[image line 12] in Image.load(_)"
        );
    }
}
