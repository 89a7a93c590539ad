// Wrench Entry Point
// Turns the first command-line argument into the source of the "main" module.

use crate::context::Context;
use crate::error::{Error, Result};

pub const MAIN_MODULE: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryTarget {
    /// A script file, loaded through the Context's file callbacks
    Script(String),
    /// A module name, imported from a generated main module
    Module(String),
}

impl EntryTarget {
    /// Arguments mentioning `.<extension>` are scripts, anything else is
    /// treated as a module name.
    pub fn parse(arg: &str, extension: &str) -> Self {
        if arg.contains(&format!(".{}", extension)) {
            EntryTarget::Script(arg.to_string())
        } else {
            EntryTarget::Module(arg.to_string())
        }
    }
}

pub fn import_source(module: &str) -> String {
    format!("import \"{}\"", module)
}

/// Source the VM should interpret as [`MAIN_MODULE`]
pub fn main_source(ctx: &mut Context, target: &EntryTarget) -> Result<String> {
    match target {
        EntryTarget::Script(path) => {
            let module = ctx.load_source_file(path)?;
            ctx.module_source(&module)
                .map(str::to_string)
                .ok_or_else(|| Error::ModuleNotFound { module })
        }
        EntryTarget::Module(name) => Ok(import_source(name)),
    }
}
