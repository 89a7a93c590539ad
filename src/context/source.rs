// Wrench Source Files
// Default file callbacks used when a module is found neither in the registry
// nor in a native provider.

use std::fs;

use log::debug;

use super::Context;
use crate::error::{Error, Result};

/// Reads the text of a module from wherever the host keeps scripts
pub type FileReadFn = fn(&Context, &str) -> Result<String>;

/// Receives the buffer returned by [`FileReadFn`] once it has been copied
pub type FileFreeFn = fn(&Context, String);

/// `name` without a trailing `.<extension>`. Idempotent.
pub fn strip_script_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    name.strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(name)
}

pub fn script_path(ctx: &Context, name: &str) -> String {
    let extension = ctx.script_extension();
    format!(
        "{}{}.{}",
        ctx.base_path(),
        strip_script_extension(name, extension),
        extension
    )
}

/// Reads `<base_path><name>.<extension>` from disk
pub fn default_file_read(ctx: &Context, name: &str) -> Result<String> {
    let path = script_path(ctx, name);
    debug!("reading module source from \"{}\"", path);
    fs::read_to_string(&path).map_err(|e| Error::SourceNotFound {
        path,
        message: e.to_string(),
    })
}

pub fn default_file_free(_ctx: &Context, source: String) {
    drop(source);
}
