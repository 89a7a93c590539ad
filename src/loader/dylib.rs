// Wrench Dynamic Libraries
// Shared libraries exporting `<name>Init` / `<name>Quit`. Handles stay open
// until the owning Context is torn down.

use std::env::consts::DLL_EXTENSION;
use std::ffi::c_void;
use std::fmt;

use libloading::Library;
use log::{debug, warn};

use super::{init_symbol, quit_symbol, LibraryInitFn, LibraryQuitFn, NativeModuleProvider};
use crate::context::Context;
use crate::error::{Error, Result};

pub struct DynamicLibrary {
    name: String,
    path: String,
    library: Library,
}

impl DynamicLibrary {
    /// Open `<base_path><name>.<ext>`, then on non-Windows the bare file name
    /// through the system search path. The error names the local path.
    pub fn open(name: &str, base_path: &str) -> Result<Self> {
        let file_name = format!("{}.{}", name, DLL_EXTENSION);
        let local = format!("{}{}", base_path, file_name);

        let first_error = match unsafe { Library::new(&local) } {
            Ok(library) => return Ok(Self::opened(name, local, library)),
            Err(e) => e.to_string(),
        };

        if !cfg!(target_os = "windows") {
            if let Ok(library) = unsafe { Library::new(&file_name) } {
                return Ok(Self::opened(name, file_name, library));
            }
        }

        Err(Error::LibraryNotFound {
            path: local,
            message: first_error,
        })
    }

    /// Open an exact library path for module `name`, bypassing the search
    pub fn open_path(name: &str, path: &str) -> Result<Self> {
        match unsafe { Library::new(path) } {
            Ok(library) => Ok(Self::opened(name, path.to_string(), library)),
            Err(e) => Err(Error::LibraryNotFound {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn opened(name: &str, path: String, library: Library) -> Self {
        debug!("opened library \"{}\" for module \"{}\"", path, name);
        Self {
            name: name.to_string(),
            path,
            library,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve an exported symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's real type. The value must not be used
    /// after this library is unloaded.
    pub unsafe fn symbol<T: Copy>(&self, symbol: &str) -> Result<T> {
        self.library
            .get::<T>(symbol.as_bytes())
            .map(|sym| *sym)
            .map_err(|e| Error::SymbolNotFound {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })
    }
}

impl NativeModuleProvider for DynamicLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, ctx: &mut Context) -> Result<()> {
        let symbol = init_symbol(&self.name);
        let init = match unsafe { self.symbol::<LibraryInitFn>(&symbol) } {
            Ok(init) => init,
            Err(_) => {
                debug!("\"{}\" exports no {}", self.path, symbol);
                return Ok(());
            }
        };

        let ok = unsafe { init(ctx as *mut Context as *mut c_void) };
        if ok {
            Ok(())
        } else {
            Err(Error::InitFailed {
                module: self.name.clone(),
            })
        }
    }

    fn quit(&self) {
        let symbol = quit_symbol(&self.name);
        if let Ok(quit) = unsafe { self.symbol::<LibraryQuitFn>(&symbol) } {
            quit();
        }
    }

    fn unload(self: Box<Self>) {
        let DynamicLibrary { path, library, .. } = *self;
        if let Err(e) = library.close() {
            warn!("failed to close library \"{}\": {}", path, e);
        }
    }
}

impl fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}
