// Wrench Static Modules
// Native modules compiled into the host, registered by name on the Context.

use std::fmt;

use super::NativeModuleProvider;
use crate::context::Context;
use crate::error::Result;

pub type StaticInitFn = fn(&mut Context) -> Result<()>;
pub type StaticQuitFn = fn();

#[derive(Clone)]
pub struct StaticModule {
    name: String,
    init: StaticInitFn,
    quit: Option<StaticQuitFn>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>, init: StaticInitFn) -> Self {
        Self {
            name: name.into(),
            init,
            quit: None,
        }
    }

    pub fn with_quit(mut self, quit: StaticQuitFn) -> Self {
        self.quit = Some(quit);
        self
    }
}

impl NativeModuleProvider for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, ctx: &mut Context) -> Result<()> {
        (self.init)(ctx)
    }

    fn quit(&self) {
        if let Some(quit) = self.quit {
            quit();
        }
    }
}

impl fmt::Debug for StaticModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticModule")
            .field("name", &self.name)
            .field("quit", &self.quit.is_some())
            .finish()
    }
}
