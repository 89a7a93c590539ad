// Wrench Global Hooks
// Process-wide init/quit routines run for every Context that is handed the
// hook table. Meant to be filled before any Context is created.

use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};

use super::Context;
use crate::error::Result;

pub type GlobalInitHook = Arc<dyn Fn(&mut Context) -> Result<()> + Send + Sync>;
pub type GlobalQuitHook = Arc<dyn Fn() + Send + Sync>;

pub struct GlobalHooks {
    init: RwLock<Vec<GlobalInitHook>>,
    quit: RwLock<Vec<GlobalQuitHook>>,
}

impl GlobalHooks {
    pub const fn new() -> Self {
        Self {
            init: const_rwlock(Vec::new()),
            quit: const_rwlock(Vec::new()),
        }
    }

    pub fn register_init<F>(&self, hook: F)
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.init.write().push(Arc::new(hook));
    }

    pub fn register_quit<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.quit.write().push(Arc::new(hook));
    }

    pub fn init_count(&self) -> usize {
        self.init.read().len()
    }

    pub fn quit_count(&self) -> usize {
        self.quit.read().len()
    }

    /// Run init hooks in registration order, stopping at the first failure.
    /// Hooks registered while this runs take effect for the next Context.
    pub(crate) fn run_init(&self, ctx: &mut Context) -> Result<()> {
        let hooks = self.init.read().clone();
        for hook in hooks {
            hook(&mut *ctx)?;
        }
        Ok(())
    }

    pub(crate) fn run_quit(&self) {
        let hooks = self.quit.read().clone();
        for hook in hooks {
            hook();
        }
    }
}

impl Default for GlobalHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HOOKS: GlobalHooks = GlobalHooks::new();

    static REENTRANT: GlobalHooks = GlobalHooks::new();

    #[test]
    fn test_hooks_may_register_hooks() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        REENTRANT.register_init(|_| {
            RUNS.fetch_add(1, Ordering::SeqCst);
            REENTRANT.register_quit(|| {
                REENTRANT.register_quit(|| {});
            });
            Ok(())
        });

        let ctx = Context::new(ContextConfig::default(), Vec::<String>::new(), Some(&REENTRANT))
            .unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
        assert_eq!(REENTRANT.quit_count(), 1);

        ctx.shutdown(Some(&REENTRANT));
        assert_eq!(REENTRANT.quit_count(), 2);
    }

    #[test]
    fn test_static_hook_table() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        HOOKS.register_quit(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(HOOKS.quit_count(), 1);
        assert_eq!(HOOKS.init_count(), 0);

        HOOKS.run_quit();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
