// Wrench Registry Records

use smallvec::SmallVec;

use crate::arena::ArenaRef;
use crate::loader::ProviderId;
use crate::vm::{FinalizerFn, ForeignMethodFn};

/// Where a module's source text lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceText {
    /// Copied into the context's source arena
    Arena(ArenaRef),
    /// Borrowed for the life of the program, never copied
    Static(&'static str),
}

pub(crate) struct MethodRecord {
    pub(crate) signature: ArenaRef,
    pub(crate) is_static: bool,
    pub(crate) method: ForeignMethodFn,
}

impl MethodRecord {
    pub(crate) fn new(signature: ArenaRef, is_static: bool, method: ForeignMethodFn) -> Self {
        Self {
            signature,
            is_static,
            method,
        }
    }
}

pub(crate) struct ClassRecord {
    pub(crate) name: ArenaRef,
    pub(crate) allocate: Option<ForeignMethodFn>,
    pub(crate) finalize: Option<FinalizerFn>,
    pub(crate) methods: SmallVec<[MethodRecord; 8]>,
}

impl ClassRecord {
    pub(crate) fn new(
        name: ArenaRef,
        allocate: Option<ForeignMethodFn>,
        finalize: Option<FinalizerFn>,
    ) -> Self {
        Self {
            name,
            allocate,
            finalize,
            methods: SmallVec::new(),
        }
    }
}

pub(crate) struct ModuleRecord {
    pub(crate) name: ArenaRef,
    pub(crate) source: Option<SourceText>,
    pub(crate) classes: Vec<ClassRecord>,
    /// Native provider whose init produced this module, quit at teardown
    pub(crate) provider: Option<ProviderId>,
}

impl ModuleRecord {
    pub(crate) fn new(name: ArenaRef, source: Option<SourceText>) -> Self {
        Self {
            name,
            source,
            classes: Vec::new(),
            provider: None,
        }
    }
}
