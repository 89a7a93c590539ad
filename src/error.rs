// Wrench Error Handling
// Recoverable failures of the registry, loader and bridge. Broken registration
// contracts (duplicates, unknown bind targets, builder misuse) panic instead.

use std::fmt;
use thiserror::Error;

use crate::arena::ArenaKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMemory,
    LibraryNotFound,
    SymbolNotFound,
    SourceNotFound,
    InitFailed,
    ModuleNotFound,
    HookFailed,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OutOfMemory => write!(f, "OutOfMemory"),
            ErrorKind::LibraryNotFound => write!(f, "LibraryNotFound"),
            ErrorKind::SymbolNotFound => write!(f, "SymbolNotFound"),
            ErrorKind::SourceNotFound => write!(f, "SourceNotFound"),
            ErrorKind::InitFailed => write!(f, "InitFailed"),
            ErrorKind::ModuleNotFound => write!(f, "ModuleNotFound"),
            ErrorKind::HookFailed => write!(f, "HookFailed"),
            ErrorKind::Config => write!(f, "Config"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Out of memory - {arena} arena exhausted ({requested} bytes requested, {available} available)")]
    OutOfMemory {
        arena: ArenaKind,
        requested: usize,
        available: usize,
    },

    #[error("Failed to load library \"{path}\": {message}")]
    LibraryNotFound { path: String, message: String },

    #[error("Failed to load function \"{symbol}\": {message}")]
    SymbolNotFound { symbol: String, message: String },

    #[error("Source file \"{path}\" not found: {message}")]
    SourceNotFound { path: String, message: String },

    #[error("Module \"{module}\" failed to initialize")]
    InitFailed { module: String },

    #[error("Module \"{module}\" not found")]
    ModuleNotFound { module: String },

    #[error("Global init hook failed: {0}")]
    HookFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Error::LibraryNotFound { .. } => ErrorKind::LibraryNotFound,
            Error::SymbolNotFound { .. } => ErrorKind::SymbolNotFound,
            Error::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            Error::InitFailed { .. } => ErrorKind::InitFailed,
            Error::ModuleNotFound { .. } => ErrorKind::ModuleNotFound,
            Error::HookFailed(_) => ErrorKind::HookFailed,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Error::HookFailed(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}
