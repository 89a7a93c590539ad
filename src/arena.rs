// Wrench Arenas
// Fixed-size bump allocators for registry metadata and module source text.
// Nothing is freed individually; the whole buffer goes away with the Context.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_NODE_ARENA_SIZE: usize = 1024 * 1024;
pub const DEFAULT_SOURCE_ARENA_SIZE: usize = 1024 * 1024;

/// Which of the two context arenas a value lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArenaKind {
    Node,
    Source,
}

impl fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaKind::Node => write!(f, "node"),
            ArenaKind::Source => write!(f, "source"),
        }
    }
}

/// Byte range handed out by an [`Arena`]. Only meaningful for the arena
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaRef {
    offset: usize,
    len: usize,
}

impl ArenaRef {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Monotonic bump allocator over a fixed buffer
pub struct Arena {
    kind: ArenaKind,
    buffer: Box<[u8]>,
    mark: usize,
}

impl Arena {
    pub fn new(kind: ArenaKind, capacity: usize) -> Self {
        Self {
            kind,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            mark: 0,
        }
    }

    pub fn kind(&self) -> ArenaKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Current bump position (bytes used so far)
    pub fn mark(&self) -> usize {
        self.mark
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.mark
    }

    fn out_of_memory(&self, requested: usize) -> Error {
        Error::OutOfMemory {
            arena: self.kind,
            requested,
            available: self.remaining(),
        }
    }

    /// Reserve `size` bytes at the mark. Fails without side effects when the
    /// arena cannot hold them.
    pub fn allocate(&mut self, size: usize, zeroed: bool) -> Result<ArenaRef> {
        let end = self
            .mark
            .checked_add(size)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| self.out_of_memory(size))?;

        if zeroed {
            self.buffer[self.mark..end].fill(0);
        }

        let handle = ArenaRef {
            offset: self.mark,
            len: size,
        };
        self.mark = end;
        Ok(handle)
    }

    /// Copy a string in with a trailing NUL. The handle excludes the NUL.
    pub fn alloc_str(&mut self, s: &str) -> Result<ArenaRef> {
        let bytes = s.as_bytes();
        let slot = self.allocate(bytes.len() + 1, false)?;
        let start = slot.offset;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
        self.buffer[start + bytes.len()] = 0;
        Ok(ArenaRef {
            offset: start,
            len: bytes.len(),
        })
    }

    /// Append raw bytes with no terminator (incremental module building)
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let slot = self.allocate(bytes.len(), false)?;
        self.buffer[slot.offset..slot.offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Close an incremental run started at `base`: writes the NUL terminator
    /// and returns the span `base..mark` (terminator excluded).
    pub fn terminate_from(&mut self, base: usize) -> Result<ArenaRef> {
        debug_assert!(base <= self.mark);
        if self.mark == self.buffer.len() {
            return Err(self.out_of_memory(1));
        }
        let span = ArenaRef {
            offset: base,
            len: self.mark - base,
        };
        self.buffer[self.mark] = 0;
        self.mark += 1;
        Ok(span)
    }

    pub fn bytes(&self, handle: ArenaRef) -> &[u8] {
        &self.buffer[handle.offset..handle.offset + handle.len]
    }

    /// View a handle as text. Everything written through this arena comes
    /// from `&str`, so a decode failure means the handle came from elsewhere.
    pub fn str(&self, handle: ArenaRef) -> &str {
        match std::str::from_utf8(self.bytes(handle)) {
            Ok(s) => s,
            Err(_) => {
                debug_assert!(false, "{} arena handle does not cover UTF-8 text", self.kind);
                ""
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity())
            .field("mark", &self.mark)
            .finish()
    }
}

/// `fmt::Write` adapter for formatting straight into an arena
pub struct ArenaWriter<'a> {
    arena: &'a mut Arena,
    error: Option<Error>,
}

impl<'a> ArenaWriter<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        Self { arena, error: None }
    }

    /// The allocation failure that interrupted formatting, if any
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Write for ArenaWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.arena.append(s.as_bytes()) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error = Some(err);
                Err(fmt::Error)
            }
        }
    }
}
