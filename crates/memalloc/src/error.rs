//! Error types returned by the allocator.

use core::fmt;

use snafu::{GenerateImplicitData, Snafu};

/// Source location at which an error was raised.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static core::panic::Location<'static>);

impl Location {
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl Default for Location {
    #[track_caller]
    fn default() -> Self {
        Self(core::panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Errors raised while setting up an allocator over an arena.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InitError {
    #[snafu(display("arena base address is null"))]
    NullBase {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("arena of {len} bytes cannot hold a free block of {min} bytes"))]
    ArenaTooSmall {
        len: usize,
        min: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("arena of {len} bytes at {base:#x} wraps around the address space"))]
    AddressOverflow {
        base: usize,
        len: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors raised by [`ArenaAllocator::allocate`](crate::ArenaAllocator::allocate).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AllocError {
    #[snafu(display("out of memory: no free block can hold a {requested} byte payload"))]
    OutOfMemory {
        requested: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl AllocError {
    /// Payload length the caller asked for.
    #[must_use]
    pub fn requested(&self) -> usize {
        match self {
            Self::OutOfMemory { requested, .. } => *requested,
        }
    }
}
