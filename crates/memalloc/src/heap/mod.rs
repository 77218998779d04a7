//! Unlocked allocator state.
//!
//! [`Heap`] pairs the arena accessor with its free list and implements the
//! allocation and deallocation engines. It performs no synchronisation of its
//! own; [`ArenaAllocator`](crate::ArenaAllocator) wraps it in a lock.

use core::ptr::NonNull;

use snafu::ensure;

use crate::{
    block::{Arena, FREE_HEADER_SIZE},
    dump::{FreeBlockInfo, FreeListDump},
    error::{AddressOverflowSnafu, ArenaTooSmallSnafu, InitError},
    free_list::FreeList,
};

mod allocate;
mod deallocate;

#[derive(Debug)]
pub(crate) struct Heap {
    arena: Arena,
    free_list: FreeList,
}

unsafe impl Send for Heap {}

impl Heap {
    /// Builds a heap whose free list holds one block spanning the whole
    /// arena.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `base..base + len` is valid for reads and writes
    /// - the region is not used by any other code for the lifetime of the heap
    pub(crate) unsafe fn new(base: NonNull<u8>, len: usize) -> Result<Self, InitError> {
        ensure!(
            len >= FREE_HEADER_SIZE,
            ArenaTooSmallSnafu {
                len,
                min: FREE_HEADER_SIZE,
            }
        );
        ensure!(
            base.addr().get().checked_add(len).is_some(),
            AddressOverflowSnafu {
                base: base.addr().get(),
                len,
            }
        );

        let arena = unsafe { Arena::new(base, len) };
        let free_list = FreeList::with_block(&arena, 0, len);
        log::debug!(
            "arena initialized: {:#x}..{:#x} ({len} bytes)",
            arena.addr_of(0),
            arena.addr_of(len)
        );
        Ok(Self { arena, free_list })
    }

    pub(crate) fn arena_start(&self) -> NonNull<u8> {
        self.arena.base()
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn free_block_count(&self) -> usize {
        self.free_list.len()
    }

    pub(crate) fn dump_free_list(&self) -> FreeListDump {
        self.free_list
            .iter(&self.arena)
            .map(|cursor| FreeBlockInfo {
                addr: self.arena.addr_of(cursor.offset),
                offset: cursor.offset,
                len: cursor.len,
            })
            .collect()
    }
}
