//! Allocation engine: first-fit search with splitting.

use core::ptr::NonNull;

use snafu::OptionExt as _;

use super::Heap;
use crate::{
    block::{FREE_HEADER_SIZE, MIN_PAYLOAD_SIZE, USED_HEADER_SIZE},
    error::{AllocError, OutOfMemorySnafu},
};

impl Heap {
    /// Carves a used block with room for `len` payload bytes out of the first
    /// free block large enough to hold it.
    ///
    /// The used block is taken from the high-address end of the free block,
    /// which keeps its offset and shrinks. If the remainder would be too small
    /// to stand as a free block on its own, the whole free block is handed out
    /// and the extra bytes are added to the payload.
    ///
    /// On failure the free list is left untouched.
    pub(crate) fn allocate(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        let mut payload_len = len.max(MIN_PAYLOAD_SIZE);
        let needed = payload_len
            .checked_add(USED_HEADER_SIZE)
            .context(OutOfMemorySnafu { requested: len })?;

        let Some(block) = self
            .free_list
            .iter(&self.arena)
            .find(|block| block.len >= needed)
        else {
            log::debug!(
                "allocation of {len} bytes failed ({} free blocks)",
                self.free_list.len()
            );
            return OutOfMemorySnafu { requested: len }.fail();
        };

        let leftover = block.len - needed;
        let used_offset = if leftover < FREE_HEADER_SIZE {
            // The sliver cannot hold a free header; give it to the caller.
            payload_len += leftover;
            self.free_list.remove(&self.arena, block.prev, block.offset);
            block.offset
        } else {
            self.free_list.resize(&self.arena, block.offset, leftover);
            block.offset + leftover
        };

        self.arena.write_used(used_offset, payload_len);
        let data_offset = used_offset + USED_HEADER_SIZE;
        log::trace!(
            "allocated {payload_len} bytes at offset {data_offset} (requested {len})"
        );
        Ok(self.arena.ptr_at(data_offset))
    }
}
