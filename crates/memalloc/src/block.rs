//! Block layout model.
//!
//! Every byte of the arena belongs to exactly one block. A block is either
//! *free* (linked into the free list) or *used* (handed out to a caller).
//! Both kinds start with a header made of machine words stored at the
//! lowest-address end of the block.
//!
//! ```text
//! Free Block Layout:
//! ┌───────────────────────────────────────┬──────────────────┐
//! │ Free Header (FREE_HEADER_SIZE bytes)  │ Unused           │
//! │ ┌──────────────┬────────────────────┐ │                  │
//! │ │ len: usize   │ next: usize        │ │                  │
//! │ └──────────────┴────────────────────┘ │                  │
//! └───────────────────────────────────────┴──────────────────┘
//!  `len` covers the whole span, header included.
//!
//! Used Block Layout:
//! ┌───────────────────────────────────────┬──────────────────┐
//! │ Used Header (USED_HEADER_SIZE bytes)  │ Payload          │
//! │ ┌──────────────┐                      │ (returned to the │
//! │ │ len: usize   │                      │  caller)         │
//! │ └──────────────┘                      │                  │
//! └───────────────────────────────────────┴──────────────────┘
//!  `len` covers the payload only.
//! ```
//!
//! Headers are never accessed through typed references. [`Arena`] reads and
//! writes individual words at byte offsets with unaligned accesses, so the
//! arena base address does not need any particular alignment.

use core::ptr::NonNull;

const WORD_SIZE: usize = size_of::<usize>();

/// Size in bytes of the header that precedes every payload.
pub const USED_HEADER_SIZE: usize = WORD_SIZE;

/// Size in bytes of the header stored at the start of every free block.
///
/// This is also the smallest span a free block may have.
pub const FREE_HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Smallest payload ever handed out.
///
/// Requests below this are rounded up so that the used block, once freed on
/// its own, is large enough to hold a free header.
pub const MIN_PAYLOAD_SIZE: usize = FREE_HEADER_SIZE - USED_HEADER_SIZE;

/// Encoded `next` link marking the end of the free list.
const NIL: usize = usize::MAX;

/// Decoded free-block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeHeader {
    /// Total span of the block in bytes, header included.
    pub(crate) len: usize,
    /// Arena offset of the next free block.
    pub(crate) next: Option<usize>,
}

/// Byte-level view of the caller-supplied memory region.
///
/// All offsets are relative to the arena base. Every accessor checks that the
/// header it touches lies inside the arena.
#[derive(Debug)]
pub(crate) struct Arena {
    base: NonNull<u8>,
    len: usize,
}

impl Arena {
    /// Creates a view of `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `base..base + len` is valid for reads and writes
    /// - the region is not used by anything else except through pointers
    ///   handed out by the allocator that owns this view
    /// - the region outlives this view
    pub(crate) unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Returns the address of the byte at `offset`.
    pub(crate) fn addr_of(&self, offset: usize) -> usize {
        self.base.addr().get() + offset
    }

    /// Returns a pointer to the byte at `offset`.
    ///
    /// `offset` may equal the arena length (one-past-the-end).
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.len, "offset {offset} is outside the arena");
        unsafe { self.base.add(offset) }
    }

    /// Converts a pointer into the arena back into an offset.
    ///
    /// Returns `None` if `ptr` lies outside `base..=base + len`.
    pub(crate) fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = ptr.addr().get().checked_sub(self.base.addr().get())?;
        (offset <= self.len).then_some(offset)
    }

    fn read_word(&self, offset: usize) -> usize {
        assert!(
            offset
                .checked_add(WORD_SIZE)
                .is_some_and(|end| end <= self.len),
            "word at offset {offset} is outside the arena"
        );
        unsafe { self.base.add(offset).cast::<usize>().read_unaligned() }
    }

    fn write_word(&self, offset: usize, value: usize) {
        assert!(
            offset
                .checked_add(WORD_SIZE)
                .is_some_and(|end| end <= self.len),
            "word at offset {offset} is outside the arena"
        );
        unsafe { self.base.add(offset).cast::<usize>().write_unaligned(value) }
    }

    pub(crate) fn read_free(&self, offset: usize) -> FreeHeader {
        let len = self.read_word(offset);
        let next = self.read_word(offset + WORD_SIZE);
        FreeHeader {
            len,
            next: (next != NIL).then_some(next),
        }
    }

    pub(crate) fn write_free(&self, offset: usize, header: FreeHeader) {
        assert!(
            header.len >= FREE_HEADER_SIZE,
            "free block at offset {offset} is too small ({} bytes)",
            header.len
        );
        self.write_word(offset, header.len);
        self.write_word(offset + WORD_SIZE, header.next.unwrap_or(NIL));
    }

    /// Updates the span length of a free block, keeping its link.
    pub(crate) fn write_free_len(&self, offset: usize, len: usize) {
        assert!(
            len >= FREE_HEADER_SIZE,
            "free block at offset {offset} is too small ({len} bytes)"
        );
        self.write_word(offset, len);
    }

    /// Updates the link of a free block, keeping its length.
    pub(crate) fn write_free_next(&self, offset: usize, next: Option<usize>) {
        self.write_word(offset + WORD_SIZE, next.unwrap_or(NIL));
    }

    /// Reads the payload length of the used block starting at `offset`.
    pub(crate) fn read_used(&self, offset: usize) -> usize {
        self.read_word(offset)
    }

    /// Writes the header of a used block starting at `offset`.
    pub(crate) fn write_used(&self, offset: usize, payload_len: usize) {
        self.write_word(offset, payload_len);
    }
}
