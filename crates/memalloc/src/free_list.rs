//! Address-ordered free list.
//!
//! The list is intrusive: each entry's header lives inside the free block it
//! describes, and links are arena offsets. Entries are kept strictly ascending
//! by offset, which lets the allocation scan double as a first-fit-by-address
//! search and lets the deallocation scan find both neighbours of a freed span
//! in a single pass.

use crate::block::{Arena, FreeHeader};

/// Ordering predicate for free-list entries: strict less-than on offsets.
fn precedes(a: usize, b: usize) -> bool {
    a < b
}

/// A free-list entry observed during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    /// Offset of the entry before this one, or `None` at the head.
    pub(crate) prev: Option<usize>,
    /// Offset of this entry's block.
    pub(crate) offset: usize,
    /// Span of this entry's block in bytes.
    pub(crate) len: usize,
}

impl Cursor {
    /// Offset one past the last byte of the block.
    pub(crate) fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<usize>,
    count: usize,
}

impl FreeList {
    /// Creates a list holding a single block at `offset` spanning `len` bytes.
    pub(crate) fn with_block(arena: &Arena, offset: usize, len: usize) -> Self {
        arena.write_free(offset, FreeHeader { len, next: None });
        Self {
            head: Some(offset),
            count: 1,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn iter<'a>(&self, arena: &'a Arena) -> Iter<'a> {
        Iter {
            arena,
            prev: None,
            next: self.head,
        }
    }

    /// Inserts a new free block, keeping the list sorted by offset.
    pub(crate) fn insert_ordered(&mut self, arena: &Arena, offset: usize, len: usize) {
        let mut prev = None;
        let mut next = self.head;
        while let Some(current) = next {
            debug_assert_ne!(current, offset, "block {offset} is already free");
            if precedes(offset, current) {
                break;
            }
            prev = Some(current);
            next = arena.read_free(current).next;
        }

        arena.write_free(offset, FreeHeader { len, next });
        self.link(arena, prev, Some(offset));
        self.count += 1;
    }

    /// Unlinks the entry at `offset`, whose predecessor in the list is `prev`.
    pub(crate) fn remove(&mut self, arena: &Arena, prev: Option<usize>, offset: usize) {
        debug_assert_eq!(self.next_of(arena, prev), Some(offset));
        let next = arena.read_free(offset).next;
        self.link(arena, prev, next);
        self.count -= 1;
    }

    /// Moves the entry at `old` to a new block at `new` of `len` bytes.
    ///
    /// `new` must fall between `prev` and the entry after `old`, so the list
    /// stays sorted without a search.
    pub(crate) fn replace(
        &mut self,
        arena: &Arena,
        prev: Option<usize>,
        old: usize,
        new: usize,
        len: usize,
    ) {
        debug_assert_eq!(self.next_of(arena, prev), Some(old));
        let next = arena.read_free(old).next;
        debug_assert!(prev.is_none_or(|prev| precedes(prev, new)));
        debug_assert!(next.is_none_or(|next| precedes(new, next)));

        arena.write_free(new, FreeHeader { len, next });
        self.link(arena, prev, Some(new));
    }

    /// Sets the span of the entry at `offset` in place.
    pub(crate) fn resize(&self, arena: &Arena, offset: usize, len: usize) {
        debug_assert!(
            self.iter(arena).any(|block| block.offset == offset),
            "block {offset} is not in the free list"
        );
        arena.write_free_len(offset, len);
    }

    fn next_of(&self, arena: &Arena, prev: Option<usize>) -> Option<usize> {
        match prev {
            Some(prev) => arena.read_free(prev).next,
            None => self.head,
        }
    }

    fn link(&mut self, arena: &Arena, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(prev) => arena.write_free_next(prev, next),
            None => self.head = next,
        }
    }
}

pub(crate) struct Iter<'a> {
    arena: &'a Arena,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = Cursor;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next?;
        let header = self.arena.read_free(offset);
        let cursor = Cursor {
            prev: self.prev,
            offset,
            len: header.len,
        };
        self.prev = Some(offset);
        self.next = header.next;
        Some(cursor)
    }
}
