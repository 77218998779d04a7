//! Deallocation engine: adjacency detection and coalescing.

use core::ptr::NonNull;

use super::Heap;
use crate::{block::USED_HEADER_SIZE, free_list::Cursor};

impl Heap {
    /// Returns the used block owning `ptr` to the free list.
    ///
    /// The freed span is merged with the free block ending right before it
    /// and with the free block starting right after it, whenever those exist,
    /// so no two free blocks are ever adjacent once this returns.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by [`allocate`](Self::allocate) on this heap
    /// - `ptr` has not been deallocated since
    pub(crate) unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let data_offset = self.arena.offset_of(ptr);
        debug_assert!(
            data_offset.is_some_and(|offset| offset >= USED_HEADER_SIZE),
            "pointer {ptr:p} was not allocated from this arena"
        );
        let Some(data_offset) = data_offset else {
            return;
        };

        let start = data_offset - USED_HEADER_SIZE;
        let payload_len = self.arena.read_used(start);
        let span = USED_HEADER_SIZE + payload_len;
        let end = start + span;
        debug_assert!(
            end <= self.arena.len(),
            "used block at offset {start} runs past the arena end"
        );

        let (before, after) = self.find_neighbors(start, end);
        match (before, after) {
            (None, None) => {
                self.free_list.insert_ordered(&self.arena, start, span);
            }
            (Some(before), None) => {
                self.free_list
                    .resize(&self.arena, before.offset, before.len + span);
            }
            (None, Some(after)) => {
                self.free_list.replace(
                    &self.arena,
                    after.prev,
                    after.offset,
                    start,
                    span + after.len,
                );
            }
            (Some(before), Some(after)) => {
                debug_assert_eq!(after.prev, Some(before.offset));
                self.free_list.remove(&self.arena, after.prev, after.offset);
                self.free_list.resize(
                    &self.arena,
                    before.offset,
                    before.len + span + after.len,
                );
            }
        }

        log::trace!(
            "freed {payload_len} bytes at offset {data_offset} (merged before: {}, after: {})",
            before.is_some(),
            after.is_some()
        );
    }

    /// Finds the free blocks ending at `start` and beginning at `end`.
    fn find_neighbors(&self, start: usize, end: usize) -> (Option<Cursor>, Option<Cursor>) {
        let mut before = None;
        let mut after = None;
        for block in self.free_list.iter(&self.arena) {
            if block.offset > end {
                break;
            }
            if block.end() == start {
                before = Some(block);
            }
            if block.offset == end {
                after = Some(block);
            }
        }
        (before, after)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::ptr::NonNull;

    use crate::{block::USED_HEADER_SIZE, heap::tests::with_test_heap};

    const SPAN: usize = 64 + USED_HEADER_SIZE;

    #[test]
    fn test_no_neighbors_inserts_in_order() {
        with_test_heap(1024, |heap| unsafe {
            let a = heap.allocate(64).unwrap();
            let _b = heap.allocate(64).unwrap();
            let c = heap.allocate(64).unwrap();
            let _d = heap.allocate(64).unwrap();
            let rest = 1024 - 4 * SPAN;

            heap.deallocate(a, 64);
            heap.deallocate(c, 64);
            assert_eq!(
                heap.free_blocks(),
                [(0, rest), (rest + SPAN, SPAN), (rest + 3 * SPAN, SPAN)]
            );
            assert_eq!(heap.heap.free_block_count(), 3);
        });
    }

    #[test]
    fn test_merge_with_predecessor() {
        with_test_heap(1024, |heap| unsafe {
            let _a = heap.allocate(64).unwrap();
            let b = heap.allocate(64).unwrap();
            let rest = 1024 - 2 * SPAN;

            heap.deallocate(b, 64);
            assert_eq!(heap.free_blocks(), [(0, rest + SPAN)]);
        });
    }

    #[test]
    fn test_merge_with_successor() {
        with_test_heap(1024, |heap| unsafe {
            let a = heap.allocate(64).unwrap();
            let b = heap.allocate(64).unwrap();
            let _c = heap.allocate(64).unwrap();
            let rest = 1024 - 3 * SPAN;

            heap.deallocate(a, 64);
            assert_eq!(heap.free_blocks(), [(0, rest), (rest + 2 * SPAN, SPAN)]);

            heap.deallocate(b, 64);
            assert_eq!(
                heap.free_blocks(),
                [(0, rest), (rest + SPAN, 2 * SPAN)]
            );
            assert_eq!(heap.heap.free_block_count(), 2);
        });
    }

    #[test]
    fn test_merge_with_successor_at_head() {
        with_test_heap(256, |heap| unsafe {
            // Consume the whole arena in two blocks.
            let high = heap.allocate(128 - USED_HEADER_SIZE).unwrap();
            let low = heap.allocate(128 - USED_HEADER_SIZE).unwrap();
            assert!(heap.free_blocks().is_empty());

            heap.deallocate(high, 128 - USED_HEADER_SIZE);
            assert_eq!(heap.free_blocks(), [(128, 128)]);

            heap.deallocate(low, 128 - USED_HEADER_SIZE);
            assert_eq!(heap.free_blocks(), [(0, 256)]);
        });
    }

    #[test]
    fn test_merge_both_sides() {
        with_test_heap(1024, |heap| unsafe {
            let a = heap.allocate(64).unwrap();
            let b = heap.allocate(64).unwrap();
            let c = heap.allocate(64).unwrap();
            let _d = heap.allocate(64).unwrap();
            let rest = 1024 - 4 * SPAN;

            heap.deallocate(c, 64);
            heap.deallocate(a, 64);
            assert_eq!(heap.heap.free_block_count(), 3);

            // `b` sits between the free spans of `c` and `a`.
            heap.deallocate(b, 64);
            assert_eq!(
                heap.free_blocks(),
                [(0, rest), (rest + SPAN, 3 * SPAN)]
            );
        });
    }

    #[test]
    fn test_full_reclamation() {
        with_test_heap(1024, |heap| unsafe {
            let sizes = [1, 7, 8, 100, 33, 64, 250, 0, 16];
            let ptrs = sizes
                .iter()
                .map(|&size| (heap.allocate(size).unwrap(), size))
                .collect::<Vec<(NonNull<u8>, usize)>>();

            for &(ptr, size) in ptrs.iter().step_by(2) {
                heap.deallocate(ptr, size);
            }
            for &(ptr, size) in ptrs.iter().skip(1).step_by(2).rev() {
                heap.deallocate(ptr, size);
            }

            assert_eq!(heap.free_blocks(), [(0, 1024)]);
        });
    }

    #[test]
    fn test_absorbed_sliver_is_returned() {
        with_test_heap(128, |heap| unsafe {
            let ptr = heap.allocate(110).unwrap();
            assert!(heap.free_blocks().is_empty());
            heap.deallocate(ptr, 110);
            assert_eq!(heap.free_blocks(), [(0, 128)]);
        });
    }
}
