use core::{marker::PhantomData, ptr::NonNull};

use snafu::OptionExt as _;
use spin::Mutex;

use crate::{
    dump::FreeListDump,
    error::{AllocError, InitError, NullBaseSnafu},
    heap::Heap,
};

/// A thread-safe allocator carving blocks out of one caller-supplied arena.
///
/// All bookkeeping lives inside the arena itself; the allocator never asks
/// any other memory provider for space. Every operation takes a single lock
/// for its whole duration, so concurrent callers always observe a consistent
/// free list.
///
/// # Algorithm
///
/// - **Allocation**: first-fit over the address-ordered free list. The used
///   block is cut from the high-address end of the chosen free block; a
///   remainder too small to be a free block is handed out with it.
/// - **Deallocation**: the freed block is merged with the free blocks
///   directly before and after it, so the arena always returns to a single
///   free block once every allocation has been released.
///
/// # Alignment
///
/// Payloads are placed at `USED_HEADER_SIZE` bytes past a block boundary and
/// block boundaries follow request sizes, so the returned pointers have no
/// alignment guarantee beyond byte alignment.
pub struct ArenaAllocator<'arena> {
    heap: Mutex<Heap>,
    _arena: PhantomData<&'arena mut [u8]>,
}

impl<'arena> ArenaAllocator<'arena> {
    /// Creates an allocator managing all of `arena`.
    ///
    /// The whole slice becomes one free block.
    pub fn new(arena: &'arena mut [u8]) -> Result<Self, InitError> {
        let len = arena.len();
        let base = NonNull::from(arena).cast::<u8>();
        unsafe { Self::from_raw_parts(base.as_ptr(), len) }
    }

    /// Creates an allocator managing `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - the range `base..base + len` is valid for reads and writes
    /// - the range is not accessed by any other code except through pointers
    ///   returned by this allocator
    /// - the range stays valid for `'arena`
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Result<Self, InitError> {
        let base = NonNull::new(base).context(NullBaseSnafu)?;
        let heap = unsafe { Heap::new(base, len) }?;
        Ok(Self {
            heap: Mutex::new(heap),
            _arena: PhantomData,
        })
    }

    /// Allocates a block with room for `len` payload bytes.
    ///
    /// Requests smaller than [`MIN_PAYLOAD_SIZE`](crate::MIN_PAYLOAD_SIZE)
    /// are rounded up. The block may be slightly larger than requested.
    pub fn allocate(&self, len: usize) -> Result<NonNull<u8>, AllocError> {
        self.heap.lock().allocate(len)
    }

    /// Returns a block to the allocator.
    ///
    /// Passing a null pointer does nothing.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` is null or was returned by [`allocate`](Self::allocate) on this
    ///   allocator
    /// - `ptr` has not been deallocated since
    /// - the payload is not accessed after this call
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        unsafe { self.heap.lock().deallocate(ptr) }
    }

    /// Returns the number of blocks in the free list.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.heap.lock().free_block_count()
    }

    /// Takes a snapshot of the free list.
    #[must_use]
    pub fn dump_free_list(&self) -> FreeListDump {
        self.heap.lock().dump_free_list()
    }

    /// Returns a pointer to the first byte of the arena.
    #[must_use]
    pub fn arena_start(&self) -> NonNull<u8> {
        self.heap.lock().arena_start()
    }

    /// Returns the size of the arena in bytes.
    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.heap.lock().arena_len()
    }
}

impl core::fmt::Debug for ArenaAllocator<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let heap = self.heap.lock();
        f.debug_struct("ArenaAllocator")
            .field("arena_start", &heap.arena_start())
            .field("arena_len", &heap.arena_len())
            .field("free_blocks", &heap.free_block_count())
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::ptr;

    use super::*;
    use crate::{FREE_HEADER_SIZE, USED_HEADER_SIZE};

    fn with_test_allocator<F>(size: usize, test_fn: F)
    where
        F: FnOnce(&ArenaAllocator<'_>),
    {
        let mut arena = vec![0x11_u8; size];
        let allocator = ArenaAllocator::new(&mut arena).unwrap();
        test_fn(&allocator);
    }

    #[test]
    fn test_new_from_slice() {
        let mut arena = [0_u8; 256];
        let start = arena.as_ptr().addr();
        let allocator = ArenaAllocator::new(&mut arena).unwrap();
        assert_eq!(allocator.arena_start().addr().get(), start);
        assert_eq!(allocator.arena_len(), 256);
        assert_eq!(allocator.free_block_count(), 1);
    }

    #[test]
    fn test_null_base_is_rejected() {
        let err = unsafe { ArenaAllocator::from_raw_parts(ptr::null_mut(), 1024) }.unwrap_err();
        assert!(matches!(err, InitError::NullBase { .. }));
    }

    #[test]
    fn test_too_small_is_rejected() {
        let mut arena = [0_u8; FREE_HEADER_SIZE - 1];
        let err = ArenaAllocator::new(&mut arena).unwrap_err();
        assert!(matches!(err, InitError::ArenaTooSmall { .. }));
    }

    #[test]
    fn test_null_deallocate_releases_lock() {
        with_test_allocator(128, |allocator| unsafe {
            allocator.deallocate(ptr::null_mut());
            allocator.deallocate(ptr::null_mut());
            // Would spin forever if the lock had been kept.
            let ptr = allocator.allocate(16).unwrap();
            assert_eq!(allocator.free_block_count(), 1);
            allocator.deallocate(ptr.as_ptr());
            assert_eq!(allocator.dump_free_list().total_len(), 128);
        });
    }

    #[test]
    fn test_failed_allocate_releases_lock() {
        with_test_allocator(64, |allocator| {
            assert!(allocator.allocate(1000).is_err());
            assert!(allocator.allocate(1000).is_err());
            assert!(allocator.allocate(8).is_ok());
        });
    }

    #[test]
    fn test_payload_is_writable() {
        with_test_allocator(256, |allocator| unsafe {
            let a = allocator.allocate(40).unwrap();
            let b = allocator.allocate(40).unwrap();
            a.write_bytes(0xaa, 40);
            b.write_bytes(0xbb, 40);
            assert!((0..40).all(|i| a.add(i).read() == 0xaa));
            assert!((0..40).all(|i| b.add(i).read() == 0xbb));
            allocator.deallocate(a.as_ptr());
            allocator.deallocate(b.as_ptr());
            assert_eq!(allocator.free_block_count(), 1);
        });
    }

    #[test]
    fn test_dump_matches_count() {
        with_test_allocator(512, |allocator| unsafe {
            let a = allocator.allocate(32).unwrap();
            let _b = allocator.allocate(32).unwrap();
            allocator.deallocate(a.as_ptr());

            let dump = allocator.dump_free_list();
            assert_eq!(dump.len(), allocator.free_block_count());
            assert_eq!(dump.len(), 2);
            assert_eq!(
                dump.total_len(),
                512 - (32 + USED_HEADER_SIZE)
            );
            let start = allocator.arena_start().addr().get();
            for block in &dump {
                assert_eq!(block.addr, start + block.offset);
            }
        });
    }

    #[test]
    fn test_independent_arenas() {
        let mut arena1 = [0_u8; 128];
        let mut arena2 = [0_u8; 256];
        let allocator1 = ArenaAllocator::new(&mut arena1).unwrap();
        let allocator2 = ArenaAllocator::new(&mut arena2).unwrap();

        let _ptr = allocator1.allocate(110).unwrap();
        assert_eq!(allocator1.free_block_count(), 0);
        assert_eq!(allocator2.dump_free_list()[0].len, 256);
    }

    #[test]
    fn test_debug_output() {
        with_test_allocator(64, |allocator| {
            let debug = format!("{allocator:?}");
            assert!(debug.contains("arena_len: 64"));
            assert!(debug.contains("free_blocks: 1"));
        });
    }
}
