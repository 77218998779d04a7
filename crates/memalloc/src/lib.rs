//! A thread-safe first-fit allocator over a caller-supplied arena.
//!
//! [`ArenaAllocator`] partitions one contiguous memory region into blocks and
//! services allocate/free requests against it. It never acquires memory from
//! anywhere else: the free list, its links and every block header are stored
//! inside the arena itself.
//!
//! # Algorithm
//!
//! - **Free List**: free blocks are kept in a singly-linked list sorted by
//!   address
//! - **Allocation**: the list is searched from the beginning for the first
//!   block large enough; the allocation is cut from that block's high end
//! - **Deallocation**: the freed block is merged with any free block directly
//!   before or after it, or inserted at its address-ordered position
//! - **Locking**: a single spin lock serializes every operation
//!
//! # Usage Example
//!
//! ```rust
//! use memalloc::ArenaAllocator;
//!
//! let mut arena = vec![0u8; 1024];
//! let allocator = ArenaAllocator::new(&mut arena).unwrap();
//!
//! let ptr = allocator.allocate(100).unwrap();
//! unsafe {
//!     ptr.write_bytes(0, 100);
//!     allocator.deallocate(ptr.as_ptr());
//! }
//!
//! assert_eq!(allocator.free_block_count(), 1);
//! assert_eq!(allocator.dump_free_list()[0].len, 1024);
//! ```
//!
//! # Performance Characteristics
//!
//! - **Allocation**: O(n) where n is the number of free blocks
//! - **Deallocation**: O(n) where n is the number of free blocks
//! - **Memory Overhead**: [`USED_HEADER_SIZE`] bytes per allocation
//! - **Minimum Block**: [`FREE_HEADER_SIZE`] bytes

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

pub use self::{
    allocator::ArenaAllocator,
    block::{FREE_HEADER_SIZE, MIN_PAYLOAD_SIZE, USED_HEADER_SIZE},
    dump::{FreeBlockInfo, FreeListDump},
    error::{AllocError, InitError, Location},
};

mod allocator;
mod block;
mod dump;
pub mod error;
mod free_list;
mod heap;
