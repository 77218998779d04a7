//! Free-list snapshots for tests and debugging.

use alloc::vec::Vec;
use core::{fmt, ops::Deref};

/// One free block as seen at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreeBlockInfo {
    /// Address of the first byte of the block.
    pub addr: usize,
    /// Position of the block relative to the arena start.
    pub offset: usize,
    /// Span of the block in bytes, header included.
    pub len: usize,
}

impl FreeBlockInfo {
    /// Offset one past the last byte of the block.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }
}

/// Snapshot of the free list, in list (ascending address) order.
///
/// Displays as one `\t<address> <length>` line per block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeListDump {
    blocks: Vec<FreeBlockInfo>,
}

impl FreeListDump {
    /// Sum of the spans of all free blocks.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.blocks.iter().map(|block| block.len).sum()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<FreeBlockInfo> {
        self.blocks
    }
}

impl Deref for FreeListDump {
    type Target = [FreeBlockInfo];

    fn deref(&self) -> &Self::Target {
        &self.blocks
    }
}

impl FromIterator<FreeBlockInfo> for FreeListDump {
    fn from_iter<T: IntoIterator<Item = FreeBlockInfo>>(iter: T) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FreeListDump {
    type Item = &'a FreeBlockInfo;
    type IntoIter = core::slice::Iter<'a, FreeBlockInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl fmt::Display for FreeListDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "\t{:#x} {}", block.addr, block.len)?;
        }
        Ok(())
    }
}
