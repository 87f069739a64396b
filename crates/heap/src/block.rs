//! Block metadata: the header placed in front of every block and the tagged
//! size field that folds the ownership flag into its highest bit.
//!
//! All address arithmetic in this crate works on byte offsets into the pool
//! rather than stored pointers, so the constants and helpers here are the
//! only place where block geometry is defined.

use core::fmt;

/// Alignment boundary for block headers and returned allocations.
///
/// This equals the header's own alignment requirement (one machine word):
/// 4 bytes on 32-bit targets, 8 bytes on 64-bit targets. Every block offset
/// and every pointer handed out by the allocator is a multiple of this.
pub const ALIGNMENT: usize = align_of::<BlockHeader>();

/// Size of the header stored immediately before the usable bytes of every
/// block, free or allocated.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Smallest block the splitting policy will leave behind.
///
/// A remainder at or below this size could never hold a header plus usable
/// space worth re-splitting, so such splits are skipped and the caller
/// receives the whole block instead.
pub const MINIMUM_BLOCK_SIZE: usize = HEADER_SIZE * 2;

/// Offset value meaning "no next block".
///
/// Used as the end sentinel's successor and as the `next` of every allocated
/// block; allocated blocks are never part of the free list.
pub(crate) const NIL: usize = usize::MAX;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(align_of::<BlockHeader>() == align_of::<usize>());

/// Rounds `value` up to the next multiple of [`ALIGNMENT`].
pub(crate) fn align_up(value: usize) -> usize {
    value.next_multiple_of(ALIGNMENT)
}

/// Rounds `value` down to the previous multiple of [`ALIGNMENT`].
pub(crate) fn align_down(value: usize) -> usize {
    value / ALIGNMENT * ALIGNMENT
}

/// A total block size with the ownership flag in its highest bit.
///
/// The size value proper counts the whole block including its header and is
/// always a multiple of [`ALIGNMENT`]. Reserving the top bit halves the
/// largest representable block but avoids a separate status field in every
/// header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaggedSize(usize);

impl TaggedSize {
    /// The ownership flag: the highest bit of the size type.
    const ALLOCATED_BIT: usize = 1 << (usize::BITS - 1);

    /// Largest block size the reserved bit leaves representable.
    pub(crate) const MAX_SIZE: usize = Self::ALLOCATED_BIT - 1;

    /// Tags `size` as the size of a free block.
    ///
    /// # Panics
    ///
    /// Panics if `size` collides with the reserved ownership bit.
    pub(crate) fn free(size: usize) -> Self {
        assert!(
            size <= Self::MAX_SIZE,
            "block size collides with the reserved ownership bit"
        );
        Self(size)
    }

    /// The size value with the ownership bit masked off.
    pub(crate) fn value(self) -> usize {
        self.0 & !Self::ALLOCATED_BIT
    }

    /// Whether the ownership bit is set.
    pub(crate) fn is_allocated(self) -> bool {
        self.0 & Self::ALLOCATED_BIT != 0
    }

    /// The same size with the ownership bit set.
    #[must_use]
    pub(crate) fn with_allocated_bit(self) -> Self {
        Self(self.0 | Self::ALLOCATED_BIT)
    }
}

impl fmt::Debug for TaggedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedSize")
            .field("size", &self.value())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

/// Header placed immediately before the usable memory of every block.
///
/// While a block is free, `next` holds the pool offset of the next free block
/// in ascending address order (the end sentinel holds [`NIL`]). While a block
/// is allocated, `next` is severed to [`NIL`].
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockHeader {
    pub(crate) next: usize,
    pub(crate) size: TaggedSize,
}
