//! Unsynchronized fixed-pool allocator core.
//!
//! [`Pool`] carves variable-sized allocations out of a single caller-supplied
//! buffer. It keeps free blocks in an intrusive singly linked list that is
//! **strictly ordered by ascending address** at all times; that ordering is
//! what makes coalescing on release a local neighbor check instead of a full
//! pool scan.
//!
//! # Algorithm
//!
//! - **Allocation** walks the free list from its lowest address and takes the
//!   first block large enough for the adjusted request (first fit). Oversized
//!   blocks are split in place and the remainder is reinserted.
//! - **Release** recovers the block header, verifies the in-band ownership
//!   flag, and reinserts the block at its address-ordered position, merging
//!   with the predecessor and/or successor when the regions touch. Zero, one,
//!   or two merges happen per release.
//!
//! # Memory layout
//!
//! Each block carries a [`BlockHeader`] directly in front of its usable
//! bytes. The list is bounded by a `start` sentinel (a plain field of the
//! pool, not a block) and an `end` sentinel header written at the highest
//! aligned offset that keeps the header inside the buffer:
//!
//! ```text
//! buffer: [pad][hdr|usable...][hdr|usable...][hdr|usable...][end hdr][pad]
//!              ^first_offset                                ^end_offset
//! ```
//!
//! Blocks are addressed by byte offset into the buffer; the allocator never
//! stores raw pointers in the pool. Header reads and writes go through
//! bounds-checked accessors that verify the offset against the pool extent
//! before reinterpreting the bytes.
//!
//! # Thread safety
//!
//! `Pool` is `Send` but not `Sync`; concurrent callers must go through the
//! lock-guarded [`Heap`](crate::Heap) facade or provide their own mutual
//! exclusion.

use core::ptr;

use snafu::ensure;

use crate::{
    block::{
        self, ALIGNMENT, BlockHeader, HEADER_SIZE, MINIMUM_BLOCK_SIZE, NIL, TaggedSize,
    },
    error::{
        AssignError, NullBufferSnafu, RegionTooLargeSnafu, RegionTooSmallSnafu, ZeroSizeSnafu,
    },
};

/// A snapshot of the pool's accounting state.
///
/// Produced by [`Pool::stats`] in a single pass over the free list, so all
/// fields are mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Bytes currently free, including the header of every free block.
    pub bytes_free: usize,
    /// The lowest value `bytes_free` has ever reached.
    pub minimum_ever_free: usize,
    /// Cumulative bytes handed out, counted in whole blocks (header
    /// included).
    pub bytes_allocated_total: usize,
    /// Cumulative bytes returned, counted in whole blocks.
    pub bytes_freed_total: usize,
    /// Number of successful allocations.
    pub allocation_count: usize,
    /// Number of releases.
    pub release_count: usize,
    /// Number of blocks currently on the free list.
    pub free_block_count: usize,
    /// Size of the largest free block, zero when the list is empty.
    pub largest_free_block: usize,
    /// Size of the smallest free block, zero when the list is empty.
    pub smallest_free_block: usize,
}

/// Fixed-pool allocator over one contiguous caller-supplied buffer.
///
/// The pool is adopted once via [`assign`](Self::assign); the free list
/// itself is built lazily on the first allocation. All five structural
/// invariants (address ordering, eager coalescing, size conservation,
/// alignment, ownership-bit consistency) hold after every operation.
///
/// # Examples
///
/// ```
/// use heap::Pool;
///
/// let mut buffer = [0_u8; 1024];
/// let mut pool = Pool::new();
/// unsafe { pool.assign(buffer.as_mut_ptr(), buffer.len()) }.unwrap();
///
/// let ptr = pool.allocate(64).expect("pool has room");
/// unsafe { pool.release(ptr) };
/// ```
pub struct Pool {
    /// Start of the caller's buffer; null until a pool is assigned.
    base: *mut u8,
    /// Raw buffer size as supplied by the caller.
    capacity: usize,
    /// Offset of the first (lowest) possible block header.
    first_offset: usize,
    /// Offset of the end sentinel header.
    end_offset: usize,
    /// The start sentinel's successor: offset of the lowest free block, or
    /// `end_offset` when the list is empty.
    start_next: usize,
    /// Whether the free list has been built.
    initialized: bool,
    free_remaining: usize,
    minimum_ever_free: usize,
    bytes_allocated: usize,
    bytes_freed: usize,
    allocations: usize,
    releases: usize,
}

// The pool owns its buffer exclusively for its lifetime; moving it between
// threads is sound as long as access stays externally serialized.
unsafe impl Send for Pool {}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    /// Creates a pool with no buffer assigned.
    ///
    /// Every allocation fails until [`assign`](Self::assign) succeeds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base: ptr::null_mut(),
            capacity: 0,
            first_offset: 0,
            end_offset: 0,
            start_next: NIL,
            initialized: false,
            free_remaining: 0,
            minimum_ever_free: 0,
            bytes_allocated: 0,
            bytes_freed: 0,
            allocations: 0,
            releases: 0,
        }
    }

    /// Adopts `buffer` as the pool and resets all accounting.
    ///
    /// The buffer geometry (alignment padding, end sentinel position, usable
    /// size) is validated and computed here, but the free list is only built
    /// on the first allocation. On failure the previous pool state is left
    /// untouched.
    ///
    /// Re-assigning while allocations from the previous pool are live
    /// invalidates them; releasing such a pointer afterwards is undefined
    /// behavior.
    ///
    /// # Errors
    ///
    /// - [`AssignError::NullBuffer`] / [`AssignError::ZeroSize`] for the
    ///   degenerate arguments.
    /// - [`AssignError::RegionTooSmall`] when, after alignment, the buffer
    ///   cannot hold the end sentinel plus one minimum-size block.
    /// - [`AssignError::RegionTooLarge`] when `size` exceeds what the tagged
    ///   size field can represent.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `buffer` is valid for reads and writes for `size` bytes
    /// - The region is not used by anything else for the lifetime of the pool
    /// - No pointer from a previously assigned pool is released after this
    ///   call succeeds
    pub unsafe fn assign(&mut self, buffer: *mut u8, size: usize) -> Result<(), AssignError> {
        ensure!(!buffer.is_null(), NullBufferSnafu);
        ensure!(size > 0, ZeroSizeSnafu);
        ensure!(size <= TaggedSize::MAX_SIZE, RegionTooLargeSnafu { size });

        let base_addr = buffer.addr();
        let Some(first_addr) = base_addr.checked_next_multiple_of(ALIGNMENT) else {
            return RegionTooSmallSnafu { size }.fail();
        };
        let end_addr = base_addr
            .checked_add(size)
            .and_then(|top| top.checked_sub(HEADER_SIZE))
            .map(block::align_down);
        let Some(end_addr) = end_addr else {
            return RegionTooSmallSnafu { size }.fail();
        };
        let usable = end_addr.checked_sub(first_addr);
        let Some(usable) = usable.filter(|&span| span >= MINIMUM_BLOCK_SIZE) else {
            return RegionTooSmallSnafu { size }.fail();
        };

        self.base = buffer;
        self.capacity = size;
        self.first_offset = first_addr - base_addr;
        self.end_offset = end_addr - base_addr;
        self.start_next = NIL;
        self.initialized = false;
        self.free_remaining = usable;
        self.minimum_ever_free = usable;
        self.bytes_allocated = 0;
        self.bytes_freed = 0;
        self.allocations = 0;
        self.releases = 0;
        Ok(())
    }

    /// Allocates `size` usable bytes from the pool.
    ///
    /// The request is grown by the header size and rounded up to
    /// [`ALIGNMENT`]; the first free block large enough (in ascending address
    /// order) is taken and split when the surplus exceeds
    /// [`MINIMUM_BLOCK_SIZE`]. Returns `None` when no pool is assigned, the
    /// request is zero or collides with the reserved ownership bit, or no
    /// single free block can hold the adjusted request — even if the
    /// aggregate free bytes would suffice, which is the inherent
    /// fragmentation trade-off of first fit.
    ///
    /// The returned pointer is aligned to [`ALIGNMENT`] and points to at
    /// least `size` usable bytes.
    pub fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        if self.base.is_null() {
            return None;
        }
        if !self.initialized {
            self.initialize();
        }
        if size == 0 || size > TaggedSize::MAX_SIZE {
            return None;
        }
        // `size` is bounded by the tag, so the adjustment cannot overflow.
        let needed = block::align_up(size.checked_add(HEADER_SIZE)?);
        if needed > self.free_remaining {
            return None;
        }

        // First fit over the address-ordered list. An exact fit sitting at a
        // higher address than an earlier large-enough block is intentionally
        // not preferred; placement is observable behavior.
        let mut prev = None;
        let mut cursor = self.start_next;
        while cursor != self.end_offset && self.header(cursor).size.value() < needed {
            prev = Some(cursor);
            cursor = self.header(cursor).next;
        }
        if cursor == self.end_offset {
            // Enough bytes in aggregate, but fragmented into blocks that are
            // all too small.
            return None;
        }

        let found = self.header(cursor);
        self.set_next(prev, found.next);

        let mut block_size = found.size.value();
        if block_size - needed > MINIMUM_BLOCK_SIZE {
            let remainder = cursor + needed;
            self.write_header(
                remainder,
                BlockHeader {
                    next: NIL,
                    size: TaggedSize::free(block_size - needed),
                },
            );
            block_size = needed;
            self.insert_free_block(remainder);
        }

        self.free_remaining -= block_size;
        if self.free_remaining < self.minimum_ever_free {
            self.minimum_ever_free = self.free_remaining;
        }
        self.bytes_allocated += block_size;
        self.allocations += 1;

        self.write_header(
            cursor,
            BlockHeader {
                next: NIL,
                size: TaggedSize::free(block_size).with_allocated_bit(),
            },
        );
        Some(unsafe { self.base.add(cursor + HEADER_SIZE) })
    }

    /// Returns a block to the pool.
    ///
    /// The block is reinserted at its address-ordered position in the free
    /// list and merged with the predecessor and/or successor when the regions
    /// touch, so the released memory becomes indistinguishable from a freshly
    /// split free block.
    ///
    /// # Panics
    ///
    /// Double free, a pointer that was never returned by
    /// [`allocate`](Self::allocate) on this pool, or a corrupted header are
    /// fatal: the free list's integrity cannot be locally repaired once
    /// violated, so this panics instead of attempting recovery.
    ///
    /// # Safety
    ///
    /// `ptr` must come from a successful `allocate` call on this pool, must
    /// not have been released since, and the block's memory must no longer be
    /// accessed after this call.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        assert!(!ptr.is_null(), "released pointer is null");
        assert!(
            !self.base.is_null() && self.initialized,
            "release on a pool with no live allocations"
        );

        let offset = ptr
            .addr()
            .checked_sub(self.base.addr())
            .and_then(|user| user.checked_sub(HEADER_SIZE));
        let Some(offset) = offset else {
            panic!("released pointer does not belong to this pool");
        };
        assert!(
            offset >= self.first_offset && offset < self.end_offset,
            "released pointer does not belong to this pool"
        );

        let header = self.header(offset);
        assert!(
            header.size.is_allocated(),
            "released block is not allocated (double free or corruption)"
        );
        assert!(
            header.next == NIL,
            "released block is still linked (double free or corruption)"
        );

        let size = header.size.value();
        self.write_header(
            offset,
            BlockHeader {
                next: NIL,
                size: TaggedSize::free(size),
            },
        );
        self.free_remaining += size;
        self.bytes_freed += size;
        self.releases += 1;
        self.insert_free_block(offset);
    }

    /// Bytes currently free, headers of free blocks included.
    #[must_use]
    pub fn bytes_free(&self) -> usize {
        self.free_remaining
    }

    /// The lowest value [`bytes_free`](Self::bytes_free) has ever reached on
    /// this pool.
    #[must_use]
    pub fn minimum_ever_free(&self) -> usize {
        self.minimum_ever_free
    }

    /// Cumulative bytes handed out since assignment, in whole blocks.
    #[must_use]
    pub fn bytes_allocated_total(&self) -> usize {
        self.bytes_allocated
    }

    /// Cumulative bytes returned since assignment, in whole blocks.
    #[must_use]
    pub fn bytes_freed_total(&self) -> usize {
        self.bytes_freed
    }

    /// Takes a consistent snapshot of the accounting state.
    ///
    /// Walks the free list once to count blocks and find the size extremes.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut free_block_count = 0;
        let mut largest_free_block = 0;
        let mut smallest_free_block = 0;
        if self.initialized {
            let mut cursor = self.start_next;
            while cursor != self.end_offset {
                let header = self.header(cursor);
                let size = header.size.value();
                free_block_count += 1;
                largest_free_block = largest_free_block.max(size);
                smallest_free_block = if smallest_free_block == 0 {
                    size
                } else {
                    smallest_free_block.min(size)
                };
                cursor = header.next;
            }
        } else if self.free_remaining > 0 {
            // The list is built lazily; before first use the whole usable
            // region counts as one free block.
            free_block_count = 1;
            largest_free_block = self.free_remaining;
            smallest_free_block = self.free_remaining;
        }
        HeapStats {
            bytes_free: self.free_remaining,
            minimum_ever_free: self.minimum_ever_free,
            bytes_allocated_total: self.bytes_allocated,
            bytes_freed_total: self.bytes_freed,
            allocation_count: self.allocations,
            release_count: self.releases,
            free_block_count,
            largest_free_block,
            smallest_free_block,
        }
    }

    /// Builds the free list on first use: the end sentinel plus one giant
    /// free block spanning the whole usable region.
    fn initialize(&mut self) {
        debug_assert!(!self.initialized);
        self.initialized = true;
        self.write_header(
            self.end_offset,
            BlockHeader {
                next: NIL,
                size: TaggedSize::free(0),
            },
        );
        self.write_header(
            self.first_offset,
            BlockHeader {
                next: self.end_offset,
                size: TaggedSize::free(self.end_offset - self.first_offset),
            },
        );
        self.start_next = self.first_offset;
    }

    /// Inserts a free block at its address-ordered list position, merging
    /// with the predecessor and/or successor when the regions touch.
    ///
    /// The end sentinel is never merged away.
    fn insert_free_block(&mut self, offset: usize) {
        let mut prev = None;
        let mut cursor = self.start_next;
        while cursor < offset {
            prev = Some(cursor);
            cursor = self.header(cursor).next;
        }
        debug_assert!(cursor != offset, "block inserted twice");

        let size = self.header(offset).size.value();

        // Merge with the predecessor when it ends exactly where this block
        // starts; the predecessor's list slot is reused and this block's
        // header disappears.
        let (node, merged_into_prev) = match prev {
            Some(p) if p + self.header(p).size.value() == offset => {
                let mut grown = self.header(p);
                grown.size = TaggedSize::free(grown.size.value() + size);
                self.write_header(p, grown);
                (p, true)
            }
            _ => (offset, false),
        };

        // Merge with the successor unless it is the end sentinel.
        let mut node_header = self.header(node);
        if node + node_header.size.value() == cursor && cursor != self.end_offset {
            let successor = self.header(cursor);
            node_header.size = TaggedSize::free(node_header.size.value() + successor.size.value());
            node_header.next = successor.next;
        } else {
            node_header.next = cursor;
        }
        self.write_header(node, node_header);

        if !merged_into_prev {
            self.set_next(prev, node);
        }
    }

    /// Patches the successor link of `prev`, where `None` stands for the
    /// list's start sentinel.
    fn set_next(&mut self, prev: Option<usize>, next: usize) {
        match prev {
            None => self.start_next = next,
            Some(offset) => {
                let mut header = self.header(offset);
                header.next = next;
                self.write_header(offset, header);
            }
        }
    }

    /// Reads the header stored at `offset`.
    #[expect(clippy::cast_ptr_alignment)]
    fn header(&self, offset: usize) -> BlockHeader {
        self.check_extent(offset);
        unsafe { self.base.add(offset).cast::<BlockHeader>().read() }
    }

    /// Writes `header` at `offset`.
    #[expect(clippy::cast_ptr_alignment)]
    fn write_header(&mut self, offset: usize, header: BlockHeader) {
        self.check_extent(offset);
        unsafe {
            self.base.add(offset).cast::<BlockHeader>().write(header);
        }
    }

    /// Verifies `offset` against the pool extent before any byte range is
    /// reinterpreted as a header.
    fn check_extent(&self, offset: usize) {
        assert!(!self.base.is_null(), "no pool assigned");
        assert!(
            offset >= self.first_offset && offset <= self.end_offset,
            "block offset outside the pool extent"
        );
        assert!(
            self.base.addr().wrapping_add(offset).is_multiple_of(ALIGNMENT),
            "block offset is misaligned"
        );
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::alloc::Layout;

    use super::*;

    /// Adjusted size of a block serving a `size`-byte request, assuming the
    /// split happened.
    fn block_size(size: usize) -> usize {
        (size + HEADER_SIZE).next_multiple_of(ALIGNMENT)
    }

    fn with_test_pool<F>(pool_size: usize, test_fn: F)
    where
        F: FnOnce(&mut Pool),
    {
        unsafe {
            let layout = Layout::from_size_align(pool_size, ALIGNMENT).unwrap();
            let buffer = std::alloc::alloc(layout);
            buffer.write_bytes(0x11, pool_size);

            let mut pool = Pool::new();
            pool.assign(buffer, pool_size).unwrap();
            test_fn(&mut pool);

            std::alloc::dealloc(buffer, layout);
        }
    }

    fn checked_allocate(pool: &mut Pool, size: usize) -> *mut u8 {
        let ptr = pool.allocate(size).unwrap();
        unsafe {
            ptr.write_bytes(0x33, size);
        }
        ptr
    }

    unsafe fn checked_release(pool: &mut Pool, ptr: *mut u8, size: usize) {
        unsafe {
            for i in 0..size {
                assert_eq!(ptr.add(i).read(), 0x33);
            }
            ptr.write_bytes(0x55, size);
            pool.release(ptr);
        }
    }

    #[test]
    fn test_basic_allocation() {
        with_test_pool(1024, |pool| unsafe {
            let ptr = checked_allocate(pool, 64);
            assert!(!ptr.is_null());
            checked_release(pool, ptr, 64);
        });
    }

    #[test]
    fn test_allocations_are_disjoint_and_ascending() {
        with_test_pool(1024, |pool| unsafe {
            let a = checked_allocate(pool, 48);
            let b = checked_allocate(pool, 48);
            let c = checked_allocate(pool, 48);

            assert!(a < b && b < c);
            assert!(a.addr() + 48 <= b.addr());
            assert!(b.addr() + 48 <= c.addr());

            checked_release(pool, a, 48);
            checked_release(pool, b, 48);
            checked_release(pool, c, 48);
        });
    }

    #[test]
    fn test_returned_pointers_are_aligned() {
        with_test_pool(2048, |pool| unsafe {
            for size in [1, 3, 5, 17, 63, 100] {
                let ptr = checked_allocate(pool, size);
                assert!(ptr.addr().is_multiple_of(ALIGNMENT));
                checked_release(pool, ptr, size);
            }
        });
    }

    #[test]
    fn test_zero_size_allocation_fails() {
        with_test_pool(1024, |pool| {
            assert!(pool.allocate(0).is_none());
        });
    }

    #[test]
    fn test_request_colliding_with_ownership_bit_fails() {
        with_test_pool(1024, |pool| {
            assert!(pool.allocate(usize::MAX).is_none());
            assert!(pool.allocate(1 << (usize::BITS - 1)).is_none());
        });
    }

    #[test]
    fn test_unassigned_pool_fails() {
        let mut pool = Pool::new();
        assert!(pool.allocate(16).is_none());
        assert_eq!(pool.bytes_free(), 0);
    }

    #[test]
    fn test_split_places_second_block_adjacent() {
        // The worked scenario: the second allocation lands exactly one
        // adjusted block after the first.
        with_test_pool(1024, |pool| unsafe {
            let p1 = checked_allocate(pool, 100);
            let p2 = checked_allocate(pool, 200);
            assert_eq!(p2.addr(), p1.addr() + block_size(100));

            checked_release(pool, p1, 100);
            checked_release(pool, p2, 200);
        });
    }

    #[test]
    fn test_release_reuses_freed_region() {
        with_test_pool(1024, |pool| unsafe {
            let p1 = checked_allocate(pool, 100);
            let p2 = checked_allocate(pool, 200);

            checked_release(pool, p1, 100);
            // The freed region is first in address order and large enough,
            // so first fit must reuse it.
            let p3 = checked_allocate(pool, 50);
            assert_eq!(p3.addr(), p1.addr());

            checked_release(pool, p2, 200);
            checked_release(pool, p3, 50);
        });
    }

    #[test]
    fn test_full_cycle_restores_free_bytes() {
        with_test_pool(1024, |pool| unsafe {
            let initial = pool.bytes_free();

            let p1 = checked_allocate(pool, 100);
            let p2 = checked_allocate(pool, 200);
            checked_release(pool, p1, 100);
            let p3 = checked_allocate(pool, 50);
            checked_release(pool, p2, 200);
            checked_release(pool, p3, 50);

            assert_eq!(pool.bytes_free(), initial);
            let stats = pool.stats();
            assert_eq!(stats.free_block_count, 1);
            assert_eq!(stats.largest_free_block, initial);
        });
    }

    #[test]
    fn test_coalescing_release_lower_then_upper() {
        with_test_pool(1024, |pool| unsafe {
            let a = checked_allocate(pool, 64);
            let b = checked_allocate(pool, 64);
            // Keeps the tail free block away from a and b.
            let guard = checked_allocate(pool, 64);

            checked_release(pool, a, 64);
            checked_release(pool, b, 64);

            // One merged block must now span both; a request for their
            // combined usable space succeeds and lands at `a`.
            let combined = 2 * block_size(64) - HEADER_SIZE;
            let merged = checked_allocate(pool, combined);
            assert_eq!(merged.addr(), a.addr());

            checked_release(pool, merged, combined);
            checked_release(pool, guard, 64);
        });
    }

    #[test]
    fn test_coalescing_release_upper_then_lower() {
        with_test_pool(1024, |pool| unsafe {
            let a = checked_allocate(pool, 64);
            let b = checked_allocate(pool, 64);
            let guard = checked_allocate(pool, 64);

            checked_release(pool, b, 64);
            checked_release(pool, a, 64);

            let combined = 2 * block_size(64) - HEADER_SIZE;
            let merged = checked_allocate(pool, combined);
            assert_eq!(merged.addr(), a.addr());

            checked_release(pool, merged, combined);
            checked_release(pool, guard, 64);
        });
    }

    #[test]
    fn test_exhaustion_returns_none_without_corruption() {
        with_test_pool(512, |pool| unsafe {
            let mut live = Vec::new();
            while let Some(ptr) = pool.allocate(32) {
                ptr.write_bytes(0x33, 32);
                live.push(ptr);
            }
            assert!(!live.is_empty());
            assert!(pool.allocate(32).is_none());

            for ptr in live {
                checked_release(pool, ptr, 32);
            }
            // The pool survives exhaustion intact.
            let ptr = checked_allocate(pool, 32);
            checked_release(pool, ptr, 32);
        });
    }

    #[test]
    fn test_fragmented_pool_fails_despite_aggregate_bytes() {
        with_test_pool(1024, |pool| unsafe {
            let mut live = Vec::new();
            while let Some(ptr) = pool.allocate(32) {
                ptr.write_bytes(0x33, 32);
                live.push(ptr);
            }

            // Free every other block: plenty of aggregate bytes, but no two
            // holes are adjacent.
            let mut holes = 0;
            for (i, &ptr) in live.iter().enumerate() {
                if i % 2 == 0 {
                    checked_release(pool, ptr, 32);
                    holes += 1;
                }
            }
            assert!(holes >= 4);
            assert!(pool.bytes_free() >= 2 * block_size(32));
            assert!(pool.allocate(2 * block_size(32)).is_none());

            for (i, &ptr) in live.iter().enumerate() {
                if i % 2 != 0 {
                    checked_release(pool, ptr, 32);
                }
            }
        });
    }

    #[test]
    fn test_first_fit_prefers_earlier_block_over_later_exact_fit() {
        with_test_pool(2048, |pool| unsafe {
            let a = checked_allocate(pool, 128);
            let b = checked_allocate(pool, 32);
            let c = checked_allocate(pool, 48);
            let d = checked_allocate(pool, 32);

            // Free list: [a-hole (128-block), c-hole (48-block), tail].
            checked_release(pool, a, 128);
            checked_release(pool, c, 48);

            // A request that fits the c-hole exactly still takes the earlier,
            // larger a-hole: the walk stops at the first block that fits.
            let ptr = checked_allocate(pool, 48);
            assert_eq!(ptr.addr(), a.addr());

            checked_release(pool, ptr, 48);
            checked_release(pool, b, 32);
            checked_release(pool, d, 32);
        });
    }

    #[test]
    fn test_conservation_and_accounting_identity() {
        with_test_pool(2048, |pool| unsafe {
            let usable = pool.bytes_free();
            let mut live: Vec<(*mut u8, usize)> = Vec::new();

            let script: &[(bool, usize)] = &[
                (true, 100),
                (true, 32),
                (true, 256),
                (false, 1),
                (true, 64),
                (false, 0),
                (true, 48),
                (false, 2),
                (true, 64),
            ];
            for &(is_alloc, arg) in script {
                if is_alloc {
                    live.push((checked_allocate(pool, arg), arg));
                } else {
                    let (ptr, size) = live.remove(arg);
                    checked_release(pool, ptr, size);
                }

                // Conservation: free bytes plus live block bytes is the
                // usable pool size, and the cumulative counters agree.
                let live_bytes = pool.bytes_allocated_total() - pool.bytes_freed_total();
                assert_eq!(pool.bytes_free() + live_bytes, usable);
            }

            // Splits occurred for every allocation above, so the exact block
            // sizes are known.
            let expected: usize = live.iter().map(|&(_, size)| block_size(size)).sum();
            assert_eq!(
                pool.bytes_allocated_total() - pool.bytes_freed_total(),
                expected
            );

            for (ptr, size) in live {
                checked_release(pool, ptr, size);
            }
        });
    }

    #[test]
    fn test_minimum_ever_free_tracks_low_water() {
        with_test_pool(1024, |pool| unsafe {
            let initial = pool.bytes_free();
            assert_eq!(pool.minimum_ever_free(), initial);

            let big = checked_allocate(pool, 600);
            let low_water = pool.bytes_free();
            assert_eq!(pool.minimum_ever_free(), low_water);

            checked_release(pool, big, 600);
            let small = checked_allocate(pool, 64);

            // Releasing recovers bytes but the low-water mark stays.
            assert_eq!(pool.minimum_ever_free(), low_water);
            checked_release(pool, small, 64);
        });
    }

    #[test]
    fn test_stats_snapshot() {
        with_test_pool(1024, |pool| unsafe {
            let pre = pool.stats();
            assert_eq!(pre.free_block_count, 1);
            assert_eq!(pre.largest_free_block, pre.bytes_free);
            assert_eq!(pre.allocation_count, 0);

            let a = checked_allocate(pool, 64);
            let b = checked_allocate(pool, 64);
            let c = checked_allocate(pool, 64);
            checked_release(pool, b, 64);

            let stats = pool.stats();
            assert_eq!(stats.allocation_count, 3);
            assert_eq!(stats.release_count, 1);
            assert_eq!(stats.free_block_count, 2);
            assert_eq!(stats.smallest_free_block, block_size(64));
            assert_eq!(
                stats.bytes_allocated_total - stats.bytes_freed_total,
                2 * block_size(64)
            );

            checked_release(pool, a, 64);
            checked_release(pool, c, 64);
        });
    }

    #[test]
    fn test_assign_rejects_degenerate_arguments() {
        let mut pool = Pool::new();
        let mut buffer = [0_u8; 256];

        let err = unsafe { pool.assign(ptr::null_mut(), 256) }.unwrap_err();
        assert!(matches!(err, AssignError::NullBuffer { .. }));

        let err = unsafe { pool.assign(buffer.as_mut_ptr(), 0) }.unwrap_err();
        assert!(matches!(err, AssignError::ZeroSize { .. }));

        let err = unsafe { pool.assign(buffer.as_mut_ptr(), HEADER_SIZE) }.unwrap_err();
        assert!(matches!(err, AssignError::RegionTooSmall { .. }));

        let err = unsafe { pool.assign(buffer.as_mut_ptr(), usize::MAX) }.unwrap_err();
        assert!(matches!(err, AssignError::RegionTooLarge { .. }));
    }

    #[test]
    fn test_failed_assign_leaves_pool_untouched() {
        with_test_pool(1024, |pool| unsafe {
            let before = pool.bytes_free();
            let ptr = checked_allocate(pool, 64);

            assert!(pool.assign(ptr::null_mut(), 1024).is_err());

            // The existing pool still works.
            assert_eq!(pool.bytes_free(), before - block_size(64));
            checked_release(pool, ptr, 64);
            assert_eq!(pool.bytes_free(), before);
        });
    }

    #[test]
    fn test_reassign_resets_accounting() {
        unsafe {
            let layout = Layout::from_size_align(1024, ALIGNMENT).unwrap();
            let buffer = std::alloc::alloc(layout);

            let mut pool = Pool::new();
            pool.assign(buffer, 1024).unwrap();
            let usable = pool.bytes_free();
            let _ = pool.allocate(200).unwrap();
            assert!(pool.bytes_allocated_total() > 0);

            pool.assign(buffer, 1024).unwrap();
            assert_eq!(pool.bytes_free(), usable);
            assert_eq!(pool.bytes_allocated_total(), 0);
            assert_eq!(pool.bytes_freed_total(), 0);
            assert_eq!(pool.minimum_ever_free(), usable);

            std::alloc::dealloc(buffer, layout);
        }
    }

    #[test]
    fn test_lazy_accounting_before_first_allocation() {
        with_test_pool(1024, |pool| {
            // Geometry is computed at assignment; the reported free bytes are
            // already net of alignment and sentinel overhead.
            let usable = pool.bytes_free();
            assert!(usable <= 1024 - HEADER_SIZE);
            assert!(usable >= 1024 - 2 * HEADER_SIZE - ALIGNMENT);
            assert_eq!(pool.minimum_ever_free(), usable);
        });
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        with_test_pool(1024, |pool| unsafe {
            let ptr = pool.allocate(64).unwrap();
            pool.release(ptr);
            pool.release(ptr);
        });
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_foreign_pointer_release_panics() {
        with_test_pool(1024, |pool| unsafe {
            // Keep the pool initialized so the extent check is what fires.
            let _ = pool.allocate(16).unwrap();
            let mut outside = [0_u8; 64];
            pool.release(outside.as_mut_ptr().add(HEADER_SIZE));
        });
    }

    #[test]
    #[should_panic(expected = "no live allocations")]
    fn test_release_before_any_allocation_panics() {
        with_test_pool(1024, |pool| unsafe {
            let mut outside = [0_u8; 64];
            pool.release(outside.as_mut_ptr());
        });
    }
}
