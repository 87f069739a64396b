//! Lock-guarded facade over the pool.
//!
//! [`Heap`] wraps a [`Pool`] in a spin mutex and holds the lock for the
//! entire duration of every public operation, making it safe to call from
//! multiple threads or interrupt contexts. On a single-threaded embedder the
//! lock never contends and the code path stays identical.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr,
};

use spin::mutex::SpinMutex;

use crate::{
    block::ALIGNMENT,
    error::AssignError,
    pool::{HeapStats, Pool},
};

/// A fixed-pool heap safe for concurrent use.
///
/// Every operation acquires the internal lock for its whole duration and
/// releases it before returning; no operation blocks on anything but the
/// lock itself. `new` is `const`, so a heap can live in a `static` and back
/// the global allocator:
///
/// ```rust,ignore
/// #[global_allocator]
/// static HEAP: Heap = Heap::new();
///
/// // During startup, before the first allocation:
/// unsafe { HEAP.assign(POOL.as_mut_ptr(), POOL.len()) }.unwrap();
/// ```
///
/// # Examples
///
/// ```
/// use heap::Heap;
///
/// let mut buffer = [0_u8; 4096];
/// let heap = Heap::new();
/// unsafe { heap.assign(buffer.as_mut_ptr(), buffer.len()) }.unwrap();
///
/// let ptr = heap.allocate(128).expect("pool has room");
/// unsafe { heap.release(ptr) };
/// ```
pub struct Heap {
    pool: SpinMutex<Pool>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Creates a heap with no pool assigned.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pool: SpinMutex::new(Pool::new()),
        }
    }

    /// Adopts `buffer` as the pool. See [`Pool::assign`].
    ///
    /// # Errors
    ///
    /// Propagates [`AssignError`] from the pool; the previous pool state is
    /// left untouched on failure.
    ///
    /// # Safety
    ///
    /// Same contract as [`Pool::assign`].
    pub unsafe fn assign(&self, buffer: *mut u8, size: usize) -> Result<(), AssignError> {
        unsafe { self.pool.lock().assign(buffer, size) }
    }

    /// Allocates `size` usable bytes. See [`Pool::allocate`].
    pub fn allocate(&self, size: usize) -> Option<*mut u8> {
        self.pool.lock().allocate(size)
    }

    /// Allocates room for `count` elements of `size` bytes each and zeroes
    /// the usable region.
    ///
    /// Returns `None` when the element count and size multiply past
    /// `usize::MAX`, when the product is zero, or on out-of-memory.
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> Option<*mut u8> {
        let total = count.checked_mul(size)?;
        let ptr = self.pool.lock().allocate(total)?;
        // The block is exclusively the caller's once the lock is dropped;
        // zeroing outside the critical section keeps it short.
        unsafe {
            ptr.write_bytes(0, total);
        }
        Some(ptr)
    }

    /// Returns a block to the pool. See [`Pool::release`].
    ///
    /// # Panics
    ///
    /// Double free and foreign pointers are fatal; see [`Pool::release`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Pool::release`].
    pub unsafe fn release(&self, ptr: *mut u8) {
        unsafe { self.pool.lock().release(ptr) }
    }

    /// Bytes currently free, headers of free blocks included.
    #[must_use]
    pub fn bytes_free(&self) -> usize {
        self.pool.lock().bytes_free()
    }

    /// The lowest value [`bytes_free`](Self::bytes_free) has ever reached.
    #[must_use]
    pub fn minimum_ever_free(&self) -> usize {
        self.pool.lock().minimum_ever_free()
    }

    /// Cumulative bytes handed out since assignment, in whole blocks.
    #[must_use]
    pub fn bytes_allocated_total(&self) -> usize {
        self.pool.lock().bytes_allocated_total()
    }

    /// Cumulative bytes returned since assignment, in whole blocks.
    #[must_use]
    pub fn bytes_freed_total(&self) -> usize {
        self.pool.lock().bytes_freed_total()
    }

    /// Takes a consistent snapshot of the accounting state under the lock.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.pool.lock().stats()
    }
}

/// Lets an assigned [`Heap`] back the Rust `alloc` runtime.
///
/// The pool hands out [`ALIGNMENT`]-aligned blocks, so layouts with stricter
/// alignment are refused with a null pointer.
unsafe impl GlobalAlloc for Heap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        self.allocate(layout.size()).unwrap_or_default()
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { self.release(ptr) }
    }
}
