//! Fixed-pool heap allocator for systems with no OS-backed heap.
//!
//! This crate manages variable-sized allocations inside a single
//! caller-supplied buffer (a static array, a reserved RAM region). It keeps
//! an intrusive free list ordered by ascending block address, allocates
//! first-fit with in-place block splitting, and coalesces neighbors on
//! release. Each block's ownership state is encoded in-band in the highest
//! bit of its size field.
//!
//! # Available Types
//!
//! ## [`Heap`]
//!
//! The lock-guarded allocator: every operation holds a spin mutex for its
//! entire duration, so a `Heap` can be shared across threads and interrupt
//! contexts or installed as the global allocator. This is the type most
//! embedders want.
//!
//! ## [`Pool`]
//!
//! The unsynchronized core. `Send` but not `Sync`; use it directly only when
//! the embedding system already serializes access.
//!
//! # Memory Layout
//!
//! ```text
//! Block layout (free or allocated):
//! ┌───────────────────────────────────┬───────────────────────┐
//! │ BlockHeader                       │ Usable space          │
//! │ ┌──────────────┬────────────────┐ │                       │
//! │ │ next: offset │ size: tagged   │ │                       │
//! │ └──────────────┴────────────────┘ │                       │
//! └───────────────────────────────────┴───────────────────────┘
//! ```
//!
//! `size` counts the whole block including the header; its top bit is the
//! allocated flag. Free blocks chain through `next` (a byte offset into the
//! pool, never a stored pointer) in strictly ascending address order,
//! terminated by an end sentinel written at the top of the pool.
//!
//! # Usage
//!
//! ```
//! use heap::Heap;
//!
//! let mut buffer = [0_u8; 4096];
//! let heap = Heap::new();
//! unsafe { heap.assign(buffer.as_mut_ptr(), buffer.len()) }.unwrap();
//!
//! let ptr = heap.allocate(256).expect("pool has room");
//! // ... use the memory ...
//! unsafe { heap.release(ptr) };
//!
//! assert_eq!(heap.bytes_free(), heap.stats().bytes_free);
//! ```
//!
//! # Design Considerations
//!
//! - **First fit, address order**: allocation takes the first (lowest) free
//!   block that fits. A fragmented pool can refuse a request even when the
//!   aggregate free bytes would suffice; callers observe this as an
//!   out-of-memory `None`.
//! - **Failure taxonomy**: out-of-memory is a recoverable `None`; a bad pool
//!   assignment is a recoverable [`AssignError`]; double free, foreign
//!   pointers, and header corruption are fatal assertions, because a broken
//!   free list cannot be locally repaired and continuing risks handing
//!   overlapping blocks to unrelated callers.
//! - **No hidden state**: the allocator is a value. Assigning a new buffer
//!   invalidates all allocations from the previous one.
//! - **Alignment**: [`ALIGNMENT`] is one machine word — 4 bytes with an
//!   8-byte header on 32-bit targets, 8 bytes with a 16-byte header on
//!   64-bit targets. Every returned pointer is aligned to it.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod block;
mod error;
mod heap;
mod pool;

pub use self::{
    block::{ALIGNMENT, HEADER_SIZE, MINIMUM_BLOCK_SIZE},
    error::AssignError,
    heap::Heap,
    pool::{HeapStats, Pool},
};
