//! Pool assignment failures.
//!
//! Assignment is the only recoverable-error surface of the allocator:
//! out-of-memory is signaled by `None` from the allocation operations, and
//! protocol violations (double free, foreign pointer) are fatal assertions.

use snafu::{Location, Snafu};

/// Errors reported when a buffer cannot be adopted as the pool.
///
/// A failed assignment leaves whatever pool state existed before the call
/// untouched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AssignError {
    /// The buffer pointer was null.
    #[snafu(display("pool buffer pointer is null"))]
    NullBuffer {
        #[snafu(implicit)]
        location: Location,
    },
    /// The buffer size was zero.
    #[snafu(display("pool size is zero"))]
    ZeroSize {
        #[snafu(implicit)]
        location: Location,
    },
    /// After alignment the buffer cannot hold the end sentinel plus one
    /// minimum-size block, so no allocation could ever succeed.
    #[snafu(display("pool of {size} bytes is too small to hold any allocation"))]
    RegionTooSmall {
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The buffer is larger than the tagged size field can represent.
    #[snafu(display("pool of {size} bytes exceeds the maximum representable block size"))]
    RegionTooLarge {
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
}
