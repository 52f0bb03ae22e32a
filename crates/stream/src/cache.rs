//! Data-cache maintenance hooks for cross-core shared buffers.
//!
//! A buffer whose producer and consumer live on different cores must
//! write back dirty lines after a commit and invalidate stale lines
//! before a read. On single-core topologies both operations are no-ops.
//!
//! Ranges are expressed as byte offsets into the backing store, never
//! as raw pointers, so implementations stay bounds-checkable.

use core::ops::Range;

/// Data-cache line size the transport aligns backing stores to.
pub const CACHE_LINE: usize = 64;

/// Round `n` up to the next multiple of [`CACHE_LINE`].
#[must_use]
pub const fn align_up(n: usize) -> usize {
    (n + CACHE_LINE - 1) & !(CACHE_LINE - 1)
}

/// Cache maintenance operations over a buffer's backing store.
pub trait CacheOps {
    /// Write dirty lines covering `range` back to memory.
    fn writeback(&mut self, range: Range<usize>);

    /// Drop (invalidate) cached lines covering `range`.
    fn invalidate(&mut self, range: Range<usize>);
}

/// No-op cache operations for non-shared buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheOps for NullCache {
    fn writeback(&mut self, _range: Range<usize>) {}

    fn invalidate(&mut self, _range: Range<usize>) {}
}
