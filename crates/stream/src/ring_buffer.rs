//! Lock-free single-producer/single-consumer byte ring with doubled
//! offsets and optional cross-core cache maintenance.
//!
//! # Doubled index space
//!
//! Both offsets live in `[0, 2 * size)`. Empty is "offsets equal", full
//! is "offsets differ by `size`", so no separate element count is
//! needed to tell the two apart. Mapping an offset to a storage index
//! is a single conditional subtraction.
//!
//! # Sizing
//!
//! The store holds `3 * max(min_available, min_free_space)` bytes,
//! rounded up to a cache line. Data-processing modules on a second core
//! run after the low-latency pass of their period; with a smaller
//! buffer a 44.1 kHz-style cadence (42 frames for nine periods, 63 on
//! the tenth) starves the consumer. Three periods of headroom absorb
//! the worst-case phase offset.

use alloc::vec::Vec;

use crate::cache::{align_up, CacheOps};
use crate::error::CoreError;
use crate::format::FrameFormat;
use crate::sink::{RegionMut, Sink};
use crate::source::{DataRegion, Source};

/// SPSC byte transport between one upstream and one downstream module.
///
/// Implements both [`Sink`] (producer view) and [`Source`] (consumer
/// view). Created at bind time, reset on pipeline reset, dropped on
/// unbind.
pub struct RingBuffer<C: CacheOps> {
    data: Vec<u8>,
    size: usize,
    /// Producer offset in doubled space `[0, 2 * size)`.
    write_off: usize,
    /// Consumer offset in doubled space `[0, 2 * size)`.
    read_off: usize,
    min_available: usize,
    min_free_space: usize,
    /// Producer and consumer live on different cores.
    shared: bool,
    cache: C,
    format: Option<FrameFormat>,
}

impl<C: CacheOps> RingBuffer<C> {
    /// Allocate a ring buffer sized for the given watermarks.
    ///
    /// `min_available` is the consumer's block size (IBS) and
    /// `min_free_space` the producer's (OBS). `shared` enables cache
    /// maintenance through `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfMemory`] when the backing store cannot
    /// be allocated, and [`CoreError::InvalidArg`] when both watermarks
    /// are zero.
    pub fn new(
        min_available: usize,
        min_free_space: usize,
        shared: bool,
        cache: C,
    ) -> Result<Self, CoreError> {
        let max_ibs_obs = min_available.max(min_free_space);
        if max_ibs_obs == 0 {
            return Err(CoreError::InvalidArg);
        }

        let size = align_up(3 * max_ibs_obs);
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| CoreError::OutOfMemory)?;
        data.resize(size, 0);

        Ok(RingBuffer {
            data,
            size,
            write_off: 0,
            read_off: 0,
            min_available,
            min_free_space,
            shared,
            cache,
            format: None,
        })
    }

    /// Backing store size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// `true` when producer and consumer run on different cores.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Record the negotiated stream format.
    pub fn set_format(&mut self, format: FrameFormat) {
        self.format = Some(format);
    }

    /// Drop both offsets to zero and zero the backing store.
    ///
    /// Shared buffers invalidate first (discarding lines another core
    /// may have left behind) and force a writeback of the zeroed
    /// contents afterwards.
    pub fn reset(&mut self) {
        self.write_off = 0;
        self.read_off = 0;

        if self.shared {
            self.cache.invalidate(0..self.size);
        }
        self.data.fill(0);
        if self.shared {
            self.cache.writeback(0..self.size);
        }
    }

    /// Map a doubled-space offset to a storage index.
    fn index_of(&self, offset: usize) -> usize {
        // Quicker form of offset % size: the offset never exceeds
        // 2 * size, so one conditional subtraction suffices.
        if offset >= self.size {
            offset - self.size
        } else {
            offset
        }
    }

    /// Advance an offset by `inc` within the doubled space.
    fn inc_offset(&self, offset: usize, inc: usize) -> usize {
        debug_assert!(inc <= self.size);
        let next = offset + inc;
        if next >= 2 * self.size {
            next - 2 * self.size
        } else {
            next
        }
    }

    fn available_bytes(&self) -> usize {
        // (write - read) mod 2*size, evaluated without going negative.
        if self.write_off >= self.read_off {
            self.write_off - self.read_off
        } else {
            2 * self.size - (self.read_off - self.write_off)
        }
    }

    /// Write back `len` bytes starting at storage index `idx`,
    /// splitting the operation in two when it crosses the store end.
    fn writeback_shared(&mut self, idx: usize, len: usize) {
        if !self.shared || len == 0 {
            return;
        }
        if idx + len > self.size {
            let head = self.size - idx;
            self.cache.writeback(idx..self.size);
            self.cache.writeback(0..len - head);
        } else {
            self.cache.writeback(idx..idx + len);
        }
    }

    /// Invalidate `len` bytes starting at storage index `idx`, split at
    /// the store end like [`Self::writeback_shared`].
    fn invalidate_shared(&mut self, idx: usize, len: usize) {
        if !self.shared || len == 0 {
            return;
        }
        if idx + len > self.size {
            let head = self.size - idx;
            self.cache.invalidate(idx..self.size);
            self.cache.invalidate(0..len - head);
        } else {
            self.cache.invalidate(idx..idx + len);
        }
    }
}

impl<C: CacheOps> Sink for RingBuffer<C> {
    fn min_free_space(&self) -> usize {
        self.min_free_space
    }

    fn free(&self) -> usize {
        self.size - self.available_bytes()
    }

    fn capacity(&self) -> usize {
        self.size
    }

    fn get_buffer(&mut self, req: usize) -> Result<RegionMut<'_>, CoreError> {
        if req > self.free() {
            return Err(CoreError::NoData);
        }
        let pos = self.index_of(self.write_off);
        // Write-only region: no cache maintenance on acquisition.
        Ok(RegionMut {
            buf: &mut self.data,
            pos,
        })
    }

    fn commit(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let idx = self.index_of(self.write_off);
        self.writeback_shared(idx, n);
        self.write_off = self.inc_offset(self.write_off, n);
    }

    fn on_unbind(&mut self) {
        // Guaranteed to run on the core that last wrote; discard every
        // cached line so a future owner starts clean.
        self.invalidate_shared(0, self.size);
    }

    fn format(&self) -> Option<FrameFormat> {
        self.format
    }
}

impl<C: CacheOps> Source for RingBuffer<C> {
    fn min_available(&self) -> usize {
        self.min_available
    }

    fn available(&self) -> usize {
        self.available_bytes()
    }

    fn get_data(&mut self, req: usize) -> Result<DataRegion<'_>, CoreError> {
        if req > self.available_bytes() {
            return Err(CoreError::NoData);
        }
        let pos = self.index_of(self.read_off);
        self.invalidate_shared(pos, req);
        Ok(DataRegion {
            buf: &self.data,
            pos,
        })
    }

    fn release(&mut self, n: usize) {
        // Consumed data frees buffer space; no cache maintenance needed.
        self.read_off = self.inc_offset(self.read_off, n);
    }

    fn format(&self) -> Option<FrameFormat> {
        self.format
    }
}
