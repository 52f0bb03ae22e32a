//! Producer-side capability view of an audio buffer.

use crate::error::CoreError;
use crate::format::FrameFormat;

/// A writable region of a circular backing store.
///
/// `pos` is the index of the first writable byte within `buf`; a
/// producer fills circularly, wrapping at `buf.len()`.
#[derive(Debug)]
pub struct RegionMut<'a> {
    /// Entire backing store of the buffer.
    pub buf: &'a mut [u8],
    /// Index of the first writable byte within `buf`.
    pub pos: usize,
}

impl RegionMut<'_> {
    /// Copy `data` into the region, honouring wrap-around.
    pub fn write_wrapped(&mut self, data: &[u8]) {
        let size = self.buf.len();
        let mut idx = self.pos;
        for &byte in data {
            self.buf[idx] = byte;
            idx += 1;
            if idx == size {
                idx = 0;
            }
        }
    }
}

/// Capability view an upstream module uses to produce audio data.
///
/// Exactly one producer holds the sink side of any buffer.
pub trait Sink {
    /// Minimum free bytes the producer needs per processing period (OBS).
    fn min_free_space(&self) -> usize;

    /// Bytes currently free for writing.
    fn free(&self) -> usize;

    /// Total size of the backing store in bytes.
    fn capacity(&self) -> usize;

    /// Borrow a writable region holding at least `req` free bytes.
    ///
    /// No cache maintenance is needed on acquisition; the region is
    /// write-only until committed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoData`] when fewer than `req` bytes are
    /// free. The buffer is unchanged on error.
    fn get_buffer(&mut self, req: usize) -> Result<RegionMut<'_>, CoreError>;

    /// Publish `n` written bytes to the consumer.
    ///
    /// Shared buffers write back the covered cache lines before the
    /// write offset advances, so the consumer core never observes a
    /// stale line.
    fn commit(&mut self, n: usize);

    /// Disconnect notification. Runs on the core that last wrote;
    /// invalidates the whole backing region to discard stale lines.
    fn on_unbind(&mut self);

    /// Negotiated stream format, when one has been set.
    fn format(&self) -> Option<FrameFormat>;
}
