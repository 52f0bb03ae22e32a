//! Consumer-side capability view of an audio buffer.

use crate::error::CoreError;
use crate::format::FrameFormat;

/// A readable region of a circular backing store.
///
/// `buf` is the whole backing store and `pos` the index of the first
/// readable byte; a consumer traverses circularly, wrapping at
/// `buf.len()`. The requested byte count is guaranteed present.
#[derive(Debug)]
pub struct DataRegion<'a> {
    /// Entire backing store of the buffer.
    pub buf: &'a [u8],
    /// Index of the first readable byte within `buf`.
    pub pos: usize,
}

impl DataRegion<'_> {
    /// Copy `out.len()` bytes from the region, honouring wrap-around.
    pub fn read_wrapped(&self, out: &mut [u8]) {
        let size = self.buf.len();
        let mut idx = self.pos;
        for slot in out.iter_mut() {
            *slot = self.buf[idx];
            idx += 1;
            if idx == size {
                idx = 0;
            }
        }
    }
}

/// Capability view a downstream module uses to consume audio data.
///
/// Exactly one consumer holds the source side of any buffer.
pub trait Source {
    /// Minimum bytes the consumer needs per processing period (IBS).
    fn min_available(&self) -> usize;

    /// Bytes currently available to read.
    fn available(&self) -> usize;

    /// Borrow a readable region holding at least `req` bytes.
    ///
    /// Shared buffers invalidate the covered cache lines first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoData`] when fewer than `req` bytes are
    /// available. The buffer is unchanged on error.
    fn get_data(&mut self, req: usize) -> Result<DataRegion<'_>, CoreError>;

    /// Mark `n` bytes as consumed, freeing them for the producer.
    fn release(&mut self, n: usize);

    /// Negotiated stream format, when one has been set.
    fn format(&self) -> Option<FrameFormat>;
}
