//! Fragmented configuration-blob transport.
//!
//! Large parameter blobs arrive over IPC in fragments. The handler
//! assembles them into an `incoming` buffer and publishes the complete
//! blob atomically: readers always see either the previous blob or the
//! fully assembled new one, never a torn mixture.
//!
//! In single-blob mode only one allocation exists at a time and
//! reconfiguration of an active module is refused; this is the mode for
//! modules whose blob is too large to double-buffer.

use alloc::vec::Vec;

use crate::state::InstanceState;
use stream::CoreError;

/// Position of a fragment within a multi-fragment transfer.
///
/// `First` and `Last` combine into `Single` for one-fragment blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FragmentPosition {
    /// Neither first nor last.
    Middle,
    /// Opens a transfer of a known total size.
    First,
    /// Closes the transfer; the blob becomes publishable.
    Last,
    /// A complete blob in one fragment.
    Single,
}

impl FragmentPosition {
    /// Build from first/last flags as carried in the IPC request.
    #[must_use]
    pub const fn from_flags(first: bool, last: bool) -> Self {
        match (first, last) {
            (false, false) => FragmentPosition::Middle,
            (true, false) => FragmentPosition::First,
            (false, true) => FragmentPosition::Last,
            (true, true) => FragmentPosition::Single,
        }
    }

    const fn is_first(self) -> bool {
        matches!(self, FragmentPosition::First | FragmentPosition::Single)
    }

    const fn is_last(self) -> bool {
        matches!(self, FragmentPosition::Last | FragmentPosition::Single)
    }
}

/// Assembles fragmented configuration blobs with commit-on-complete
/// semantics.
#[derive(Debug, Default)]
pub struct BlobHandler {
    /// Blob currently visible to readers.
    current: Option<Vec<u8>>,
    /// Blob under assembly; published on the final fragment.
    incoming: Option<Vec<u8>>,
    /// Next write position within `incoming`.
    write_cursor: usize,
    /// A complete `incoming` blob awaits pickup by the next `get`.
    data_ready: bool,
    /// Keep a single allocation; forbid reconfiguring an active owner.
    single_blob: bool,
}

fn alloc_zeroed(size: usize) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| CoreError::OutOfMemory)?;
    buf.resize(size, 0);
    Ok(buf)
}

impl BlobHandler {
    /// Create a handler in multi-blob (double-buffered) mode.
    #[must_use]
    pub fn new() -> Self {
        BlobHandler::default()
    }

    /// Create a handler that keeps a single allocation at a time.
    #[must_use]
    pub fn new_single_blob() -> Self {
        BlobHandler {
            single_blob: true,
            ..BlobHandler::default()
        }
    }

    /// Pre-load an initial blob at module init.
    ///
    /// Frees any previous blobs. A `size` of zero leaves the handler
    /// empty and succeeds. Without `init_data` the blob is zero-filled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfMemory`] on allocation failure and
    /// [`CoreError::InvalidArg`] when `init_data` does not match `size`.
    pub fn init(&mut self, size: usize, init_data: Option<&[u8]>) -> Result<(), CoreError> {
        self.current = None;
        self.incoming = None;
        self.data_ready = false;
        self.write_cursor = 0;

        if size == 0 {
            return Ok(());
        }

        let mut blob = alloc_zeroed(size)?;
        if let Some(data) = init_data {
            if data.len() != size {
                return Err(CoreError::InvalidArg);
            }
            blob.copy_from_slice(data);
        }
        self.current = Some(blob);
        Ok(())
    }

    /// Absorb one fragment of a configuration transfer.
    ///
    /// `owner_state` is the lifecycle state of the owning module:
    /// a final fragment received while the owner is `Ready` replaces
    /// the current blob immediately; otherwise publication is deferred
    /// until the owner's next prepare (or the next [`Self::get`]).
    ///
    /// # Errors
    ///
    /// - [`CoreError::Busy`] — a previous transfer is still open, or
    ///   single-blob mode with an `Active` owner. The handler is left
    ///   unchanged.
    /// - [`CoreError::InvalidArg`] — fragment overflows the announced
    ///   total size.
    /// - [`CoreError::InvalidState`] — `Middle`/`Last` without an open
    ///   transfer.
    /// - [`CoreError::OutOfMemory`] — allocation failure.
    pub fn set(
        &mut self,
        owner_state: InstanceState,
        pos: FragmentPosition,
        total_size: usize,
        fragment: &[u8],
    ) -> Result<(), CoreError> {
        // A work-in-progress transfer refuses a new opening fragment.
        if self.incoming.is_some() && pos.is_first() {
            return Err(CoreError::Busy);
        }

        // On-the-fly updates are forbidden in single-blob mode.
        if self.single_blob && owner_state == InstanceState::Active {
            return Err(CoreError::Busy);
        }

        if pos.is_first() {
            // A zero-size transfer is how the host reads back defaults
            // before any configuration exists; succeed and drop it.
            if total_size == 0 {
                return Ok(());
            }

            if self.single_blob {
                match self.current.take() {
                    Some(cur) if cur.len() == total_size => {
                        // Same size: reuse the allocation in place.
                        self.incoming = Some(cur);
                    }
                    _ => self.incoming = None,
                }
            }

            if self.incoming.is_none() {
                self.incoming = Some(alloc_zeroed(total_size)?);
            }
            self.data_ready = false;
            self.write_cursor = 0;
        }

        let Some(incoming) = self.incoming.as_mut() else {
            return Err(CoreError::InvalidState);
        };

        if self.write_cursor + fragment.len() > incoming.len() {
            return Err(CoreError::InvalidArg);
        }
        incoming[self.write_cursor..self.write_cursor + fragment.len()].copy_from_slice(fragment);
        self.write_cursor += fragment.len();

        if pos.is_last() {
            // A Ready owner has no period in flight; the old blob can
            // go immediately. Otherwise it stays until the owner picks
            // the new one up between periods.
            if owner_state == InstanceState::Ready {
                self.current = None;
            }

            if self.current.is_none() {
                self.current = self.incoming.take();
                self.data_ready = false;
                self.write_cursor = 0;
            } else {
                self.data_ready = true;
            }
        }

        Ok(())
    }

    /// Current blob, promoting a completed incoming blob first.
    #[must_use]
    pub fn get(&mut self) -> Option<&[u8]> {
        if self.is_new_blob_available() {
            self.current = self.incoming.take();
            self.data_ready = false;
            self.write_cursor = 0;
        }
        self.current.as_deref()
    }

    /// Like [`Self::get`], additionally returning the CRC-32 of the blob.
    #[must_use]
    pub fn get_with_crc(&mut self) -> Option<(&[u8], u32)> {
        // Promote first, then hash whatever is visible.
        let blob = self.get()?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(blob);
        let crc = hasher.finalize();
        Some((blob, crc))
    }

    /// Copy a slice of the current blob into `out` for chunked
    /// readback, returning the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArg`] when `offset` is past the end
    /// of the blob or no blob exists.
    pub fn get_fragment(&mut self, offset: usize, out: &mut [u8]) -> Result<usize, CoreError> {
        let Some(blob) = self.get() else {
            return Err(CoreError::InvalidArg);
        };
        if offset > blob.len() {
            return Err(CoreError::InvalidArg);
        }
        let n = out.len().min(blob.len() - offset);
        out[..n].copy_from_slice(&blob[offset..offset + n]);
        Ok(n)
    }

    /// A fully received blob awaits promotion.
    #[must_use]
    pub fn is_new_blob_available(&self) -> bool {
        self.incoming.is_some() && self.data_ready
    }

    /// A blob is visible to readers.
    #[must_use]
    pub fn is_current_blob_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Size of the blob readers currently see.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.current.as_ref().map_or(0, |blob| blob.len())
    }
}
