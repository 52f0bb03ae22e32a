//! Configuration-blob ABI versioning.
//!
//! Every blob leads with `{ abi_version, type, size }`. Receivers
//! enforce strict equality on the ABI major number; a lower minor or
//! patch from the sender is tolerated by zero-padding the missing
//! trailing fields.

use stream::CoreError;

const MAJOR_SHIFT: u32 = 24;
const MINOR_SHIFT: u32 = 12;
const MINOR_MASK: u32 = 0xFFF;
const PATCH_MASK: u32 = 0xFFF;

/// Packed ABI version: 8-bit major, 12-bit minor, 12-bit patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct AbiVersion(u32);

impl AbiVersion {
    /// Pack a version triple.
    #[must_use]
    pub const fn new(major: u8, minor: u16, patch: u16) -> Self {
        AbiVersion(
            ((major as u32) << MAJOR_SHIFT)
                | (((minor as u32) & MINOR_MASK) << MINOR_SHIFT)
                | ((patch as u32) & PATCH_MASK),
        )
    }

    /// From the raw packed word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        AbiVersion(raw)
    }

    /// Raw packed word.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Major component.
    #[must_use]
    pub const fn major(self) -> u8 {
        (self.0 >> MAJOR_SHIFT) as u8
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(self) -> u16 {
        ((self.0 >> MINOR_SHIFT) & MINOR_MASK) as u16
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(self) -> u16 {
        (self.0 & PATCH_MASK) as u16
    }

    /// `true` when a blob carrying `sender` may be accepted by a
    /// receiver at `self`: equal major, sender not newer.
    #[must_use]
    pub const fn accepts(self, sender: AbiVersion) -> bool {
        self.major() == sender.major() && sender.0 <= self.0
    }
}

/// Leading header of every configuration blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlobHeader {
    /// Packed ABI version of the sender.
    pub abi: AbiVersion,
    /// Blob type discriminator.
    pub blob_type: u32,
    /// Payload size in bytes, header excluded.
    pub size: u32,
}

/// Encoded size of a blob header.
pub const BLOB_HEADER_BYTES: usize = 12;

impl BlobHeader {
    /// Encode little-endian.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BLOB_HEADER_BYTES] {
        let mut out = [0u8; BLOB_HEADER_BYTES];
        out[0..4].copy_from_slice(&self.abi.raw().to_le_bytes());
        out[4..8].copy_from_slice(&self.blob_type.to_le_bytes());
        out[8..12].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Parse from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when fewer than
    /// [`BLOB_HEADER_BYTES`] are given.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < BLOB_HEADER_BYTES {
            return Err(CoreError::InvalidArg);
        }
        Ok(BlobHeader {
            abi: AbiVersion::from_raw(u32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            blob_type: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }

    /// Check an incoming blob against the receiver's ABI and expected
    /// payload size, returning how many trailing bytes the receiver
    /// must zero-fill.
    ///
    /// A same-major sender with an older minor/patch may legitimately
    /// send a shorter payload; the missing tail reads as zero.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotSupported`] on an ABI major mismatch or a
    /// sender newer than the receiver; [`CoreError::InvalidArg`] when
    /// the payload is larger than expected.
    pub fn check(&self, receiver: AbiVersion, expected_size: u32) -> Result<usize, CoreError> {
        if !receiver.accepts(self.abi) {
            return Err(CoreError::NotSupported);
        }
        if self.size > expected_size {
            return Err(CoreError::InvalidArg);
        }
        Ok((expected_size - self.size) as usize)
    }
}
