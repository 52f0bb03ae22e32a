//! IPC command header and reply framing.
//!
//! Little-endian, 8-byte fixed header `{ u32 size; u32 cmd }`. The
//! `cmd` word packs `0xGCCCNNNN`: a 4-bit global type, a 12-bit
//! command type, and a 16-bit monotonically increasing id. Replies
//! carry the same header followed by an `i32` error, negative errno on
//! failure.

use stream::CoreError;

/// Encoded size of a command header.
pub const COMMAND_HEADER_BYTES: usize = 8;

/// Encoded size of a reply frame.
pub const REPLY_BYTES: usize = 12;

/// Map a core error onto the negative errno the reply carries.
#[must_use]
pub const fn errno(err: CoreError) -> i32 {
    match err {
        CoreError::InvalidArg => -22,    // EINVAL
        CoreError::InvalidState => -1,   // EPERM
        CoreError::OutOfMemory => -12,   // ENOMEM
        CoreError::Busy => -16,          // EBUSY
        CoreError::NoData => -61,        // ENODATA
        CoreError::XRun => -5,           // EIO
        CoreError::NotConnected => -107, // ENOTCONN
        CoreError::NotSupported => -95,  // EOPNOTSUPP
    }
}

/// Fixed 8-byte header prefixed to every IPC command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandHeader {
    /// Total message size in bytes, header included.
    pub size: u32,
    /// Packed command word `0xGCCCNNNN`.
    pub cmd: u32,
}

impl CommandHeader {
    /// Pack a command word from its fields.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when `global_type` exceeds 4 bits or
    /// `command_type` exceeds 12 bits.
    pub fn new(
        size: u32,
        global_type: u8,
        command_type: u16,
        ident: u16,
    ) -> Result<Self, CoreError> {
        if global_type > 0xF || command_type > 0xFFF {
            return Err(CoreError::InvalidArg);
        }
        let cmd = (u32::from(global_type) << 28)
            | (u32::from(command_type) << 16)
            | u32::from(ident);
        Ok(CommandHeader { size, cmd })
    }

    /// 4-bit global type (`G`).
    #[must_use]
    pub const fn global_type(&self) -> u8 {
        (self.cmd >> 28) as u8
    }

    /// 12-bit command type (`CCC`).
    #[must_use]
    pub const fn command_type(&self) -> u16 {
        ((self.cmd >> 16) & 0xFFF) as u16
    }

    /// 16-bit monotonically increasing id (`NNNN`).
    #[must_use]
    pub const fn ident(&self) -> u16 {
        (self.cmd & 0xFFFF) as u16
    }

    /// Encode little-endian.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; COMMAND_HEADER_BYTES] {
        let mut out = [0u8; COMMAND_HEADER_BYTES];
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..8].copy_from_slice(&self.cmd.to_le_bytes());
        out
    }

    /// Parse from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when fewer than
    /// [`COMMAND_HEADER_BYTES`] are given or the embedded size is
    /// smaller than the header itself.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < COMMAND_HEADER_BYTES {
            return Err(CoreError::InvalidArg);
        }
        let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let cmd = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if (size as usize) < COMMAND_HEADER_BYTES {
            return Err(CoreError::InvalidArg);
        }
        Ok(CommandHeader { size, cmd })
    }
}

/// Reply frame: the echoed header plus the result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reply {
    /// Header echoed from the command this replies to.
    pub header: CommandHeader,
    /// 0 on success, negative errno on failure.
    pub error: i32,
}

impl Reply {
    /// Successful reply to `cmd`.
    #[must_use]
    pub fn success(cmd: &CommandHeader) -> Self {
        Reply {
            header: CommandHeader {
                size: REPLY_BYTES as u32,
                cmd: cmd.cmd,
            },
            error: 0,
        }
    }

    /// Failure reply to `cmd` carrying `err` as negative errno.
    #[must_use]
    pub fn failure(cmd: &CommandHeader, err: CoreError) -> Self {
        Reply {
            header: CommandHeader {
                size: REPLY_BYTES as u32,
                cmd: cmd.cmd,
            },
            error: errno(err),
        }
    }

    /// Encode little-endian.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; REPLY_BYTES] {
        let mut out = [0u8; REPLY_BYTES];
        out[0..8].copy_from_slice(&self.header.to_bytes());
        out[8..12].copy_from_slice(&self.error.to_le_bytes());
        out
    }

    /// Parse from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when fewer than [`REPLY_BYTES`] are
    /// given.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < REPLY_BYTES {
            return Err(CoreError::InvalidArg);
        }
        let header = CommandHeader::parse(bytes)?;
        let error = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        Ok(Reply { header, error })
    }
}
