//! Error taxonomy shared by every subsystem of the processing core.
//!
//! Local errors propagate up the call chain unchanged; the IPC layer
//! converts them to negative errno values for the host-visible reply.

/// Errors produced by the transport, module, DSP and scheduler layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreError {
    /// Malformed input, out-of-range index, or mismatched size.
    #[error("invalid argument")]
    InvalidArg,
    /// Operation issued in a state where its precondition is false
    /// (e.g. process before prepare).
    #[error("invalid state for operation")]
    InvalidState,
    /// The allocator could not satisfy the request.
    #[error("out of memory")]
    OutOfMemory,
    /// A concurrent configuration transfer is in progress, or a
    /// runtime-only configuration was attempted on an active module.
    #[error("busy")]
    Busy,
    /// The ring buffer holds insufficient data or free room.
    #[error("no data")]
    NoData,
    /// The processing period cannot be satisfied by the attached
    /// buffers. Offsets are left untouched so the next tick can retry.
    #[error("xrun")]
    XRun,
    /// Prepare was called before a required peer was bound.
    #[error("not connected")]
    NotConnected,
    /// Frame format, sample width or channel count is unsupported.
    #[error("not supported")]
    NotSupported,
}
