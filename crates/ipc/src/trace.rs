//! Trace-entry wire format.
//!
//! Firmware log calls emit a packed entry into a ring the host drains;
//! the format string itself stays on the host side, addressed by a
//! dictionary-entry pointer into a `.static_log.<level>` section. An
//! entry carries at most four `u32` parameters.

use heapless::Vec;

use stream::CoreError;

/// Most parameters one trace entry can carry.
pub const MAX_TRACE_PARAMS: usize = 4;

/// Encoded size of a full entry: fixed header plus four parameters.
pub const TRACE_ENTRY_MAX_BYTES: usize = 24 + MAX_TRACE_PARAMS * 4;

/// Severity of a trace entry; also selects the dictionary section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TraceLevel {
    /// Unrecoverable or data-corrupting condition.
    Critical = 1,
    /// Operation failed; the pipeline keeps running.
    Error = 2,
    /// Unusual but tolerated condition.
    Warning = 3,
    /// Lifecycle and configuration landmarks.
    Info = 4,
    /// Per-period diagnostics.
    Verbose = 5,
}

/// One packed log entry as it crosses to the host.
///
/// Layout (little-endian):
///
/// ```text
/// u8  core_id     u8  level      u16 component_class
/// u8  has_ids     u8  param_count  u16 (reserved)
/// u64 timestamp
/// u32 dict_entry
/// u32 id0         u32 id1          (only when has_ids != 0)
/// u32 params[param_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Core the entry was emitted on.
    pub core_id: u8,
    /// Severity.
    pub level: TraceLevel,
    /// Component class of the emitter.
    pub component_class: u16,
    /// Optional component/pipeline ids.
    pub ids: Option<(u32, u32)>,
    /// Emission timestamp, platform ticks.
    pub timestamp: u64,
    /// Address of the dictionary entry describing the format string.
    pub dict_entry: u32,
    /// Up to four format parameters.
    pub params: Vec<u32, MAX_TRACE_PARAMS>,
}

impl TraceEntry {
    /// Encode into `out`.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfMemory`] when `out` lacks capacity for the
    /// encoded entry.
    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), CoreError> {
        let mut push = |bytes: &[u8]| -> Result<(), CoreError> {
            out.extend_from_slice(bytes).map_err(|_| CoreError::OutOfMemory)
        };

        push(&[self.core_id, self.level as u8])?;
        push(&self.component_class.to_le_bytes())?;
        push(&[
            u8::from(self.ids.is_some()),
            self.params.len() as u8,
            0,
            0,
        ])?;
        push(&self.timestamp.to_le_bytes())?;
        push(&self.dict_entry.to_le_bytes())?;
        if let Some((id0, id1)) = self.ids {
            push(&id0.to_le_bytes())?;
            push(&id1.to_le_bytes())?;
        }
        for param in &self.params {
            push(&param.to_le_bytes())?;
        }
        Ok(())
    }
}

/// Host-side dictionary entry, one per log call site, emitted into a
/// `.static_log.<level>` section at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictEntry {
    /// Severity the call site logs at.
    pub level: TraceLevel,
    /// Component class of the call site.
    pub component_class: u16,
    /// Number of parameters the format string takes.
    pub params_num: u8,
    /// Line number of the call site.
    pub line_idx: u32,
    /// Source file of the call site.
    pub file_name: &'static str,
    /// The format string itself.
    pub text: &'static str,
}
