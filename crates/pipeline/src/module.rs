//! The processing contract every audio module implements.
//!
//! A module picks one of two processing styles at init time. The
//! source/sink style receives capability objects and drives them
//! directly; the stream style (the older contract) receives staged
//! input/output views and reports per-buffer consumed/produced counts,
//! with the adapter doing the buffer arbitration.

use crate::adapter::{InputStreamBuffer, OutputStreamBuffer};
use crate::blob::FragmentPosition;
use crate::state::InstanceState;
use stream::{CoreError, FrameFormat, Sink, Source};

/// Most sources or sinks a single module can attach.
pub const MAX_PINS: usize = 8;

/// Processing-contract style, chosen at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProcessingMode {
    /// Module queries sink/source capability objects itself.
    SourceSink,
    /// Module receives staged stream views and reports counts.
    Stream,
}

/// Which scheduler drives the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Domain {
    /// Runs inline on the DMA tick; must always be ready to process.
    LowLatency,
    /// Runs on its own thread, synchronized through ring buffers.
    DataProcessing,
}

/// Static per-instance stream parameters carried in the init blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaseConfig {
    /// Input block size: bytes consumed per invocation.
    pub ibs: u32,
    /// Output block size: bytes produced per invocation.
    pub obs: u32,
    /// PCM frames processed per period.
    pub frames_per_period: u32,
    /// Periods of headroom each sink buffer must hold.
    pub periods_sink: u32,
    /// Negotiated stream format.
    pub frame: FrameFormat,
}

impl BaseConfig {
    /// Bytes in one processing period.
    #[must_use]
    pub fn period_bytes(&self) -> usize {
        self.frames_per_period as usize * self.frame.frame_bytes()
    }
}

/// Init-time configuration: base parameters plus a module-private blob.
#[derive(Debug)]
pub struct ModuleConfig<'a> {
    /// Stream parameters common to all modules.
    pub base: BaseConfig,
    /// Module-specific payload, opaque to the adapter.
    pub init_blob: &'a [u8],
}

/// Operations a processing module provides to the adapter.
///
/// All operations return the shared error taxonomy; fatal errors in
/// `init`/`prepare` must leave the module in its prior state with any
/// partial allocations undone.
pub trait ModuleOps {
    /// Which processing contract this module uses.
    fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::SourceSink
    }

    /// Allocate private state from the init configuration.
    fn init(&mut self, cfg: &ModuleConfig<'_>) -> Result<(), CoreError>;

    /// Build DSP tables and choose the specialized processing path for
    /// the negotiated format.
    fn prepare(
        &mut self,
        base: &BaseConfig,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError>;

    /// Process one period, source/sink style.
    ///
    /// The module consumes at most `min(available)` across its sources
    /// and produces at most `min(free)` across its sinks, releasing and
    /// committing exactly what it used.
    fn process(
        &mut self,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError> {
        let _ = (sources, sinks);
        Err(CoreError::NotSupported)
    }

    /// Process one period, stream style: consume from staged inputs,
    /// fill staged outputs, and report counts through the views.
    fn process_stream(
        &mut self,
        inputs: &mut [InputStreamBuffer<'_>],
        outputs: &mut [OutputStreamBuffer<'_>],
    ) -> Result<(), CoreError> {
        let _ = (inputs, outputs);
        Err(CoreError::NotSupported)
    }

    /// Whether a data-processing instance has enough data and space for
    /// one invocation. The default applies the IBS/OBS watermarks.
    fn is_ready_to_process(
        &mut self,
        sources: &[&mut dyn Source],
        sinks: &[&mut dyn Sink],
    ) -> bool {
        for src in sources {
            if src.available() < src.min_available() {
                return false;
            }
        }
        for snk in sinks {
            if snk.free() < snk.min_free_space() {
                return false;
            }
        }
        true
    }

    /// Absorb a configuration-blob fragment.
    ///
    /// Effective at the next prepare, or immediately when the owner is
    /// `Ready`.
    fn set_configuration(
        &mut self,
        config_id: u32,
        pos: FragmentPosition,
        total_size: usize,
        fragment: &[u8],
        owner_state: InstanceState,
    ) -> Result<(), CoreError> {
        let _ = (config_id, pos, total_size, fragment, owner_state);
        Err(CoreError::InvalidArg)
    }

    /// Copy a slice of the current configuration blob into `fragment`,
    /// returning the number of bytes written.
    fn get_configuration(
        &mut self,
        config_id: u32,
        offset: usize,
        fragment: &mut [u8],
    ) -> Result<usize, CoreError> {
        let _ = (config_id, offset, fragment);
        Err(CoreError::InvalidArg)
    }

    /// Drop runtime state, keeping the configuration blob.
    fn reset(&mut self) -> Result<(), CoreError>;

    /// Release every private resource.
    fn free(&mut self);
}
