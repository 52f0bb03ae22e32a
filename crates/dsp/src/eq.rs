//! IIR equalizer: a bank of per-channel biquad cascades over a shared
//! delay-line arena, packaged as a stream-style processing module.
//!
//! # Configuration blob layout (little-endian `i32` words)
//!
//! ```text
//! [0]                 channels_in_config
//! [1]                 number_of_responses
//! [2 .. 2+channels]   assign_response[]: response index per channel,
//!                     -1 = bypass
//! then per response:  [num_sections] followed by
//!                     num_sections * SECTION_WORDS coefficient words
//! ```
//!
//! Setup is two-phase: first resolve every channel's response and sum
//! the delay storage, then allocate one arena and hand each channel a
//! window into it. On any failure the bank keeps its previous state.

use alloc::vec::Vec;

use heapless::Vec as BoundedVec;

use crate::iir::{iir_df2t, IirChannel, DELAY_WORDS_PER_SECTION, SECTION_WORDS};
use crate::wrap::{read_i32_le, write_i32_le};
use pipeline::{
    BaseConfig, BlobHandler, FragmentPosition, InputStreamBuffer, InstanceState, ModuleConfig,
    ModuleOps, OutputStreamBuffer, ProcessingMode,
};
use stream::format::MAX_CHANNELS;
use stream::{CoreError, SampleFormat, Sink, Source};

/// Configuration id of the coefficient blob.
pub const EQ_IIR_CONFIG_ID: u32 = 0;

const HEADER_WORDS: usize = 2;
const RESPONSE_HEADER_WORDS: usize = 1;

/// Per-channel biquad cascades sharing one delay arena.
#[derive(Debug, Default)]
pub struct IirBank {
    /// Configuration words backing the running channels.
    config: Vec<i32>,
    /// Staged configuration; becomes active when setup succeeds.
    pending: Option<Vec<i32>>,
    channels: BoundedVec<IirChannel, MAX_CHANNELS>,
    arena: Vec<i64>,
}

struct ConfigView<'a> {
    words: &'a [i32],
    channels_in_config: usize,
    num_responses: usize,
}

impl<'a> ConfigView<'a> {
    fn parse(words: &'a [i32]) -> Result<Self, CoreError> {
        if words.len() < HEADER_WORDS {
            return Err(CoreError::InvalidArg);
        }
        let channels_in_config = words[0];
        let num_responses = words[1];
        if channels_in_config <= 0
            || channels_in_config as usize > MAX_CHANNELS
            || num_responses < 0
        {
            return Err(CoreError::InvalidArg);
        }
        let view = ConfigView {
            words,
            channels_in_config: channels_in_config as usize,
            num_responses: num_responses as usize,
        };
        if words.len() < HEADER_WORDS + view.channels_in_config {
            return Err(CoreError::InvalidArg);
        }
        Ok(view)
    }

    fn assign_response(&self, channel: usize) -> i32 {
        self.words[HEADER_WORDS + channel]
    }

    /// Word offsets where each response's header starts.
    fn response_offsets(
        &self,
    ) -> Result<BoundedVec<usize, MAX_CHANNELS>, CoreError> {
        let mut offsets = BoundedVec::new();
        let mut off = HEADER_WORDS + self.channels_in_config;
        for _ in 0..self.num_responses {
            if off + RESPONSE_HEADER_WORDS > self.words.len() {
                return Err(CoreError::InvalidArg);
            }
            let sections = self.words[off];
            if sections < 0 {
                return Err(CoreError::InvalidArg);
            }
            let span = RESPONSE_HEADER_WORDS + sections as usize * SECTION_WORDS;
            if off + span > self.words.len() {
                return Err(CoreError::InvalidArg);
            }
            offsets.push(off).map_err(|_| CoreError::InvalidArg)?;
            off += span;
        }
        Ok(offsets)
    }
}

impl IirBank {
    /// Empty bank; every channel bypasses until configured.
    #[must_use]
    pub fn new() -> Self {
        IirBank::default()
    }

    /// Stage a new configuration. The running channel state is not
    /// touched until [`Self::setup`] succeeds against it.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for a malformed blob,
    /// [`CoreError::OutOfMemory`] on allocation failure.
    pub fn set_config(&mut self, words: &[i32]) -> Result<(), CoreError> {
        ConfigView::parse(words)?;
        let mut copy = Vec::new();
        copy.try_reserve_exact(words.len())
            .map_err(|_| CoreError::OutOfMemory)?;
        copy.extend_from_slice(words);
        self.pending = Some(copy);
        Ok(())
    }

    /// Build the per-channel cascades for `nch` channels from the
    /// staged configuration (or the active one when nothing is
    /// staged).
    ///
    /// Phase one resolves responses and sums delay storage; phase two
    /// allocates a single arena and assigns each channel its window.
    /// Mute flags survive re-setup. On error the staged configuration
    /// is discarded and the previous running state is kept in full.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for out-of-range channel counts or
    /// response indices, [`CoreError::InvalidState`] with no
    /// configuration, [`CoreError::OutOfMemory`] when the delay arena
    /// cannot be allocated.
    pub fn setup(&mut self, nch: usize) -> Result<(), CoreError> {
        let ret = self.setup_inner(nch);
        if ret.is_ok() {
            if let Some(pending) = self.pending.take() {
                self.config = pending;
            }
        } else {
            // Reject the staged blob; the running state stands.
            self.pending = None;
        }
        ret
    }

    fn setup_inner(&mut self, nch: usize) -> Result<(), CoreError> {
        let words = self.pending.as_ref().unwrap_or(&self.config);
        if words.is_empty() {
            return Err(CoreError::InvalidState);
        }
        if nch == 0 || nch > MAX_CHANNELS {
            return Err(CoreError::InvalidArg);
        }

        let view = ConfigView::parse(words)?;
        if nch > view.channels_in_config {
            return Err(CoreError::InvalidArg);
        }
        let offsets = view.response_offsets()?;

        // Phase 1: resolve responses, validate, count delay words.
        let mut new_channels: BoundedVec<IirChannel, MAX_CHANNELS> = BoundedVec::new();
        let mut delay_words = 0usize;
        for ch in 0..nch {
            let resp = view.assign_response(ch);
            if resp < 0 {
                let _ = new_channels.push(IirChannel::bypass());
                continue;
            }
            let resp = resp as usize;
            if resp >= view.num_responses {
                return Err(CoreError::InvalidArg);
            }
            let off = offsets[resp];
            let sections = words[off] as usize;
            let coef_start = off + RESPONSE_HEADER_WORDS;
            let _ = new_channels.push(IirChannel {
                sections,
                coef: coef_start..coef_start + sections * SECTION_WORDS,
                delay: 0..0, // assigned in phase 2
                mute: false,
            });
            delay_words += sections * DELAY_WORDS_PER_SECTION;
        }

        // Phase 2: one arena for all channels, windows handed out by an
        // advancing offset.
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(delay_words)
            .map_err(|_| CoreError::OutOfMemory)?;
        arena.resize(delay_words, 0i64);

        let mut next = 0usize;
        for chan in new_channels.iter_mut() {
            let words = chan.sections * DELAY_WORDS_PER_SECTION;
            chan.delay = next..next + words;
            next += words;
        }

        // Success: swap in the new state, carrying mute flags over.
        for (new, old) in new_channels.iter_mut().zip(self.channels.iter()) {
            new.mute = old.mute;
        }
        self.channels = new_channels;
        self.arena = arena;
        Ok(())
    }

    /// Reassign `channel` to `response` (-1 = bypass) and rebuild.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when the channel or response index is
    /// out of range; setup errors propagate with the bank unchanged.
    pub fn switch_response(&mut self, channel: usize, response: i32) -> Result<(), CoreError> {
        if self.config.is_empty() {
            return Err(CoreError::InvalidState);
        }
        // A staged configuration is about to replace the assignment
        // table wholesale; refuse runtime edits until it lands.
        if self.pending.is_some() {
            return Err(CoreError::Busy);
        }
        let view = ConfigView::parse(&self.config)?;
        if channel >= view.channels_in_config {
            return Err(CoreError::InvalidArg);
        }
        if response >= view.num_responses as i32 || response < -1 {
            return Err(CoreError::InvalidArg);
        }
        let nch = self.channels.len().max(1);
        let previous = self.config[HEADER_WORDS + channel];
        self.config[HEADER_WORDS + channel] = response;
        let ret = self.setup(nch);
        if ret.is_err() {
            self.config[HEADER_WORDS + channel] = previous;
        }
        ret
    }

    /// Force `channel`'s output to zero. Takes effect on the next
    /// sample.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an out-of-range channel.
    pub fn mute(&mut self, channel: usize) -> Result<(), CoreError> {
        let chan = self
            .channels
            .get_mut(channel)
            .ok_or(CoreError::InvalidArg)?;
        chan.mute = true;
        Ok(())
    }

    /// Restore `channel`'s output.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an out-of-range channel.
    pub fn unmute(&mut self, channel: usize) -> Result<(), CoreError> {
        let chan = self
            .channels
            .get_mut(channel)
            .ok_or(CoreError::InvalidArg)?;
        chan.mute = false;
        Ok(())
    }

    /// Channels currently set up.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Zero every delay line, keeping coefficients and assignment.
    pub fn reset_state(&mut self) {
        self.arena.fill(0);
    }

    /// Drop configuration and runtime state.
    pub fn clear(&mut self) {
        self.config = Vec::new();
        self.pending = None;
        self.channels.clear();
        self.arena = Vec::new();
    }

    /// Run one sample of `channel` through its cascade.
    ///
    /// # Panics
    ///
    /// Panics when `channel` is not a set-up channel; the processing
    /// path only passes indices below [`Self::channel_count`].
    pub fn run_channel(&mut self, channel: usize, x: i32) -> i32 {
        let chan = &self.channels[channel];
        let coef = &self.config[chan.coef.clone()];
        let delay = &mut self.arena[chan.delay.clone()];
        let y = iir_df2t(coef, delay, x);
        if chan.mute {
            0
        } else {
            y
        }
    }
}

/// The equalizer processing module: S32LE only, stream contract.
#[derive(Debug, Default)]
pub struct EqIir {
    bank: IirBank,
    blob: BlobHandler,
    channels: usize,
}

impl EqIir {
    /// New, unconfigured equalizer.
    #[must_use]
    pub fn new() -> Self {
        EqIir::default()
    }

    /// Direct access to the filter bank for runtime controls
    /// (mute/unmute, response switching).
    pub fn bank_mut(&mut self) -> &mut IirBank {
        &mut self.bank
    }

    fn blob_to_words(blob: &[u8]) -> Result<Vec<i32>, CoreError> {
        if blob.len() % 4 != 0 {
            return Err(CoreError::InvalidArg);
        }
        let mut words = Vec::new();
        words
            .try_reserve_exact(blob.len() / 4)
            .map_err(|_| CoreError::OutOfMemory)?;
        for chunk in blob.chunks_exact(4) {
            words.push(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(words)
    }
}

impl ModuleOps for EqIir {
    fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::Stream
    }

    fn init(&mut self, cfg: &ModuleConfig<'_>) -> Result<(), CoreError> {
        if !cfg.init_blob.is_empty() {
            self.blob.init(cfg.init_blob.len(), Some(cfg.init_blob))?;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        base: &BaseConfig,
        _sources: &mut [&mut dyn Source],
        _sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError> {
        if base.frame.sample != SampleFormat::S32Le {
            return Err(CoreError::NotSupported);
        }

        // Prepare without a received response configuration is an
        // error that interrupts pipeline prepare downstream.
        let Some(blob) = self.blob.get() else {
            return Err(CoreError::InvalidArg);
        };
        let words = Self::blob_to_words(blob)?;
        self.bank.set_config(&words)?;
        self.bank.setup(base.frame.channels as usize)?;
        self.channels = base.frame.channels as usize;
        Ok(())
    }

    fn process_stream(
        &mut self,
        inputs: &mut [InputStreamBuffer<'_>],
        outputs: &mut [OutputStreamBuffer<'_>],
    ) -> Result<(), CoreError> {
        let input = &mut inputs[0];
        let output = &mut outputs[0];

        let nch = self.channels;
        let frame_bytes = nch * 4;
        if frame_bytes == 0 {
            return Err(CoreError::InvalidState);
        }
        let frames = (input.size / frame_bytes).min(output.free / frame_bytes);

        // Per channel: walk interleaved samples with a stride of one
        // frame, wrapping both circular buffers independently.
        for ch in 0..nch {
            let mut x_idx = input.pos + ch * 4;
            let mut y_idx = output.pos + ch * 4;
            for _ in 0..frames {
                let x = read_i32_le(input.buf, x_idx);
                let y = self.bank.run_channel(ch, x);
                write_i32_le(output.buf, y_idx, y);
                x_idx = crate::wrap::wrap_idx(x_idx + frame_bytes, input.buf.len());
                y_idx = crate::wrap::wrap_idx(y_idx + frame_bytes, output.buf.len());
            }
        }

        input.consumed = frames * frame_bytes;
        output.size = frames * frame_bytes;
        Ok(())
    }

    fn set_configuration(
        &mut self,
        config_id: u32,
        pos: FragmentPosition,
        total_size: usize,
        fragment: &[u8],
        owner_state: InstanceState,
    ) -> Result<(), CoreError> {
        if config_id != EQ_IIR_CONFIG_ID {
            return Err(CoreError::InvalidArg);
        }
        self.blob.set(owner_state, pos, total_size, fragment)
    }

    fn get_configuration(
        &mut self,
        config_id: u32,
        offset: usize,
        fragment: &mut [u8],
    ) -> Result<usize, CoreError> {
        if config_id != EQ_IIR_CONFIG_ID {
            return Err(CoreError::InvalidArg);
        }
        self.blob.get_fragment(offset, fragment)
    }

    fn reset(&mut self) -> Result<(), CoreError> {
        // Runtime state goes; the coefficient blob survives reset.
        self.bank.reset_state();
        Ok(())
    }

    fn free(&mut self) {
        self.bank.clear();
        let _ = self.blob.init(0, None);
        self.channels = 0;
    }
}
