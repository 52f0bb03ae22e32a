//! PCM frame-format descriptors and channel maps.
//!
//! Samples are interleaved. Mandatory container widths are 16 and
//! 32 bit; 24-bit audio travels in a 32-bit container, left- or
//! right-justified. Channel maps pack one 4-bit slot index per channel
//! into a `u32`, with `0xF` marking an absent channel.

use crate::error::CoreError;

/// Highest channel count any module in the core supports.
pub const MAX_CHANNELS: usize = 8;

/// Justification of 24 valid bits inside a 32-bit container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Justify {
    /// Valid bits occupy the most significant end (sample << 8).
    Left,
    /// Valid bits occupy the least significant end.
    Right,
}

/// On-wire PCM sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// 16-bit signed little-endian.
    S16Le,
    /// 24 valid bits in a 32-bit little-endian container.
    S24In32Le(Justify),
    /// 32-bit signed little-endian.
    S32Le,
}

impl SampleFormat {
    /// Bytes one sample occupies in the stream.
    #[must_use]
    pub const fn container_bytes(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S24In32Le(_) | SampleFormat::S32Le => 4,
        }
    }

    /// Number of meaningful bits in the container.
    #[must_use]
    pub const fn valid_bits(self) -> u32 {
        match self {
            SampleFormat::S16Le => 16,
            SampleFormat::S24In32Le(_) => 24,
            SampleFormat::S32Le => 32,
        }
    }
}

/// Slot value marking an absent channel in a [`ChannelMap`].
pub const CHANNEL_ABSENT: u8 = 0xF;

/// Packed channel map: 4 bits per channel, lowest nibble = channel 0.
///
/// A nibble holds the hardware slot index the channel is routed to, or
/// [`CHANNEL_ABSENT`] when the channel does not exist in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ChannelMap(u32);

impl ChannelMap {
    /// Map with every channel absent.
    pub const EMPTY: ChannelMap = ChannelMap(0xFFFF_FFFF);

    /// Build a map from raw packed nibbles.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        ChannelMap(raw)
    }

    /// Identity map for the first `channels` slots (0, 1, 2, ...).
    ///
    /// Channels beyond `channels` are marked absent. Counts above
    /// [`MAX_CHANNELS`] are clamped.
    #[must_use]
    pub fn identity(channels: usize) -> Self {
        let mut raw = 0xFFFF_FFFFu32;
        let n = channels.min(MAX_CHANNELS);
        for ch in 0..n {
            let shift = (ch * 4) as u32;
            raw &= !(0xF << shift);
            raw |= (ch as u32) << shift;
        }
        ChannelMap(raw)
    }

    /// Raw packed value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Slot index assigned to `channel`, or `None` when absent.
    #[must_use]
    pub fn slot(self, channel: usize) -> Option<u8> {
        if channel >= MAX_CHANNELS {
            return None;
        }
        let nibble = ((self.0 >> (channel * 4)) & 0xF) as u8;
        (nibble != CHANNEL_ABSENT).then_some(nibble)
    }

    /// `true` when `channel` is present in the stream.
    #[must_use]
    pub fn is_present(self, channel: usize) -> bool {
        self.slot(channel).is_some()
    }

    /// Number of present channels.
    #[must_use]
    pub fn count(self) -> usize {
        (0..MAX_CHANNELS).filter(|&ch| self.is_present(ch)).count()
    }
}

/// Complete stream format: rate, channel count and sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat {
    /// Sample rate in Hz.
    pub rate_hz: u32,
    /// Interleaved channel count.
    pub channels: u32,
    /// Per-sample container layout.
    pub sample: SampleFormat,
}

impl FrameFormat {
    /// Validate and build a frame format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSupported`] for a zero channel count or
    /// more than [`MAX_CHANNELS`] channels, and for a zero sample rate.
    pub fn new(rate_hz: u32, channels: u32, sample: SampleFormat) -> Result<Self, CoreError> {
        if rate_hz == 0 || channels == 0 || channels as usize > MAX_CHANNELS {
            return Err(CoreError::NotSupported);
        }
        Ok(FrameFormat {
            rate_hz,
            channels,
            sample,
        })
    }

    /// Bytes per interleaved frame: container bytes times channels.
    #[must_use]
    pub const fn frame_bytes(&self) -> usize {
        self.sample.container_bytes() * self.channels as usize
    }
}
