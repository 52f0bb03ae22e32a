//! Channel up/down mixer.
//!
//! Picks a specialized mix routine at init time from the (input
//! config, output config, sample depth) triple. Output samples always
//! travel in 32-bit containers; 16-bit inputs are shift-copied up.
//! Downmix weights are Q2.30; custom coefficient tables are copied and
//! validated before they are made active.

use crate::wrap::{read_i16_le, read_i32_le, write_i32_le};
use dasp::sample::Sample;
use pipeline::{
    BaseConfig, InputStreamBuffer, ModuleConfig, ModuleOps, OutputStreamBuffer, ProcessingMode,
};
use stream::format::MAX_CHANNELS;
use stream::{ChannelMap, CoreError, SampleFormat, Sink, Source};

/// Q2.30 unity downmix weight.
const WEIGHT_UNITY: i32 = 1 << 30;

/// Downmix weights per source channel, Q2.30.
pub type DownmixCoefficients = [i32; MAX_CHANNELS];

/// Equal half-gain weights: safe for two active channels.
pub const LO_RO_DOWNMIX: DownmixCoefficients = [WEIGHT_UNITY / 2; MAX_CHANNELS];

/// Quarter-gain weights for three- and four-channel sources.
pub const HALF_SCALED_LO_RO_DOWNMIX: DownmixCoefficients = [WEIGHT_UNITY / 4; MAX_CHANNELS];

/// Eighth-gain weights for five channels and up.
pub const SCALED_LO_RO_DOWNMIX: DownmixCoefficients = [WEIGHT_UNITY / 8; MAX_CHANNELS];

/// Channel layouts the mixer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelConfig {
    /// 1 channel.
    Mono,
    /// 2 channels, L/R.
    Stereo,
    /// 2 independent mono channels.
    DualMono,
    /// 3 channels, L/R/LFE.
    TwoPointOne,
    /// 3 channels, L/C/R.
    ThreePointZero,
    /// 4 channels, L/C/R/LFE.
    ThreePointOne,
    /// 4 channels, L/R/Ls/Rs.
    Quatro,
    /// 4 channels, L/C/R/Cs.
    FourPointZero,
    /// 5 channels.
    FivePointZero,
    /// 6 channels.
    FivePointOne,
    /// 8 channels.
    SevenPointOne,
}

impl ChannelConfig {
    /// Interleaved channel count of the layout.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            ChannelConfig::Mono => 1,
            ChannelConfig::Stereo | ChannelConfig::DualMono => 2,
            ChannelConfig::TwoPointOne | ChannelConfig::ThreePointZero => 3,
            ChannelConfig::ThreePointOne
            | ChannelConfig::Quatro
            | ChannelConfig::FourPointZero => 4,
            ChannelConfig::FivePointZero => 5,
            ChannelConfig::FivePointOne => 6,
            ChannelConfig::SevenPointOne => 8,
        }
    }

    /// Identity channel map for the layout.
    #[must_use]
    pub fn create_channel_map(self) -> ChannelMap {
        ChannelMap::identity(self.channels())
    }
}

/// Input sample depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Depth {
    /// 16-bit containers.
    Bits16,
    /// 32-bit containers.
    Bits32,
}

impl Depth {
    const fn container_bytes(self) -> usize {
        match self {
            Depth::Bits16 => 2,
            Depth::Bits32 => 4,
        }
    }

    fn from_sample_format(fmt: SampleFormat) -> Self {
        match fmt {
            SampleFormat::S16Le => Depth::Bits16,
            SampleFormat::S24In32Le(_) | SampleFormat::S32Le => Depth::Bits32,
        }
    }
}

/// Specialized mix routine selected at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixRoutine {
    /// Mono in, duplicated to stereo, 16-bit shifted into 32-bit.
    ShiftCopy16MonoToStereo,
    /// Stereo in, stereo out, 16-bit shifted into 32-bit.
    ShiftCopy16Stereo,
    /// Mono in, duplicated to stereo, 32-bit copy.
    ShiftCopy32MonoToStereo,
    /// Stereo in, stereo out, 32-bit copy.
    ShiftCopy32Stereo,
    /// Stereo 16-bit in, mono 32-bit out, equal weights.
    Downmix16StereoToMono,
    /// Stereo 32-bit in, mono 32-bit out, equal weights.
    Downmix32StereoToMono,
    /// N-channel 32-bit in, weighted stereo out.
    DownmixCoef32ToStereo,
    /// Mono 32-bit in, 5.1 out (front pair and center carry the
    /// signal, LFE and surrounds silent).
    Upmix32MonoToFiveOne,
    /// Stereo 32-bit in, 5.1 out (fronts carry L/R, center their
    /// half-sum, LFE and surrounds silent).
    Upmix32StereoToFiveOne,
}

fn select_mix_out_stereo(depth: Depth, in_cfg: ChannelConfig) -> Result<MixRoutine, CoreError> {
    use ChannelConfig::*;
    match (depth, in_cfg) {
        (Depth::Bits16, Mono) => Ok(MixRoutine::ShiftCopy16MonoToStereo),
        (Depth::Bits16, Stereo | DualMono) => Ok(MixRoutine::ShiftCopy16Stereo),
        (Depth::Bits32, Mono) => Ok(MixRoutine::ShiftCopy32MonoToStereo),
        (Depth::Bits32, Stereo | DualMono) => Ok(MixRoutine::ShiftCopy32Stereo),
        (Depth::Bits32, _) => Ok(MixRoutine::DownmixCoef32ToStereo),
        // 16-bit multichannel sources are not carried by this firmware.
        (Depth::Bits16, _) => Err(CoreError::NotSupported),
    }
}

fn select_mix_out_mono(depth: Depth, in_cfg: ChannelConfig) -> Result<MixRoutine, CoreError> {
    match (depth, in_cfg) {
        (Depth::Bits16, ChannelConfig::Stereo | ChannelConfig::DualMono) => {
            Ok(MixRoutine::Downmix16StereoToMono)
        }
        (Depth::Bits32, ChannelConfig::Stereo | ChannelConfig::DualMono) => {
            Ok(MixRoutine::Downmix32StereoToMono)
        }
        _ => Err(CoreError::NotSupported),
    }
}

fn select_mix_out_5_1(depth: Depth, in_cfg: ChannelConfig) -> Result<MixRoutine, CoreError> {
    match (depth, in_cfg) {
        (Depth::Bits32, ChannelConfig::Mono) => Ok(MixRoutine::Upmix32MonoToFiveOne),
        (Depth::Bits32, ChannelConfig::Stereo) => Ok(MixRoutine::Upmix32StereoToFiveOne),
        _ => Err(CoreError::NotSupported),
    }
}

/// Default downmix weight table for a source layout.
fn default_coefficients(in_cfg: ChannelConfig) -> &'static DownmixCoefficients {
    use ChannelConfig::*;
    match in_cfg {
        Mono | Stereo | DualMono | TwoPointOne => &LO_RO_DOWNMIX,
        ThreePointZero | ThreePointOne | Quatro | FourPointZero => &HALF_SCALED_LO_RO_DOWNMIX,
        FivePointZero | FivePointOne | SevenPointOne => &SCALED_LO_RO_DOWNMIX,
    }
}

/// The up/down mixer processing module (stream contract).
#[derive(Debug)]
pub struct UpDownMixer {
    out_cfg: ChannelConfig,
    custom_coefficients: Option<DownmixCoefficients>,
    routine: Option<MixRoutine>,
    coefficients: DownmixCoefficients,
    in_cfg: ChannelConfig,
    depth: Depth,
    out_map: ChannelMap,
}

impl UpDownMixer {
    /// Create a mixer targeting `out_cfg`.
    ///
    /// `custom_coefficients`, when given, replaces the default downmix
    /// weight table. The slice is copied and length-checked here,
    /// before anything points at it.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when the custom table does not hold
    /// exactly [`MAX_CHANNELS`] weights.
    pub fn new(
        out_cfg: ChannelConfig,
        custom_coefficients: Option<&[i32]>,
    ) -> Result<Self, CoreError> {
        let custom = match custom_coefficients {
            Some(table) => {
                // Copy first, validate the copy, and only then let the
                // mixer's coefficient selection point at it.
                let mut owned: DownmixCoefficients = [0; MAX_CHANNELS];
                if table.len() != MAX_CHANNELS {
                    return Err(CoreError::InvalidArg);
                }
                owned.copy_from_slice(table);
                Some(owned)
            }
            None => None,
        };

        Ok(UpDownMixer {
            out_cfg,
            custom_coefficients: custom,
            routine: None,
            coefficients: LO_RO_DOWNMIX,
            in_cfg: ChannelConfig::Stereo,
            depth: Depth::Bits32,
            out_map: out_cfg.create_channel_map(),
        })
    }

    /// Selected routine, once init has run.
    #[must_use]
    pub fn routine(&self) -> Option<MixRoutine> {
        self.routine
    }

    /// Output channel map.
    #[must_use]
    pub fn out_channel_map(&self) -> ChannelMap {
        self.out_map
    }

    /// Active downmix weights.
    #[must_use]
    pub fn coefficients(&self) -> &DownmixCoefficients {
        &self.coefficients
    }

    fn out_channels(&self) -> usize {
        self.out_cfg.channels()
    }

    fn set_downmix_coefficients(&mut self) {
        self.coefficients = match &self.custom_coefficients {
            Some(owned) => *owned,
            None => *default_coefficients(self.in_cfg),
        };
    }
}

impl ModuleOps for UpDownMixer {
    fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::Stream
    }

    fn init(&mut self, cfg: &ModuleConfig<'_>) -> Result<(), CoreError> {
        let in_cfg = match cfg.base.frame.channels {
            1 => ChannelConfig::Mono,
            2 => ChannelConfig::Stereo,
            3 => ChannelConfig::TwoPointOne,
            4 => ChannelConfig::Quatro,
            5 => ChannelConfig::FivePointZero,
            6 => ChannelConfig::FivePointOne,
            8 => ChannelConfig::SevenPointOne,
            _ => return Err(CoreError::NotSupported),
        };
        let depth = Depth::from_sample_format(cfg.base.frame.sample);

        let routine = match self.out_cfg {
            ChannelConfig::Mono => select_mix_out_mono(depth, in_cfg)?,
            ChannelConfig::Stereo => select_mix_out_stereo(depth, in_cfg)?,
            ChannelConfig::FivePointOne => select_mix_out_5_1(depth, in_cfg)?,
            _ => return Err(CoreError::NotSupported),
        };

        self.in_cfg = in_cfg;
        self.depth = depth;
        self.routine = Some(routine);
        self.set_downmix_coefficients();
        Ok(())
    }

    fn prepare(
        &mut self,
        _base: &BaseConfig,
        _sources: &mut [&mut dyn Source],
        _sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError> {
        if self.routine.is_none() {
            return Err(CoreError::InvalidState);
        }
        Ok(())
    }

    fn process_stream(
        &mut self,
        inputs: &mut [InputStreamBuffer<'_>],
        outputs: &mut [OutputStreamBuffer<'_>],
    ) -> Result<(), CoreError> {
        let routine = self.routine.ok_or(CoreError::InvalidState)?;
        let input = &mut inputs[0];
        let output = &mut outputs[0];

        let in_ch = self.in_cfg.channels();
        let out_ch = self.out_channels();
        let in_frame = in_ch * self.depth.container_bytes();
        let out_frame = out_ch * 4; // output always in 32-bit containers
        let frames = (input.size / in_frame).min(output.free / out_frame);

        let mut x = input.pos;
        let mut y = output.pos;
        for _ in 0..frames {
            mix_one_frame(routine, &self.coefficients, input.buf, x, output.buf, y, in_ch);
            x = crate::wrap::wrap_idx(x + in_frame, input.buf.len());
            y = crate::wrap::wrap_idx(y + out_frame, output.buf.len());
        }

        // The mixer always flushes its whole staged input.
        input.consumed = frames * in_frame;
        output.size = frames * out_frame;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn free(&mut self) {
        self.routine = None;
    }
}

/// Weighted Q2.30 accumulation of `n` interleaved source channels.
fn weighted_sum(
    coef: &DownmixCoefficients,
    buf: &[u8],
    pos: usize,
    channels: usize,
    pick: impl Fn(usize) -> bool,
) -> i32 {
    let mut acc: i64 = 0;
    for ch in 0..channels {
        if pick(ch) {
            let x = read_i32_le(buf, pos + ch * 4);
            acc += i64::from(coef[ch]) * i64::from(x);
        }
    }
    ((acc + (1i64 << 29)) >> 30) as i32
}

fn mix_one_frame(
    routine: MixRoutine,
    coef: &DownmixCoefficients,
    inb: &[u8],
    x: usize,
    outb: &mut [u8],
    y: usize,
    in_ch: usize,
) {
    match routine {
        MixRoutine::ShiftCopy16MonoToStereo => {
            let s: i32 = read_i16_le(inb, x).to_sample();
            write_i32_le(outb, y, s);
            write_i32_le(outb, y + 4, s);
        }
        MixRoutine::ShiftCopy16Stereo => {
            let l: i32 = read_i16_le(inb, x).to_sample();
            let r: i32 = read_i16_le(inb, x + 2).to_sample();
            write_i32_le(outb, y, l);
            write_i32_le(outb, y + 4, r);
        }
        MixRoutine::ShiftCopy32MonoToStereo => {
            let s = read_i32_le(inb, x);
            write_i32_le(outb, y, s);
            write_i32_le(outb, y + 4, s);
        }
        MixRoutine::ShiftCopy32Stereo => {
            write_i32_le(outb, y, read_i32_le(inb, x));
            write_i32_le(outb, y + 4, read_i32_le(inb, x + 4));
        }
        MixRoutine::Downmix16StereoToMono => {
            let l: i32 = read_i16_le(inb, x).to_sample();
            let r: i32 = read_i16_le(inb, x + 2).to_sample();
            write_i32_le(outb, y, ((i64::from(l) + i64::from(r)) / 2) as i32);
        }
        MixRoutine::Downmix32StereoToMono => {
            let l = read_i32_le(inb, x);
            let r = read_i32_le(inb, x + 4);
            write_i32_le(outb, y, ((i64::from(l) + i64::from(r)) / 2) as i32);
        }
        MixRoutine::DownmixCoef32ToStereo => {
            // Even source channels feed left, odd feed right.
            let l = weighted_sum(coef, inb, x, in_ch, |ch| ch % 2 == 0);
            let r = weighted_sum(coef, inb, x, in_ch, |ch| ch % 2 == 1);
            write_i32_le(outb, y, l);
            write_i32_le(outb, y + 4, r);
        }
        MixRoutine::Upmix32MonoToFiveOne => {
            let s = read_i32_le(inb, x);
            // FL FR C LFE RL RR
            write_i32_le(outb, y, s);
            write_i32_le(outb, y + 4, s);
            write_i32_le(outb, y + 8, s);
            write_i32_le(outb, y + 12, 0);
            write_i32_le(outb, y + 16, 0);
            write_i32_le(outb, y + 20, 0);
        }
        MixRoutine::Upmix32StereoToFiveOne => {
            let l = read_i32_le(inb, x);
            let r = read_i32_le(inb, x + 4);
            write_i32_le(outb, y, l);
            write_i32_le(outb, y + 4, r);
            write_i32_le(outb, y + 8, ((i64::from(l) + i64::from(r)) / 2) as i32);
            write_i32_le(outb, y + 12, 0);
            write_i32_le(outb, y + 16, 0);
            write_i32_le(outb, y + 20, 0);
        }
    }
}
