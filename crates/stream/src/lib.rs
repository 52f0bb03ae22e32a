//! PCM transport layer: ring-buffer byte transport between exactly one
//! producer and one consumer, with sink/source capability views and
//! cache-coherence hooks for buffers shared across DSP cores.
//!
//! # Architecture
//!
//! ```text
//! upstream module --(Sink view)--> [ RingBuffer ] --(Source view)--> downstream module
//! ```
//!
//! A module never touches a buffer implementation directly; it talks to
//! the [`Sink`] and [`Source`] traits. The ring buffer is the only
//! implementation today, but the capability split keeps room for DMA
//! descriptor rings and host-shared windows later.
//!
//! Offsets are plain integers mapped to storage through a pure
//! offset-to-index function, which keeps every access bounds-checkable.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cache;
pub mod error;
pub mod format;
pub mod ring_buffer;
pub mod sink;
pub mod source;

pub use cache::{CacheOps, NullCache};
pub use error::CoreError;
pub use format::{ChannelMap, FrameFormat, Justify, SampleFormat};
pub use ring_buffer::RingBuffer;
pub use sink::{RegionMut, Sink};
pub use source::{DataRegion, Source};
