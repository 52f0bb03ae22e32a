//! Low-latency scheduler DMA domain.
//!
//! The LL scheduler runs one pipeline pass per DMA completion. This
//! crate decides which DMA channel clocks that pass and on which core:
//! channels register in a [`channel::DmaChannelTable`], the
//! [`domain::DmaDomain`] elects the running scheduling-source channel
//! with the smallest period, and [`notifier`] carries the change
//! broadcast peers use to re-bind their interrupts.
//!
//! Hardware access goes through the [`domain::InterruptController`]
//! trait, so the election logic runs unchanged on host tests.

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod domain;
pub mod notifier;

pub use channel::{CoreId, DmaChannelDesc, DmaChannelId, DmaChannelTable, IrqId};
pub use domain::{DmaDomain, InterruptController};
pub use notifier::{DomainChange, DomainNotifier, QueueNotifier, NOTIFY_QUEUE_DEPTH};
