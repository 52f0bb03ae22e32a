//! Cross-core notification of scheduling-channel changes.
//!
//! When owner election moves the tick source to another channel, every
//! peer core must re-bind its interrupt. The broadcast is a bounded
//! per-core message queue; peers drain it from their notification
//! handler.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::channel::{CoreId, DmaChannelId};

/// Pending notifications a core can hold before the producer's push
/// fails; one outstanding change is the norm, a few is pathological.
pub const NOTIFY_QUEUE_DEPTH: usize = 4;

/// Payload of a scheduling-channel change broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DomainChange {
    /// The newly elected tick-source channel.
    pub channel: DmaChannelId,
}

/// Broadcast surface the domain publishes changes through.
pub trait DomainNotifier {
    /// Deliver `change` to every core except `from`.
    fn broadcast(&mut self, change: DomainChange, from: CoreId);
}

/// Bounded per-core broadcast queues.
///
/// Pushes and pops run inside a critical section, the same lock that
/// serializes owner election.
pub struct QueueNotifier<const CORES: usize> {
    queues: [Mutex<RefCell<Deque<DomainChange, NOTIFY_QUEUE_DEPTH>>>; CORES],
}

impl<const CORES: usize> QueueNotifier<CORES> {
    /// Empty queues for every core.
    #[must_use]
    pub fn new() -> Self {
        QueueNotifier {
            queues: core::array::from_fn(|_| Mutex::new(RefCell::new(Deque::new()))),
        }
    }

    /// Pop the oldest pending change for `core`.
    #[must_use]
    pub fn poll(&self, core: CoreId) -> Option<DomainChange> {
        let queue = self.queues.get(core as usize)?;
        critical_section::with(|cs| queue.borrow_ref_mut(cs).pop_front())
    }
}

impl<const CORES: usize> Default for QueueNotifier<CORES> {
    fn default() -> Self {
        QueueNotifier::new()
    }
}

impl<const CORES: usize> DomainNotifier for QueueNotifier<CORES> {
    fn broadcast(&mut self, change: DomainChange, from: CoreId) {
        critical_section::with(|cs| {
            for (core, queue) in self.queues.iter().enumerate() {
                if core as CoreId == from {
                    continue;
                }
                let mut q = queue.borrow_ref_mut(cs);
                // Older unprocessed changes are superseded by this one.
                if q.is_full() {
                    let _ = q.pop_front();
                }
                let _ = q.push_back(change);
            }
        });
    }
}
