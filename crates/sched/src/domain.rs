//! Single-channel DMA scheduling domain with owner-core election.
//!
//! One DMA completion interrupt per period wakes the low-latency
//! scheduler, on exactly one core: the core hosting the running
//! scheduling-source channel with the smallest transfer period. Every
//! core registers for that channel's interrupt, but only the owner
//! keeps it unmasked; peers hold it masked and re-bind when a
//! `DomainChange` broadcast tells them the tick source moved.
//!
//! Election and the owner hand-over run inside a critical section, the
//! per-core IRQ-lock of the concurrency model.

use crate::channel::{CoreId, DmaChannelDesc, DmaChannelId, DmaChannelTable, IrqId};
use crate::notifier::{DomainChange, DomainNotifier};
use stream::CoreError;

/// Interrupt-controller operations the domain drives.
///
/// `mask`/`unmask` gate delivery of a (possibly shared) interrupt line
/// to one core; `enable`/`disable` gate the line itself.
pub trait InterruptController {
    /// Attach the domain's handler to `irq`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; a failed registration aborts the
    /// domain-side bookkeeping.
    fn register(&mut self, irq: IrqId) -> Result<(), CoreError>;

    /// Detach the domain's handler from `irq`.
    fn unregister(&mut self, irq: IrqId);

    /// Enable the interrupt line.
    fn enable(&mut self, irq: IrqId);

    /// Disable the interrupt line.
    fn disable(&mut self, irq: IrqId);

    /// Stop delivering `irq` to `core`.
    fn mask(&mut self, irq: IrqId, core: CoreId);

    /// Deliver `irq` to `core`.
    fn unmask(&mut self, irq: IrqId, core: CoreId);

    /// Clear a pending `irq`.
    fn clear(&mut self, irq: IrqId);
}

/// Per-core registration state.
#[derive(Debug, Default, Clone, Copy)]
struct CoreSlot {
    /// Channel this core's handler is bound to.
    channel: Option<DmaChannelId>,
    irq: Option<IrqId>,
    /// Core has subscribed to domain-change notifications.
    subscribed: bool,
}

/// The LL scheduler's DMA tick domain for one cluster of cores.
#[derive(Debug)]
pub struct DmaDomain<const CORES: usize, const CHANNELS: usize> {
    table: DmaChannelTable<CHANNELS>,
    per_core: [CoreSlot; CORES],
    /// Core hosting the elected channel; `None` when no
    /// scheduling-source channel runs.
    owner: Option<CoreId>,
    /// Set when a re-registration moved the tick source; the next
    /// tick resynchronizes instead of extrapolating.
    channel_changed: bool,
    last_tick: u64,
}

impl<const CORES: usize, const CHANNELS: usize> DmaDomain<CORES, CHANNELS> {
    /// Domain over the given channel table.
    #[must_use]
    pub fn new(table: DmaChannelTable<CHANNELS>) -> Self {
        DmaDomain {
            table,
            per_core: [CoreSlot::default(); CORES],
            owner: None,
            channel_changed: false,
            last_tick: 0,
        }
    }

    /// The channel registry, for start/stop bookkeeping.
    pub fn table_mut(&mut self) -> &mut DmaChannelTable<CHANNELS> {
        &mut self.table
    }

    /// Core currently owning the tick source.
    #[must_use]
    pub fn owner(&self) -> Option<CoreId> {
        self.owner
    }

    /// Channel `core`'s handler is currently bound to.
    #[must_use]
    pub fn registered_channel(&self, core: CoreId) -> Option<DmaChannelId> {
        self.per_core.get(core as usize)?.channel
    }

    /// `true` when `core` is subscribed for domain-change broadcasts.
    #[must_use]
    pub fn is_subscribed(&self, core: CoreId) -> bool {
        self.per_core
            .get(core as usize)
            .is_some_and(|slot| slot.subscribed)
    }

    fn slot(&mut self, core: CoreId) -> Result<&mut CoreSlot, CoreError> {
        self.per_core
            .get_mut(core as usize)
            .ok_or(CoreError::InvalidArg)
    }

    /// Bind `core` to the elected channel's interrupt and unmask it
    /// only on the owner core.
    fn irq_bind(
        ctl: &mut dyn InterruptController,
        slot: &mut CoreSlot,
        core: CoreId,
        chan: &DmaChannelDesc,
    ) -> Result<(), CoreError> {
        ctl.register(chan.irq)?;
        ctl.enable(chan.irq);
        if chan.core == core {
            ctl.unmask(chan.irq, core);
        } else {
            ctl.mask(chan.irq, core);
        }
        slot.channel = Some(chan.id);
        slot.irq = Some(chan.irq);
        Ok(())
    }

    /// Release `core`'s current binding: disable, unregister, mask and
    /// clear.
    fn irq_release(ctl: &mut dyn InterruptController, slot: &mut CoreSlot, core: CoreId) {
        if let Some(irq) = slot.irq.take() {
            ctl.disable(irq);
            ctl.unregister(irq);
            ctl.mask(irq, core);
            ctl.clear(irq);
        }
        slot.channel = None;
    }

    /// Register `core`'s LL scheduler with the domain.
    ///
    /// Elects the minimum-period running channel, re-binds this core if
    /// it was registered to a different channel, broadcasts a
    /// [`DomainChange`] when the owner core moves, and subscribes the
    /// per-core notifier on first registration.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when no scheduling-source channel is
    /// running or `core` is out of range; controller registration
    /// errors propagate.
    pub fn register(
        &mut self,
        core: CoreId,
        ctl: &mut dyn InterruptController,
        notifier: &mut dyn DomainNotifier,
    ) -> Result<(), CoreError> {
        critical_section::with(|_cs| {
            let elected = *self
                .table
                .min_period_running()
                .ok_or(CoreError::InvalidArg)?;
            let previous_owner = self.owner;
            let slot_idx = core as usize;
            if slot_idx >= CORES {
                return Err(CoreError::InvalidArg);
            }

            let mut first_registration = true;
            if let Some(current) = self.per_core[slot_idx].channel {
                let same_period = self
                    .table
                    .get(current)
                    .is_some_and(|c| c.period_us == elected.period_us);
                if same_period {
                    // Already bound to a channel of the elected period.
                    return Ok(());
                }
                // Re-bind: release the old channel first.
                let mut slot = self.per_core[slot_idx];
                Self::irq_release(ctl, &mut slot, core);
                self.per_core[slot_idx] = slot;
                self.channel_changed = true;
                first_registration = false;
            }

            let mut slot = self.per_core[slot_idx];
            Self::irq_bind(ctl, &mut slot, core, &elected)?;
            if first_registration {
                slot.subscribed = true;
            }
            self.per_core[slot_idx] = slot;

            // The owner moved: peers must re-bind to the new channel.
            if previous_owner != Some(elected.core) {
                notifier.broadcast(
                    DomainChange {
                        channel: elected.id,
                    },
                    core,
                );
            }

            self.owner = Some(elected.core);
            Ok(())
        })
    }

    /// Unregister `core`'s LL scheduler from the domain.
    ///
    /// The owner releases the tick source only once its channel has
    /// stopped, then re-elects and broadcasts the change (or clears
    /// the owner when nothing runs). A non-owner core just releases
    /// its binding once no local channel runs.
    pub fn unregister(
        &mut self,
        core: CoreId,
        ctl: &mut dyn InterruptController,
        notifier: &mut dyn DomainNotifier,
    ) {
        critical_section::with(|_cs| {
            let slot_idx = core as usize;
            if slot_idx >= CORES || self.per_core[slot_idx].channel.is_none() {
                return;
            }

            if self.owner == Some(core) {
                self.unregister_owner(core, ctl, notifier);
                return;
            }

            // Some local channel still scheduled: stay bound.
            if self.table.any_running_on(core) {
                return;
            }

            let mut slot = self.per_core[slot_idx];
            Self::irq_release(ctl, &mut slot, core);
            slot.subscribed = false;
            self.per_core[slot_idx] = slot;
        });
    }

    fn unregister_owner(
        &mut self,
        core: CoreId,
        ctl: &mut dyn InterruptController,
        notifier: &mut dyn DomainNotifier,
    ) {
        let slot_idx = core as usize;

        // Transfers still scheduled on the bound channel: keep it.
        let still_running = self.per_core[slot_idx]
            .channel
            .and_then(|id| self.table.get(id))
            .is_some_and(|c| c.running);
        if still_running {
            return;
        }

        let mut slot = self.per_core[slot_idx];
        Self::irq_release(ctl, &mut slot, core);

        let Some(elected) = self.table.min_period_running().copied() else {
            // Nothing left to schedule from.
            self.owner = None;
            slot.subscribed = false;
            self.per_core[slot_idx] = slot;
            return;
        };

        self.owner = Some(elected.core);
        notifier.broadcast(
            DomainChange {
                channel: elected.id,
            },
            core,
        );

        // A channel still runs on this core: rebind to the new tick
        // source so local pipelines keep their interrupt path.
        if self.table.any_running_on(core) {
            if Self::irq_bind(ctl, &mut slot, core, &elected).is_ok() {
                ctl.clear(elected.irq);
                self.channel_changed = true;
            }
        } else {
            slot.subscribed = false;
        }
        self.per_core[slot_idx] = slot;
    }

    /// Peer-core reaction to a [`DomainChange`] broadcast: release the
    /// old binding and bind to the new tick-source channel, masked
    /// unless this core is the new owner.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an unknown channel or core;
    /// controller registration errors propagate.
    pub fn on_domain_change(
        &mut self,
        core: CoreId,
        change: DomainChange,
        ctl: &mut dyn InterruptController,
    ) -> Result<(), CoreError> {
        critical_section::with(|_cs| {
            let chan = *self
                .table
                .get(change.channel)
                .ok_or(CoreError::InvalidArg)?;
            let slot_idx = core as usize;
            if slot_idx >= CORES {
                return Err(CoreError::InvalidArg);
            }

            let mut slot = self.per_core[slot_idx];
            Self::irq_release(ctl, &mut slot, core);
            Self::irq_bind(ctl, &mut slot, core, &chan)?;
            self.per_core[slot_idx] = slot;
            self.owner = Some(chan.core);
            self.channel_changed = true;
            Ok(())
        })
    }

    /// Compute the next tick deadline.
    ///
    /// After a channel change the domain resynchronizes to `now`;
    /// otherwise the deadline advances by the bound channel's period
    /// from `start`.
    pub fn next_tick(&mut self, core: CoreId, now: u64, start: u64) -> u64 {
        if self.channel_changed {
            self.channel_changed = false;
            self.last_tick = now;
        } else {
            let period = self
                .registered_channel(core)
                .and_then(|id| self.table.get(id))
                .map_or(0, |c| u64::from(c.period_us));
            self.last_tick = start + period;
        }
        self.last_tick
    }

    /// Clear the bound channel's pending interrupt at end of tick.
    pub fn clear_tick(&mut self, core: CoreId, ctl: &mut dyn InterruptController) {
        if let Some(slot) = self.per_core.get(core as usize) {
            if let Some(irq) = slot.irq {
                ctl.clear(irq);
            }
        }
    }
}
