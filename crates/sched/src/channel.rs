//! Scheduling-capable DMA channel bookkeeping.
//!
//! The platform glue records every channel that can clock a
//! low-latency pipeline here; the domain elects its tick source from
//! the running ones.

use heapless::Vec;

use stream::CoreError;

/// CPU core index.
pub type CoreId = u32;

/// Interrupt line identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqId(pub u32);

/// DMA channel identifier: controller index and channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannelId {
    /// DMA controller index.
    pub dma: u8,
    /// Channel index within the controller.
    pub channel: u8,
}

/// One scheduling-capable DMA channel.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannelDesc {
    /// Channel identity.
    pub id: DmaChannelId,
    /// Core the channel's transfers are owned by.
    pub core: CoreId,
    /// Completion interrupt of the channel.
    pub irq: IrqId,
    /// Transfer period in microseconds.
    pub period_us: u32,
    /// Marked as a scheduling source in the topology.
    pub scheduling_source: bool,
    /// Transfers are currently running.
    pub running: bool,
}

/// Registry of the scheduling-source channels a domain can pick from.
#[derive(Debug, Default)]
pub struct DmaChannelTable<const N: usize> {
    channels: Vec<DmaChannelDesc, N>,
}

impl<const N: usize> DmaChannelTable<N> {
    /// Empty table.
    #[must_use]
    pub const fn new() -> Self {
        DmaChannelTable {
            channels: Vec::new(),
        }
    }

    /// Register a channel.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when the id is already present,
    /// [`CoreError::OutOfMemory`] when the table is full.
    pub fn add(&mut self, desc: DmaChannelDesc) -> Result<(), CoreError> {
        if self.get(desc.id).is_some() {
            return Err(CoreError::InvalidArg);
        }
        self.channels
            .push(desc)
            .map_err(|_| CoreError::OutOfMemory)
    }

    /// Look a channel up by id.
    #[must_use]
    pub fn get(&self, id: DmaChannelId) -> Option<&DmaChannelDesc> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Mark a channel's transfers running.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an unknown id.
    pub fn channel_started(&mut self, id: DmaChannelId) -> Result<(), CoreError> {
        self.set_running(id, true)
    }

    /// Mark a channel's transfers stopped.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an unknown id.
    pub fn channel_stopped(&mut self, id: DmaChannelId) -> Result<(), CoreError> {
        self.set_running(id, false)
    }

    fn set_running(&mut self, id: DmaChannelId, running: bool) -> Result<(), CoreError> {
        let chan = self
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CoreError::InvalidArg)?;
        chan.running = running;
        Ok(())
    }

    /// The running scheduling-source channel with the smallest period,
    /// if any.
    #[must_use]
    pub fn min_period_running(&self) -> Option<&DmaChannelDesc> {
        self.channels
            .iter()
            .filter(|c| c.scheduling_source && c.running)
            .min_by_key(|c| c.period_us)
    }

    /// Any running scheduling-source channel hosted on `core`?
    #[must_use]
    pub fn any_running_on(&self, core: CoreId) -> bool {
        self.channels
            .iter()
            .any(|c| c.scheduling_source && c.running && c.core == core)
    }
}
