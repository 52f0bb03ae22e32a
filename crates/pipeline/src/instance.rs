//! A module instance: identity, lifecycle, configuration dispatch and
//! processing entry, wrapped around the module's private ops.

use heapless::Vec;

use crate::adapter::{self, ProcessStats};
use crate::blob::FragmentPosition;
use crate::module::{BaseConfig, Domain, ModuleConfig, ModuleOps, MAX_PINS};
use crate::resources::ResourceRegistry;
use crate::state::{Command, InstanceState};
use stream::{CoreError, Sink, Source};

/// Immutable identity of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleId {
    /// Module-type UUID from the manifest.
    pub uuid: [u8; 16],
    /// Numeric module type id.
    pub module_id: u32,
    /// Instance number within the module type.
    pub instance_id: u32,
}

/// A live module instance.
///
/// Owns the module's private ops, its lifecycle state, its resource
/// registry and its record of bound topology neighbours.
pub struct ModuleInstance<M: ModuleOps> {
    id: ModuleId,
    domain: Domain,
    state: InstanceState,
    base: Option<BaseConfig>,
    module: M,
    resources: ResourceRegistry,
    peers: Vec<ModuleId, MAX_PINS>,
    overrun_permitted: bool,
    period_bytes: usize,
}

impl<M: ModuleOps> ModuleInstance<M> {
    /// Wrap module ops into an uninitialized instance.
    pub fn new(id: ModuleId, domain: Domain, module: M) -> Self {
        ModuleInstance {
            id,
            domain,
            state: InstanceState::Init,
            base: None,
            module,
            resources: ResourceRegistry::new(),
            peers: Vec::new(),
            overrun_permitted: false,
            period_bytes: 0,
        }
    }

    /// Instance identity.
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Scheduling domain of the instance.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// The instance's resource registry.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Mutable access for the module's own allocations.
    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    /// Module private ops, for configuration paths outside the
    /// uniform contract.
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// `true` once a `PreStart` trigger armed this instance's sinks to
    /// tolerate overruns.
    pub fn overrun_permitted(&self) -> bool {
        self.overrun_permitted
    }

    /// Allocate private state; `Init` -> `Ready`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] outside `Init`; module `init` errors
    /// propagate and leave the instance in `Init`.
    pub fn init(&mut self, cfg: &ModuleConfig<'_>) -> Result<(), CoreError> {
        if self.state != InstanceState::Init {
            return Err(CoreError::InvalidState);
        }
        self.module.init(cfg)?;
        self.base = Some(cfg.base);
        self.state = InstanceState::Ready;
        Ok(())
    }

    /// Build DSP tables against the attached buffers; `Ready` ->
    /// `Prepared`.
    ///
    /// Validates that every sink holds the configured periods of
    /// headroom, then lets the module choose its format-specialized
    /// processing path.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] outside `Ready`;
    /// [`CoreError::NotConnected`] with no buffers attached;
    /// [`CoreError::NotSupported`] when a sink is too small for
    /// `periods_sink` periods. Module errors leave the state `Ready`.
    pub fn prepare(
        &mut self,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<(), CoreError> {
        if self.state != InstanceState::Ready {
            return Err(CoreError::InvalidState);
        }
        let base = self.base.ok_or(CoreError::InvalidState)?;
        if sources.is_empty() && sinks.is_empty() {
            return Err(CoreError::NotConnected);
        }

        let period_bytes = base.period_bytes();
        for snk in sinks.iter() {
            if snk.capacity() < base.periods_sink as usize * period_bytes {
                return Err(CoreError::NotSupported);
            }
        }

        self.module.prepare(&base, sources, sinks)?;
        self.period_bytes = period_bytes;
        self.state = InstanceState::Prepared;
        Ok(())
    }

    /// Apply a trigger command.
    ///
    /// `Reset` tears runtime state down through [`Self::reset`]; the
    /// remaining commands walk the transition table. `PreStart`
    /// additionally arms the overrun-permitted flag.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] for transitions the table rejects.
    pub fn trigger(&mut self, cmd: Command) -> Result<(), CoreError> {
        if cmd == Command::Reset {
            return self.reset();
        }
        self.state = self.state.apply(cmd)?;
        if cmd == Command::PreStart {
            self.overrun_permitted = true;
        }
        Ok(())
    }

    /// Process one period. Only legal while `Active`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] outside `Active`;
    /// [`CoreError::XRun`] when the period cannot be staged (offsets
    /// untouched, retry next tick).
    pub fn process(
        &mut self,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<ProcessStats, CoreError> {
        if self.state != InstanceState::Active {
            return Err(CoreError::InvalidState);
        }
        adapter::process_period(
            &mut self.module,
            self.domain,
            self.period_bytes,
            sources,
            sinks,
        )
    }

    /// Whether this instance would run a period right now.
    ///
    /// Low-latency instances must always answer `true`.
    pub fn is_ready_to_process(
        &mut self,
        sources: &[&mut dyn Source],
        sinks: &[&mut dyn Sink],
    ) -> bool {
        match self.domain {
            Domain::LowLatency => true,
            Domain::DataProcessing => self.module.is_ready_to_process(sources, sinks),
        }
    }

    /// Forward a configuration-blob fragment to the module.
    ///
    /// The module sees the owner state so blob gating (busy while
    /// active, immediate swap while ready) can be enforced.
    pub fn set_configuration(
        &mut self,
        config_id: u32,
        pos: FragmentPosition,
        total_size: usize,
        fragment: &[u8],
    ) -> Result<(), CoreError> {
        self.module
            .set_configuration(config_id, pos, total_size, fragment, self.state)
    }

    /// Read back a slice of the module's current configuration.
    pub fn get_configuration(
        &mut self,
        config_id: u32,
        offset: usize,
        fragment: &mut [u8],
    ) -> Result<usize, CoreError> {
        self.module.get_configuration(config_id, offset, fragment)
    }

    /// Drop runtime state, keep configuration; any state -> `Ready`.
    ///
    /// # Errors
    ///
    /// Module reset errors propagate; the instance still enters
    /// `Ready`.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        let ret = self.module.reset();
        self.overrun_permitted = false;
        self.state = InstanceState::Ready;
        ret
    }

    /// Release every resource; any state -> `Init`.
    pub fn free(&mut self) {
        self.module.free();
        self.resources.free_all();
        self.base = None;
        self.overrun_permitted = false;
        self.state = InstanceState::Init;
    }

    /// Record a topology neighbour.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when the peer is already bound or the
    /// peer table is full.
    pub fn bind(&mut self, peer: ModuleId) -> Result<(), CoreError> {
        if self.peers.iter().any(|p| p == &peer) {
            return Err(CoreError::InvalidArg);
        }
        self.peers.push(peer).map_err(|_| CoreError::InvalidArg)
    }

    /// Forget a topology neighbour. Unknown peers are ignored.
    pub fn unbind(&mut self, peer: &ModuleId) {
        if let Some(idx) = self.peers.iter().position(|p| p == peer) {
            let _ = self.peers.swap_remove(idx);
        }
    }

    /// Currently bound neighbours.
    pub fn peers(&self) -> &[ModuleId] {
        &self.peers
    }
}
