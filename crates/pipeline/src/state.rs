//! Module-instance lifecycle state machine.
//!
//! The transition table is the contract every module obeys; unstated
//! (state, command) pairs are errors and leave the state unchanged.
//!
//! ```text
//! INIT  --init()-->           READY
//! READY --prepare()-->        PREPARED
//! PREPARED --Start-->         ACTIVE
//! ACTIVE --Pause-->           PAUSED
//! PAUSED --Start|Release-->   ACTIVE
//! ACTIVE|PAUSED --Stop-->     PREPARED
//! any --reset()-->            READY
//! any --free()-->             INIT
//! ```

use stream::CoreError;

/// Lifecycle state of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstanceState {
    /// Not initialized yet, or freed.
    Init,
    /// Initialized or reset; configuration may be replaced freely.
    Ready,
    /// DSP tables built, buffers validated, processing path chosen.
    Prepared,
    /// Processing one period per scheduler tick.
    Active,
    /// Suspended; runtime state is preserved.
    Paused,
}

/// Trigger commands delivered to a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Begin or resume processing.
    Start,
    /// Stop processing and return to `Prepared`.
    Stop,
    /// Suspend processing, keeping runtime state.
    Pause,
    /// Resume from pause.
    Release,
    /// Drop runtime state and return to `Ready`.
    Reset,
    /// Arm a cross-pipeline sink with overrun permitted, so it never
    /// overflows before the producer pipeline starts.
    PreStart,
}

impl InstanceState {
    /// Apply a trigger command, yielding the next state.
    ///
    /// `Reset` is handled by the instance itself (it must tear down
    /// runtime state first) and is not accepted here.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] for any pair the table does
    /// not list.
    pub fn apply(self, cmd: Command) -> Result<InstanceState, CoreError> {
        use Command::*;
        use InstanceState::*;

        match (self, cmd) {
            (Prepared, Start) => Ok(Active),
            (Paused, Start | Release) => Ok(Active),
            (Active, Pause) => Ok(Paused),
            (Active | Paused, Stop) => Ok(Prepared),
            (Prepared, PreStart) => Ok(Prepared),
            _ => Err(CoreError::InvalidState),
        }
    }
}
