// src/engine.rs
//
// Capability surface of the audio middleware.
//
// The bridge never talks to a concrete engine directly. Everything it needs
// (system lifetime, banks, event instances, the master bus, the update tick)
// goes through [`AudioEngine`], so the FMOD binding and the headless engine
// are interchangeable.

use std::path::Path;

use crate::error::EngineError;

/// Path of the root output bus.
pub const MASTER_BUS_PATH: &str = "bus:/";

pub type EngineResult<T> = Result<T, EngineError>;

/// Live playback state of an event instance, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    /// Paused on a sustain point.
    Sustaining,
    Stopped,
    Starting,
    Stopping,
}

impl PlaybackState {
    /// Playing or about to play. These instances are restarted in place on replay.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Starting)
    }
}

/// How an instance should be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Let release envelopes (AHDSR, fades) play out.
    AllowFadeOut,
    /// Cut to silence.
    Immediate,
}

/// Where bank data comes from.
#[derive(Debug, Clone, Copy)]
pub enum BankSource<'a> {
    File(&'a Path),
    Memory(&'a [u8]),
}

impl BankSource<'_> {
    /// Short human-readable description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            BankSource::File(path) => path.display().to_string(),
            BankSource::Memory(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }
}

/// One loaded bank and the paths of the events it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankListing {
    pub bank: String,
    pub events: Vec<String>,
}

/// The operations the bridge needs from an audio middleware.
///
/// Instances are consumed by [`AudioEngine::release`], so a handle can only be
/// released once.
pub trait AudioEngine: Send {
    /// Event definition resolved from a path.
    type Description;
    /// Live playback instance.
    type Instance: Send;
    /// Mixer bus.
    type Bus: Send;

    /// Create and configure the engine with a virtual channel budget.
    ///
    /// A failure part-way may leave the engine allocated; [`AudioEngine::shutdown`]
    /// must cope with that.
    fn initialize(&mut self, max_channels: i32) -> EngineResult<()>;

    /// Release the engine and everything it owns. No-op if nothing is allocated.
    fn shutdown(&mut self);

    fn bus(&mut self, path: &str) -> EngineResult<Self::Bus>;
    fn set_bus_paused(&mut self, bus: &Self::Bus, paused: bool) -> EngineResult<()>;
    fn set_bus_volume(&mut self, bus: &Self::Bus, volume: f32) -> EngineResult<()>;

    fn load_bank(&mut self, source: BankSource<'_>) -> EngineResult<()>;

    fn event(&mut self, path: &str) -> EngineResult<Self::Description>;
    fn create_instance(&mut self, description: &Self::Description)
    -> EngineResult<Self::Instance>;
    fn start(&mut self, instance: &Self::Instance) -> EngineResult<()>;
    fn stop(&mut self, instance: &Self::Instance, mode: StopMode) -> EngineResult<()>;
    fn release(&mut self, instance: Self::Instance) -> EngineResult<()>;
    fn playback_state(&self, instance: &Self::Instance) -> EngineResult<PlaybackState>;

    fn set_parameter(
        &mut self,
        instance: &Self::Instance,
        name: &str,
        value: f32,
    ) -> EngineResult<()>;
    fn set_paused(&mut self, instance: &Self::Instance, paused: bool) -> EngineResult<()>;
    fn set_volume(&mut self, instance: &Self::Instance, volume: f32) -> EngineResult<()>;

    /// Advance mixing and callbacks. Must be called periodically.
    fn update(&mut self) -> EngineResult<()>;

    /// Every loaded bank with the events it declares.
    fn list_events(&self) -> EngineResult<Vec<BankListing>>;

    /// Whether a released instance keeps playing its fade-out until it stops.
    ///
    /// When this is `false` the registry holds on to faded-out handles and only
    /// releases them once they report [`PlaybackState::Stopped`].
    fn keeps_fading_instances(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_playing_and_starting_are_live() {
        assert!(PlaybackState::Playing.is_live());
        assert!(PlaybackState::Starting.is_live());
        assert!(!PlaybackState::Sustaining.is_live());
        assert!(!PlaybackState::Stopping.is_live());
        assert!(!PlaybackState::Stopped.is_live());
    }

    #[test]
    fn test_bank_source_description() {
        let bytes = [0u8; 12];
        assert_eq!(BankSource::Memory(&bytes).describe(), "<memory: 12 bytes>");
        assert_eq!(
            BankSource::File(Path::new("banks/Master.bank")).describe(),
            "banks/Master.bank"
        );
    }
}
