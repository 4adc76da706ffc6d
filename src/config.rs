// src/config.rs
//
// Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Virtual channel budget handed to the engine at initialization.
pub const DEFAULT_MAX_CHANNELS: i32 = 512;

/// Background update period (~60 Hz).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(16);

/// Volume applied to the master bus after initialization.
pub const DEFAULT_MASTER_VOLUME: f32 = 1.0;

/// Who drives the engine's periodic `update()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// The bridge owns a background thread ticking at `interval`.
    Internal { interval: Duration },
    /// The host calls `update()` from its own frame loop.
    External,
}

impl Default for TickMode {
    fn default() -> Self {
        TickMode::Internal {
            interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

/// What `play` does when the event already has a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Restart a playing/starting instance with an immediate stop and a new
    /// start, keeping the handle. Instances that already stopped are replaced.
    #[default]
    RestartInPlace,
    /// Always stop immediately, release, and create a fresh instance.
    Recreate,
}

/// Configuration for an [`AudioBridge`](crate::AudioBridge).
///
/// # Default Values
///
/// - **max_channels**: 512
/// - **master_volume**: 1.0
/// - **tick_mode**: internal, every 16 ms
/// - **replay_policy**: restart in place
/// - **asset_roots**: none beyond the platform defaults
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub max_channels: i32,
    pub master_volume: f32,
    pub tick_mode: TickMode,
    pub replay_policy: ReplayPolicy,
    /// Extra directories searched for relative bank paths, before the
    /// platform defaults.
    pub asset_roots: Vec<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            master_volume: DEFAULT_MASTER_VOLUME,
            tick_mode: TickMode::default(),
            replay_policy: ReplayPolicy::default(),
            asset_roots: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine's virtual channel budget.
    ///
    /// # Panics
    ///
    /// Panics if `max_channels <= 0`.
    pub fn with_max_channels(mut self, max_channels: i32) -> Self {
        assert!(
            max_channels > 0,
            "Channel budget must be positive, got {}",
            max_channels
        );
        self.max_channels = max_channels;
        self
    }

    /// Sets the master bus volume applied after initialization.
    ///
    /// # Panics
    ///
    /// Panics if `volume` is negative or not finite.
    pub fn with_master_volume(mut self, volume: f32) -> Self {
        assert!(
            volume.is_finite() && volume >= 0.0,
            "Master volume must be a non-negative number, got {}",
            volume
        );
        self.master_volume = volume;
        self
    }

    /// Drive `update()` from a background thread at the given interval.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn with_internal_tick(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "Update interval must be positive");
        self.tick_mode = TickMode::Internal { interval };
        self
    }

    /// Leave `update()` to the host.
    pub fn with_external_tick(mut self) -> Self {
        self.tick_mode = TickMode::External;
        self
    }

    pub fn with_replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_roots.push(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_channels, 512);
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(
            config.tick_mode,
            TickMode::Internal {
                interval: Duration::from_millis(16)
            }
        );
        assert_eq!(config.replay_policy, ReplayPolicy::RestartInPlace);
        assert!(config.asset_roots.is_empty());
    }

    #[test]
    fn test_fluent_chaining() {
        let config = BridgeConfig::new()
            .with_max_channels(64)
            .with_master_volume(0.5)
            .with_external_tick()
            .with_replay_policy(ReplayPolicy::Recreate)
            .with_asset_root("/opt/game/assets");

        assert_eq!(config.max_channels, 64);
        assert_eq!(config.master_volume, 0.5);
        assert_eq!(config.tick_mode, TickMode::External);
        assert_eq!(config.replay_policy, ReplayPolicy::Recreate);
        assert_eq!(config.asset_roots, vec![PathBuf::from("/opt/game/assets")]);
    }

    #[test]
    #[should_panic(expected = "Channel budget must be positive")]
    fn test_zero_channels_panics() {
        BridgeConfig::new().with_max_channels(0);
    }

    #[test]
    #[should_panic(expected = "Update interval must be positive")]
    fn test_zero_interval_panics() {
        BridgeConfig::new().with_internal_tick(Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "Master volume must be a non-negative number")]
    fn test_negative_master_volume_panics() {
        BridgeConfig::new().with_master_volume(-1.0);
    }
}
