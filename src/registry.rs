// src/registry.rs
//
// Event-instance lifecycle tracker.
//
// Maps an event path to the one live instance playing it. Decides what a
// repeated `play` does (restart in place or recreate), stops with fade-out
// on request, and tears everything down immediately on release.
//
// Invariant: at most one registered instance per event path. Entries are
// added only by a successful `play` and removed by `stop`, by replacement
// in `play`, or by `release`.

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::config::{BridgeConfig, ReplayPolicy};
use crate::engine::{AudioEngine, BankListing, BankSource, EngineResult, PlaybackState, StopMode};
use crate::error::{BridgeError, Result};
use crate::service::AudioService;

pub struct EventRegistry<E: AudioEngine> {
    service: AudioService<E>,
    instances: HashMap<String, E::Instance>,
    /// Stopped with fade-out but not yet released; only used when the engine
    /// does not keep fading instances alive on its own.
    draining: Vec<(String, E::Instance)>,
    policy: ReplayPolicy,
}

impl<E: AudioEngine> EventRegistry<E> {
    pub fn new(service: AudioService<E>, policy: ReplayPolicy) -> Self {
        Self {
            service,
            instances: HashMap::new(),
            draining: Vec::new(),
            policy,
        }
    }

    pub fn from_config(engine: E, config: &BridgeConfig) -> Self {
        let service = AudioService::new(engine, config.max_channels, config.master_volume);
        Self::new(service, config.replay_policy)
    }

    // ───────────────────────────────────────────────────────────────
    // Engine lifecycle
    // ───────────────────────────────────────────────────────────────

    pub fn initialize(&mut self) -> Result<()> {
        self.service.initialize()
    }

    pub fn load_bank(&mut self, source: BankSource<'_>) -> Result<()> {
        self.service.load_bank(source)
    }

    /// Tick the engine, then release any drained instance whose fade-out ended.
    pub fn update(&mut self) {
        self.service.update();

        if self.draining.is_empty() {
            return;
        }
        let engine = self.service.engine_mut();
        let mut still_fading = Vec::new();
        for (key, instance) in self.draining.drain(..) {
            match engine.playback_state(&instance) {
                Ok(PlaybackState::Stopped) => release_logged(engine, &key, instance),
                Ok(_) => still_fading.push((key, instance)),
                Err(e) => {
                    warn!("update: lost track of fading {}: {}", key, e);
                    release_logged(engine, &key, instance);
                }
            }
        }
        self.draining = still_fading;
    }

    /// Stop every instance immediately, release them all, then release the
    /// engine. Calling it again does nothing.
    pub fn release(&mut self) {
        if !self.service.holds_engine() {
            debug!("release: nothing to release");
            return;
        }

        let engine = self.service.engine_mut();
        let count = self.instances.len() + self.draining.len();
        for (key, instance) in self.instances.drain().chain(self.draining.drain(..)) {
            if let Err(e) = engine.stop(&instance, StopMode::Immediate) {
                warn!("release: failed to stop {}: {}", key, e);
            }
            release_logged(engine, &key, instance);
        }

        self.service.shutdown();
        info!("release: released {} instance(s) and the engine", count);
    }

    // ───────────────────────────────────────────────────────────────
    // Event playback
    // ───────────────────────────────────────────────────────────────

    /// Play the event at `key`.
    ///
    /// If `key` already has an instance, the replay policy decides whether it
    /// is restarted in place or replaced by a fresh one.
    pub fn play(&mut self, key: &str) -> Result<()> {
        let policy = self.policy;
        let engine = self.service.ready_engine()?;

        if let Some(existing) = self.instances.remove(key) {
            let restart = match policy {
                ReplayPolicy::RestartInPlace => match engine.playback_state(&existing) {
                    Ok(state) => state.is_live(),
                    Err(e) => {
                        warn!("play_event: state of {} unavailable: {}", key, e);
                        false
                    }
                },
                ReplayPolicy::Recreate => false,
            };

            if restart {
                debug!("play_event: restarting already playing {}", key);
                if let Err(e) = engine.stop(&existing, StopMode::Immediate) {
                    warn!("play_event: failed to stop {} for restart: {}", key, e);
                }
                if let Err(source) = engine.start(&existing) {
                    error!("play_event: failed to restart {}: {}", key, source);
                    release_logged(engine, key, existing);
                    return Err(BridgeError::InstanceStart {
                        key: key.to_string(),
                        source,
                    });
                }
                self.instances.insert(key.to_string(), existing);
                return Ok(());
            }

            if policy == ReplayPolicy::Recreate {
                if let Err(e) = engine.stop(&existing, StopMode::Immediate) {
                    warn!("play_event: failed to stop previous {}: {}", key, e);
                }
            }
            debug!("play_event: replacing previous instance of {}", key);
            release_logged(engine, key, existing);
        }

        let description = engine.event(key).map_err(|source| {
            error!("play_event: failed to get event {}: {}", key, source);
            BridgeError::EventLookup {
                key: key.to_string(),
                source,
            }
        })?;

        let instance = engine.create_instance(&description).map_err(|source| {
            error!("play_event: failed to create instance of {}: {}", key, source);
            BridgeError::InstanceCreate {
                key: key.to_string(),
                source,
            }
        })?;

        if let Err(source) = engine.start(&instance) {
            error!("play_event: failed to start {}: {}", key, source);
            release_logged(engine, key, instance);
            return Err(BridgeError::InstanceStart {
                key: key.to_string(),
                source,
            });
        }

        self.instances.insert(key.to_string(), instance);
        info!("play_event: started {}", key);
        Ok(())
    }

    /// Stop the event at `key`, letting its fade-out play, and forget it.
    pub fn stop(&mut self, key: &str) -> Result<()> {
        let Some(instance) = self.instances.remove(key) else {
            debug!("stop_event: no instance found for {}", key);
            return Err(BridgeError::NoInstanceFound(key.to_string()));
        };

        let engine = self.service.engine_mut();
        if let Err(source) = engine.stop(&instance, StopMode::AllowFadeOut) {
            error!("stop_event: failed to stop {}: {}", key, source);
            self.instances.insert(key.to_string(), instance);
            return Err(BridgeError::Engine {
                operation: "stop event",
                source,
            });
        }

        if engine.keeps_fading_instances() {
            release_logged(engine, key, instance);
        } else {
            self.draining.push((key.to_string(), instance));
        }

        info!("stop_event: stopped {}", key);
        Ok(())
    }

    pub fn set_parameter(&mut self, key: &str, name: &str, value: f32) -> Result<()> {
        self.forward(key, "set parameter", |engine, instance| {
            engine.set_parameter(instance, name, value)
        })?;
        debug!("set_parameter: {} = {} on {}", name, value, key);
        Ok(())
    }

    pub fn set_paused(&mut self, key: &str, paused: bool) -> Result<()> {
        self.forward(key, "set paused", |engine, instance| {
            engine.set_paused(instance, paused)
        })?;
        debug!("set_paused: {} on {}", paused, key);
        Ok(())
    }

    pub fn set_volume(&mut self, key: &str, volume: f32) -> Result<()> {
        self.forward(key, "set volume", |engine, instance| {
            engine.set_volume(instance, volume)
        })?;
        debug!("set_volume: {} on {}", volume, key);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────
    // Master bus
    // ───────────────────────────────────────────────────────────────

    pub fn set_master_paused(&mut self, paused: bool) -> Result<()> {
        self.service.set_master_paused(paused)
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        self.service.set_master_volume(volume)
    }

    // ───────────────────────────────────────────────────────────────
    // Diagnostics
    // ───────────────────────────────────────────────────────────────

    pub fn list_events(&self) -> Result<Vec<BankListing>> {
        self.service.list_events()
    }

    /// Log every event path of every loaded bank, and return the listing.
    pub fn log_available_events(&self) -> Result<Vec<BankListing>> {
        let listing = self.list_events().inspect_err(|e| {
            error!("log_available_events: {}", e);
        })?;

        if listing.is_empty() {
            info!("No banks loaded");
            return Ok(listing);
        }

        info!("=== Available events ===");
        for bank in &listing {
            info!("{}:", bank.bank);
            for event in &bank.events {
                info!("  {}", event);
            }
        }
        info!("========================");
        Ok(listing)
    }

    pub fn playback_state(&self, key: &str) -> Result<PlaybackState> {
        let instance = self
            .instances
            .get(key)
            .ok_or_else(|| BridgeError::NoInstanceFound(key.to_string()))?;
        self.service
            .engine()
            .playback_state(instance)
            .map_err(|source| BridgeError::Engine {
                operation: "get playback state",
                source,
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.instances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Registered event paths, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Instances stopped with fade-out and awaiting release.
    pub fn draining_len(&self) -> usize {
        self.draining.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.service.is_initialized()
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    pub fn service(&self) -> &AudioService<E> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut AudioService<E> {
        &mut self.service
    }

    pub fn engine(&self) -> &E {
        self.service.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.service.engine_mut()
    }

    fn forward<F>(&mut self, key: &str, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut E, &E::Instance) -> EngineResult<()>,
    {
        let Some(instance) = self.instances.get(key) else {
            debug!("{}: no instance found for {}", operation, key);
            return Err(BridgeError::NoInstanceFound(key.to_string()));
        };
        f(self.service.engine_mut(), instance).map_err(|source| {
            error!("{}: {} on {}", operation, source, key);
            BridgeError::Engine { operation, source }
        })
    }
}

fn release_logged<E: AudioEngine>(engine: &mut E, key: &str, instance: E::Instance) {
    if let Err(e) = engine.release(instance) {
        warn!("failed to release instance of {}: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{EngineOp, FaultPoint, HeadlessEngine};

    const BANK: &[u8] = b"event:/A\nevent:/B\nevent:/Music/Theme\n";

    fn registry_with(engine: HeadlessEngine, policy: ReplayPolicy) -> EventRegistry<HeadlessEngine> {
        let config = BridgeConfig::new().with_replay_policy(policy);
        let mut registry = EventRegistry::from_config(engine, &config);
        registry.initialize().unwrap();
        registry.load_bank(BankSource::Memory(BANK)).unwrap();
        registry.engine_mut().clear_ops();
        registry
    }

    fn registry() -> EventRegistry<HeadlessEngine> {
        registry_with(HeadlessEngine::new(), ReplayPolicy::RestartInPlace)
    }

    #[test]
    fn test_play_registers_one_instance() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        assert!(reg.contains("event:/A"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.playback_state("event:/A").unwrap(), PlaybackState::Starting);
    }

    #[test]
    fn test_repeated_play_keeps_one_handle() {
        for policy in [ReplayPolicy::RestartInPlace, ReplayPolicy::Recreate] {
            let mut reg = registry_with(HeadlessEngine::new(), policy);
            for _ in 0..5 {
                reg.play("event:/A").unwrap();
                reg.update();
                assert_eq!(reg.len(), 1);
                assert_eq!(reg.engine().unreleased_for("event:/A").len(), 1);
            }
        }
    }

    #[test]
    fn test_replay_while_playing_restarts_in_place() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.update();
        let id = reg.engine().unreleased_for("event:/A")[0].id;
        reg.engine_mut().clear_ops();

        reg.play("event:/A").unwrap();
        assert_eq!(
            reg.engine().ops(),
            &[EngineOp::Stop(id, StopMode::Immediate), EngineOp::Start(id)]
        );
        assert_eq!(reg.engine().unreleased_for("event:/A")[0].id, id);
    }

    #[test]
    fn test_replay_after_stopped_recreates() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        let old = reg.engine().unreleased_for("event:/A")[0].id;
        // A one-shot that ran to completion.
        reg.engine_mut().set_state(old, PlaybackState::Stopped);

        reg.play("event:/A").unwrap();
        let live = reg.engine().unreleased_for("event:/A");
        assert_eq!(live.len(), 1);
        assert_ne!(live[0].id, old);
        assert!(reg.engine().ops().contains(&EngineOp::Release(old)));
    }

    #[test]
    fn test_replay_with_state_query_failure_recreates() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        let old = reg.engine().unreleased_for("event:/A")[0].id;
        reg.engine_mut().fail_on(FaultPoint::PlaybackState);

        reg.play("event:/A").unwrap();
        reg.engine_mut().clear_faults();
        let live = reg.engine().unreleased_for("event:/A");
        assert_eq!(live.len(), 1);
        assert_ne!(live[0].id, old);
    }

    #[test]
    fn test_recreate_policy_always_replaces() {
        let mut reg = registry_with(HeadlessEngine::new(), ReplayPolicy::Recreate);
        reg.play("event:/A").unwrap();
        reg.update();
        let old = reg.engine().unreleased_for("event:/A")[0].id;
        reg.engine_mut().clear_ops();

        reg.play("event:/A").unwrap();
        let ops = reg.engine().ops();
        assert_eq!(ops[0], EngineOp::Stop(old, StopMode::Immediate));
        assert_eq!(ops[1], EngineOp::Release(old));
        assert!(matches!(ops[2], EngineOp::CreateInstance { .. }));
    }

    #[test]
    fn test_play_then_stop_round_trip() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        let id = reg.engine().unreleased_for("event:/A")[0].id;
        reg.engine_mut().clear_ops();

        reg.stop("event:/A").unwrap();
        assert!(!reg.contains("event:/A"));
        assert_eq!(
            reg.engine().ops(),
            &[EngineOp::Stop(id, StopMode::AllowFadeOut), EngineOp::Release(id)]
        );

        let err = reg.stop("event:/A").unwrap_err();
        assert!(matches!(err, BridgeError::NoInstanceFound(_)));
        assert!(err.is_soft());
    }

    #[test]
    fn test_stop_fades_out_after_release() {
        let mut reg = registry();
        reg.play("event:/Music/Theme").unwrap();
        reg.update();
        let id = reg.engine().unreleased_for("event:/Music/Theme")[0].id;

        reg.stop("event:/Music/Theme").unwrap();
        let fading = reg.engine().snapshot(id).unwrap();
        assert_eq!(fading.state, PlaybackState::Stopping);
        assert!(fading.released);

        reg.update();
        assert!(reg.engine().snapshot(id).is_none());
    }

    #[test]
    fn test_stop_defers_release_without_engine_keepalive() {
        let mut reg = registry_with(
            HeadlessEngine::without_fade_keepalive(),
            ReplayPolicy::RestartInPlace,
        );
        reg.play("event:/A").unwrap();
        reg.update();
        let id = reg.engine().unreleased_for("event:/A")[0].id;

        reg.stop("event:/A").unwrap();
        assert!(!reg.contains("event:/A"));
        assert_eq!(reg.draining_len(), 1);
        assert!(!reg.engine().ops().contains(&EngineOp::Release(id)));

        reg.update();
        assert_eq!(reg.draining_len(), 0);
        assert!(reg.engine().ops().contains(&EngineOp::Release(id)));
    }

    #[test]
    fn test_stop_rejected_by_engine_keeps_entry() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.engine_mut().fail_on(FaultPoint::Stop);
        assert!(matches!(
            reg.stop("event:/A"),
            Err(BridgeError::Engine { .. })
        ));
        assert!(reg.contains("event:/A"));
    }

    #[test]
    fn test_unknown_event_is_lookup_error() {
        let mut reg = registry();
        assert!(matches!(
            reg.play("event:/Nope"),
            Err(BridgeError::EventLookup { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_create_failure_registers_nothing() {
        let mut reg = registry();
        reg.engine_mut().fail_on(FaultPoint::CreateInstance);
        assert!(matches!(
            reg.play("event:/A"),
            Err(BridgeError::InstanceCreate { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_start_failure_releases_new_instance() {
        let mut reg = registry();
        reg.engine_mut().fail_on(FaultPoint::Start);
        assert!(matches!(
            reg.play("event:/A"),
            Err(BridgeError::InstanceStart { .. })
        ));
        assert!(reg.is_empty());
        assert_eq!(reg.engine().instance_count(), 0);

        let ops = reg.engine().ops();
        let EngineOp::CreateInstance { id, .. } = ops[0] else {
            panic!("expected instance creation, got {:?}", ops[0]);
        };
        assert_eq!(ops.last(), Some(&EngineOp::Release(id)));
    }

    #[test]
    fn test_failed_restart_drops_entry() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.engine_mut().fail_on(FaultPoint::Start);
        assert!(reg.play("event:/A").is_err());
        assert!(!reg.contains("event:/A"));
        assert_eq!(reg.engine().instance_count(), 0);
    }

    #[test]
    fn test_unknown_key_forwards_are_noops() {
        let mut reg = registry();
        for result in [
            reg.set_parameter("event:/missing", "p", 1.0),
            reg.set_paused("event:/missing", true),
            reg.set_volume("event:/missing", 0.5),
        ] {
            assert!(matches!(result, Err(BridgeError::NoInstanceFound(_))));
        }
        assert!(reg.engine().ops().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_forwards_reach_engine_unclamped() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.set_parameter("event:/A", "Intensity", 7.5).unwrap();
        reg.set_volume("event:/A", 3.0).unwrap();
        reg.set_paused("event:/A", true).unwrap();

        let live = reg.engine().unreleased_for("event:/A");
        let inst = &live[0];
        assert_eq!(inst.parameters.get("Intensity"), Some(&7.5));
        assert_eq!(inst.volume, 3.0);
        assert!(inst.paused);
    }

    #[test]
    fn test_release_stops_immediately_and_empties() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.play("event:/B").unwrap();
        reg.release();

        assert!(reg.is_empty());
        assert!(!reg.is_initialized());
        let stops: Vec<_> = reg
            .engine()
            .ops()
            .iter()
            .filter(|op| matches!(op, EngineOp::Stop(..)))
            .collect();
        assert_eq!(stops.len(), 2);
        assert!(stops
            .iter()
            .all(|op| matches!(op, EngineOp::Stop(_, StopMode::Immediate))));
        assert_eq!(reg.engine().ops().last(), Some(&EngineOp::Shutdown));

        for result in [
            reg.stop("event:/A"),
            reg.set_parameter("event:/A", "p", 1.0),
            reg.set_volume("event:/B", 1.0),
        ] {
            assert!(matches!(result, Err(BridgeError::NoInstanceFound(_))));
        }
    }

    #[test]
    fn test_release_also_flushes_draining() {
        let mut reg = registry_with(
            HeadlessEngine::without_fade_keepalive(),
            ReplayPolicy::RestartInPlace,
        );
        reg.play("event:/A").unwrap();
        reg.update();
        reg.stop("event:/A").unwrap();
        assert_eq!(reg.draining_len(), 1);

        reg.release();
        assert_eq!(reg.draining_len(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut reg = registry();
        reg.play("event:/A").unwrap();
        reg.release();
        reg.engine_mut().clear_ops();

        reg.release();
        assert!(reg.engine().ops().is_empty());
    }

    #[test]
    fn test_release_before_initialize_touches_nothing() {
        let mut reg = EventRegistry::from_config(HeadlessEngine::new(), &BridgeConfig::new());
        reg.release();
        assert!(reg.engine().ops().is_empty());
    }

    #[test]
    fn test_reinitialize_after_release() {
        let mut reg = registry();
        reg.release();
        assert!(matches!(reg.play("event:/A"), Err(BridgeError::NotInitialized)));

        reg.initialize().unwrap();
        reg.load_bank(BankSource::Memory(BANK)).unwrap();
        reg.play("event:/A").unwrap();
        assert!(reg.contains("event:/A"));
    }

    #[test]
    fn test_master_pause_independent_of_entries() {
        let mut reg = registry();
        reg.set_master_paused(true).unwrap();
        assert!(reg.engine().bus_paused());

        reg.play("event:/A").unwrap();
        reg.set_master_paused(false).unwrap();
        reg.set_master_paused(true).unwrap();
        assert!(!reg.engine().unreleased_for("event:/A")[0].paused);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_master_pause_requires_initialize() {
        let mut reg = EventRegistry::from_config(HeadlessEngine::new(), &BridgeConfig::new());
        assert!(matches!(
            reg.set_master_paused(true),
            Err(BridgeError::NotInitialized)
        ));
    }

    #[test]
    fn test_log_available_events() {
        let reg = registry();
        let listing = reg.log_available_events().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(
            listing[0].events,
            vec!["event:/A", "event:/B", "event:/Music/Theme"]
        );
    }
}
