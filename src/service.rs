// src/service.rs
//
// Owner of the engine instance and its master bus.
//
// There is exactly one engine per service, and its lifetime is the
// service's: created by `initialize`, torn down by `shutdown`, and
// re-creatable afterwards.

use log::{debug, error, info, warn};

use crate::engine::{AudioEngine, BankListing, BankSource, EngineResult, MASTER_BUS_PATH};
use crate::error::{BridgeError, Result};

/// Lifecycle of the engine owned by an [`AudioService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Never initialized; nothing allocated.
    Uninitialized,
    Ready,
    /// Initialization failed part-way. The engine may hold resources that
    /// `shutdown` still has to free.
    Failed,
    /// Torn down. `initialize` may be called again.
    Released,
}

pub struct AudioService<E: AudioEngine> {
    engine: E,
    state: ServiceState,
    master_bus: Option<E::Bus>,
    max_channels: i32,
    master_volume: f32,
}

impl<E: AudioEngine> AudioService<E> {
    pub fn new(engine: E, max_channels: i32, master_volume: f32) -> Self {
        Self {
            engine,
            state: ServiceState::Uninitialized,
            master_bus: None,
            max_channels,
            master_volume,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ServiceState::Ready
    }

    /// `true` while the engine may hold resources (ready or half-initialized).
    pub fn holds_engine(&self) -> bool {
        matches!(self.state, ServiceState::Ready | ServiceState::Failed)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The engine, if it is ready for calls.
    pub fn ready_engine(&mut self) -> Result<&mut E> {
        if self.state != ServiceState::Ready {
            return Err(BridgeError::NotInitialized);
        }
        Ok(&mut self.engine)
    }

    /// Create and configure the engine, then bring the master bus to the
    /// configured volume.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            ServiceState::Ready => {
                warn!("initialize: engine already initialized");
                return Ok(());
            }
            ServiceState::Failed => {
                debug!("initialize: discarding partially initialized engine");
                self.engine.shutdown();
            }
            ServiceState::Uninitialized | ServiceState::Released => {}
        }

        if let Err(e) = self.engine.initialize(self.max_channels) {
            error!("initialize: engine initialization failed: {}", e);
            self.state = ServiceState::Failed;
            return Err(BridgeError::EngineInit(e));
        }
        self.state = ServiceState::Ready;

        match self.engine.bus(MASTER_BUS_PATH) {
            Ok(bus) => {
                if let Err(e) = self.engine.set_bus_volume(&bus, self.master_volume) {
                    warn!("initialize: could not set master volume: {}", e);
                }
                self.master_bus = Some(bus);
            }
            Err(e) => warn!("initialize: master bus unavailable: {}", e),
        }

        info!(
            "initialize: engine ready ({} channels)",
            self.max_channels
        );
        Ok(())
    }

    pub fn load_bank(&mut self, source: BankSource<'_>) -> Result<()> {
        let engine = self.ready_engine()?;
        match engine.load_bank(source) {
            Ok(()) => {
                info!("load_bank: loaded {}", source.describe());
                Ok(())
            }
            Err(e) => {
                error!("load_bank: failed to load {}: {}", source.describe(), e);
                Err(BridgeError::BankLoad {
                    bank: source.describe(),
                    source: e,
                })
            }
        }
    }

    pub fn set_master_paused(&mut self, paused: bool) -> Result<()> {
        self.with_master_bus("set master paused", |engine, bus| {
            engine.set_bus_paused(bus, paused)
        })?;
        info!("set_master_paused: master bus paused = {}", paused);
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        self.with_master_bus("set master volume", |engine, bus| {
            engine.set_bus_volume(bus, volume)
        })?;
        debug!("set_master_volume: master bus volume = {}", volume);
        Ok(())
    }

    /// Tick the engine. Failures are logged and otherwise ignored.
    pub fn update(&mut self) {
        if self.state != ServiceState::Ready {
            return;
        }
        if let Err(e) = self.engine.update() {
            warn!("update: engine update failed: {}", e);
        }
    }

    pub fn list_events(&self) -> Result<Vec<BankListing>> {
        if self.state != ServiceState::Ready {
            return Err(BridgeError::NotInitialized);
        }
        self.engine
            .list_events()
            .map_err(|source| BridgeError::Engine {
                operation: "list events",
                source,
            })
    }

    /// Release the engine. Returns `false` if there was nothing to release.
    pub fn shutdown(&mut self) -> bool {
        if !self.holds_engine() {
            return false;
        }
        self.master_bus = None;
        self.engine.shutdown();
        self.state = ServiceState::Released;
        info!("shutdown: engine released");
        true
    }

    fn with_master_bus<F>(&mut self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut E, &E::Bus) -> EngineResult<()>,
    {
        if self.state != ServiceState::Ready {
            error!("{}: engine not initialized", operation);
            return Err(BridgeError::NotInitialized);
        }

        // Looked up lazily if it was unavailable at initialization.
        if self.master_bus.is_none() {
            let bus = self.engine.bus(MASTER_BUS_PATH).map_err(|source| {
                error!("{}: failed to get master bus: {}", operation, source);
                BridgeError::Engine { operation, source }
            })?;
            self.master_bus = Some(bus);
        }

        let Some(bus) = self.master_bus.as_ref() else {
            return Err(BridgeError::NotInitialized);
        };
        f(&mut self.engine, bus).map_err(|source| {
            error!("{}: {}", operation, source);
            BridgeError::Engine { operation, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{EngineOp, FaultPoint, HeadlessEngine};

    fn service() -> AudioService<HeadlessEngine> {
        AudioService::new(HeadlessEngine::new(), 512, 1.0)
    }

    #[test]
    fn test_initialize_sets_master_volume() {
        let mut svc = service();
        svc.initialize().unwrap();
        assert!(svc.is_initialized());
        assert_eq!(
            svc.engine().ops(),
            &[
                EngineOp::Initialize { max_channels: 512 },
                EngineOp::SetBusVolume(1.0)
            ]
        );
        assert_eq!(svc.engine().bus_volume(), 1.0);
    }

    #[test]
    fn test_initialize_twice_is_noop() {
        let mut svc = service();
        svc.initialize().unwrap();
        svc.engine_mut().clear_ops();
        svc.initialize().unwrap();
        assert!(svc.engine().ops().is_empty());
    }

    #[test]
    fn test_failed_initialize_is_released_safely() {
        let mut svc = service();
        svc.engine_mut().fail_on(FaultPoint::Initialize);
        assert!(matches!(svc.initialize(), Err(BridgeError::EngineInit(_))));
        assert_eq!(svc.state(), ServiceState::Failed);
        assert!(matches!(
            svc.set_master_paused(true),
            Err(BridgeError::NotInitialized)
        ));

        assert!(svc.shutdown());
        assert_eq!(svc.state(), ServiceState::Released);
        assert!(!svc.shutdown());
    }

    #[test]
    fn test_retry_after_failure_discards_partial_engine() {
        let mut svc = service();
        svc.engine_mut().fail_on(FaultPoint::Initialize);
        assert!(svc.initialize().is_err());
        svc.engine_mut().clear_faults();
        svc.engine_mut().clear_ops();

        svc.initialize().unwrap();
        assert_eq!(svc.engine().ops()[0], EngineOp::Shutdown);
        assert!(svc.is_initialized());
    }

    #[test]
    fn test_missing_master_bus_is_not_fatal() {
        let mut svc = service();
        svc.engine_mut().fail_on(FaultPoint::Bus);
        svc.initialize().unwrap();
        assert!(svc.set_master_paused(true).is_err());

        // Looked up again once the bus becomes available.
        svc.engine_mut().clear_faults();
        svc.set_master_paused(true).unwrap();
        assert!(svc.engine().bus_paused());
    }

    #[test]
    fn test_load_bank_requires_initialize() {
        let mut svc = service();
        let bank = b"event:/A\n";
        assert!(matches!(
            svc.load_bank(BankSource::Memory(bank)),
            Err(BridgeError::NotInitialized)
        ));
        svc.initialize().unwrap();
        svc.load_bank(BankSource::Memory(bank)).unwrap();
        assert!(matches!(
            svc.load_bank(BankSource::Memory(b"not a bank")),
            Err(BridgeError::BankLoad { .. })
        ));
    }

    #[test]
    fn test_update_failure_is_swallowed() {
        let mut svc = service();
        svc.initialize().unwrap();
        svc.engine_mut().fail_on(FaultPoint::Update);
        svc.update();
        assert_eq!(svc.engine().ops().last(), Some(&EngineOp::Update));
    }

    #[test]
    fn test_update_before_initialize_skips_engine() {
        let mut svc = service();
        svc.update();
        assert!(svc.engine().ops().is_empty());
    }
}
