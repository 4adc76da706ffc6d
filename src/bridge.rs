//! Thread-safe front end over the event registry.
//!
//! Platform entry points (the method channel, the C ABI) all talk to an
//! [`AudioBridge`]. It serializes every call into the [`EventRegistry`] and,
//! in internal tick mode, owns the background thread that keeps the engine
//! updated.
//!
//! # Architecture
//!
//! - **Caller threads** (platform channel, FFI) lock the registry per call
//! - **Update thread** (internal tick mode) locks it once per tick
//! - `release` stops and joins the update thread before tearing down
//!
//! # Usage
//!
//! ```ignore
//! let bridge = AudioBridge::new(engine, BridgeConfig::default());
//! bridge.initialize()?;
//! bridge.load_bank_asset("assets/audio/Master.bank")?;
//! bridge.play_event("event:/Music/Theme")?;
//! // ...
//! bridge.release();
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::assets::AssetResolver;
use crate::config::{BridgeConfig, TickMode};
use crate::engine::{AudioEngine, BankListing, BankSource, PlaybackState};
use crate::error::Result;
use crate::registry::EventRegistry;

const UPDATE_THREAD_NAME: &str = "fmod-bridge-update";

/// A bank to load: an asset key resolved on disk, or the bank bytes themselves.
#[derive(Debug, Clone, Copy)]
pub enum BankRequest<'a> {
    Asset(&'a str),
    Bytes(&'a [u8]),
}

pub struct AudioBridge<E: AudioEngine + 'static> {
    registry: Arc<Mutex<EventRegistry<E>>>,
    tick_mode: TickMode,
    ticker: Mutex<Option<UpdateThread>>,
    resolver: AssetResolver,
}

/// Background thread calling `update()` at a fixed interval.
struct UpdateThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl UpdateThread {
    fn spawn<E: AudioEngine + 'static>(
        registry: Arc<Mutex<EventRegistry<E>>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(UPDATE_THREAD_NAME.to_string())
            .spawn(move || {
                while running_thread.load(Ordering::Acquire) {
                    let tick_start = Instant::now();
                    registry.lock().update();

                    let elapsed = tick_start.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
                debug!("update thread exiting");
            })?;

        Ok(Self { running, handle })
    }

    fn stop(self) {
        self.running.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            error!("update thread panicked");
        }
    }
}

impl<E: AudioEngine + 'static> AudioBridge<E> {
    pub fn new(engine: E, config: BridgeConfig) -> Self {
        let resolver = AssetResolver::with_platform_defaults(&config.asset_roots);
        Self::with_resolver(engine, config, resolver)
    }

    pub fn with_resolver(engine: E, config: BridgeConfig, resolver: AssetResolver) -> Self {
        let registry = EventRegistry::from_config(engine, &config);
        Self {
            registry: Arc::new(Mutex::new(registry)),
            tick_mode: config.tick_mode,
            ticker: Mutex::new(None),
            resolver,
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Lifecycle
    // ───────────────────────────────────────────────────────────────

    /// Initialize the engine and, in internal tick mode, start the update thread.
    pub fn initialize(&self) -> Result<()> {
        self.registry.lock().initialize()?;

        if let TickMode::Internal { interval } = self.tick_mode {
            let mut ticker = self.ticker.lock();
            if ticker.is_none() {
                match UpdateThread::spawn(Arc::clone(&self.registry), interval) {
                    Ok(thread) => {
                        info!("initialize: update thread started ({:?} tick)", interval);
                        *ticker = Some(thread);
                    }
                    Err(e) => {
                        warn!(
                            "initialize: could not start update thread, host must call update(): {}",
                            e
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Stop the update thread, then release every instance and the engine.
    pub fn release(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
            debug!("release: update thread joined");
        }
        self.registry.lock().release();
    }

    /// Tick the engine from the host's own loop.
    pub fn update(&self) {
        self.registry.lock().update();
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.lock().is_initialized()
    }

    /// `true` while the internal update thread is running.
    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().is_some()
    }

    // ───────────────────────────────────────────────────────────────
    // Banks
    // ───────────────────────────────────────────────────────────────

    /// Load a bank from an asset key, resolved against the asset roots.
    pub fn load_bank_asset(&self, asset: &str) -> Result<()> {
        let path = self.resolver.resolve(asset);
        self.registry.lock().load_bank(BankSource::File(&path))
    }

    pub fn load_bank_memory(&self, bytes: &[u8]) -> Result<()> {
        self.registry.lock().load_bank(BankSource::Memory(bytes))
    }

    /// Load every bank, continuing past failures. Returns `true` only if all
    /// of them loaded, in which case the available events are logged.
    pub fn load_banks<'a, I>(&self, banks: I) -> bool
    where
        I: IntoIterator<Item = BankRequest<'a>>,
    {
        let mut all_loaded = true;
        for bank in banks {
            let loaded = match bank {
                BankRequest::Asset(asset) => self.load_bank_asset(asset),
                BankRequest::Bytes(bytes) => self.load_bank_memory(bytes),
            };
            all_loaded &= loaded.is_ok();
        }

        if all_loaded {
            let _ = self.log_available_events();
        }
        all_loaded
    }

    // ───────────────────────────────────────────────────────────────
    // Events
    // ───────────────────────────────────────────────────────────────

    pub fn play_event(&self, path: &str) -> Result<()> {
        self.registry.lock().play(path)
    }

    pub fn stop_event(&self, path: &str) -> Result<()> {
        self.registry.lock().stop(path)
    }

    pub fn set_parameter(&self, path: &str, name: &str, value: f32) -> Result<()> {
        self.registry.lock().set_parameter(path, name, value)
    }

    pub fn set_paused(&self, path: &str, paused: bool) -> Result<()> {
        self.registry.lock().set_paused(path, paused)
    }

    pub fn set_volume(&self, path: &str, volume: f32) -> Result<()> {
        self.registry.lock().set_volume(path, volume)
    }

    pub fn set_master_paused(&self, paused: bool) -> Result<()> {
        self.registry.lock().set_master_paused(paused)
    }

    pub fn set_master_volume(&self, volume: f32) -> Result<()> {
        self.registry.lock().set_master_volume(volume)
    }

    /// Whether the event at `path` is registered and playing or starting.
    pub fn is_playing(&self, path: &str) -> bool {
        self.playback_state(path).is_some_and(PlaybackState::is_live)
    }

    pub fn playback_state(&self, path: &str) -> Option<PlaybackState> {
        self.registry.lock().playback_state(path).ok()
    }

    // ───────────────────────────────────────────────────────────────
    // Diagnostics
    // ───────────────────────────────────────────────────────────────

    pub fn list_events(&self) -> Result<Vec<BankListing>> {
        self.registry.lock().list_events()
    }

    pub fn log_available_events(&self) -> Result<Vec<BankListing>> {
        self.registry.lock().log_available_events()
    }

    /// Number of registered event instances.
    pub fn event_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Run `f` with exclusive access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut EventRegistry<E>) -> R) -> R {
        f(&mut *self.registry.lock())
    }
}

impl<E: AudioEngine + 'static> Drop for AudioBridge<E> {
    fn drop(&mut self) {
        self.release();
    }
}
