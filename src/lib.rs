// src/lib.rs
//
// Library entry point for the Flutter platform plugins (method channel and
// C ABI) and for Rust consumers.

mod assets;
mod bridge;
mod channel;
mod config;
mod engine;
mod error;
mod headless;
mod registry;
mod service;

#[cfg(feature = "fmod")]
pub mod fmod;

pub mod ffi;

// Re-export key types for Rust consumers
pub use assets::{AssetResolver, platform_asset_roots};
pub use bridge::{AudioBridge, BankRequest};
pub use channel::{
    CHANNEL_NAME, INVALID_ARGS, MethodCall, MethodResponse, handle_json_call, handle_method_call,
};
pub use config::{
    BridgeConfig, DEFAULT_MASTER_VOLUME, DEFAULT_MAX_CHANNELS, DEFAULT_UPDATE_INTERVAL,
    ReplayPolicy, TickMode,
};
pub use engine::{
    AudioEngine, BankListing, BankSource, EngineResult, MASTER_BUS_PATH, PlaybackState, StopMode,
};
pub use error::{BridgeError, EngineError, Result};
pub use headless::{EngineOp, FaultPoint, HeadlessEngine, InstanceSnapshot};
pub use registry::EventRegistry;
pub use service::{AudioService, ServiceState};
