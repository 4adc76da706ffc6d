// C-compatible FFI bindings for the Flutter platform plugins.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - Bridge handles must be created by this module and not fabricated
// - String parameters must be null-terminated UTF-8
// - Caller must call `fmod_bridge_destroy` for each `_create`, and
//   `fmod_bridge_string_free` for each string returned by this module

use std::ffi::{CStr, CString, c_char};
use std::time::Duration;

use log::{debug, error, warn};

use crate::bridge::AudioBridge;
use crate::channel;
use crate::config::{
    BridgeConfig, DEFAULT_MASTER_VOLUME, DEFAULT_MAX_CHANNELS, DEFAULT_UPDATE_INTERVAL,
    ReplayPolicy, TickMode,
};

/// Engine behind the C ABI: the FMOD Studio binding when linked, otherwise
/// the headless engine.
#[cfg(feature = "fmod")]
pub type PlatformEngine = crate::fmod::FmodStudio;
#[cfg(not(feature = "fmod"))]
pub type PlatformEngine = crate::headless::HeadlessEngine;

// Logger subsystem identifier
#[cfg(feature = "ios")]
const LOG_SUBSYSTEM: &str = "com.fmodflutter.bridge";

pub const REPLAY_RESTART_IN_PLACE: u32 = 0;
pub const REPLAY_RECREATE: u32 = 1;

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup before using any other FFI function.
/// Output appears in Console.app and Xcode's debug console.
#[cfg(feature = "ios")]
#[unsafe(no_mangle)]
pub extern "C" fn fmod_bridge_init_logger() {
    use log::LevelFilter;
    use oslog::OsLogger;

    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to an [`AudioBridge`].
pub struct FmodBridge {
    inner: AudioBridge<PlatformEngine>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating a bridge.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmodBridgeConfig {
    /// Virtual channel budget (e.g. 512).
    pub max_channels: i32,
    /// Master bus volume applied after initialization.
    pub master_volume: f32,
    /// Background update period in milliseconds. 0 means the host calls
    /// `fmod_bridge_update` itself.
    pub tick_interval_ms: u32,
    /// `REPLAY_RESTART_IN_PLACE` or `REPLAY_RECREATE`.
    pub replay_policy: u32,
}

impl Default for FmodBridgeConfig {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            master_volume: DEFAULT_MASTER_VOLUME,
            tick_interval_ms: DEFAULT_UPDATE_INTERVAL.as_millis() as u32,
            replay_policy: REPLAY_RESTART_IN_PLACE,
        }
    }
}

// Out-of-range values fall back to defaults instead of panicking across the ABI.
impl From<FmodBridgeConfig> for BridgeConfig {
    fn from(cfg: FmodBridgeConfig) -> Self {
        let mut config = BridgeConfig::default();

        if cfg.max_channels > 0 {
            config.max_channels = cfg.max_channels;
        } else {
            warn!(
                "bridge config: invalid channel budget {}, using {}",
                cfg.max_channels, DEFAULT_MAX_CHANNELS
            );
        }

        if cfg.master_volume.is_finite() && cfg.master_volume >= 0.0 {
            config.master_volume = cfg.master_volume;
        } else {
            warn!(
                "bridge config: invalid master volume {}, using {}",
                cfg.master_volume, DEFAULT_MASTER_VOLUME
            );
        }

        config.tick_mode = match cfg.tick_interval_ms {
            0 => TickMode::External,
            ms => TickMode::Internal {
                interval: Duration::from_millis(u64::from(ms)),
            },
        };

        config.replay_policy = match cfg.replay_policy {
            REPLAY_RESTART_IN_PLACE => ReplayPolicy::RestartInPlace,
            REPLAY_RECREATE => ReplayPolicy::Recreate,
            other => {
                warn!("bridge config: unknown replay policy {}, restarting in place", other);
                ReplayPolicy::RestartInPlace
            }
        };

        config
    }
}

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn fmod_bridge_default_config() -> FmodBridgeConfig {
    FmodBridgeConfig::default()
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

unsafe fn bridge_ref<'a>(bridge: *const FmodBridge) -> Option<&'a AudioBridge<PlatformEngine>> {
    if bridge.is_null() {
        return None;
    }
    Some(unsafe { &(*bridge).inner })
}

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Option<&'a str> {
    if ptr.is_null() {
        debug!("ffi: null {}", what);
        return None;
    }
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            warn!("ffi: {} is not valid UTF-8", what);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Bridge Creation
// ═══════════════════════════════════════════════════════════════════════════

/// Create a bridge with default configuration (512 channels, 16 ms
/// background update, restart-in-place replay).
///
/// Returns an opaque pointer that must be freed with `fmod_bridge_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn fmod_bridge_create() -> *mut FmodBridge {
    let config = FmodBridgeConfig::default();
    unsafe { fmod_bridge_create_with_config(&config) }
}

/// Create a bridge with custom configuration.
///
/// # Safety
/// `config` must be a valid pointer to an `FmodBridgeConfig` or NULL
/// (defaults are used).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_create_with_config(
    config: *const FmodBridgeConfig,
) -> *mut FmodBridge {
    let cfg = if config.is_null() {
        FmodBridgeConfig::default()
    } else {
        unsafe { std::ptr::read(config) }
    };

    let bridge = AudioBridge::new(PlatformEngine::new(), BridgeConfig::from(cfg));
    Box::into_raw(Box::new(FmodBridge { inner: bridge }))
}

/// Destroy a bridge, releasing the engine if it is still initialized.
///
/// # Safety
/// `bridge` must be a valid pointer returned by `fmod_bridge_create*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_destroy(bridge: *mut FmodBridge) {
    if !bridge.is_null() {
        unsafe { drop(Box::from_raw(bridge)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the engine. Returns `true` on success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_initialize(bridge: *const FmodBridge) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    bridge.initialize().is_ok()
}

/// Tick the engine. Only needed when the bridge was created with
/// `tick_interval_ms == 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_update(bridge: *const FmodBridge) {
    if let Some(bridge) = unsafe { bridge_ref(bridge) } {
        bridge.update();
    }
}

/// Stop and release every event instance, then the engine. Safe to call
/// more than once; the bridge can be initialized again afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_release(bridge: *const FmodBridge) {
    if let Some(bridge) = unsafe { bridge_ref(bridge) } {
        bridge.release();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Banks
// ═══════════════════════════════════════════════════════════════════════════

/// Load a bank file. Relative paths are resolved against the Flutter asset
/// directories.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_load_bank_file(
    bridge: *const FmodBridge,
    path: *const c_char,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "bank path") }) else {
        return false;
    };
    bridge.load_bank_asset(path).is_ok()
}

/// Load a bank from memory. The bytes are copied by the engine.
///
/// # Safety
/// `data` must point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_load_bank_memory(
    bridge: *const FmodBridge,
    data: *const u8,
    len: usize,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    if data.is_null() || len == 0 {
        error!("load_bank_memory: no bank data");
        return false;
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    bridge.load_bank_memory(bytes).is_ok()
}

/// Log every loaded bank and its events. Returns `false` if the engine is not
/// initialized.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_log_available_events(bridge: *const FmodBridge) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    bridge.log_available_events().is_ok()
}

// ═══════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════

/// Play (or replay) an event.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_play_event(
    bridge: *const FmodBridge,
    path: *const c_char,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "event path") }) else {
        return false;
    };
    bridge.play_event(path).is_ok()
}

/// Stop an event with fade-out. Returns `false` if it was not playing.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_stop_event(
    bridge: *const FmodBridge,
    path: *const c_char,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "event path") }) else {
        return false;
    };
    bridge.stop_event(path).is_ok()
}

/// Set a named parameter on a playing event.
///
/// # Safety
/// `path` and `name` must be valid null-terminated UTF-8 strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_set_parameter(
    bridge: *const FmodBridge,
    path: *const c_char,
    name: *const c_char,
    value: f32,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let path = unsafe { str_arg(path, "event path") };
    let name = unsafe { str_arg(name, "parameter name") };
    let (Some(path), Some(name)) = (path, name) else {
        return false;
    };
    bridge.set_parameter(path, name, value).is_ok()
}

/// Pause or resume a playing event.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_set_paused(
    bridge: *const FmodBridge,
    path: *const c_char,
    paused: bool,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "event path") }) else {
        return false;
    };
    bridge.set_paused(path, paused).is_ok()
}

/// Set the volume of a playing event.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_set_volume(
    bridge: *const FmodBridge,
    path: *const c_char,
    volume: f32,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "event path") }) else {
        return false;
    };
    bridge.set_volume(path, volume).is_ok()
}

/// Whether the event is registered and playing or starting.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_is_playing(
    bridge: *const FmodBridge,
    path: *const c_char,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    let Some(path) = (unsafe { str_arg(path, "event path") }) else {
        return false;
    };
    bridge.is_playing(path)
}

// ═══════════════════════════════════════════════════════════════════════════
// Master Bus
// ═══════════════════════════════════════════════════════════════════════════

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_set_master_paused(
    bridge: *const FmodBridge,
    paused: bool,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    bridge.set_master_paused(paused).is_ok()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_set_master_volume(
    bridge: *const FmodBridge,
    volume: f32,
) -> bool {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return false;
    };
    bridge.set_master_volume(volume).is_ok()
}

// ═══════════════════════════════════════════════════════════════════════════
// Method Channel
// ═══════════════════════════════════════════════════════════════════════════

/// Dispatch a method-channel call.
///
/// `arguments_json` may be NULL or empty for methods without arguments.
/// Returns a JSON envelope (`{"status":"success","result":...}`,
/// `{"status":"error","code":...,"message":...}` or
/// `{"status":"not_implemented"}`) that must be freed with
/// `fmod_bridge_string_free`, or NULL if `bridge` or `method` is invalid.
///
/// # Safety
/// `method` must be a valid null-terminated UTF-8 string; `arguments_json`
/// must be one or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_handle_method_call(
    bridge: *const FmodBridge,
    method: *const c_char,
    arguments_json: *const c_char,
) -> *mut c_char {
    let Some(bridge) = (unsafe { bridge_ref(bridge) }) else {
        return std::ptr::null_mut();
    };
    let Some(method) = (unsafe { str_arg(method, "method name") }) else {
        return std::ptr::null_mut();
    };

    let response = if arguments_json.is_null() {
        channel::handle_json_call(bridge, method, "")
    } else {
        match unsafe { str_arg(arguments_json, "method arguments") } {
            Some(args) => channel::handle_json_call(bridge, method, args),
            None => channel::MethodResponse::invalid_args("Arguments must be JSON"),
        }
    };

    match CString::new(response.to_json()) {
        Ok(json) => json.into_raw(),
        Err(e) => {
            error!("handle_method_call: response contains NUL: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Free a string returned by this module.
///
/// # Safety
/// `s` must be a pointer returned by `fmod_bridge_handle_method_call`, or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmod_bridge_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe { drop(CString::from_raw(s)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_config() -> FmodBridgeConfig {
        FmodBridgeConfig {
            tick_interval_ms: 0,
            ..FmodBridgeConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = fmod_bridge_default_config();
        assert_eq!(cfg.max_channels, 512);
        assert_eq!(cfg.master_volume, 1.0);
        assert_eq!(cfg.tick_interval_ms, 16);
        assert_eq!(BridgeConfig::from(cfg), BridgeConfig::default());
    }

    #[test]
    fn test_config_conversion_sanitizes() {
        let config = BridgeConfig::from(FmodBridgeConfig {
            max_channels: -4,
            master_volume: f32::NAN,
            tick_interval_ms: 0,
            replay_policy: 7,
        });
        assert_eq!(config.max_channels, DEFAULT_MAX_CHANNELS);
        assert_eq!(config.master_volume, DEFAULT_MASTER_VOLUME);
        assert_eq!(config.tick_mode, TickMode::External);
        assert_eq!(config.replay_policy, ReplayPolicy::RestartInPlace);

        let config = BridgeConfig::from(FmodBridgeConfig {
            replay_policy: REPLAY_RECREATE,
            tick_interval_ms: 5,
            ..FmodBridgeConfig::default()
        });
        assert_eq!(config.replay_policy, ReplayPolicy::Recreate);
        assert_eq!(
            config.tick_mode,
            TickMode::Internal {
                interval: Duration::from_millis(5)
            }
        );
    }

    #[test]
    fn test_null_handles_are_rejected() {
        let path = CString::new("event:/SFX/Jump").unwrap();
        unsafe {
            assert!(!fmod_bridge_initialize(std::ptr::null()));
            assert!(!fmod_bridge_play_event(std::ptr::null(), path.as_ptr()));
            assert!(!fmod_bridge_set_master_paused(std::ptr::null(), true));
            assert!(fmod_bridge_handle_method_call(
                std::ptr::null(),
                path.as_ptr(),
                std::ptr::null()
            )
            .is_null());
            fmod_bridge_update(std::ptr::null());
            fmod_bridge_release(std::ptr::null());
            fmod_bridge_destroy(std::ptr::null_mut());
            fmod_bridge_string_free(std::ptr::null_mut());
        }
    }

    #[cfg(not(feature = "fmod"))]
    #[test]
    fn test_session_through_c_abi() {
        let cfg = external_config();
        let bridge = unsafe { fmod_bridge_create_with_config(&cfg) };
        assert!(!bridge.is_null());

        let bank = b"event:/Music/Theme\nevent:/SFX/Jump\n";
        let theme = CString::new("event:/Music/Theme").unwrap();
        let intensity = CString::new("Intensity").unwrap();
        unsafe {
            assert!(!fmod_bridge_play_event(bridge, theme.as_ptr()));
            assert!(fmod_bridge_initialize(bridge));
            assert!(fmod_bridge_load_bank_memory(bridge, bank.as_ptr(), bank.len()));
            assert!(!fmod_bridge_load_bank_memory(bridge, std::ptr::null(), 4));

            assert!(fmod_bridge_play_event(bridge, theme.as_ptr()));
            assert!(fmod_bridge_is_playing(bridge, theme.as_ptr()));
            assert!(fmod_bridge_set_parameter(
                bridge,
                theme.as_ptr(),
                intensity.as_ptr(),
                0.5
            ));
            assert!(!fmod_bridge_set_parameter(
                bridge,
                theme.as_ptr(),
                std::ptr::null(),
                0.5
            ));
            assert!(fmod_bridge_set_volume(bridge, theme.as_ptr(), 0.8));
            assert!(fmod_bridge_set_paused(bridge, theme.as_ptr(), false));
            assert!(fmod_bridge_set_master_volume(bridge, 0.5));
            assert!(fmod_bridge_log_available_events(bridge));
            fmod_bridge_update(bridge);

            assert!(fmod_bridge_stop_event(bridge, theme.as_ptr()));
            assert!(!fmod_bridge_stop_event(bridge, theme.as_ptr()));

            fmod_bridge_release(bridge);
            assert!(!fmod_bridge_is_playing(bridge, theme.as_ptr()));
            fmod_bridge_destroy(bridge);
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let cfg = external_config();
        let bridge = unsafe { fmod_bridge_create_with_config(&cfg) };
        let bad = CString::new(vec![0xffu8, 0xfe]).unwrap();
        unsafe {
            assert!(!fmod_bridge_play_event(bridge, bad.as_ptr()));
            assert!(!fmod_bridge_load_bank_file(bridge, bad.as_ptr()));
            fmod_bridge_destroy(bridge);
        }
    }

    #[test]
    fn test_method_call_returns_json_envelope() {
        let cfg = external_config();
        let bridge = unsafe { fmod_bridge_create_with_config(&cfg) };
        let play = CString::new("playEvent").unwrap();
        let unknown = CString::new("getVersion").unwrap();
        let no_path = CString::new("{}").unwrap();

        let read = |ptr: *mut c_char| -> String {
            assert!(!ptr.is_null());
            let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
            unsafe { fmod_bridge_string_free(ptr) };
            s
        };

        unsafe {
            assert_eq!(
                read(fmod_bridge_handle_method_call(
                    bridge,
                    play.as_ptr(),
                    no_path.as_ptr()
                )),
                r#"{"status":"error","code":"INVALID_ARGS","message":"Event path required"}"#
            );
            assert_eq!(
                read(fmod_bridge_handle_method_call(
                    bridge,
                    unknown.as_ptr(),
                    std::ptr::null()
                )),
                r#"{"status":"not_implemented"}"#
            );
            fmod_bridge_destroy(bridge);
        }
    }
}
