// src/channel.rs
//
// Method-channel dispatcher.
//
// Flutter plugins receive `(method, arguments)` pairs on a named channel and
// answer with a success value, an error, or "not implemented". Arguments
// arrive here as JSON; each method decodes its own typed argument struct and
// anything that does not decode is answered with INVALID_ARGS before the
// engine is touched.
//
// Operations that return void on the Dart side acknowledge even when the
// engine refused the call; the failure has already been logged.

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::{AudioBridge, BankRequest};
use crate::engine::AudioEngine;
use crate::error::{BridgeError, Result};

/// Name of the method channel the Dart side opens.
pub const CHANNEL_NAME: &str = "fmod_flutter";

/// Error code for missing or malformed arguments.
pub const INVALID_ARGS: &str = "INVALID_ARGS";

/// One incoming call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success {
        #[serde(skip_serializing_if = "Value::is_null")]
        result: Value,
    },
    Error {
        code: String,
        message: String,
    },
    NotImplemented,
}

impl MethodResponse {
    /// Success without a value.
    pub fn ack() -> Self {
        MethodResponse::Success {
            result: Value::Null,
        }
    }

    pub fn success(result: impl Into<Value>) -> Self {
        MethodResponse::Success {
            result: result.into(),
        }
    }

    pub fn invalid_args(message: &str) -> Self {
        MethodResponse::Error {
            code: INVALID_ARGS.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success { .. })
    }

    /// JSON envelope, e.g. `{"status":"success","result":true}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"error","code":"ENCODING","message":"unencodable response"}"#.to_string()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Argument payloads
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct BanksArgs {
    banks: Vec<BankArg>,
}

/// Bank given either as an asset path or as the bank bytes.
#[derive(Deserialize)]
#[serde(untagged)]
enum BankArg {
    Path(String),
    Bytes(Vec<u8>),
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct ParameterArgs {
    path: String,
    parameter: String,
    value: f64,
}

#[derive(Deserialize)]
struct PausedArgs {
    path: String,
    paused: bool,
}

#[derive(Deserialize)]
struct VolumeArgs {
    path: String,
    volume: f64,
}

#[derive(Deserialize)]
struct MasterPausedArgs {
    paused: bool,
}

#[derive(Deserialize)]
struct MasterVolumeArgs {
    volume: f64,
}

fn decode<T: DeserializeOwned>(
    arguments: &Value,
    message: &str,
) -> std::result::Result<T, MethodResponse> {
    T::deserialize(arguments).map_err(|e| {
        let err = BridgeError::InvalidArguments(message.to_string());
        debug!("method channel: {} ({})", err, e);
        MethodResponse::invalid_args(message)
    })
}

/// Void acknowledgement. Engine failures were logged where they happened.
fn acknowledge(_outcome: Result<()>) -> MethodResponse {
    MethodResponse::ack()
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════════════════

/// Route one call to the bridge.
pub fn handle_method_call<E: AudioEngine + 'static>(
    bridge: &AudioBridge<E>,
    call: &MethodCall,
) -> MethodResponse {
    dispatch(bridge, call).unwrap_or_else(|invalid| invalid)
}

/// Route a call whose arguments are a JSON document. Empty arguments mean none.
pub fn handle_json_call<E: AudioEngine + 'static>(
    bridge: &AudioBridge<E>,
    method: &str,
    arguments_json: &str,
) -> MethodResponse {
    let arguments = if arguments_json.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(arguments_json) {
            Ok(value) => value,
            Err(e) => {
                debug!("method channel: {} arguments are not JSON: {}", method, e);
                return MethodResponse::invalid_args("Arguments must be JSON");
            }
        }
    };
    handle_method_call(bridge, &MethodCall::new(method, arguments))
}

fn dispatch<E: AudioEngine + 'static>(
    bridge: &AudioBridge<E>,
    call: &MethodCall,
) -> std::result::Result<MethodResponse, MethodResponse> {
    let args = &call.arguments;

    let response = match call.method.as_str() {
        "initialize" => MethodResponse::success(bridge.initialize().is_ok()),

        "loadBanks" => {
            let BanksArgs { banks } = decode(args, "Banks list required")?;
            let requests = banks.iter().map(|bank| match bank {
                BankArg::Path(path) => BankRequest::Asset(path),
                BankArg::Bytes(bytes) => BankRequest::Bytes(bytes),
            });
            MethodResponse::success(bridge.load_banks(requests))
        }

        "playEvent" => {
            let PathArgs { path } = decode(args, "Event path required")?;
            acknowledge(bridge.play_event(&path))
        }

        "stopEvent" => {
            let PathArgs { path } = decode(args, "Event path required")?;
            acknowledge(bridge.stop_event(&path))
        }

        "setParameter" => {
            let ParameterArgs {
                path,
                parameter,
                value,
            } = decode(args, "Path, parameter, and value required")?;
            acknowledge(bridge.set_parameter(&path, &parameter, value as f32))
        }

        "setPaused" => {
            let PausedArgs { path, paused } = decode(args, "Path and paused state required")?;
            acknowledge(bridge.set_paused(&path, paused))
        }

        "setVolume" => {
            let VolumeArgs { path, volume } = decode(args, "Path and volume required")?;
            acknowledge(bridge.set_volume(&path, volume as f32))
        }

        "setMasterPaused" => {
            let MasterPausedArgs { paused } = decode(args, "Paused state required")?;
            MethodResponse::success(bridge.set_master_paused(paused).is_ok())
        }

        "setMasterVolume" => {
            let MasterVolumeArgs { volume } = decode(args, "Volume required")?;
            MethodResponse::success(bridge.set_master_volume(volume as f32).is_ok())
        }

        "update" => {
            bridge.update();
            MethodResponse::ack()
        }

        "release" => {
            bridge.release();
            MethodResponse::ack()
        }

        "logAvailableEvents" => {
            let _ = bridge.log_available_events();
            MethodResponse::ack()
        }

        other => {
            debug!("method channel: {} not implemented", other);
            MethodResponse::NotImplemented
        }
    };

    Ok(response)
}
