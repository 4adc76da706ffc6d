// src/main.rs
//
// Sanity run of the bridge against the headless engine, driven through the
// method channel the way the Dart side drives it.

use fmod_bridge::{
    AssetResolver, AudioBridge, BridgeConfig, HeadlessEngine, MethodCall, ReplayPolicy,
    handle_method_call,
};
use serde_json::{Value, json};

/// ===============================
/// Test Bank
/// ===============================

const SANITY_BANK: &str = "\
# sanity bank
event:/Music/Theme
event:/SFX/Jump
event:/UI/Click
";

fn call(bridge: &AudioBridge<HeadlessEngine>, method: &str, arguments: Value) {
    let response = handle_method_call(bridge, &MethodCall::new(method, arguments));
    println!("{:<18} -> {}", method, response.to_json());
}

/// ===============================
/// Main
/// ===============================

fn main() {
    let config = BridgeConfig::new()
        .with_external_tick()
        .with_replay_policy(ReplayPolicy::RestartInPlace);
    let bridge =
        AudioBridge::with_resolver(HeadlessEngine::new(), config, AssetResolver::default());

    println!("Starting bridge sanity test…");

    // --------------------------------
    // Engine + banks
    // --------------------------------

    call(&bridge, "initialize", Value::Null);
    let bank: Vec<u8> = SANITY_BANK.bytes().collect();
    call(&bridge, "loadBanks", json!({ "banks": [bank] }));

    // --------------------------------
    // Events
    // --------------------------------

    call(&bridge, "playEvent", json!({ "path": "event:/Music/Theme" }));
    call(
        &bridge,
        "setParameter",
        json!({ "path": "event:/Music/Theme", "parameter": "Intensity", "value": 0.75 }),
    );
    call(&bridge, "playEvent", json!({ "path": "event:/SFX/Jump" }));

    for frame in 0..3 {
        call(&bridge, "update", Value::Null);
        println!(
            "frame {}: {} registered, theme playing = {}",
            frame,
            bridge.event_count(),
            bridge.is_playing("event:/Music/Theme")
        );
    }

    // Replay restarts the same instance.
    call(&bridge, "playEvent", json!({ "path": "event:/Music/Theme" }));
    call(&bridge, "setMasterPaused", json!({ "paused": true }));
    call(&bridge, "setMasterPaused", json!({ "paused": false }));

    // --------------------------------
    // Error paths
    // --------------------------------

    call(&bridge, "playEvent", json!({}));
    call(&bridge, "stopEvent", json!({ "path": "event:/Nope" }));
    call(&bridge, "getVersion", Value::Null);

    // --------------------------------
    // Teardown
    // --------------------------------

    call(&bridge, "stopEvent", json!({ "path": "event:/Music/Theme" }));
    call(&bridge, "release", Value::Null);
    println!("{} registered after release", bridge.event_count());

    println!("Sanity test completed.");
}
