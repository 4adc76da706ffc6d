// src/headless.rs
//
// In-process engine with no audio output.
//
// Used where no middleware is linked (the default C ABI build) and by the
// test suite. Banks are plain-text manifests: one event path per line,
// blank lines and `#` comments ignored. Every engine call is recorded so
// callers can check exactly what reached the engine.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::engine::{AudioEngine, BankListing, BankSource, EngineResult, PlaybackState, StopMode};
use crate::error::EngineError;

// Result codes reported by the headless engine.
pub const ERR_UNINITIALIZED: i32 = 1;
pub const ERR_INVALID_HANDLE: i32 = 2;
pub const ERR_EVENT_NOT_FOUND: i32 = 3;
pub const ERR_BANK_MALFORMED: i32 = 4;
pub const ERR_BANK_ALREADY_LOADED: i32 = 5;
pub const ERR_FILE: i32 = 6;
pub const ERR_BUS_NOT_FOUND: i32 = 7;
pub const ERR_INJECTED: i32 = 99;

/// Engine call that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Initialize,
    Bus,
    LoadBank,
    CreateInstance,
    Start,
    Stop,
    PlaybackState,
    Update,
}

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOp {
    Initialize { max_channels: i32 },
    Shutdown,
    LoadBank(String),
    CreateInstance { id: u64, path: String },
    Start(u64),
    Stop(u64, StopMode),
    Release(u64),
    SetParameter(u64, String, f32),
    SetPaused(u64, bool),
    SetVolume(u64, f32),
    SetBusPaused(bool),
    SetBusVolume(f32),
    Update,
}

/// Handle to a headless instance. Not `Clone`: the registry owns it.
#[derive(Debug, PartialEq, Eq)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Resolved event definition.
#[derive(Debug, Clone)]
pub struct EventRef {
    path: String,
}

/// Handle to the headless master bus.
#[derive(Debug)]
pub struct BusRef;

/// Observable state of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSnapshot {
    pub id: u64,
    pub path: String,
    pub state: PlaybackState,
    pub paused: bool,
    pub volume: f32,
    pub parameters: HashMap<String, f32>,
    pub released: bool,
}

struct HeadlessInstance {
    path: String,
    state: PlaybackState,
    paused: bool,
    volume: f32,
    parameters: HashMap<String, f32>,
    released: bool,
}

struct HeadlessBank {
    name: String,
    events: Vec<String>,
}

pub struct HeadlessEngine {
    initialized: bool,
    banks: Vec<HeadlessBank>,
    instances: HashMap<u64, HeadlessInstance>,
    next_id: u64,
    memory_banks: usize,
    bus_paused: bool,
    bus_volume: f32,
    keeps_fading: bool,
    faults: HashSet<FaultPoint>,
    ops: Vec<EngineOp>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            initialized: false,
            banks: Vec::new(),
            instances: HashMap::new(),
            next_id: 1,
            memory_banks: 0,
            bus_paused: false,
            bus_volume: 0.0,
            keeps_fading: true,
            faults: HashSet::new(),
            ops: Vec::new(),
        }
    }

    /// Engine that drops instances as soon as they are released, fading or not.
    pub fn without_fade_keepalive() -> Self {
        Self {
            keeps_fading: false,
            ..Self::new()
        }
    }

    /// Make every subsequent call at `point` fail until [`Self::clear_faults`].
    pub fn fail_on(&mut self, point: FaultPoint) {
        self.faults.insert(point);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Every engine call since creation (or the last [`Self::clear_ops`]).
    pub fn ops(&self) -> &[EngineOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Instances the engine still tracks (unreleased, or released but still fading).
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instances of `path` that have not been released.
    pub fn unreleased_for(&self, path: &str) -> Vec<InstanceSnapshot> {
        let mut found: Vec<InstanceSnapshot> = self
            .instances
            .iter()
            .filter(|(_, inst)| inst.path == path && !inst.released)
            .map(|(&id, inst)| snapshot(id, inst))
            .collect();
        found.sort_by_key(|s| s.id);
        found
    }

    pub fn snapshot(&self, id: u64) -> Option<InstanceSnapshot> {
        self.instances.get(&id).map(|inst| snapshot(id, inst))
    }

    pub fn bus_paused(&self) -> bool {
        self.bus_paused
    }

    pub fn bus_volume(&self) -> f32 {
        self.bus_volume
    }

    /// Force the reported state of an instance, e.g. to simulate a one-shot ending.
    pub fn set_state(&mut self, id: u64, state: PlaybackState) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.state = state;
        }
    }

    fn check_fault(&self, point: FaultPoint) -> EngineResult<()> {
        if self.faults.contains(&point) {
            return Err(EngineError::new(
                ERR_INJECTED,
                format!("injected failure at {:?}", point),
            ));
        }
        Ok(())
    }

    fn check_initialized(&self) -> EngineResult<()> {
        if !self.initialized {
            return Err(EngineError::new(ERR_UNINITIALIZED, "engine not initialized"));
        }
        Ok(())
    }

    fn live(&self, id: &InstanceId) -> EngineResult<&HeadlessInstance> {
        match self.instances.get(&id.0) {
            Some(inst) if !inst.released => Ok(inst),
            _ => Err(invalid_handle(id)),
        }
    }

    fn live_mut(&mut self, id: &InstanceId) -> EngineResult<&mut HeadlessInstance> {
        match self.instances.get_mut(&id.0) {
            Some(inst) if !inst.released => Ok(inst),
            _ => Err(invalid_handle(id)),
        }
    }
}

fn invalid_handle(id: &InstanceId) -> EngineError {
    EngineError::new(ERR_INVALID_HANDLE, format!("invalid instance handle {}", id.0))
}

fn snapshot(id: u64, inst: &HeadlessInstance) -> InstanceSnapshot {
    InstanceSnapshot {
        id,
        path: inst.path.clone(),
        state: inst.state,
        paused: inst.paused,
        volume: inst.volume,
        parameters: inst.parameters.clone(),
        released: inst.released,
    }
}

/// Parse a manifest bank into event paths.
fn parse_manifest(bytes: &[u8]) -> EngineResult<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| EngineError::new(ERR_BANK_MALFORMED, "bank is not valid UTF-8"))?;

    let mut events = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.starts_with("event:/") {
            return Err(EngineError::new(
                ERR_BANK_MALFORMED,
                format!("unexpected bank entry '{}'", line),
            ));
        }
        events.push(line.to_string());
    }

    if events.is_empty() {
        return Err(EngineError::new(ERR_BANK_MALFORMED, "bank declares no events"));
    }
    Ok(events)
}

impl AudioEngine for HeadlessEngine {
    type Description = EventRef;
    type Instance = InstanceId;
    type Bus = BusRef;

    fn initialize(&mut self, max_channels: i32) -> EngineResult<()> {
        self.ops.push(EngineOp::Initialize { max_channels });
        self.check_fault(FaultPoint::Initialize)?;
        self.initialized = true;
        debug!("headless engine initialized ({} channels)", max_channels);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.ops.push(EngineOp::Shutdown);
        self.initialized = false;
        self.banks.clear();
        self.instances.clear();
        self.memory_banks = 0;
        self.bus_paused = false;
        self.bus_volume = 0.0;
    }

    fn bus(&mut self, path: &str) -> EngineResult<BusRef> {
        self.check_initialized()?;
        self.check_fault(FaultPoint::Bus)?;
        if path != crate::engine::MASTER_BUS_PATH {
            return Err(EngineError::new(
                ERR_BUS_NOT_FOUND,
                format!("bus '{}' not found", path),
            ));
        }
        Ok(BusRef)
    }

    fn set_bus_paused(&mut self, _bus: &BusRef, paused: bool) -> EngineResult<()> {
        self.ops.push(EngineOp::SetBusPaused(paused));
        self.check_initialized()?;
        self.bus_paused = paused;
        Ok(())
    }

    fn set_bus_volume(&mut self, _bus: &BusRef, volume: f32) -> EngineResult<()> {
        self.ops.push(EngineOp::SetBusVolume(volume));
        self.check_initialized()?;
        self.bus_volume = volume;
        Ok(())
    }

    fn load_bank(&mut self, source: BankSource<'_>) -> EngineResult<()> {
        let name = source.describe();
        self.ops.push(EngineOp::LoadBank(name.clone()));
        self.check_initialized()?;
        self.check_fault(FaultPoint::LoadBank)?;

        let (name, events) = match source {
            BankSource::File(path) => {
                if self.banks.iter().any(|b| b.name == name) {
                    return Err(EngineError::new(
                        ERR_BANK_ALREADY_LOADED,
                        format!("bank {} already loaded", name),
                    ));
                }
                let bytes = std::fs::read(path).map_err(|e| {
                    EngineError::new(ERR_FILE, format!("cannot read {}: {}", name, e))
                })?;
                (name, parse_manifest(&bytes)?)
            }
            BankSource::Memory(bytes) => {
                let events = parse_manifest(bytes)?;
                self.memory_banks += 1;
                (format!("memory bank #{}", self.memory_banks), events)
            }
        };

        self.banks.push(HeadlessBank { name, events });
        Ok(())
    }

    fn event(&mut self, path: &str) -> EngineResult<EventRef> {
        self.check_initialized()?;
        let known = self
            .banks
            .iter()
            .any(|bank| bank.events.iter().any(|e| e == path));
        if !known {
            return Err(EngineError::new(
                ERR_EVENT_NOT_FOUND,
                format!("event '{}' not found", path),
            ));
        }
        Ok(EventRef {
            path: path.to_string(),
        })
    }

    fn create_instance(&mut self, description: &EventRef) -> EngineResult<InstanceId> {
        self.check_initialized()?;
        self.check_fault(FaultPoint::CreateInstance)?;

        let id = self.next_id;
        self.next_id += 1;
        self.ops.push(EngineOp::CreateInstance {
            id,
            path: description.path.clone(),
        });
        self.instances.insert(
            id,
            HeadlessInstance {
                path: description.path.clone(),
                state: PlaybackState::Stopped,
                paused: false,
                volume: 1.0,
                parameters: HashMap::new(),
                released: false,
            },
        );
        Ok(InstanceId(id))
    }

    fn start(&mut self, instance: &InstanceId) -> EngineResult<()> {
        self.ops.push(EngineOp::Start(instance.0));
        self.check_fault(FaultPoint::Start)?;
        let inst = self.live_mut(instance)?;
        inst.state = PlaybackState::Starting;
        Ok(())
    }

    fn stop(&mut self, instance: &InstanceId, mode: StopMode) -> EngineResult<()> {
        self.ops.push(EngineOp::Stop(instance.0, mode));
        self.check_fault(FaultPoint::Stop)?;
        let inst = self.live_mut(instance)?;
        inst.state = match (mode, inst.state) {
            (StopMode::Immediate, _) => PlaybackState::Stopped,
            (StopMode::AllowFadeOut, PlaybackState::Stopped) => PlaybackState::Stopped,
            (StopMode::AllowFadeOut, _) => PlaybackState::Stopping,
        };
        Ok(())
    }

    fn release(&mut self, instance: InstanceId) -> EngineResult<()> {
        self.ops.push(EngineOp::Release(instance.0));
        let keeps_fading = self.keeps_fading;
        let inst = self.live_mut(&instance)?;
        if keeps_fading && inst.state == PlaybackState::Stopping {
            // Destroyed once the fade completes on a later update.
            inst.released = true;
        } else {
            self.instances.remove(&instance.0);
        }
        Ok(())
    }

    fn playback_state(&self, instance: &InstanceId) -> EngineResult<PlaybackState> {
        self.check_fault(FaultPoint::PlaybackState)?;
        Ok(self.live(instance)?.state)
    }

    fn set_parameter(&mut self, instance: &InstanceId, name: &str, value: f32) -> EngineResult<()> {
        self.ops
            .push(EngineOp::SetParameter(instance.0, name.to_string(), value));
        let inst = self.live_mut(instance)?;
        inst.parameters.insert(name.to_string(), value);
        Ok(())
    }

    fn set_paused(&mut self, instance: &InstanceId, paused: bool) -> EngineResult<()> {
        self.ops.push(EngineOp::SetPaused(instance.0, paused));
        self.live_mut(instance)?.paused = paused;
        Ok(())
    }

    fn set_volume(&mut self, instance: &InstanceId, volume: f32) -> EngineResult<()> {
        self.ops.push(EngineOp::SetVolume(instance.0, volume));
        self.live_mut(instance)?.volume = volume;
        Ok(())
    }

    fn update(&mut self) -> EngineResult<()> {
        self.ops.push(EngineOp::Update);
        self.check_initialized()?;
        self.check_fault(FaultPoint::Update)?;

        for inst in self.instances.values_mut() {
            inst.state = match inst.state {
                PlaybackState::Starting => PlaybackState::Playing,
                PlaybackState::Stopping => PlaybackState::Stopped,
                other => other,
            };
        }
        self.instances
            .retain(|_, inst| !(inst.released && inst.state == PlaybackState::Stopped));
        Ok(())
    }

    fn list_events(&self) -> EngineResult<Vec<BankListing>> {
        self.check_initialized()?;
        Ok(self
            .banks
            .iter()
            .map(|bank| BankListing {
                bank: bank.name.clone(),
                events: bank.events.clone(),
            })
            .collect())
    }

    fn keeps_fading_instances(&self) -> bool {
        self.keeps_fading
    }
}
