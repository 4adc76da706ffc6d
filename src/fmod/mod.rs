// src/fmod/mod.rs
//
// FMOD Studio implementation of `AudioEngine`.
//
// Thin layer over the C API: every call is checked and failures surface as
// `EngineError` carrying the raw FMOD_RESULT. The Studio API is thread-safe
// unless initialized with FMOD_STUDIO_INIT_SYNCHRONOUS_UPDATE /
// FMOD_INIT_THREAD_UNSAFE, neither of which is used here, so the handles can
// move to the update thread.

mod sys;

use std::ffi::{CString, c_char, c_int};
use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::engine::{AudioEngine, BankListing, BankSource, EngineResult, PlaybackState, StopMode};
use crate::error::EngineError;

// FMOD_RESULT values used for failures detected on this side of the API.
const FMOD_ERR_INVALID_HANDLE: c_int = 30;
const FMOD_ERR_INVALID_PARAM: c_int = 31;

struct System(NonNull<sys::FMOD_STUDIO_SYSTEM>);

unsafe impl Send for System {}

pub struct EventDescription(NonNull<sys::FMOD_STUDIO_EVENTDESCRIPTION>);

pub struct EventInstance(NonNull<sys::FMOD_STUDIO_EVENTINSTANCE>);

unsafe impl Send for EventInstance {}

pub struct Bus(NonNull<sys::FMOD_STUDIO_BUS>);

unsafe impl Send for Bus {}

/// FMOD Studio system. Created by `initialize`, freed by `shutdown` or drop.
#[derive(Default)]
pub struct FmodStudio {
    system: Option<System>,
}

fn check(result: sys::FMOD_RESULT, call: &str) -> EngineResult<()> {
    if result == sys::FMOD_OK {
        Ok(())
    } else {
        Err(EngineError::new(result, format!("{} failed", call)))
    }
}

fn non_null<T>(raw: *mut T, call: &str) -> EngineResult<NonNull<T>> {
    NonNull::new(raw)
        .ok_or_else(|| EngineError::new(FMOD_ERR_INVALID_HANDLE, format!("{} returned null", call)))
}

fn c_string(s: &str) -> EngineResult<CString> {
    CString::new(s).map_err(|_| {
        EngineError::new(FMOD_ERR_INVALID_PARAM, format!("'{}' contains a NUL byte", s))
    })
}

/// Read a path through one of FMOD's `GetPath(handle, buf, size, retrieved)`
/// calls: ask for the length first, then fill a buffer of that size.
fn read_path<F>(call: &str, get: F) -> EngineResult<String>
where
    F: Fn(*mut c_char, c_int, *mut c_int) -> sys::FMOD_RESULT,
{
    let mut needed: c_int = 0;
    check(get(ptr::null_mut(), 0, &mut needed), call)?;
    if needed <= 0 {
        return Ok(String::new());
    }

    let mut buf = vec![0u8; needed as usize];
    let mut retrieved: c_int = 0;
    check(get(buf.as_mut_ptr().cast(), needed, &mut retrieved), call)?;

    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

fn playback_state_from_raw(raw: c_int) -> EngineResult<PlaybackState> {
    match raw {
        sys::FMOD_STUDIO_PLAYBACK_PLAYING => Ok(PlaybackState::Playing),
        sys::FMOD_STUDIO_PLAYBACK_SUSTAINING => Ok(PlaybackState::Sustaining),
        sys::FMOD_STUDIO_PLAYBACK_STOPPED => Ok(PlaybackState::Stopped),
        sys::FMOD_STUDIO_PLAYBACK_STARTING => Ok(PlaybackState::Starting),
        sys::FMOD_STUDIO_PLAYBACK_STOPPING => Ok(PlaybackState::Stopping),
        other => Err(EngineError::new(
            FMOD_ERR_INVALID_PARAM,
            format!("unknown playback state {}", other),
        )),
    }
}

fn fmod_bool(value: bool) -> sys::FMOD_BOOL {
    value as sys::FMOD_BOOL
}

impl FmodStudio {
    pub fn new() -> Self {
        Self::default()
    }

    fn system(&self) -> EngineResult<*mut sys::FMOD_STUDIO_SYSTEM> {
        self.system
            .as_ref()
            .map(|s| s.0.as_ptr())
            .ok_or_else(|| EngineError::new(FMOD_ERR_INVALID_HANDLE, "studio system not created"))
    }

    /// Route output to the platform's default device. Failure is not fatal.
    fn select_default_output(system: *mut sys::FMOD_STUDIO_SYSTEM) {
        let mut core = ptr::null_mut();
        let result = check(
            unsafe { sys::FMOD_Studio_System_GetCoreSystem(system, &mut core) },
            "FMOD_Studio_System_GetCoreSystem",
        )
        .and_then(|()| {
            check(
                unsafe { sys::FMOD_System_SetOutput(core, sys::FMOD_OUTPUTTYPE_AUTODETECT) },
                "FMOD_System_SetOutput",
            )
        });
        if let Err(e) = result {
            warn!("fmod: could not select output device: {}", e);
        }
    }

    fn bank_listing(bank: *mut sys::FMOD_STUDIO_BANK) -> EngineResult<BankListing> {
        let name = read_path("FMOD_Studio_Bank_GetPath", |buf, size, retrieved| unsafe {
            sys::FMOD_Studio_Bank_GetPath(bank, buf, size, retrieved)
        })?;

        let mut count: c_int = 0;
        check(
            unsafe { sys::FMOD_Studio_Bank_GetEventCount(bank, &mut count) },
            "FMOD_Studio_Bank_GetEventCount",
        )?;

        let mut descriptions = vec![ptr::null_mut(); count.max(0) as usize];
        let mut filled: c_int = 0;
        if count > 0 {
            check(
                unsafe {
                    sys::FMOD_Studio_Bank_GetEventList(
                        bank,
                        descriptions.as_mut_ptr(),
                        count,
                        &mut filled,
                    )
                },
                "FMOD_Studio_Bank_GetEventList",
            )?;
        }
        descriptions.truncate(filled.max(0) as usize);

        let mut events = Vec::with_capacity(descriptions.len());
        for desc in descriptions {
            events.push(read_path(
                "FMOD_Studio_EventDescription_GetPath",
                |buf, size, retrieved| unsafe {
                    sys::FMOD_Studio_EventDescription_GetPath(desc, buf, size, retrieved)
                },
            )?);
        }

        Ok(BankListing { bank: name, events })
    }
}

impl Drop for FmodStudio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioEngine for FmodStudio {
    type Description = EventDescription;
    type Instance = EventInstance;
    type Bus = Bus;

    fn initialize(&mut self, max_channels: i32) -> EngineResult<()> {
        self.shutdown();

        let mut raw = ptr::null_mut();
        check(
            unsafe { sys::FMOD_Studio_System_Create(&mut raw, sys::FMOD_VERSION) },
            "FMOD_Studio_System_Create",
        )?;
        let system = non_null(raw, "FMOD_Studio_System_Create")?;
        // Held from here on so a failure below is still released by shutdown.
        self.system = Some(System(system));

        Self::select_default_output(system.as_ptr());

        check(
            unsafe {
                sys::FMOD_Studio_System_Initialize(
                    system.as_ptr(),
                    max_channels,
                    sys::FMOD_STUDIO_INIT_NORMAL,
                    sys::FMOD_INIT_NORMAL,
                    ptr::null_mut(),
                )
            },
            "FMOD_Studio_System_Initialize",
        )?;
        debug!("fmod: studio system initialized");
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(system) = self.system.take() {
            let released = check(
                unsafe { sys::FMOD_Studio_System_Release(system.0.as_ptr()) },
                "FMOD_Studio_System_Release",
            );
            if let Err(e) = released {
                warn!("fmod: {}", e);
            }
        }
    }

    fn bus(&mut self, path: &str) -> EngineResult<Bus> {
        let system = self.system()?;
        let path = c_string(path)?;
        let mut raw = ptr::null_mut();
        check(
            unsafe { sys::FMOD_Studio_System_GetBus(system, path.as_ptr(), &mut raw) },
            "FMOD_Studio_System_GetBus",
        )?;
        Ok(Bus(non_null(raw, "FMOD_Studio_System_GetBus")?))
    }

    fn set_bus_paused(&mut self, bus: &Bus, paused: bool) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_Bus_SetPaused(bus.0.as_ptr(), fmod_bool(paused)) },
            "FMOD_Studio_Bus_SetPaused",
        )
    }

    fn set_bus_volume(&mut self, bus: &Bus, volume: f32) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_Bus_SetVolume(bus.0.as_ptr(), volume) },
            "FMOD_Studio_Bus_SetVolume",
        )
    }

    fn load_bank(&mut self, source: BankSource<'_>) -> EngineResult<()> {
        let system = self.system()?;
        let mut bank = ptr::null_mut();

        match source {
            BankSource::File(path) => {
                let path = path.to_str().ok_or_else(|| {
                    EngineError::new(FMOD_ERR_INVALID_PARAM, "bank path is not valid UTF-8")
                })?;
                let path = c_string(path)?;
                check(
                    unsafe {
                        sys::FMOD_Studio_System_LoadBankFile(
                            system,
                            path.as_ptr(),
                            sys::FMOD_STUDIO_LOAD_BANK_NORMAL,
                            &mut bank,
                        )
                    },
                    "FMOD_Studio_System_LoadBankFile",
                )
            }
            BankSource::Memory(bytes) => {
                let length = c_int::try_from(bytes.len()).map_err(|_| {
                    EngineError::new(FMOD_ERR_INVALID_PARAM, "bank exceeds 2 GiB")
                })?;
                check(
                    unsafe {
                        sys::FMOD_Studio_System_LoadBankMemory(
                            system,
                            bytes.as_ptr().cast(),
                            length,
                            sys::FMOD_STUDIO_LOAD_MEMORY,
                            sys::FMOD_STUDIO_LOAD_BANK_NORMAL,
                            &mut bank,
                        )
                    },
                    "FMOD_Studio_System_LoadBankMemory",
                )
            }
        }
    }

    fn event(&mut self, path: &str) -> EngineResult<EventDescription> {
        let system = self.system()?;
        let path = c_string(path)?;
        let mut raw = ptr::null_mut();
        check(
            unsafe { sys::FMOD_Studio_System_GetEvent(system, path.as_ptr(), &mut raw) },
            "FMOD_Studio_System_GetEvent",
        )?;
        Ok(EventDescription(non_null(raw, "FMOD_Studio_System_GetEvent")?))
    }

    fn create_instance(&mut self, description: &EventDescription) -> EngineResult<EventInstance> {
        let mut raw = ptr::null_mut();
        check(
            unsafe {
                sys::FMOD_Studio_EventDescription_CreateInstance(description.0.as_ptr(), &mut raw)
            },
            "FMOD_Studio_EventDescription_CreateInstance",
        )?;
        Ok(EventInstance(non_null(
            raw,
            "FMOD_Studio_EventDescription_CreateInstance",
        )?))
    }

    fn start(&mut self, instance: &EventInstance) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_EventInstance_Start(instance.0.as_ptr()) },
            "FMOD_Studio_EventInstance_Start",
        )
    }

    fn stop(&mut self, instance: &EventInstance, mode: StopMode) -> EngineResult<()> {
        let mode = match mode {
            StopMode::AllowFadeOut => sys::FMOD_STUDIO_STOP_ALLOWFADEOUT,
            StopMode::Immediate => sys::FMOD_STUDIO_STOP_IMMEDIATE,
        };
        check(
            unsafe { sys::FMOD_Studio_EventInstance_Stop(instance.0.as_ptr(), mode) },
            "FMOD_Studio_EventInstance_Stop",
        )
    }

    fn release(&mut self, instance: EventInstance) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_EventInstance_Release(instance.0.as_ptr()) },
            "FMOD_Studio_EventInstance_Release",
        )
    }

    fn playback_state(&self, instance: &EventInstance) -> EngineResult<PlaybackState> {
        let mut raw: c_int = sys::FMOD_STUDIO_PLAYBACK_STOPPED;
        check(
            unsafe { sys::FMOD_Studio_EventInstance_GetPlaybackState(instance.0.as_ptr(), &mut raw) },
            "FMOD_Studio_EventInstance_GetPlaybackState",
        )?;
        playback_state_from_raw(raw)
    }

    fn set_parameter(&mut self, instance: &EventInstance, name: &str, value: f32) -> EngineResult<()> {
        let name = c_string(name)?;
        check(
            unsafe {
                sys::FMOD_Studio_EventInstance_SetParameterByName(
                    instance.0.as_ptr(),
                    name.as_ptr(),
                    value,
                    fmod_bool(false),
                )
            },
            "FMOD_Studio_EventInstance_SetParameterByName",
        )
    }

    fn set_paused(&mut self, instance: &EventInstance, paused: bool) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_EventInstance_SetPaused(instance.0.as_ptr(), fmod_bool(paused)) },
            "FMOD_Studio_EventInstance_SetPaused",
        )
    }

    fn set_volume(&mut self, instance: &EventInstance, volume: f32) -> EngineResult<()> {
        check(
            unsafe { sys::FMOD_Studio_EventInstance_SetVolume(instance.0.as_ptr(), volume) },
            "FMOD_Studio_EventInstance_SetVolume",
        )
    }

    fn update(&mut self) -> EngineResult<()> {
        let system = self.system()?;
        check(
            unsafe { sys::FMOD_Studio_System_Update(system) },
            "FMOD_Studio_System_Update",
        )
    }

    fn list_events(&self) -> EngineResult<Vec<BankListing>> {
        let system = self.system()?;

        let mut count: c_int = 0;
        check(
            unsafe { sys::FMOD_Studio_System_GetBankCount(system, &mut count) },
            "FMOD_Studio_System_GetBankCount",
        )?;
        if count <= 0 {
            return Ok(Vec::new());
        }

        let mut banks = vec![ptr::null_mut(); count as usize];
        let mut filled: c_int = 0;
        check(
            unsafe {
                sys::FMOD_Studio_System_GetBankList(system, banks.as_mut_ptr(), count, &mut filled)
            },
            "FMOD_Studio_System_GetBankList",
        )?;
        banks.truncate(filled.max(0) as usize);

        banks.into_iter().map(Self::bank_listing).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_mapping() {
        assert_eq!(playback_state_from_raw(0).unwrap(), PlaybackState::Playing);
        assert_eq!(playback_state_from_raw(1).unwrap(), PlaybackState::Sustaining);
        assert_eq!(playback_state_from_raw(2).unwrap(), PlaybackState::Stopped);
        assert_eq!(playback_state_from_raw(3).unwrap(), PlaybackState::Starting);
        assert_eq!(playback_state_from_raw(4).unwrap(), PlaybackState::Stopping);
        assert!(playback_state_from_raw(9).is_err());
    }

    #[test]
    fn test_calls_without_system_fail() {
        let mut studio = FmodStudio::new();
        let err = studio.update().unwrap_err();
        assert_eq!(err.code, FMOD_ERR_INVALID_HANDLE);
        assert!(studio.list_events().is_err());
        assert!(studio.event("event:/A").is_err());
        // Nothing to release.
        studio.shutdown();
    }

    #[test]
    fn test_strings_with_nul_are_rejected() {
        let err = c_string("event:/A\0B").unwrap_err();
        assert_eq!(err.code, FMOD_ERR_INVALID_PARAM);
    }
}
