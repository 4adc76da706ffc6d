// src/fmod/sys.rs
//
// Raw declarations for the subset of the FMOD Studio C API the bridge uses.
// The libraries themselves ship with the host app (FMOD's licence forbids
// redistributing them here).

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_float, c_int, c_uint, c_void};

pub type FMOD_RESULT = c_int;
pub type FMOD_BOOL = c_int;

pub const FMOD_OK: FMOD_RESULT = 0;

/// Header version the declarations below match (2.02.22).
pub const FMOD_VERSION: c_uint = 0x0002_0222;

pub const FMOD_INIT_NORMAL: c_uint = 0;
pub const FMOD_STUDIO_INIT_NORMAL: c_uint = 0;
pub const FMOD_STUDIO_LOAD_BANK_NORMAL: c_uint = 0;

// FMOD_STUDIO_LOAD_MEMORY_MODE
pub const FMOD_STUDIO_LOAD_MEMORY: c_int = 0;

// FMOD_OUTPUTTYPE
pub const FMOD_OUTPUTTYPE_AUTODETECT: c_int = 0;

// FMOD_STUDIO_STOP_MODE
pub const FMOD_STUDIO_STOP_ALLOWFADEOUT: c_int = 0;
pub const FMOD_STUDIO_STOP_IMMEDIATE: c_int = 1;

// FMOD_STUDIO_PLAYBACK_STATE
pub const FMOD_STUDIO_PLAYBACK_PLAYING: c_int = 0;
pub const FMOD_STUDIO_PLAYBACK_SUSTAINING: c_int = 1;
pub const FMOD_STUDIO_PLAYBACK_STOPPED: c_int = 2;
pub const FMOD_STUDIO_PLAYBACK_STARTING: c_int = 3;
pub const FMOD_STUDIO_PLAYBACK_STOPPING: c_int = 4;

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    FMOD_SYSTEM,
    FMOD_STUDIO_SYSTEM,
    FMOD_STUDIO_BANK,
    FMOD_STUDIO_BUS,
    FMOD_STUDIO_EVENTDESCRIPTION,
    FMOD_STUDIO_EVENTINSTANCE,
);

#[cfg_attr(windows, link(name = "fmodstudio_vc"))]
#[cfg_attr(not(windows), link(name = "fmodstudio"))]
unsafe extern "C" {
    pub fn FMOD_Studio_System_Create(
        system: *mut *mut FMOD_STUDIO_SYSTEM,
        headerversion: c_uint,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_Initialize(
        system: *mut FMOD_STUDIO_SYSTEM,
        maxchannels: c_int,
        studioflags: c_uint,
        flags: c_uint,
        extradriverdata: *mut c_void,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_Release(system: *mut FMOD_STUDIO_SYSTEM) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_Update(system: *mut FMOD_STUDIO_SYSTEM) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_GetCoreSystem(
        system: *mut FMOD_STUDIO_SYSTEM,
        coresystem: *mut *mut FMOD_SYSTEM,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_GetEvent(
        system: *mut FMOD_STUDIO_SYSTEM,
        pathOrID: *const c_char,
        event: *mut *mut FMOD_STUDIO_EVENTDESCRIPTION,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_GetBus(
        system: *mut FMOD_STUDIO_SYSTEM,
        pathOrID: *const c_char,
        bus: *mut *mut FMOD_STUDIO_BUS,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_LoadBankFile(
        system: *mut FMOD_STUDIO_SYSTEM,
        filename: *const c_char,
        flags: c_uint,
        bank: *mut *mut FMOD_STUDIO_BANK,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_LoadBankMemory(
        system: *mut FMOD_STUDIO_SYSTEM,
        buffer: *const c_char,
        length: c_int,
        mode: c_int,
        flags: c_uint,
        bank: *mut *mut FMOD_STUDIO_BANK,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_GetBankCount(
        system: *mut FMOD_STUDIO_SYSTEM,
        count: *mut c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_System_GetBankList(
        system: *mut FMOD_STUDIO_SYSTEM,
        array: *mut *mut FMOD_STUDIO_BANK,
        capacity: c_int,
        count: *mut c_int,
    ) -> FMOD_RESULT;

    pub fn FMOD_Studio_Bank_GetPath(
        bank: *mut FMOD_STUDIO_BANK,
        path: *mut c_char,
        size: c_int,
        retrieved: *mut c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_Bank_GetEventCount(
        bank: *mut FMOD_STUDIO_BANK,
        count: *mut c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_Bank_GetEventList(
        bank: *mut FMOD_STUDIO_BANK,
        array: *mut *mut FMOD_STUDIO_EVENTDESCRIPTION,
        capacity: c_int,
        count: *mut c_int,
    ) -> FMOD_RESULT;

    pub fn FMOD_Studio_EventDescription_GetPath(
        eventdescription: *mut FMOD_STUDIO_EVENTDESCRIPTION,
        path: *mut c_char,
        size: c_int,
        retrieved: *mut c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventDescription_CreateInstance(
        eventdescription: *mut FMOD_STUDIO_EVENTDESCRIPTION,
        instance: *mut *mut FMOD_STUDIO_EVENTINSTANCE,
    ) -> FMOD_RESULT;

    pub fn FMOD_Studio_EventInstance_Start(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_Stop(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
        mode: c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_Release(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_GetPlaybackState(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
        state: *mut c_int,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_SetParameterByName(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
        name: *const c_char,
        value: c_float,
        ignoreseekspeed: FMOD_BOOL,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_SetPaused(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
        paused: FMOD_BOOL,
    ) -> FMOD_RESULT;
    pub fn FMOD_Studio_EventInstance_SetVolume(
        eventinstance: *mut FMOD_STUDIO_EVENTINSTANCE,
        volume: c_float,
    ) -> FMOD_RESULT;

    pub fn FMOD_Studio_Bus_SetPaused(bus: *mut FMOD_STUDIO_BUS, paused: FMOD_BOOL) -> FMOD_RESULT;
    pub fn FMOD_Studio_Bus_SetVolume(bus: *mut FMOD_STUDIO_BUS, volume: c_float) -> FMOD_RESULT;
}

#[cfg_attr(windows, link(name = "fmod_vc"))]
#[cfg_attr(not(windows), link(name = "fmod"))]
unsafe extern "C" {
    pub fn FMOD_System_SetOutput(system: *mut FMOD_SYSTEM, output: c_int) -> FMOD_RESULT;
}
