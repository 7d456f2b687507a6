//! Exported device, volume and session functions backed by Windows Core Audio.
//!
//! COM is initialized for the duration of each call on the calling thread.

use crate::{
    code_call, json_call, optional_str, required_str, DeviceResponse, FfiError, OperationResult,
    VolumeEngine, VolumeEngineHandle,
};
use std::ffi::c_char;
use volume_controller::audio::com::{ComGuard, ComPlatform};
use volume_controller::AudioError;

/// Run `f` against the COM platform with COM initialized.
///
/// Callers already in the multithreaded apartment keep it.
fn with_com<T>(
    engine: &VolumeEngine,
    f: impl FnOnce(crate::Operations<ComPlatform>) -> Result<T, AudioError>,
) -> Result<T, FfiError> {
    let _com = ComGuard::new()?;
    Ok(f(engine.operations(ComPlatform))?)
}

// ============================================================================
// FFI Functions - Devices
// ============================================================================

/// Get the active playback devices.
///
/// # Returns
/// JSON string with device list. Caller must free with volume_engine_free_string().
/// Returns null on error.
#[no_mangle]
pub extern "C" fn volume_engine_get_playback_devices(handle: VolumeEngineHandle) -> *mut c_char {
    json_call(handle, "get playback devices", |engine| {
        with_com(engine, |ops| ops.playback_devices())
    })
}

/// Get the default playback device.
///
/// # Returns
/// JSON string with device info. Caller must free with volume_engine_free_string().
/// Returns null on error.
#[no_mangle]
pub extern "C" fn volume_engine_get_default_device(handle: VolumeEngineHandle) -> *mut c_char {
    json_call(handle, "get default device", |engine| {
        let device = with_com(engine, |ops| ops.default_device())?;
        Ok(DeviceResponse { device })
    })
}

/// Make a device the default playback device for every role.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn volume_engine_set_default_device(
    handle: VolumeEngineHandle,
    device_id: *const c_char,
) -> i32 {
    code_call(handle, "set default device", |engine| {
        let id = unsafe { required_str(device_id, "device ID")? };
        with_com(engine, |ops| ops.set_default_device(id))
    })
}

// ============================================================================
// FFI Functions - Master Volume
// ============================================================================

/// Get master volume (0-100) and mute state.
///
/// # Arguments
/// * `device_id` - Endpoint ID, or null for the default playback device
///
/// # Returns
/// JSON string with volume data. Caller must free with volume_engine_free_string().
#[no_mangle]
pub extern "C" fn volume_engine_get_volume(
    handle: VolumeEngineHandle,
    device_id: *const c_char,
) -> *mut c_char {
    json_call(handle, "get volume", |engine| {
        let id = unsafe { optional_str(device_id, "device ID")? };
        with_com(engine, |ops| ops.volume(id))
    })
}

/// Set master volume (0-100). Negative values are treated as 0.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn volume_engine_set_volume(
    handle: VolumeEngineHandle,
    device_id: *const c_char,
    volume: f32,
) -> i32 {
    code_call(handle, "set volume", |engine| {
        let id = unsafe { optional_str(device_id, "device ID")? };
        with_com(engine, |ops| ops.set_volume(id, volume))
    })
}

/// Get master mute state.
///
/// # Returns
/// JSON string with operation result including is_muted.
#[no_mangle]
pub extern "C" fn volume_engine_get_mute(
    handle: VolumeEngineHandle,
    device_id: *const c_char,
) -> *mut c_char {
    json_call(handle, "get mute", |engine| {
        let id = unsafe { optional_str(device_id, "device ID")? };
        let muted = with_com(engine, |ops| ops.mute(id))?;
        Ok(OperationResult::muted(muted))
    })
}

/// Set master mute state.
///
/// # Arguments
/// * `muted` - 1 to mute, 0 to unmute
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn volume_engine_set_mute(
    handle: VolumeEngineHandle,
    device_id: *const c_char,
    muted: i32,
) -> i32 {
    code_call(handle, "set mute", |engine| {
        let id = unsafe { optional_str(device_id, "device ID")? };
        with_com(engine, |ops| ops.set_mute(id, muted != 0))
    })
}

// ============================================================================
// FFI Functions - Sessions
// ============================================================================

/// Get the audio sessions of the default playback device.
///
/// # Returns
/// JSON string with session list. Caller must free with volume_engine_free_string().
#[no_mangle]
pub extern "C" fn volume_engine_get_sessions(handle: VolumeEngineHandle) -> *mut c_char {
    json_call(handle, "get sessions", |engine| {
        with_com(engine, |ops| ops.session_list())
    })
}

/// Get the session volume (0-100) of a process.
///
/// # Returns
/// JSON string with the process ID and volume, or null when the process has
/// no session (error code SessionNotFound).
#[no_mangle]
pub extern "C" fn volume_engine_get_app_volume(handle: VolumeEngineHandle, pid: u32) -> *mut c_char {
    json_call(handle, "get app volume", |engine| {
        with_com(engine, |ops| ops.app_volume(pid))
    })
}

/// Set the session volume (0-100, clamped) of a process.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn volume_engine_set_app_volume(
    handle: VolumeEngineHandle,
    pid: u32,
    volume: f32,
) -> i32 {
    code_call(handle, "set app volume", |engine| {
        with_com(engine, |ops| ops.set_app_volume(pid, volume))
    })
}

/// Get the session mute state of a process.
///
/// # Returns
/// JSON string with operation result including is_muted.
#[no_mangle]
pub extern "C" fn volume_engine_get_app_mute(handle: VolumeEngineHandle, pid: u32) -> *mut c_char {
    json_call(handle, "get app mute", |engine| {
        let muted = with_com(engine, |ops| ops.app_mute(pid))?;
        Ok(OperationResult::muted(muted))
    })
}

/// Set the session mute state of a process.
///
/// # Arguments
/// * `muted` - 1 to mute, 0 to unmute
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn volume_engine_set_app_mute(
    handle: VolumeEngineHandle,
    pid: u32,
    muted: i32,
) -> i32 {
    code_call(handle, "set app mute", |engine| {
        with_com(engine, |ops| ops.set_app_mute(pid, muted != 0))
    })
}
