//! FFI bindings for the PC volume controller.
//!
//! This crate provides C ABI functions for use from C# via P/Invoke. Data
//! crosses the boundary as UTF-8 JSON strings that the caller frees with
//! `volume_engine_free_string`. All functions use panic::catch_unwind to
//! prevent Rust panics from unwinding across the FFI boundary.
//!
//! Device and session operations are only exported on Windows.

pub mod engine;

#[cfg(windows)]
mod exports;

#[cfg(windows)]
pub use exports::*;

pub use engine::Operations;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::debug;
use volume_controller::audio::{AudioPlatform, PlaybackDevice, SessionSummary};
use volume_controller::{logging, AudioError, SpeakerFilter};

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    DeviceNotFound = -3,
    ComError = -4,
    JsonError = -5,
    VolumeNotAvailable = -6,
    NoDefaultDevice = -7,
    SessionNotFound = -8,
    OperationFailed = -9,
    Panic = -99,
}

impl From<AudioError> for ErrorCode {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            AudioError::NoDefaultDevice => ErrorCode::NoDefaultDevice,
            AudioError::ComInitFailed(_) => ErrorCode::ComError,
            AudioError::EnumerationFailed(_) => ErrorCode::ComError,
            AudioError::PlatformCall(_) => ErrorCode::ComError,
            AudioError::SetDefaultFailed(_) => ErrorCode::OperationFailed,
            AudioError::VolumeNotAvailable
            | AudioError::MeterNotAvailable
            | AudioError::SessionManagerNotAvailable => ErrorCode::VolumeNotAvailable,
            AudioError::SessionNotFound { .. } | AudioError::SessionDisposed => {
                ErrorCode::SessionNotFound
            }
            AudioError::StringConversion(_) => ErrorCode::JsonError,
            AudioError::InvalidPattern(_) | AudioError::InvalidLevel(_) => {
                ErrorCode::InvalidArgument
            }
        }
    }
}

/// A failed call: the code handed to the caller plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiError {
    pub code: ErrorCode,
    pub message: String,
}

impl FfiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AudioError> for FfiError {
    fn from(err: AudioError) -> Self {
        let message = err.to_string();
        Self::new(ErrorCode::from(err), message)
    }
}

impl From<serde_json::Error> for FfiError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::JsonError, err.to_string())
    }
}

// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// Configuration for engine creation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fallback log level when RUST_LOG is not set; logging stays off if absent
    #[serde(default)]
    pub log_level: Option<String>,

    /// Extra case-insensitive patterns for descriptions that are not speakers
    #[serde(default)]
    pub excluded_descriptions: Vec<String>,
}

/// A playback device as offered to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackDeviceDto {
    pub id: String,
    pub name: String,
    pub is_current_device: bool,
}

impl From<PlaybackDevice> for PlaybackDeviceDto {
    fn from(device: PlaybackDevice) -> Self {
        Self {
            id: device.id,
            name: device.name,
            is_current_device: device.is_current_device,
        }
    }
}

/// Response containing a list of devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<PlaybackDeviceDto>,
}

/// Response containing a single device.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub device: PlaybackDeviceDto,
}

/// Master volume on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeData {
    pub volume: f32,
    pub is_muted: bool,
}

/// Session volume of one process on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppVolumeData {
    pub pid: u32,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDto {
    pub process_id: u32,
    pub label: String,
    pub state: String,
    pub volume: f32,
    pub is_muted: bool,
    pub is_system_sounds: bool,
}

impl From<SessionSummary> for SessionDto {
    fn from(summary: SessionSummary) -> Self {
        Self {
            process_id: summary.process_id,
            label: summary.label,
            state: summary.state.to_string(),
            volume: summary.volume,
            is_muted: summary.muted,
            is_system_sounds: summary.is_system_sounds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionDto>,
}

/// Response containing operation result.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
}

impl OperationResult {
    pub fn muted(is_muted: bool) -> Self {
        Self {
            success: true,
            error: None,
            is_muted: Some(is_muted),
        }
    }
}

// ============================================================================
// Engine Handle Type
// ============================================================================

/// Opaque handle to the volume engine. Actually points to a VolumeEngine struct.
pub type VolumeEngineHandle = *mut c_void;

/// Internal engine state.
///
/// Platform objects are created per call, so the engine only carries
/// configuration and can be used from any thread that initializes COM.
pub struct VolumeEngine {
    filter: SpeakerFilter,
}

impl VolumeEngine {
    pub fn from_config(config: &EngineConfig) -> Result<Self, FfiError> {
        if let Some(level) = &config.log_level {
            logging::init_logging(level);
        }
        let filter = SpeakerFilter::with_patterns(&config.excluded_descriptions)?;
        Ok(Self { filter })
    }

    pub fn operations<P: AudioPlatform + Clone>(&self, platform: P) -> Operations<P> {
        Operations::new(platform, self.filter.clone())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with volume_engine_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    // Interior NULs cannot cross the boundary; drop them.
    let cleaned: String = s.chars().filter(|c| *c != '\0').collect();
    CString::new(cleaned).map_or(ptr::null_mut(), CString::into_raw)
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Required string argument.
unsafe fn required_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, FfiError> {
    parse_c_str(ptr).ok_or_else(|| FfiError::new(ErrorCode::InvalidArgument, format!("Invalid {name}")))
}

/// Optional string argument: null means "not given", invalid UTF-8 is an error.
#[cfg_attr(not(windows), allow(dead_code))]
unsafe fn optional_str<'a>(ptr: *const c_char, name: &str) -> Result<Option<&'a str>, FfiError> {
    if ptr.is_null() {
        return Ok(None);
    }
    required_str(ptr, name).map(Some)
}

#[cfg_attr(not(windows), allow(dead_code))]
unsafe fn engine_ref<'a>(handle: VolumeEngineHandle) -> Result<&'a VolumeEngine, FfiError> {
    if handle.is_null() {
        return Err(FfiError::new(ErrorCode::InvalidHandle, "Null engine handle"));
    }
    Ok(&*(handle as *const VolumeEngine))
}

/// Run a call that returns JSON. Null on failure, with the last error set.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn json_call<T, F>(handle: VolumeEngineHandle, what: &str, f: F) -> *mut c_char
where
    T: Serialize,
    F: FnOnce(&VolumeEngine) -> Result<T, FfiError>,
{
    clear_last_error();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let engine = unsafe { engine_ref(handle)? };
        let value = f(engine)?;
        Ok::<_, FfiError>(serde_json::to_string(&value)?)
    }));

    match result {
        Ok(Ok(json)) => alloc_c_string(&json),
        Ok(Err(e)) => {
            debug!(call = what, code = ?e.code, error = %e.message, "FFI call failed");
            set_last_error(e.code, e.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            ptr::null_mut()
        }
    }
}

/// Run a call that returns only a status code.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn code_call<F>(handle: VolumeEngineHandle, what: &str, f: F) -> i32
where
    F: FnOnce(&VolumeEngine) -> Result<(), FfiError>,
{
    clear_last_error();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let engine = unsafe { engine_ref(handle)? };
        f(engine)
    }));

    match result {
        Ok(Ok(())) => ErrorCode::Success as i32,
        Ok(Err(e)) => {
            debug!(call = what, code = ?e.code, error = %e.message, "FFI call failed");
            let code = e.code;
            set_last_error(code, e.message);
            code as i32
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            ErrorCode::Panic as i32
        }
    }
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Create a new volume engine instance.
///
/// # Arguments
/// * `config_json` - JSON configuration string (can be null for defaults)
///
/// # Returns
/// Handle to the engine, or null on failure. Check volume_engine_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with volume_engine_destroy().
#[no_mangle]
pub extern "C" fn volume_engine_create(config_json: *const c_char) -> VolumeEngineHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let config = if config_json.is_null() {
            EngineConfig::default()
        } else {
            let json = unsafe { required_str(config_json, "configuration")? };
            serde_json::from_str::<EngineConfig>(json)?
        };

        let engine = Box::new(VolumeEngine::from_config(&config)?);
        Ok::<_, FfiError>(Box::into_raw(engine) as VolumeEngineHandle)
    });

    match result {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            set_last_error(e.code, e.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during engine creation");
            ptr::null_mut()
        }
    }
}

/// Destroy a volume engine instance.
///
/// # Safety
/// The handle must have been created by volume_engine_create() and must not be used after this call.
#[no_mangle]
pub extern "C" fn volume_engine_destroy(handle: VolumeEngineHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = Box::from_raw(handle as *mut VolumeEngine);
    });
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the volume_engine_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn volume_engine_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn volume_engine_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with volume_engine_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn volume_engine_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with volume_engine_free_string().
#[no_mangle]
pub extern "C" fn volume_engine_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================
