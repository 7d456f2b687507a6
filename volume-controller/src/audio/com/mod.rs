//! Windows Core Audio implementation of the platform seams.
//!
//! Every wrapper holds one COM interface pointer; windows-rs releases it when
//! the wrapper is dropped. COM must be initialized on the calling thread
//! before any of these types are used (see [`ComGuard`]).

mod enumerator;
mod policy;
mod session;
mod variant;
mod volume;

pub use enumerator::{ComEndpoint, ComEnumerator, ComPropertyStore};
pub use policy::ComPolicyConfig;
pub use session::{ComSessionControl, ComSessionManager, ComSimpleVolume};
pub use variant::ComVariant;
pub use volume::{ComEndpointVolume, ComMeter};

use super::device::{AudioError, PlatformError};
use super::platform::AudioPlatform;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;
use windows::core::{GUID, HRESULT, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, BOOL, RPC_E_CHANGED_MODE};
use windows::Win32::System::Com::{
    CoInitializeEx, CoTaskMemFree, CoUninitialize, COINIT_APARTMENTTHREADED,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};

impl From<windows::core::Error> for AudioError {
    fn from(e: windows::core::Error) -> Self {
        AudioError::PlatformCall(platform_error(e))
    }
}

pub(crate) fn platform_error(e: windows::core::Error) -> PlatformError {
    PlatformError::new(e.code().0, e.message())
}

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    ///
    /// A thread that already joined the multithreaded apartment (e.g. a .NET
    /// thread-pool worker) is used as is; Core Audio works there too.
    pub fn new() -> Result<Self, AudioError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        let initialized = owns_initialization(hr)?;
        if !initialized {
            debug!("COM already initialized in another apartment mode");
        }
        Ok(Self { initialized })
    }
}

/// Whether a CoInitializeEx result must be balanced by CoUninitialize.
///
/// S_OK and S_FALSE both count as an initialization. RPC_E_CHANGED_MODE means
/// the thread keeps its existing apartment and nothing was initialized.
fn owns_initialization(hr: HRESULT) -> Result<bool, AudioError> {
    if hr == RPC_E_CHANGED_MODE {
        return Ok(false);
    }
    hr.ok()
        .map_err(|e| AudioError::ComInitFailed(platform_error(e)))?;
    Ok(true)
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// The host's Core Audio subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComPlatform;

impl AudioPlatform for ComPlatform {
    type Enumerator = ComEnumerator;
    type Policy = ComPolicyConfig;

    fn create_enumerator(&self) -> Result<ComEnumerator, AudioError> {
        ComEnumerator::new()
    }

    fn create_policy_config(&self) -> Result<ComPolicyConfig, AudioError> {
        ComPolicyConfig::new()
    }

    /// Executable name without extension, like the Task Manager's process
    /// column.
    fn process_name(&self, pid: u32) -> Option<String> {
        let path = unsafe { query_image_path(pid) }.ok()?;
        Path::new(&path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

unsafe fn query_image_path(pid: u32) -> Result<String, AudioError> {
    let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL(0), pid)?;

    let mut buffer = [0u16; 1024];
    let mut len = buffer.len() as u32;
    let result = QueryFullProcessImageNameW(
        process,
        PROCESS_NAME_WIN32,
        PWSTR(buffer.as_mut_ptr()),
        &mut len,
    );
    if let Err(e) = CloseHandle(process) {
        debug!(pid, error = %e, "CloseHandle failed");
    }
    result?;

    String::from_utf16(&buffer[..len as usize])
        .map_err(|e| AudioError::StringConversion(e.to_string()))
}

/// Null-terminated UTF-16 copy of `s`.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub(crate) fn as_pcwstr(wide: &[u16]) -> PCWSTR {
    PCWSTR::from_raw(wide.as_ptr())
}

/// Copy a callee-allocated string and free it with CoTaskMemFree.
pub(crate) unsafe fn take_co_string(value: PWSTR) -> Result<String, AudioError> {
    if value.is_null() {
        return Ok(String::new());
    }
    let text = value.to_string();
    CoTaskMemFree(Some(value.0 as *const _));
    text.map_err(|e| AudioError::StringConversion(e.to_string()))
}

pub(crate) fn to_guid(id: &Uuid) -> GUID {
    let (data1, data2, data3, data4) = id.as_fields();
    GUID::from_values(data1, data2, data3, *data4)
}

pub(crate) fn from_guid(guid: &GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}
