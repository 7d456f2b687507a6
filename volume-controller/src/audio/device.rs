//! Audio device data models.
//!
//! Defines the core data structures for representing audio endpoints,
//! their state, roles, and the error type shared by the audio layer.

use super::property::{DeviceProperty, PropertyKey, PropertyValue};
use bitflags::bitflags;
use std::collections::HashMap;
use thiserror::Error;

/// An audio endpoint with its decoded property store.
///
/// Built fresh on every enumeration call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDevice {
    /// Unique Windows endpoint ID (opaque string from IMMDevice::GetId)
    pub id: String,

    /// Lifecycle state at the time of enumeration
    pub state: DeviceState,

    /// Every property the endpoint's store reported, decoded
    pub properties: HashMap<PropertyKey, PropertyValue>,
}

impl AudioDevice {
    /// Create a new AudioDevice.
    pub fn new(
        id: String,
        state: DeviceState,
        properties: HashMap<PropertyKey, PropertyValue>,
    ) -> Self {
        Self {
            id,
            state,
            properties,
        }
    }

    /// Look up a decoded property by key.
    pub fn property(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Text form of a well-known property, empty if the store lacked it.
    pub fn well_known(&self, property: DeviceProperty) -> String {
        self.property(&property.key())
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    /// Device description, e.g. "Speakers" or "Microphone".
    pub fn description(&self) -> String {
        self.well_known(DeviceProperty::DeviceDesc)
    }

    pub fn container_id(&self) -> String {
        self.well_known(DeviceProperty::ContainerId)
    }

    pub fn enumerator_name(&self) -> String {
        self.well_known(DeviceProperty::EnumeratorName)
    }

    /// Name of the adapter the endpoint belongs to.
    pub fn interface_friendly_name(&self) -> String {
        self.well_known(DeviceProperty::InterfaceFriendlyName)
    }

    /// Full name as shown in the Windows sound settings.
    pub fn friendly_name(&self) -> String {
        self.well_known(DeviceProperty::FriendlyName)
    }

    pub fn is_active(&self) -> bool {
        self.state == DeviceState::Active
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.friendly_name())
    }
}

/// A playback device as offered to callers choosing an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDevice {
    pub id: String,

    /// Interface friendly name of the endpoint
    pub name: String,

    /// Whether this is the current default render device
    pub is_current_device: bool,
}

impl PlaybackDevice {
    /// Build from an enumerated device, marking it current when its ID
    /// matches the default endpoint ID.
    pub fn from_device(device: &AudioDevice, current_id: Option<&str>) -> Self {
        Self {
            id: device.id.clone(),
            name: device.interface_friendly_name(),
            is_current_device: current_id == Some(device.id.as_str()),
        }
    }
}

/// Audio device role (maps to Windows ERole enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceRole {
    /// Used by games, system sounds, most general applications
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::Console,
        DeviceRole::Multimedia,
        DeviceRole::Communications,
    ];
}

/// Direction of audio data through an endpoint (maps to EDataFlow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataFlow {
    Render = 0,
    Capture = 1,
    All = 2,
}

impl DataFlow {
    /// Whether an endpoint with flow `self` is included by a query for `query`.
    pub fn matches(self, query: DataFlow) -> bool {
        query == DataFlow::All || self == query
    }
}

/// Windows device state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Device is active and available for use
    Active,

    /// Device is disabled in Windows Sound settings
    Disabled,

    /// Device is not present (driver issue)
    NotPresent,

    /// Device is unplugged (for pluggable devices)
    Unplugged,
}

impl DeviceState {
    /// Convert a raw DEVICE_STATE value. Unknown values map to NotPresent.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => DeviceState::Active,
            2 => DeviceState::Disabled,
            8 => DeviceState::Unplugged,
            _ => DeviceState::NotPresent,
        }
    }

    pub fn bits(self) -> u32 {
        self.mask().bits()
    }

    pub fn mask(self) -> DeviceStateMask {
        match self {
            DeviceState::Active => DeviceStateMask::ACTIVE,
            DeviceState::Disabled => DeviceStateMask::DISABLED,
            DeviceState::NotPresent => DeviceStateMask::NOT_PRESENT,
            DeviceState::Unplugged => DeviceStateMask::UNPLUGGED,
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceState::Active => "active",
            DeviceState::Disabled => "disabled",
            DeviceState::NotPresent => "not present",
            DeviceState::Unplugged => "unplugged",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// State filter passed to endpoint enumeration (DEVICE_STATEMASK_*).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceStateMask: u32 {
        const ACTIVE = 0x1;
        const DISABLED = 0x2;
        const NOT_PRESENT = 0x4;
        const UNPLUGGED = 0x8;
    }
}

impl DeviceStateMask {
    pub const ALL: DeviceStateMask = DeviceStateMask::all();

    pub fn includes(self, state: DeviceState) -> bool {
        self.contains(state.mask())
    }
}

/// A failed platform call, carrying its HRESULT.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (HRESULT {code:#010x})")]
pub struct PlatformError {
    pub code: i32,
    pub message: String,
}

impl PlatformError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Audio service error types.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("No default device available")]
    NoDefaultDevice,

    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] PlatformError),

    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(#[source] PlatformError),

    #[error("Failed to set default device: {0}")]
    SetDefaultFailed(#[source] PlatformError),

    #[error("Volume control not available for device")]
    VolumeNotAvailable,

    #[error("Level meter not available for device")]
    MeterNotAvailable,

    #[error("Session manager not available for device")]
    SessionManagerNotAvailable,

    #[error("No audio session for process {pid}")]
    SessionNotFound { pid: u32 },

    #[error("Audio session used after it was disposed")]
    SessionDisposed,

    #[error("Windows API error: {0}")]
    PlatformCall(#[source] PlatformError),

    #[error("String conversion error: {0}")]
    StringConversion(String),

    #[error("Invalid device filter pattern: {0}")]
    InvalidPattern(String),

    #[error("Volume level must be a finite number, got {0}")]
    InvalidLevel(f32),
}
