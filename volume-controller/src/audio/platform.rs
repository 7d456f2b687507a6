//! Seams over the platform audio object graph.
//!
//! Each trait mirrors one COM interface the core talks to. Implementations
//! own exactly one foreign reference per value and release it on drop, so
//! scoping a value is enough to guarantee the release on every exit path.
//!
//! # Threading
//!
//! The Windows implementation requires COM to be initialized on the calling
//! thread (see `ComGuard`). Values are not shared across threads.

use super::device::{AudioError, DataFlow, DeviceRole, DeviceState, DeviceStateMask};
use super::property::{PropertyKey, RawVariant};
use super::session::SessionState;
use uuid::Uuid;

/// Entry point to a host audio subsystem.
pub trait AudioPlatform {
    type Enumerator: DeviceEnumerator;
    type Policy: PolicyConfig;

    /// Create a fresh device enumerator (MMDeviceEnumerator).
    fn create_enumerator(&self) -> Result<Self::Enumerator, AudioError>;

    /// Create the default-endpoint policy object (PolicyConfigClient).
    fn create_policy_config(&self) -> Result<Self::Policy, AudioError>;

    /// Executable name of a running process, if it can be queried.
    fn process_name(&self, pid: u32) -> Option<String>;
}

pub type EndpointOf<P> = <<P as AudioPlatform>::Enumerator as DeviceEnumerator>::Endpoint;
pub type VolumeOf<P> = <EndpointOf<P> as Endpoint>::Volume;
pub type MeterOf<P> = <EndpointOf<P> as Endpoint>::Meter;
pub type SessionManagerOf<P> = <EndpointOf<P> as Endpoint>::Sessions;
pub type SessionOf<P> = <SessionManagerOf<P> as SessionManager>::Session;

/// IMMDeviceEnumerator.
pub trait DeviceEnumerator {
    type Endpoint: Endpoint;

    fn enum_endpoints(
        &self,
        flow: DataFlow,
        mask: DeviceStateMask,
    ) -> Result<Vec<Self::Endpoint>, AudioError>;

    fn default_endpoint(&self, flow: DataFlow, role: DeviceRole)
        -> Result<Self::Endpoint, AudioError>;

    fn endpoint(&self, device_id: &str) -> Result<Self::Endpoint, AudioError>;
}

/// IMMDevice.
pub trait Endpoint {
    type Store: PropertyStore;
    type Volume: EndpointVolumeControl;
    type Meter: MeterControl;
    type Sessions: SessionManager;

    fn id(&self) -> Result<String, AudioError>;

    fn state(&self) -> Result<DeviceState, AudioError>;

    fn open_property_store(&self) -> Result<Self::Store, AudioError>;

    fn activate_volume(&self) -> Result<Self::Volume, AudioError>;

    fn activate_meter(&self) -> Result<Self::Meter, AudioError>;

    fn activate_session_manager(&self) -> Result<Self::Sessions, AudioError>;
}

/// IPropertyStore, read-only.
pub trait PropertyStore {
    type Variant: RawVariant;

    fn count(&self) -> Result<u32, AudioError>;

    fn key_at(&self, index: u32) -> Result<PropertyKey, AudioError>;

    fn value(&self, key: &PropertyKey) -> Result<Self::Variant, AudioError>;
}

/// Volume range of an endpoint in decibels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRange {
    pub min_db: f32,
    pub max_db: f32,
    pub increment_db: f32,
}

/// Position within the endpoint's discrete volume steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStep {
    pub step: u32,
    pub step_count: u32,
}

/// IAudioEndpointVolume. `context` is the event context GUID passed to
/// change notifications.
pub trait EndpointVolumeControl {
    fn master_volume_scalar(&self) -> Result<f32, AudioError>;

    fn set_master_volume_scalar(&self, level: f32, context: &Uuid) -> Result<(), AudioError>;

    fn master_volume_db(&self) -> Result<f32, AudioError>;

    fn set_master_volume_db(&self, level_db: f32, context: &Uuid) -> Result<(), AudioError>;

    fn volume_range(&self) -> Result<VolumeRange, AudioError>;

    fn step_info(&self) -> Result<VolumeStep, AudioError>;

    fn step_up(&self, context: &Uuid) -> Result<(), AudioError>;

    fn step_down(&self, context: &Uuid) -> Result<(), AudioError>;

    fn channel_count(&self) -> Result<u32, AudioError>;

    fn mute(&self) -> Result<bool, AudioError>;

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError>;
}

/// IAudioMeterInformation.
pub trait MeterControl {
    fn peak_value(&self) -> Result<f32, AudioError>;

    fn channel_peaks(&self) -> Result<Vec<f32>, AudioError>;
}

/// IAudioSessionManager2.
pub trait SessionManager {
    type Session: SessionControl;

    /// Every session currently registered, in enumeration order.
    fn sessions(&self) -> Result<Vec<Self::Session>, AudioError>;
}

/// IAudioSessionControl2.
pub trait SessionControl {
    type Volume: SimpleVolumeControl;

    fn process_id(&self) -> Result<u32, AudioError>;

    fn state(&self) -> Result<SessionState, AudioError>;

    fn display_name(&self) -> Result<String, AudioError>;

    fn set_display_name(&self, name: &str, context: &Uuid) -> Result<(), AudioError>;

    fn icon_path(&self) -> Result<String, AudioError>;

    fn set_icon_path(&self, path: &str, context: &Uuid) -> Result<(), AudioError>;

    fn grouping_param(&self) -> Result<Uuid, AudioError>;

    fn set_grouping_param(&self, grouping: &Uuid, context: &Uuid) -> Result<(), AudioError>;

    fn session_identifier(&self) -> Result<String, AudioError>;

    fn session_instance_identifier(&self) -> Result<String, AudioError>;

    fn is_system_sounds_session(&self) -> Result<bool, AudioError>;

    /// The session's ISimpleAudioVolume facet.
    fn simple_volume(&self) -> Result<Self::Volume, AudioError>;
}

/// ISimpleAudioVolume.
pub trait SimpleVolumeControl {
    fn master_volume(&self) -> Result<f32, AudioError>;

    fn set_master_volume(&self, level: f32, context: &Uuid) -> Result<(), AudioError>;

    fn mute(&self) -> Result<bool, AudioError>;

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError>;
}

/// IPolicyConfig (undocumented but stable).
pub trait PolicyConfig {
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError>;
}

/// Fresh event context for a mutating call.
pub fn event_context() -> Uuid {
    Uuid::new_v4()
}

/// Resolve an endpoint by ID, or the default render endpoint for the
/// multimedia role when no ID is given.
pub fn resolve_endpoint<P: AudioPlatform>(
    platform: &P,
    device_id: Option<&str>,
) -> Result<EndpointOf<P>, AudioError> {
    let enumerator = platform.create_enumerator()?;
    match device_id {
        Some(id) => enumerator.endpoint(id),
        None => enumerator.default_endpoint(DataFlow::Render, DeviceRole::Multimedia),
    }
}
