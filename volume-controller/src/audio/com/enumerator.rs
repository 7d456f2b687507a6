//! Device enumeration using Windows MMDevice API.

use super::{as_pcwstr, from_guid, take_co_string, to_guid, to_wide, ComEndpointVolume, ComMeter};
use super::{ComSessionManager, ComVariant};
use crate::audio::device::{AudioError, DataFlow, DeviceRole, DeviceState, DeviceStateMask};
use crate::audio::platform::{DeviceEnumerator, Endpoint, PropertyStore};
use crate::audio::property::PropertyKey;
use tracing::debug;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioMeterInformation};
use windows::Win32::Media::Audio::{
    eAll, eCapture, eCommunications, eConsole, eMultimedia, eRender, EDataFlow, ERole,
    IAudioSessionManager2, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

fn data_flow(flow: DataFlow) -> EDataFlow {
    match flow {
        DataFlow::Render => eRender,
        DataFlow::Capture => eCapture,
        DataFlow::All => eAll,
    }
}

fn role(role: DeviceRole) -> ERole {
    match role {
        DeviceRole::Console => eConsole,
        DeviceRole::Multimedia => eMultimedia,
        DeviceRole::Communications => eCommunications,
    }
}

/// IMMDeviceEnumerator wrapper.
pub struct ComEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl ComEnumerator {
    /// Create a new enumerator.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| AudioError::EnumerationFailed(super::platform_error(e)))?;

            Ok(Self { enumerator })
        }
    }
}

impl DeviceEnumerator for ComEnumerator {
    type Endpoint = ComEndpoint;

    fn enum_endpoints(
        &self,
        flow: DataFlow,
        mask: DeviceStateMask,
    ) -> Result<Vec<ComEndpoint>, AudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow(flow), DEVICE_STATE(mask.bits()))
                .map_err(|e| AudioError::EnumerationFailed(super::platform_error(e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| AudioError::EnumerationFailed(super::platform_error(e)))?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                match collection.Item(i) {
                    Ok(device) => endpoints.push(ComEndpoint { device }),
                    Err(e) => debug!(index = i, error = %e, "Skipping endpoint"),
                }
            }
            Ok(endpoints)
        }
    }

    fn default_endpoint(
        &self,
        flow: DataFlow,
        device_role: DeviceRole,
    ) -> Result<ComEndpoint, AudioError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(data_flow(flow), role(device_role))
                .map_err(|_| AudioError::NoDefaultDevice)?;
            Ok(ComEndpoint { device })
        }
    }

    fn endpoint(&self, device_id: &str) -> Result<ComEndpoint, AudioError> {
        let device_id_wide = to_wide(device_id);
        unsafe {
            let device = self
                .enumerator
                .GetDevice(as_pcwstr(&device_id_wide))
                .map_err(|_| AudioError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })?;
            Ok(ComEndpoint { device })
        }
    }
}

/// IMMDevice wrapper.
pub struct ComEndpoint {
    device: IMMDevice,
}

impl Endpoint for ComEndpoint {
    type Store = ComPropertyStore;
    type Volume = ComEndpointVolume;
    type Meter = ComMeter;
    type Sessions = ComSessionManager;

    fn id(&self) -> Result<String, AudioError> {
        unsafe { take_co_string(self.device.GetId()?) }
    }

    fn state(&self) -> Result<DeviceState, AudioError> {
        let state = unsafe { self.device.GetState()? };
        Ok(DeviceState::from_bits(state.0))
    }

    fn open_property_store(&self) -> Result<ComPropertyStore, AudioError> {
        let store = unsafe { self.device.OpenPropertyStore(STGM(0))? };
        Ok(ComPropertyStore { store })
    }

    fn activate_volume(&self) -> Result<ComEndpointVolume, AudioError> {
        let volume: IAudioEndpointVolume = unsafe { self.device.Activate(CLSCTX_ALL, None)? };
        Ok(ComEndpointVolume::new(volume))
    }

    fn activate_meter(&self) -> Result<ComMeter, AudioError> {
        let meter: IAudioMeterInformation = unsafe { self.device.Activate(CLSCTX_ALL, None)? };
        Ok(ComMeter::new(meter))
    }

    fn activate_session_manager(&self) -> Result<ComSessionManager, AudioError> {
        let manager: IAudioSessionManager2 = unsafe { self.device.Activate(CLSCTX_ALL, None)? };
        Ok(ComSessionManager::new(manager))
    }
}

/// Read-only IPropertyStore wrapper.
pub struct ComPropertyStore {
    store: IPropertyStore,
}

impl PropertyStore for ComPropertyStore {
    type Variant = ComVariant;

    fn count(&self) -> Result<u32, AudioError> {
        Ok(unsafe { self.store.GetCount()? })
    }

    fn key_at(&self, index: u32) -> Result<PropertyKey, AudioError> {
        let mut key = PROPERTYKEY::default();
        unsafe { self.store.GetAt(index, &mut key)? };
        Ok(PropertyKey::new(from_guid(&key.fmtid), key.pid))
    }

    fn value(&self, key: &PropertyKey) -> Result<ComVariant, AudioError> {
        let key = PROPERTYKEY {
            fmtid: to_guid(&key.fmtid),
            pid: key.pid,
        };
        let value = unsafe { self.store.GetValue(&key)? };
        Ok(ComVariant::new(value))
    }
}
