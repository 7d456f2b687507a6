//! In-memory audio platform for tests.
//!
//! Mirrors the shape of the COM object graph closely enough to exercise the
//! core without Windows. Every handed-out object holds a [`RefToken`], so
//! tests can assert that no foreign reference outlives the call that made it.

use super::device::{AudioError, DataFlow, DeviceRole, DeviceState, DeviceStateMask, PlatformError};
use super::platform::{
    AudioPlatform, DeviceEnumerator, Endpoint, EndpointVolumeControl, MeterControl, PolicyConfig,
    PropertyStore, SessionControl, SessionManager, SimpleVolumeControl, VolumeRange, VolumeStep,
};
use super::property::{DeviceProperty, PropertyKey, RawVariant, VariantTag};
use super::session::SessionState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const E_INVALIDARG: i32 = 0x80070057u32 as i32;
const E_NOTFOUND: i32 = 0x80070490u32 as i32;
const E_FAIL: i32 = 0x80004005u32 as i32;

fn platform_error(code: i32, message: &str) -> AudioError {
    AudioError::PlatformCall(PlatformError::new(code, message))
}

/// One live foreign reference. Released on drop.
#[derive(Debug)]
pub struct RefToken {
    live: Arc<AtomicUsize>,
}

impl RefToken {
    fn acquire(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { live: live.clone() }
    }
}

impl Drop for RefToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Raw variant contents as a property store would hand them out.
#[derive(Debug, Clone, PartialEq)]
pub enum MockValue {
    /// VT_BOOL with its raw short
    Bool(i16),
    /// VT_LPWSTR; `None` is a null pointer
    WideStr(Option<String>),
    /// VT_UI4 bit pattern
    Int(i32),
    /// VT_CLSID; `None` is a null pointer
    Guid(Option<Uuid>),
    Blob(Vec<u8>),
    /// Any other tag, without payload
    Other(VariantTag),
}

impl MockValue {
    fn tag(&self) -> VariantTag {
        match self {
            MockValue::Bool(_) => VariantTag::BOOL,
            MockValue::WideStr(_) => VariantTag::LPWSTR,
            MockValue::Int(_) => VariantTag::UI4,
            MockValue::Guid(_) => VariantTag::CLSID,
            MockValue::Blob(_) => VariantTag::BLOB,
            MockValue::Other(tag) => *tag,
        }
    }
}

/// Endpoint volume state.
#[derive(Debug, Clone, PartialEq)]
pub struct MockVolume {
    pub scalar: f32,
    pub muted: bool,
    pub range: VolumeRange,
    pub step_count: u32,
    pub channel_count: u32,
}

impl Default for MockVolume {
    fn default() -> Self {
        Self {
            scalar: 0.5,
            muted: false,
            range: VolumeRange {
                min_db: -64.0,
                max_db: 0.0,
                increment_db: 0.5,
            },
            step_count: 51,
            channel_count: 2,
        }
    }
}

impl MockVolume {
    fn db(&self) -> f32 {
        self.range.min_db + self.scalar * (self.range.max_db - self.range.min_db)
    }

    fn step(&self) -> u32 {
        (self.scalar * (self.step_count - 1) as f32).round() as u32
    }

    fn set_step(&mut self, step: u32) {
        let last = self.step_count - 1;
        self.scalar = step.min(last) as f32 / last as f32;
    }
}

/// A session registered with a mock endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSession {
    pub process_id: u32,
    pub state: SessionState,
    pub display_name: String,
    pub icon_path: String,
    pub grouping: Uuid,
    pub identifier: String,
    pub instance_identifier: String,
    pub system_sounds: bool,
    pub volume: f32,
    pub muted: bool,
    /// Display name and icon path writes that reached the platform
    pub metadata_writes: u32,
}

impl MockSession {
    pub fn new(process_id: u32) -> Self {
        Self {
            process_id,
            state: SessionState::Inactive,
            display_name: String::new(),
            icon_path: String::new(),
            grouping: Uuid::nil(),
            identifier: String::new(),
            instance_identifier: String::new(),
            system_sounds: false,
            volume: 1.0,
            muted: false,
            metadata_writes: 0,
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    pub fn with_icon_path(mut self, path: &str) -> Self {
        self.icon_path = path.to_string();
        self
    }

    pub fn with_identifiers(mut self, identifier: &str, instance: &str) -> Self {
        self.identifier = identifier.to_string();
        self.instance_identifier = instance.to_string();
        self
    }

    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn system_sounds(mut self) -> Self {
        self.system_sounds = true;
        self
    }
}

/// An endpoint known to the mock platform.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub id: String,
    pub flow: DataFlow,
    pub state: DeviceState,
    properties: Vec<(PropertyKey, MockValue)>,
    property_store: bool,
    pub volume: Option<MockVolume>,
    pub meter: Option<Vec<f32>>,
    pub sessions: Option<Vec<MockSession>>,
}

impl MockDevice {
    fn new(id: &str, flow: DataFlow, state: DeviceState) -> Self {
        Self {
            id: id.to_string(),
            flow,
            state,
            properties: Vec::new(),
            property_store: true,
            volume: Some(MockVolume::default()),
            meter: Some(vec![0.0, 0.0]),
            sessions: Some(Vec::new()),
        }
    }

    pub fn render(id: &str, state: DeviceState) -> Self {
        Self::new(id, DataFlow::Render, state)
    }

    pub fn capture(id: &str, state: DeviceState) -> Self {
        Self::new(id, DataFlow::Capture, state)
    }

    /// Set a property, replacing any earlier value for the key.
    pub fn with_property(mut self, key: PropertyKey, value: MockValue) -> Self {
        self.properties.retain(|(k, _)| *k != key);
        self.properties.push((key, value));
        self
    }

    fn with_text(self, property: DeviceProperty, text: &str) -> Self {
        self.with_property(property.key(), MockValue::WideStr(Some(text.to_string())))
    }

    pub fn with_description(self, description: &str) -> Self {
        self.with_text(DeviceProperty::DeviceDesc, description)
    }

    pub fn with_interface_name(self, name: &str) -> Self {
        self.with_text(DeviceProperty::InterfaceFriendlyName, name)
    }

    pub fn with_friendly_name(self, name: &str) -> Self {
        self.with_text(DeviceProperty::FriendlyName, name)
    }

    pub fn without_property_store(mut self) -> Self {
        self.property_store = false;
        self
    }

    pub fn with_volume(mut self, volume: MockVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn without_volume(mut self) -> Self {
        self.volume = None;
        self
    }

    pub fn with_meter(mut self, peaks: Vec<f32>) -> Self {
        self.meter = Some(peaks);
        self
    }

    pub fn without_meter(mut self) -> Self {
        self.meter = None;
        self
    }

    pub fn with_session(mut self, session: MockSession) -> Self {
        self.sessions.get_or_insert_with(Vec::new).push(session);
        self
    }

    pub fn without_session_manager(mut self) -> Self {
        self.sessions = None;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<MockDevice>,
    defaults: HashMap<DeviceRole, String>,
    default_changes: Vec<(String, DeviceRole)>,
    processes: HashMap<u32, String>,
    event_contexts: Vec<Uuid>,
    variant_clears: u32,
    enumerator_unavailable: bool,
    policy_fails: bool,
    policy_failing_roles: Vec<DeviceRole>,
}

impl MockState {
    fn device(&self, id: &str) -> Result<&MockDevice, AudioError> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: id.to_string(),
            })
    }

    fn device_mut(&mut self, id: &str) -> Result<&mut MockDevice, AudioError> {
        self.devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: id.to_string(),
            })
    }

    fn volume_mut(&mut self, id: &str) -> Result<&mut MockVolume, AudioError> {
        self.device_mut(id)?
            .volume
            .as_mut()
            .ok_or(AudioError::VolumeNotAvailable)
    }

    fn session_mut(&mut self, id: &str, index: usize) -> Result<&mut MockSession, AudioError> {
        self.device_mut(id)?
            .sessions
            .as_mut()
            .and_then(|sessions| sessions.get_mut(index))
            .ok_or_else(|| platform_error(E_FAIL, "Session no longer registered"))
    }
}

/// Shared handle to the mock state plus the live reference counter.
#[derive(Debug, Clone, Default)]
struct Shared {
    state: Arc<Mutex<MockState>>,
    live: Arc<AtomicUsize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn token(&self) -> RefToken {
        RefToken::acquire(&self.live)
    }
}

/// In-memory [`AudioPlatform`]. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    shared: Shared,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. Enumeration preserves insertion order.
    pub fn add_device(&self, device: MockDevice) {
        self.shared.lock().devices.push(device);
    }

    /// Make `id` the default render endpoint for every role, or clear it.
    pub fn set_default_render(&self, id: Option<&str>) {
        let mut state = self.shared.lock();
        state.defaults.clear();
        if let Some(id) = id {
            for role in DeviceRole::ALL {
                state.defaults.insert(role, id.to_string());
            }
        }
    }

    pub fn set_enumerator_available(&self, available: bool) {
        self.shared.lock().enumerator_unavailable = !available;
    }

    pub fn set_policy_fails(&self, fails: bool) {
        self.shared.lock().policy_fails = fails;
    }

    /// Make SetDefaultEndpoint fail for one role only.
    pub fn fail_policy_for_role(&self, role: DeviceRole) {
        self.shared.lock().policy_failing_roles.push(role);
    }

    pub fn add_process(&self, pid: u32, name: &str) {
        self.shared.lock().processes.insert(pid, name.to_string());
    }

    /// Foreign references currently held by callers.
    pub fn live_references(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Number of variants cleared so far.
    pub fn variant_clears(&self) -> u32 {
        self.shared.lock().variant_clears
    }

    pub fn default_device(&self, role: DeviceRole) -> Option<String> {
        self.shared.lock().defaults.get(&role).cloned()
    }

    /// Successful default endpoint changes, in call order.
    pub fn default_changes(&self) -> Vec<(String, DeviceRole)> {
        self.shared.lock().default_changes.clone()
    }

    /// Event contexts passed with mutating calls, in call order.
    pub fn event_contexts(&self) -> Vec<Uuid> {
        self.shared.lock().event_contexts.clone()
    }

    pub fn device_volume(&self, id: &str) -> Option<MockVolume> {
        let state = self.shared.lock();
        state.device(id).ok().and_then(|d| d.volume.clone())
    }

    /// First session of any endpoint owned by `pid`.
    pub fn session(&self, pid: u32) -> Option<MockSession> {
        let state = self.shared.lock();
        state
            .devices
            .iter()
            .filter_map(|d| d.sessions.as_ref())
            .flatten()
            .find(|s| s.process_id == pid)
            .cloned()
    }
}

impl AudioPlatform for MockPlatform {
    type Enumerator = MockEnumerator;
    type Policy = MockPolicyConfig;

    fn create_enumerator(&self) -> Result<MockEnumerator, AudioError> {
        if self.shared.lock().enumerator_unavailable {
            return Err(AudioError::EnumerationFailed(PlatformError::new(
                E_FAIL,
                "Device enumerator unavailable",
            )));
        }
        Ok(MockEnumerator {
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }

    fn create_policy_config(&self) -> Result<MockPolicyConfig, AudioError> {
        Ok(MockPolicyConfig {
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.shared.lock().processes.get(&pid).cloned()
    }
}

pub struct MockEnumerator {
    shared: Shared,
    _token: RefToken,
}

impl MockEnumerator {
    fn endpoint_handle(&self, id: &str) -> MockEndpoint {
        MockEndpoint {
            id: id.to_string(),
            _token: self.shared.token(),
            shared: self.shared.clone(),
        }
    }
}

impl DeviceEnumerator for MockEnumerator {
    type Endpoint = MockEndpoint;

    fn enum_endpoints(
        &self,
        flow: DataFlow,
        mask: DeviceStateMask,
    ) -> Result<Vec<MockEndpoint>, AudioError> {
        let ids: Vec<String> = self
            .shared
            .lock()
            .devices
            .iter()
            .filter(|d| d.flow.matches(flow) && mask.includes(d.state))
            .map(|d| d.id.clone())
            .collect();
        Ok(ids.iter().map(|id| self.endpoint_handle(id)).collect())
    }

    fn default_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<MockEndpoint, AudioError> {
        let id = {
            let state = self.shared.lock();
            state
                .defaults
                .get(&role)
                .filter(|id| state.device(id).map(|d| d.flow.matches(flow)).unwrap_or(false))
                .cloned()
        };
        match id {
            Some(id) => Ok(self.endpoint_handle(&id)),
            None => Err(AudioError::NoDefaultDevice),
        }
    }

    fn endpoint(&self, device_id: &str) -> Result<MockEndpoint, AudioError> {
        self.shared.lock().device(device_id)?;
        Ok(self.endpoint_handle(device_id))
    }
}

pub struct MockEndpoint {
    id: String,
    shared: Shared,
    _token: RefToken,
}

impl Endpoint for MockEndpoint {
    type Store = MockPropertyStore;
    type Volume = MockEndpointVolume;
    type Meter = MockMeter;
    type Sessions = MockSessionManager;

    fn id(&self) -> Result<String, AudioError> {
        Ok(self.id.clone())
    }

    fn state(&self) -> Result<DeviceState, AudioError> {
        Ok(self.shared.lock().device(&self.id)?.state)
    }

    fn open_property_store(&self) -> Result<MockPropertyStore, AudioError> {
        let state = self.shared.lock();
        let device = state.device(&self.id)?;
        if !device.property_store {
            return Err(platform_error(E_FAIL, "Property store unavailable"));
        }
        Ok(MockPropertyStore {
            properties: device.properties.clone(),
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }

    fn activate_volume(&self) -> Result<MockEndpointVolume, AudioError> {
        if self.shared.lock().device(&self.id)?.volume.is_none() {
            return Err(platform_error(E_NOTFOUND, "IAudioEndpointVolume not supported"));
        }
        Ok(MockEndpointVolume {
            id: self.id.clone(),
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }

    fn activate_meter(&self) -> Result<MockMeter, AudioError> {
        if self.shared.lock().device(&self.id)?.meter.is_none() {
            return Err(platform_error(E_NOTFOUND, "IAudioMeterInformation not supported"));
        }
        Ok(MockMeter {
            id: self.id.clone(),
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }

    fn activate_session_manager(&self) -> Result<MockSessionManager, AudioError> {
        if self.shared.lock().device(&self.id)?.sessions.is_none() {
            return Err(platform_error(E_NOTFOUND, "IAudioSessionManager2 not supported"));
        }
        Ok(MockSessionManager {
            id: self.id.clone(),
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }
}

pub struct MockPropertyStore {
    properties: Vec<(PropertyKey, MockValue)>,
    shared: Shared,
    _token: RefToken,
}

impl PropertyStore for MockPropertyStore {
    type Variant = MockVariant;

    fn count(&self) -> Result<u32, AudioError> {
        Ok(self.properties.len() as u32)
    }

    fn key_at(&self, index: u32) -> Result<PropertyKey, AudioError> {
        self.properties
            .get(index as usize)
            .map(|(key, _)| *key)
            .ok_or_else(|| platform_error(E_INVALIDARG, "Property index out of range"))
    }

    /// Missing keys read as VT_EMPTY, as IPropertyStore::GetValue does.
    fn value(&self, key: &PropertyKey) -> Result<MockVariant, AudioError> {
        let value = self
            .properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(MockValue::Other(VariantTag::EMPTY));
        Ok(MockVariant {
            value,
            shared: self.shared.clone(),
        })
    }
}

/// A variant read from a mock store. Clears are counted on the platform.
pub struct MockVariant {
    value: MockValue,
    shared: Shared,
}

impl RawVariant for MockVariant {
    fn tag(&self) -> VariantTag {
        self.value.tag()
    }

    fn bool_payload(&self) -> i16 {
        match self.value {
            MockValue::Bool(raw) => raw,
            _ => 0,
        }
    }

    fn wide_str_payload(&self) -> Option<String> {
        match &self.value {
            MockValue::WideStr(s) => s.clone(),
            _ => None,
        }
    }

    fn int_payload(&self) -> i32 {
        match self.value {
            MockValue::Int(raw) => raw,
            _ => 0,
        }
    }

    fn guid_payload(&self) -> Option<Uuid> {
        match self.value {
            MockValue::Guid(g) => g,
            _ => None,
        }
    }

    fn clear(&mut self) -> Result<(), AudioError> {
        self.shared.lock().variant_clears += 1;
        self.value = MockValue::Other(VariantTag::EMPTY);
        Ok(())
    }
}

pub struct MockEndpointVolume {
    id: String,
    shared: Shared,
    _token: RefToken,
}

impl MockEndpointVolume {
    fn read<T>(&self, f: impl FnOnce(&MockVolume) -> T) -> Result<T, AudioError> {
        let mut state = self.shared.lock();
        Ok(f(&*state.volume_mut(&self.id)?))
    }

    fn write(
        &self,
        context: &Uuid,
        f: impl FnOnce(&mut MockVolume) -> Result<(), AudioError>,
    ) -> Result<(), AudioError> {
        let mut state = self.shared.lock();
        f(state.volume_mut(&self.id)?)?;
        state.event_contexts.push(*context);
        Ok(())
    }
}

impl EndpointVolumeControl for MockEndpointVolume {
    fn master_volume_scalar(&self) -> Result<f32, AudioError> {
        self.read(|v| v.scalar)
    }

    /// Rejects levels outside 0.0 to 1.0 like the real interface.
    fn set_master_volume_scalar(&self, level: f32, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |v| {
            if !(0.0..=1.0).contains(&level) {
                return Err(platform_error(E_INVALIDARG, "The parameter is incorrect."));
            }
            v.scalar = level;
            Ok(())
        })
    }

    fn master_volume_db(&self) -> Result<f32, AudioError> {
        self.read(MockVolume::db)
    }

    fn set_master_volume_db(&self, level_db: f32, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |v| {
            let VolumeRange { min_db, max_db, .. } = v.range;
            if !(min_db..=max_db).contains(&level_db) {
                return Err(platform_error(E_INVALIDARG, "The parameter is incorrect."));
            }
            v.scalar = (level_db - min_db) / (max_db - min_db);
            Ok(())
        })
    }

    fn volume_range(&self) -> Result<VolumeRange, AudioError> {
        self.read(|v| v.range)
    }

    fn step_info(&self) -> Result<VolumeStep, AudioError> {
        self.read(|v| VolumeStep {
            step: v.step(),
            step_count: v.step_count,
        })
    }

    fn step_up(&self, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |v| {
            v.set_step(v.step() + 1);
            Ok(())
        })
    }

    fn step_down(&self, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |v| {
            v.set_step(v.step().saturating_sub(1));
            Ok(())
        })
    }

    fn channel_count(&self) -> Result<u32, AudioError> {
        self.read(|v| v.channel_count)
    }

    fn mute(&self) -> Result<bool, AudioError> {
        self.read(|v| v.muted)
    }

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |v| {
            v.muted = muted;
            Ok(())
        })
    }
}

pub struct MockMeter {
    id: String,
    shared: Shared,
    _token: RefToken,
}

impl MeterControl for MockMeter {
    fn peak_value(&self) -> Result<f32, AudioError> {
        let peaks = self.channel_peaks()?;
        Ok(peaks.into_iter().fold(0.0, f32::max))
    }

    fn channel_peaks(&self) -> Result<Vec<f32>, AudioError> {
        let state = self.shared.lock();
        state
            .device(&self.id)?
            .meter
            .clone()
            .ok_or(AudioError::MeterNotAvailable)
    }
}

pub struct MockSessionManager {
    id: String,
    shared: Shared,
    _token: RefToken,
}

impl SessionManager for MockSessionManager {
    type Session = MockSessionControl;

    fn sessions(&self) -> Result<Vec<MockSessionControl>, AudioError> {
        let count = {
            let state = self.shared.lock();
            state
                .device(&self.id)?
                .sessions
                .as_ref()
                .map(Vec::len)
                .unwrap_or(0)
        };
        Ok((0..count)
            .map(|index| MockSessionControl {
                id: self.id.clone(),
                index,
                _token: self.shared.token(),
                shared: self.shared.clone(),
            })
            .collect())
    }
}

pub struct MockSessionControl {
    id: String,
    index: usize,
    shared: Shared,
    _token: RefToken,
}

impl MockSessionControl {
    fn read<T>(&self, f: impl FnOnce(&MockSession) -> T) -> Result<T, AudioError> {
        let mut state = self.shared.lock();
        Ok(f(&*state.session_mut(&self.id, self.index)?))
    }

    fn write(&self, context: &Uuid, f: impl FnOnce(&mut MockSession)) -> Result<(), AudioError> {
        let mut state = self.shared.lock();
        f(state.session_mut(&self.id, self.index)?);
        state.event_contexts.push(*context);
        Ok(())
    }
}

impl SessionControl for MockSessionControl {
    type Volume = MockSimpleVolume;

    fn process_id(&self) -> Result<u32, AudioError> {
        self.read(|s| s.process_id)
    }

    fn state(&self) -> Result<SessionState, AudioError> {
        self.read(|s| s.state)
    }

    fn display_name(&self) -> Result<String, AudioError> {
        self.read(|s| s.display_name.clone())
    }

    fn set_display_name(&self, name: &str, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |s| {
            s.display_name = name.to_string();
            s.metadata_writes += 1;
        })
    }

    fn icon_path(&self) -> Result<String, AudioError> {
        self.read(|s| s.icon_path.clone())
    }

    fn set_icon_path(&self, path: &str, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |s| {
            s.icon_path = path.to_string();
            s.metadata_writes += 1;
        })
    }

    fn grouping_param(&self) -> Result<Uuid, AudioError> {
        self.read(|s| s.grouping)
    }

    fn set_grouping_param(&self, grouping: &Uuid, context: &Uuid) -> Result<(), AudioError> {
        self.write(context, |s| s.grouping = *grouping)
    }

    fn session_identifier(&self) -> Result<String, AudioError> {
        self.read(|s| s.identifier.clone())
    }

    fn session_instance_identifier(&self) -> Result<String, AudioError> {
        self.read(|s| s.instance_identifier.clone())
    }

    fn is_system_sounds_session(&self) -> Result<bool, AudioError> {
        self.read(|s| s.system_sounds)
    }

    fn simple_volume(&self) -> Result<MockSimpleVolume, AudioError> {
        Ok(MockSimpleVolume {
            id: self.id.clone(),
            index: self.index,
            _token: self.shared.token(),
            shared: self.shared.clone(),
        })
    }
}

pub struct MockSimpleVolume {
    id: String,
    index: usize,
    shared: Shared,
    _token: RefToken,
}

impl MockSimpleVolume {
    fn with_session<T>(
        &self,
        context: Option<&Uuid>,
        f: impl FnOnce(&mut MockSession) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let mut state = self.shared.lock();
        let result = f(state.session_mut(&self.id, self.index)?)?;
        if let Some(context) = context {
            state.event_contexts.push(*context);
        }
        Ok(result)
    }
}

impl SimpleVolumeControl for MockSimpleVolume {
    fn master_volume(&self) -> Result<f32, AudioError> {
        self.with_session(None, |s| Ok(s.volume))
    }

    fn set_master_volume(&self, level: f32, context: &Uuid) -> Result<(), AudioError> {
        self.with_session(Some(context), |s| {
            if !(0.0..=1.0).contains(&level) {
                return Err(platform_error(E_INVALIDARG, "The parameter is incorrect."));
            }
            s.volume = level;
            Ok(())
        })
    }

    fn mute(&self) -> Result<bool, AudioError> {
        self.with_session(None, |s| Ok(s.muted))
    }

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError> {
        self.with_session(Some(context), |s| {
            s.muted = muted;
            Ok(())
        })
    }
}

pub struct MockPolicyConfig {
    shared: Shared,
    _token: RefToken,
}

impl PolicyConfig for MockPolicyConfig {
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        let mut state = self.shared.lock();
        if state.policy_fails || state.policy_failing_roles.contains(&role) {
            return Err(platform_error(E_FAIL, "Unspecified error"));
        }
        if state.device(device_id).is_err() {
            return Err(platform_error(E_NOTFOUND, "Element not found."));
        }
        state.defaults.insert(role, device_id.to_string());
        state.default_changes.push((device_id.to_string(), role));
        Ok(())
    }
}
