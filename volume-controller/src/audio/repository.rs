//! Endpoint discovery.
//!
//! Enumerates endpoints through a fresh device enumerator on every call and
//! converts each one into an [`AudioDevice`] with its full property store.

use super::device::{AudioDevice, AudioError, DataFlow, DeviceRole, DeviceStateMask, PlaybackDevice};
use super::platform::{AudioPlatform, DeviceEnumerator, Endpoint, PropertyStore};
use super::property::{decode, PropertyKey, PropertyValue};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Decides which active endpoints are offered as playback targets.
///
/// Devices whose description matches any exclusion pattern (case-insensitive)
/// are not speakers. The built-in exclusions always apply.
#[derive(Debug, Clone)]
pub struct SpeakerFilter {
    exclusions: Vec<Regex>,
}

impl SpeakerFilter {
    /// Capture and loop-back endpoints that show up as active render devices.
    pub const DEFAULT_EXCLUSIONS: [&'static str; 3] =
        ["microphone", "stereo mix", "realtek digital output"];

    /// Built-in exclusions plus additional regular expressions.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, AudioError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for pattern in patterns {
            let regex = RegexBuilder::new(pattern.as_ref())
                .case_insensitive(true)
                .build()
                .map_err(|e| AudioError::InvalidPattern(e.to_string()))?;
            filter.exclusions.push(regex);
        }
        Ok(filter)
    }

    pub fn is_speaker(&self, device: &AudioDevice) -> bool {
        let description = device.description();
        !self.exclusions.iter().any(|re| re.is_match(&description))
    }
}

impl Default for SpeakerFilter {
    fn default() -> Self {
        let exclusions = Self::DEFAULT_EXCLUSIONS
            .iter()
            .filter_map(|literal| {
                RegexBuilder::new(&regex::escape(literal))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self { exclusions }
    }
}

/// Read-only view of the host's audio endpoints.
pub struct DeviceRepository<P> {
    platform: P,
    filter: SpeakerFilter,
}

impl<P: AudioPlatform> DeviceRepository<P> {
    pub fn new(platform: P) -> Self {
        Self::with_filter(platform, SpeakerFilter::default())
    }

    pub fn with_filter(platform: P, filter: SpeakerFilter) -> Self {
        Self { platform, filter }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Every endpoint in every direction and state.
    ///
    /// An unavailable enumerator yields an empty list.
    pub fn list_all_devices(&self) -> Vec<AudioDevice> {
        let enumerator = match self.platform.create_enumerator() {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Device enumerator unavailable");
                return Vec::new();
            }
        };

        let endpoints = match enumerator.enum_endpoints(DataFlow::All, DeviceStateMask::ALL) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!(error = %e, "Endpoint enumeration failed");
                return Vec::new();
            }
        };

        endpoints
            .iter()
            .filter_map(|endpoint| match build_device(endpoint) {
                Ok(device) => Some(device),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable endpoint");
                    None
                }
            })
            .collect()
    }

    pub fn list_active_devices(&self) -> Vec<AudioDevice> {
        self.list_all_devices()
            .into_iter()
            .filter(AudioDevice::is_active)
            .collect()
    }

    /// Active endpoints that pass the speaker filter.
    pub fn list_active_speakers(&self) -> Vec<AudioDevice> {
        self.list_active_devices()
            .into_iter()
            .filter(|d| self.filter.is_speaker(d))
            .collect()
    }

    /// Default render endpoint for the multimedia role.
    pub fn current_default_device(&self) -> Option<AudioDevice> {
        let enumerator = self.platform.create_enumerator().ok()?;
        match enumerator.default_endpoint(DataFlow::Render, DeviceRole::Multimedia) {
            Ok(endpoint) => self.device_from_endpoint(Some(&endpoint)),
            Err(e) => {
                debug!(error = %e, "No default render endpoint");
                None
            }
        }
    }

    pub fn current_default_device_id(&self) -> Option<String> {
        let enumerator = self.platform.create_enumerator().ok()?;
        enumerator
            .default_endpoint(DataFlow::Render, DeviceRole::Multimedia)
            .and_then(|endpoint| endpoint.id())
            .ok()
    }

    /// Build a device from a raw endpoint, if there is one.
    pub fn device_from_endpoint<E: Endpoint>(&self, endpoint: Option<&E>) -> Option<AudioDevice> {
        let endpoint = endpoint?;
        match build_device(endpoint) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!(error = %e, "Failed to read endpoint");
                None
            }
        }
    }

    /// Look up a single endpoint by ID.
    pub fn device(&self, device_id: &str) -> Option<AudioDevice> {
        let enumerator = self.platform.create_enumerator().ok()?;
        match enumerator.endpoint(device_id) {
            Ok(endpoint) => self.device_from_endpoint(Some(&endpoint)),
            Err(e) => {
                debug!(device_id, error = %e, "Endpoint lookup failed");
                None
            }
        }
    }

    /// Active speakers with the current default device marked.
    pub fn playback_devices(&self) -> Vec<PlaybackDevice> {
        let current_id = self.current_default_device_id();
        self.list_active_speakers()
            .iter()
            .map(|d| PlaybackDevice::from_device(d, current_id.as_deref()))
            .collect()
    }
}

/// Read ID, state and the whole property store of an endpoint.
pub fn build_device<E: Endpoint>(endpoint: &E) -> Result<AudioDevice, AudioError> {
    let id = endpoint.id()?;
    let state = endpoint.state()?;

    let properties = match endpoint.open_property_store() {
        Ok(store) => read_properties(&store),
        Err(e) => {
            debug!(device_id = %id, error = %e, "Property store unavailable");
            HashMap::new()
        }
    };

    Ok(AudioDevice::new(id, state, properties))
}

fn read_properties<S: PropertyStore>(store: &S) -> HashMap<PropertyKey, PropertyValue> {
    let count = match store.count() {
        Ok(count) => count,
        Err(e) => {
            debug!(error = %e, "Property count unavailable");
            return HashMap::new();
        }
    };

    let mut properties = HashMap::with_capacity(count as usize);
    for index in 0..count {
        let key = match store.key_at(index) {
            Ok(key) => key,
            Err(e) => {
                debug!(index, error = %e, "Skipping unreadable property key");
                continue;
            }
        };

        match store.value(&key) {
            Ok(variant) => {
                properties.insert(key, decode(variant));
            }
            Err(e) => debug!(%key, error = %e, "Skipping unreadable property value"),
        }
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{MockDevice, MockPlatform, MockValue};
    use crate::audio::{DeviceProperty, DeviceState};

    fn speaker(id: &str, description: &str, name: &str) -> MockDevice {
        MockDevice::render(id, DeviceState::Active)
            .with_description(description)
            .with_interface_name(name)
    }

    #[test]
    fn test_list_all_devices_covers_every_state_and_flow() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("spk", "Speakers", "Realtek"));
        platform.add_device(MockDevice::capture("mic", DeviceState::Active).with_description("Microphone"));
        platform.add_device(MockDevice::render("hdmi", DeviceState::Unplugged).with_description("HDMI"));
        platform.add_device(MockDevice::render("old", DeviceState::Disabled).with_description("Speakers"));

        let repo = DeviceRepository::new(platform.clone());
        let devices = repo.list_all_devices();

        let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["spk", "mic", "hdmi", "old"]);
        assert_eq!(devices[2].state, DeviceState::Unplugged);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_list_active_devices_filters_state() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("a", "Speakers", "A"));
        platform.add_device(MockDevice::render("b", DeviceState::NotPresent));

        let repo = DeviceRepository::new(platform);
        let active = repo.list_active_devices();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");
    }

    #[test]
    fn test_active_speakers_exclude_known_non_speakers() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("spk", "Speakers", "Realtek"));
        platform.add_device(speaker("mic", "Microphone Array", "Realtek"));
        platform.add_device(speaker("mix", "STEREO MIX", "Realtek"));
        platform.add_device(speaker("spdif", "Realtek Digital Output", "Realtek"));
        platform.add_device(speaker("odd", "mIcRoPhOnE", "Other"));

        let repo = DeviceRepository::new(platform);
        assert_eq!(repo.list_active_devices().len(), 5);

        let speakers = repo.list_active_speakers();
        let ids: Vec<_> = speakers.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["spk"]);
    }

    #[test]
    fn test_additional_speaker_exclusions() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("spk", "Speakers", "Realtek"));
        platform.add_device(speaker("vc", "CABLE Input", "VB-Audio Virtual Cable"));

        let filter = SpeakerFilter::with_patterns(["^cable"]).unwrap();
        let repo = DeviceRepository::with_filter(platform, filter);
        let speakers = repo.list_active_speakers();
        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].id, "spk");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = SpeakerFilter::with_patterns(["(unclosed"]).unwrap_err();
        assert!(matches!(err, AudioError::InvalidPattern(_)));
    }

    #[test]
    fn test_unavailable_enumerator_yields_nothing() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("spk", "Speakers", "Realtek"));
        platform.set_default_render(Some("spk"));
        platform.set_enumerator_available(false);

        let repo = DeviceRepository::new(platform);
        assert!(repo.list_all_devices().is_empty());
        assert!(repo.list_active_speakers().is_empty());
        assert!(repo.current_default_device().is_none());
        assert!(repo.playback_devices().is_empty());
    }

    #[test]
    fn test_current_default_device() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("a", "Speakers", "A"));
        platform.add_device(speaker("b", "Headphones", "B"));

        let repo = DeviceRepository::new(platform.clone());
        assert!(repo.current_default_device().is_none());

        platform.set_default_render(Some("b"));
        let device = repo.current_default_device().unwrap();
        assert_eq!(device.id, "b");
        assert_eq!(device.description(), "Headphones");
        assert_eq!(repo.current_default_device_id().as_deref(), Some("b"));
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_device_from_endpoint_absent_handle() {
        let platform = MockPlatform::new();
        let repo = DeviceRepository::new(platform.clone());
        let none: Option<&crate::audio::mock::MockEndpoint> = None;
        assert!(repo.device_from_endpoint(none).is_none());
    }

    #[test]
    fn test_device_from_endpoint_reads_full_store() {
        let platform = MockPlatform::new();
        let container = uuid::Uuid::from_u128(0x1234);
        platform.add_device(
            speaker("a", "Speakers", "Realtek")
                .with_property(DeviceProperty::ContainerId.key(), MockValue::Guid(Some(container)))
                .with_property(
                    PropertyKey::new(uuid::Uuid::from_u128(0x99), 3),
                    MockValue::Blob(vec![1, 2, 3]),
                ),
        );

        let endpoint = platform.create_enumerator().unwrap().endpoint("a").unwrap();
        let repo = DeviceRepository::new(platform.clone());
        let device = repo.device_from_endpoint(Some(&endpoint)).unwrap();

        assert_eq!(device.properties.len(), 4);
        assert_eq!(
            device.property(&DeviceProperty::ContainerId.key()),
            Some(&PropertyValue::Guid(container))
        );
        assert_eq!(
            device.property(&PropertyKey::new(uuid::Uuid::from_u128(0x99), 3)),
            Some(&PropertyValue::Unknown("VT_BLOB:?".to_string()))
        );
        // Every variant but the blob is cleared.
        assert_eq!(platform.variant_clears(), 3);

        drop(endpoint);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_device_lookup_by_id() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("a", "Speakers", "A"));

        let repo = DeviceRepository::new(platform);
        assert_eq!(repo.device("a").unwrap().description(), "Speakers");
        assert!(repo.device("missing").is_none());
    }

    #[test]
    fn test_playback_devices_mark_exactly_the_current_one() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("1", "Speakers", "Speaker"));
        platform.add_device(speaker("2", "Headphones", "Headphones"));
        platform.add_device(speaker("3", "Speakers", "Monitor"));
        platform.set_default_render(Some("1"));

        let repo = DeviceRepository::new(platform);
        let devices = repo.playback_devices();

        let summary: Vec<_> = devices
            .iter()
            .map(|d| (d.id.as_str(), d.name.as_str(), d.is_current_device))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1", "Speaker", true),
                ("2", "Headphones", false),
                ("3", "Monitor", false),
            ]
        );
    }

    #[test]
    fn test_unreadable_property_store_yields_empty_map() {
        let platform = MockPlatform::new();
        platform.add_device(speaker("a", "Speakers", "A").without_property_store());

        let repo = DeviceRepository::new(platform);
        let devices = repo.list_all_devices();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].properties.is_empty());
        assert_eq!(devices[0].description(), "");
    }
}
