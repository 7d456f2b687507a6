//! Volume control using IAudioEndpointVolume.
//!
//! Provides master volume and mute control for one audio endpoint.

use super::device::AudioError;
use super::platform::{
    event_context, resolve_endpoint, AudioPlatform, Endpoint, EndpointVolumeControl, VolumeOf,
    VolumeRange, VolumeStep,
};
use tracing::{debug, warn};

/// Volume controller for a specific endpoint.
pub struct VolumeController<V> {
    endpoint_volume: V,
}

impl<V: EndpointVolumeControl> VolumeController<V> {
    /// Create a new VolumeController for the given endpoint.
    pub fn for_endpoint<E>(endpoint: &E) -> Result<Self, AudioError>
    where
        E: Endpoint<Volume = V>,
    {
        let endpoint_volume = endpoint.activate_volume().map_err(|e| {
            debug!(error = %e, "Endpoint volume activation failed");
            AudioError::VolumeNotAvailable
        })?;
        Ok(Self { endpoint_volume })
    }

    /// Get the current mute state.
    pub fn mute(&self) -> Result<bool, AudioError> {
        self.endpoint_volume.mute()
    }

    /// Set the mute state.
    pub fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.endpoint_volume.set_mute(muted, &event_context())
    }

    /// Toggle the mute state. Returns the new state.
    pub fn toggle_mute(&self) -> Result<bool, AudioError> {
        let new_state = !self.mute()?;
        self.set_mute(new_state)?;
        Ok(new_state)
    }

    /// Get the current volume level (0.0 to 1.0).
    pub fn master_volume_scalar(&self) -> Result<f32, AudioError> {
        self.endpoint_volume.master_volume_scalar()
    }

    /// Set the volume level (0.0 to 1.0).
    pub fn set_master_volume_scalar(&self, level: f32) -> Result<(), AudioError> {
        let level = finite_level(level)?.clamp(0.0, 1.0);
        self.endpoint_volume
            .set_master_volume_scalar(level, &event_context())
    }

    pub fn master_volume_db(&self) -> Result<f32, AudioError> {
        self.endpoint_volume.master_volume_db()
    }

    /// Set the volume in decibels, clamped to the endpoint's range.
    pub fn set_master_volume_db(&self, level_db: f32) -> Result<(), AudioError> {
        let level_db = finite_level(level_db)?;
        let range = self.volume_range()?;
        if !(range.min_db.is_finite() && range.max_db.is_finite() && range.min_db <= range.max_db) {
            warn!(?range, "Endpoint reported an unusable volume range");
            return Err(AudioError::VolumeNotAvailable);
        }
        let level_db = level_db.clamp(range.min_db, range.max_db);
        self.endpoint_volume
            .set_master_volume_db(level_db, &event_context())
    }

    pub fn volume_range(&self) -> Result<VolumeRange, AudioError> {
        self.endpoint_volume.volume_range()
    }

    pub fn step_info(&self) -> Result<VolumeStep, AudioError> {
        self.endpoint_volume.step_info()
    }

    pub fn step_up(&self) -> Result<(), AudioError> {
        self.endpoint_volume.step_up(&event_context())
    }

    pub fn step_down(&self) -> Result<(), AudioError> {
        self.endpoint_volume.step_down(&event_context())
    }

    pub fn channel_count(&self) -> Result<u32, AudioError> {
        self.endpoint_volume.channel_count()
    }
}

/// Reject NaN and infinite levels before they reach the platform.
pub(crate) fn finite_level(level: f32) -> Result<f32, AudioError> {
    if level.is_finite() {
        Ok(level)
    } else {
        Err(AudioError::InvalidLevel(level))
    }
}

/// Open the volume controller of an endpoint, or of the default render
/// endpoint when no ID is given.
pub fn open_volume_controller<P: AudioPlatform>(
    platform: &P,
    device_id: Option<&str>,
) -> Result<VolumeController<VolumeOf<P>>, AudioError> {
    let endpoint = resolve_endpoint(platform, device_id)?;
    VolumeController::for_endpoint(&endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{MockDevice, MockPlatform, MockVolume};
    use crate::audio::DeviceState;

    fn platform() -> MockPlatform {
        let platform = MockPlatform::new();
        platform.add_device(MockDevice::render("spk", DeviceState::Active));
        platform.add_device(MockDevice::render("hdmi", DeviceState::Active).without_volume());
        platform.set_default_render(Some("spk"));
        platform
    }

    #[test]
    fn test_set_then_get_is_clamped() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();

        for (requested, expected) in [(0.3, 0.3), (1.7, 1.0), (-0.2, 0.0), (1.0, 1.0), (0.0, 0.0)] {
            controller.set_master_volume_scalar(requested).unwrap();
            let actual = controller.master_volume_scalar().unwrap();
            assert!((actual - expected).abs() < 1e-6, "{requested} -> {actual}");
        }
    }

    #[test]
    fn test_default_endpoint_is_used_without_id() {
        let platform = platform();
        open_volume_controller(&platform, None)
            .unwrap()
            .set_master_volume_scalar(0.8)
            .unwrap();
        assert_eq!(platform.device_volume("spk").unwrap().scalar, 0.8);
    }

    #[test]
    fn test_missing_volume_interface() {
        let platform = platform();
        let err = open_volume_controller(&platform, Some("hdmi")).err().unwrap();
        assert!(matches!(err, AudioError::VolumeNotAvailable));
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_unknown_device() {
        let platform = platform();
        let err = open_volume_controller(&platform, Some("nope")).err().unwrap();
        assert!(matches!(err, AudioError::DeviceNotFound { .. }));
    }

    #[test]
    fn test_no_default_device() {
        let platform = platform();
        platform.set_default_render(None);
        let err = open_volume_controller(&platform, None).err().unwrap();
        assert!(matches!(err, AudioError::NoDefaultDevice));
    }

    #[test]
    fn test_mute_and_toggle() {
        let platform = platform();
        let controller = open_volume_controller(&platform, Some("spk")).unwrap();

        assert!(!controller.mute().unwrap());
        controller.set_mute(true).unwrap();
        assert!(controller.mute().unwrap());
        assert!(!controller.toggle_mute().unwrap());
        assert!(!platform.device_volume("spk").unwrap().muted);
    }

    #[test]
    fn test_every_mutation_gets_a_new_context() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();

        controller.set_master_volume_scalar(0.1).unwrap();
        controller.set_master_volume_scalar(0.1).unwrap();
        controller.set_mute(true).unwrap();

        let contexts = platform.event_contexts();
        assert_eq!(contexts.len(), 3);
        assert_ne!(contexts[0], contexts[1]);
        assert_ne!(contexts[1], contexts[2]);
    }

    #[test]
    fn test_decibel_volume_is_clamped_to_range() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();

        let range = controller.volume_range().unwrap();
        assert_eq!(range.min_db, -64.0);
        assert_eq!(range.max_db, 0.0);

        controller.set_master_volume_db(12.0).unwrap();
        assert_eq!(controller.master_volume_db().unwrap(), 0.0);
        assert_eq!(controller.master_volume_scalar().unwrap(), 1.0);

        controller.set_master_volume_db(-100.0).unwrap();
        assert_eq!(controller.master_volume_db().unwrap(), -64.0);

        controller.set_master_volume_db(-32.0).unwrap();
        assert_eq!(controller.master_volume_scalar().unwrap(), 0.5);
    }

    #[test]
    fn test_steps() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();
        controller.set_master_volume_scalar(0.0).unwrap();

        assert_eq!(
            controller.step_info().unwrap(),
            VolumeStep {
                step: 0,
                step_count: 51
            }
        );
        controller.step_down().unwrap();
        assert_eq!(controller.step_info().unwrap().step, 0);

        controller.step_up().unwrap();
        controller.step_up().unwrap();
        assert_eq!(controller.step_info().unwrap().step, 2);
        assert_eq!(controller.channel_count().unwrap(), 2);
    }

    #[test]
    fn test_controller_holds_one_reference() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();
        assert_eq!(platform.live_references(), 1);
        drop(controller);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_non_finite_levels_are_rejected() {
        let platform = platform();
        let controller = open_volume_controller(&platform, None).unwrap();

        for level in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(
                controller.set_master_volume_scalar(level),
                Err(AudioError::InvalidLevel(_))
            ));
            assert!(matches!(
                controller.set_master_volume_db(level),
                Err(AudioError::InvalidLevel(_))
            ));
        }
        assert_eq!(platform.device_volume("spk").unwrap().scalar, 0.5);
        assert!(platform.event_contexts().is_empty());
    }

    #[test]
    fn test_inverted_decibel_range_is_reported() {
        let platform = MockPlatform::new();
        let mut volume = MockVolume::default();
        volume.range = VolumeRange {
            min_db: 0.0,
            max_db: -10.0,
            increment_db: 0.5,
        };
        platform.add_device(MockDevice::render("spk", DeviceState::Active).with_volume(volume));
        platform.set_default_render(Some("spk"));

        let controller = open_volume_controller(&platform, None).unwrap();
        assert!(matches!(
            controller.set_master_volume_db(-5.0),
            Err(AudioError::VolumeNotAvailable)
        ));

        let mut volume = MockVolume::default();
        volume.range.max_db = f32::NAN;
        platform.add_device(MockDevice::render("nan", DeviceState::Active).with_volume(volume));
        let controller = open_volume_controller(&platform, Some("nan")).unwrap();
        assert!(matches!(
            controller.set_master_volume_db(-5.0),
            Err(AudioError::VolumeNotAvailable)
        ));
    }
}
