//! Operations behind the exported functions, independent of the platform.
//!
//! Every call builds fresh repository and controller objects from the
//! platform so no foreign reference outlives the call.

use crate::{
    AppVolumeData, DeviceListResponse, PlaybackDeviceDto, SessionDto, SessionListResponse,
    VolumeData,
};
use tracing::debug;
use volume_controller::audio::{
    open_volume_controller, AudioPlatform, DefaultDeviceSwitcher, DeviceRepository,
    PlaybackDevice, SessionDirectory, SpeakerFilter,
};
use volume_controller::AudioError;

pub struct Operations<P> {
    platform: P,
    filter: SpeakerFilter,
}

impl<P: AudioPlatform + Clone> Operations<P> {
    pub fn new(platform: P, filter: SpeakerFilter) -> Self {
        Self { platform, filter }
    }

    fn repository(&self) -> DeviceRepository<P> {
        DeviceRepository::with_filter(self.platform.clone(), self.filter.clone())
    }

    fn sessions(&self) -> SessionDirectory<P> {
        SessionDirectory::new(self.platform.clone())
    }

    /// Active speakers with the current default marked.
    pub fn playback_devices(&self) -> Result<DeviceListResponse, AudioError> {
        let devices = self
            .repository()
            .playback_devices()
            .into_iter()
            .map(PlaybackDeviceDto::from)
            .collect();
        Ok(DeviceListResponse { devices })
    }

    pub fn default_device(&self) -> Result<PlaybackDeviceDto, AudioError> {
        let device = self
            .repository()
            .current_default_device()
            .ok_or(AudioError::NoDefaultDevice)?;
        let current = device.id.clone();
        Ok(PlaybackDevice::from_device(&device, Some(&current)).into())
    }

    /// Make the device the default for every role.
    pub fn set_default_device(&self, device_id: &str) -> Result<(), AudioError> {
        DefaultDeviceSwitcher::new(self.platform.clone()).set_default_playback_device(device_id)
    }

    /// Master volume (0 to 100) of the endpoint, or of the default one.
    pub fn volume(&self, device_id: Option<&str>) -> Result<VolumeData, AudioError> {
        let controller = open_volume_controller(&self.platform, device_id)?;
        Ok(VolumeData {
            volume: controller.master_volume_scalar()? * 100.0,
            is_muted: controller.mute()?,
        })
    }

    /// Set the master volume from the 0 to 100 scale. Negative levels become 0.
    pub fn set_volume(&self, device_id: Option<&str>, volume: f32) -> Result<(), AudioError> {
        if !volume.is_finite() {
            return Err(AudioError::InvalidLevel(volume));
        }
        let volume = volume.max(0.0);
        debug!(?device_id, volume, "Setting master volume");
        open_volume_controller(&self.platform, device_id)?.set_master_volume_scalar(volume / 100.0)
    }

    pub fn mute(&self, device_id: Option<&str>) -> Result<bool, AudioError> {
        open_volume_controller(&self.platform, device_id)?.mute()
    }

    pub fn set_mute(&self, device_id: Option<&str>, muted: bool) -> Result<(), AudioError> {
        open_volume_controller(&self.platform, device_id)?.set_mute(muted)
    }

    pub fn session_list(&self) -> Result<SessionListResponse, AudioError> {
        let sessions = self
            .sessions()
            .summaries()
            .into_iter()
            .map(SessionDto::from)
            .collect();
        Ok(SessionListResponse { sessions })
    }

    pub fn app_volume(&self, pid: u32) -> Result<AppVolumeData, AudioError> {
        let volume = self
            .sessions()
            .session_volume(pid)?
            .ok_or(AudioError::SessionNotFound { pid })?;
        Ok(AppVolumeData { pid, volume })
    }

    pub fn set_app_volume(&self, pid: u32, volume: f32) -> Result<(), AudioError> {
        if self.sessions().set_session_volume(pid, volume)? {
            Ok(())
        } else {
            Err(AudioError::SessionNotFound { pid })
        }
    }

    pub fn app_mute(&self, pid: u32) -> Result<bool, AudioError> {
        self.sessions()
            .session_mute(pid)?
            .ok_or(AudioError::SessionNotFound { pid })
    }

    pub fn set_app_mute(&self, pid: u32, muted: bool) -> Result<(), AudioError> {
        if self.sessions().set_session_mute(pid, muted)? {
            Ok(())
        } else {
            Err(AudioError::SessionNotFound { pid })
        }
    }
}
