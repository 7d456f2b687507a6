//! IAudioEndpointVolume and IAudioMeterInformation wrappers.

use super::to_guid;
use crate::audio::device::AudioError;
use crate::audio::platform::{EndpointVolumeControl, MeterControl, VolumeRange, VolumeStep};
use uuid::Uuid;
use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioMeterInformation};

pub struct ComEndpointVolume {
    endpoint_volume: IAudioEndpointVolume,
}

impl ComEndpointVolume {
    pub(crate) fn new(endpoint_volume: IAudioEndpointVolume) -> Self {
        Self { endpoint_volume }
    }
}

impl EndpointVolumeControl for ComEndpointVolume {
    fn master_volume_scalar(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.endpoint_volume.GetMasterVolumeLevelScalar()? })
    }

    fn set_master_volume_scalar(&self, level: f32, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevelScalar(level, &context)?;
        }
        Ok(())
    }

    fn master_volume_db(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.endpoint_volume.GetMasterVolumeLevel()? })
    }

    fn set_master_volume_db(&self, level_db: f32, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevel(level_db, &context)?;
        }
        Ok(())
    }

    fn volume_range(&self) -> Result<VolumeRange, AudioError> {
        let mut range = VolumeRange {
            min_db: 0.0,
            max_db: 0.0,
            increment_db: 0.0,
        };
        unsafe {
            self.endpoint_volume.GetVolumeRange(
                &mut range.min_db,
                &mut range.max_db,
                &mut range.increment_db,
            )?;
        }
        Ok(range)
    }

    fn step_info(&self) -> Result<VolumeStep, AudioError> {
        let mut info = VolumeStep {
            step: 0,
            step_count: 0,
        };
        unsafe {
            self.endpoint_volume
                .GetVolumeStepInfo(&mut info.step, &mut info.step_count)?;
        }
        Ok(info)
    }

    fn step_up(&self, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe { self.endpoint_volume.VolumeStepUp(&context)? };
        Ok(())
    }

    fn step_down(&self, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe { self.endpoint_volume.VolumeStepDown(&context)? };
        Ok(())
    }

    fn channel_count(&self) -> Result<u32, AudioError> {
        Ok(unsafe { self.endpoint_volume.GetChannelCount()? })
    }

    fn mute(&self) -> Result<bool, AudioError> {
        let muted = unsafe { self.endpoint_volume.GetMute()? };
        Ok(muted.as_bool())
    }

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe {
            self.endpoint_volume
                .SetMute(BOOL::from(muted), &context)?;
        }
        Ok(())
    }
}

pub struct ComMeter {
    meter_info: IAudioMeterInformation,
}

impl ComMeter {
    pub(crate) fn new(meter_info: IAudioMeterInformation) -> Self {
        Self { meter_info }
    }
}

impl MeterControl for ComMeter {
    fn peak_value(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.meter_info.GetPeakValue()? })
    }

    fn channel_peaks(&self) -> Result<Vec<f32>, AudioError> {
        unsafe {
            let channel_count = self.meter_info.GetMeteringChannelCount()?;

            let mut peaks = vec![0.0f32; channel_count as usize];
            self.meter_info.GetChannelsPeakValues(&mut peaks)?;

            Ok(peaks)
        }
    }
}
