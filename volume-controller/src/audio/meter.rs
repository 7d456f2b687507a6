//! Output level metering using IAudioMeterInformation.

use super::device::AudioError;
use super::platform::{resolve_endpoint, AudioPlatform, Endpoint, MeterControl, MeterOf};

/// Level meter for a specific endpoint.
pub struct LevelMeter<M> {
    meter_info: M,
}

impl<M: MeterControl> LevelMeter<M> {
    pub fn for_endpoint<E>(endpoint: &E) -> Result<Self, AudioError>
    where
        E: Endpoint<Meter = M>,
    {
        let meter_info = endpoint
            .activate_meter()
            .map_err(|_| AudioError::MeterNotAvailable)?;
        Ok(Self { meter_info })
    }

    /// Get the current peak level (0.0 to 1.0).
    pub fn peak_value(&self) -> Result<f32, AudioError> {
        self.meter_info.peak_value()
    }

    /// Get peak values for all channels.
    pub fn channel_peaks(&self) -> Result<Vec<f32>, AudioError> {
        self.meter_info.channel_peaks()
    }
}

pub fn open_level_meter<P: AudioPlatform>(
    platform: &P,
    device_id: Option<&str>,
) -> Result<LevelMeter<MeterOf<P>>, AudioError> {
    let endpoint = resolve_endpoint(platform, device_id)?;
    LevelMeter::for_endpoint(&endpoint)
}
