//! Audio session enumeration through IAudioSessionManager2.

use super::{as_pcwstr, from_guid, take_co_string, to_guid, to_wide};
use crate::audio::device::AudioError;
use crate::audio::platform::{SessionControl, SessionManager, SimpleVolumeControl};
use crate::audio::session::SessionState;
use tracing::debug;
use uuid::Uuid;
use windows::core::Interface;
use windows::Win32::Foundation::{BOOL, S_OK};
use windows::Win32::Media::Audio::{
    IAudioSessionControl2, IAudioSessionManager2, ISimpleAudioVolume,
};

pub struct ComSessionManager {
    manager: IAudioSessionManager2,
}

impl ComSessionManager {
    pub(crate) fn new(manager: IAudioSessionManager2) -> Self {
        Self { manager }
    }
}

impl SessionManager for ComSessionManager {
    type Session = ComSessionControl;

    fn sessions(&self) -> Result<Vec<ComSessionControl>, AudioError> {
        unsafe {
            let sessions = self.manager.GetSessionEnumerator()?;
            let count = sessions.GetCount()?;

            let mut controls = Vec::with_capacity(count.max(0) as usize);
            for i in 0..count {
                let control = match sessions
                    .GetSession(i)
                    .and_then(|c| c.cast::<IAudioSessionControl2>())
                {
                    Ok(control) => control,
                    Err(e) => {
                        debug!(index = i, error = %e, "Skipping session");
                        continue;
                    }
                };
                controls.push(ComSessionControl { control });
            }
            Ok(controls)
        }
    }
}

/// IAudioSessionControl2 wrapper.
pub struct ComSessionControl {
    control: IAudioSessionControl2,
}

impl SessionControl for ComSessionControl {
    type Volume = ComSimpleVolume;

    fn process_id(&self) -> Result<u32, AudioError> {
        Ok(unsafe { self.control.GetProcessId()? })
    }

    fn state(&self) -> Result<SessionState, AudioError> {
        let state = unsafe { self.control.GetState()? };
        Ok(SessionState::from_raw(state.0))
    }

    fn display_name(&self) -> Result<String, AudioError> {
        unsafe { take_co_string(self.control.GetDisplayName()?) }
    }

    fn set_display_name(&self, name: &str, context: &Uuid) -> Result<(), AudioError> {
        let name = to_wide(name);
        let context = to_guid(context);
        unsafe { self.control.SetDisplayName(as_pcwstr(&name), &context)? };
        Ok(())
    }

    fn icon_path(&self) -> Result<String, AudioError> {
        unsafe { take_co_string(self.control.GetIconPath()?) }
    }

    fn set_icon_path(&self, path: &str, context: &Uuid) -> Result<(), AudioError> {
        let path = to_wide(path);
        let context = to_guid(context);
        unsafe { self.control.SetIconPath(as_pcwstr(&path), &context)? };
        Ok(())
    }

    fn grouping_param(&self) -> Result<Uuid, AudioError> {
        let grouping = unsafe { self.control.GetGroupingParam()? };
        Ok(from_guid(&grouping))
    }

    fn set_grouping_param(&self, grouping: &Uuid, context: &Uuid) -> Result<(), AudioError> {
        let grouping = to_guid(grouping);
        let context = to_guid(context);
        unsafe { self.control.SetGroupingParam(&grouping, &context)? };
        Ok(())
    }

    fn session_identifier(&self) -> Result<String, AudioError> {
        unsafe { take_co_string(self.control.GetSessionIdentifier()?) }
    }

    fn session_instance_identifier(&self) -> Result<String, AudioError> {
        unsafe { take_co_string(self.control.GetSessionInstanceIdentifier()?) }
    }

    /// S_OK for the system sounds session, S_FALSE otherwise.
    fn is_system_sounds_session(&self) -> Result<bool, AudioError> {
        let hr = unsafe { self.control.IsSystemSoundsSession() };
        hr.ok()?;
        Ok(hr == S_OK)
    }

    fn simple_volume(&self) -> Result<ComSimpleVolume, AudioError> {
        let volume = self.control.cast::<ISimpleAudioVolume>()?;
        Ok(ComSimpleVolume { volume })
    }
}

/// ISimpleAudioVolume wrapper.
pub struct ComSimpleVolume {
    volume: ISimpleAudioVolume,
}

impl SimpleVolumeControl for ComSimpleVolume {
    fn master_volume(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.volume.GetMasterVolume()? })
    }

    fn set_master_volume(&self, level: f32, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe { self.volume.SetMasterVolume(level, &context)? };
        Ok(())
    }

    fn mute(&self) -> Result<bool, AudioError> {
        let muted = unsafe { self.volume.GetMute()? };
        Ok(muted.as_bool())
    }

    fn set_mute(&self, muted: bool, context: &Uuid) -> Result<(), AudioError> {
        let context = to_guid(context);
        unsafe { self.volume.SetMute(BOOL::from(muted), &context)? };
        Ok(())
    }
}
