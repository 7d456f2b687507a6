//! Default endpoint switching through IPolicyConfig.

use super::device::{AudioError, DataFlow, DeviceRole, PlatformError};
use super::platform::{AudioPlatform, DeviceEnumerator, Endpoint, PolicyConfig};
use tracing::{debug, info, warn};

/// Changes which endpoint Windows uses by default.
pub struct DefaultDeviceSwitcher<P> {
    platform: P,
}

impl<P: AudioPlatform> DefaultDeviceSwitcher<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Set the device as default for the Console, Multimedia and
    /// Communications roles.
    ///
    /// Either every role switches or none does: when a role fails, the roles
    /// already switched are restored to their previous default.
    pub fn set_default_playback_device(&self, device_id: &str) -> Result<(), AudioError> {
        let previous = self.current_defaults();
        let policy = self.policy()?;

        for (done, role) in DeviceRole::ALL.into_iter().enumerate() {
            if let Err(e) = apply(&policy, device_id, role) {
                restore(&policy, &previous[..done]);
                return Err(e);
            }
        }
        info!(device_id, "Default playback device changed");
        Ok(())
    }

    /// Set the device as default for a single role.
    pub fn set_default_device(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        let policy = self.policy()?;
        apply(&policy, device_id, role)?;
        info!(device_id, ?role, "Default device changed");
        Ok(())
    }

    /// Current default render endpoint of every role, `None` where unknown.
    fn current_defaults(&self) -> Vec<(DeviceRole, Option<String>)> {
        let enumerator = match self.platform.create_enumerator() {
            Ok(enumerator) => Some(enumerator),
            Err(e) => {
                debug!(error = %e, "Cannot read current defaults");
                None
            }
        };

        DeviceRole::ALL
            .into_iter()
            .map(|role| {
                let id = enumerator.as_ref().and_then(|enumerator| {
                    enumerator
                        .default_endpoint(DataFlow::Render, role)
                        .and_then(|endpoint| endpoint.id())
                        .ok()
                });
                (role, id)
            })
            .collect()
    }

    fn policy(&self) -> Result<P::Policy, AudioError> {
        self.platform.create_policy_config().map_err(as_set_default_failure)
    }
}

fn apply<C: PolicyConfig>(policy: &C, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
    policy.set_default_endpoint(device_id, role).map_err(|e| {
        warn!(device_id, ?role, error = %e, "SetDefaultEndpoint failed");
        as_set_default_failure(e)
    })
}

/// Put switched roles back. Failures here are logged, the original error wins.
fn restore<C: PolicyConfig>(policy: &C, previous: &[(DeviceRole, Option<String>)]) {
    for (role, id) in previous {
        let Some(id) = id else {
            warn!(?role, "No previous default to restore");
            continue;
        };
        match policy.set_default_endpoint(id, *role) {
            Ok(()) => debug!(device_id = %id, ?role, "Previous default restored"),
            Err(e) => warn!(device_id = %id, ?role, error = %e, "Rollback of default device failed"),
        }
    }
}

fn as_set_default_failure(error: AudioError) -> AudioError {
    match error {
        AudioError::SetDefaultFailed(inner)
        | AudioError::PlatformCall(inner)
        | AudioError::ComInitFailed(inner) => AudioError::SetDefaultFailed(inner),
        other => AudioError::SetDefaultFailed(PlatformError::new(0, other.to_string())),
    }
}
