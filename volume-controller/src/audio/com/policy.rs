//! IPolicyConfig, used to set the default audio endpoint.

use super::{as_pcwstr, to_wide};
use crate::audio::device::{AudioError, DeviceRole};
use crate::audio::platform::PolicyConfig;
use windows::core::*;
use windows::Win32::System::Com::*;

/// IPolicyConfig COM interface (undocumented but stable)
#[windows::core::interface("F8679F50-850A-41CF-9C72-430F290290C8")]
pub unsafe trait IPolicyConfig: IUnknown {
    // Reserved methods to maintain vtable order
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
}

// PolicyConfigClient CLSID
const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

pub struct ComPolicyConfig {
    policy_config: IPolicyConfig,
}

impl ComPolicyConfig {
    pub(crate) fn new() -> std::result::Result<Self, AudioError> {
        let policy_config: IPolicyConfig =
            unsafe { CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)? };
        Ok(Self { policy_config })
    }
}

impl PolicyConfig for ComPolicyConfig {
    fn set_default_endpoint(
        &self,
        device_id: &str,
        role: DeviceRole,
    ) -> std::result::Result<(), AudioError> {
        let device_id_wide = to_wide(device_id);
        unsafe {
            self.policy_config
                .SetDefaultEndpoint(as_pcwstr(&device_id_wide), role as u32)
                .ok()?;
        }
        Ok(())
    }
}
