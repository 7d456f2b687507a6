//! Audio module for Windows Core Audio API interactions.
//!
//! This module provides playback device enumeration, property decoding,
//! endpoint and session volume control, and default device switching. All
//! components are generic over [`AudioPlatform`]; the COM implementation lives
//! in [`com`] and an in-memory one in `mock`.

pub mod device;
pub mod meter;
pub mod platform;
pub mod policy;
pub mod property;
pub mod repository;
pub mod session;
pub mod volume;

#[cfg(windows)]
pub mod com;

#[cfg(any(test, feature = "test-mocks"))]
pub mod mock;

pub use device::{
    AudioDevice, AudioError, DataFlow, DeviceRole, DeviceState, DeviceStateMask, PlatformError,
    PlaybackDevice,
};
pub use meter::{open_level_meter, LevelMeter};
pub use platform::AudioPlatform;
pub use policy::DefaultDeviceSwitcher;
pub use property::{decode, DeviceProperty, PropertyKey, PropertyValue, VariantTag};
pub use repository::{DeviceRepository, SpeakerFilter};
pub use session::{AudioSession, SessionDirectory, SessionState, SessionSummary};
pub use volume::{open_volume_controller, VolumeController};
