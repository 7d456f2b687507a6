//! PC Volume Controller - Library
//!
//! Discovery and control of the host's audio output devices and audio
//! sessions through Windows Core Audio.
//!
//! ## Features
//!
//! - Enumerate endpoints with their full, decoded property store
//! - List active speakers and mark the current default playback device
//! - Read and set master volume and mute of any endpoint
//! - Find the audio session of a process and adjust its volume and mute
//! - Switch the default playback device for every role
//!
//! ## Threading
//!
//! Operations are synchronous. On Windows, COM must be initialized on the
//! calling thread before using [`audio::com::ComPlatform`]; holding an
//! [`audio::com::ComGuard`] for the duration of the work does that.

pub mod audio;
pub mod logging;

pub use audio::{
    AudioDevice, AudioError, AudioPlatform, AudioSession, DefaultDeviceSwitcher, DeviceRepository,
    DeviceRole, PlaybackDevice, SessionDirectory, SpeakerFilter, VolumeController,
};
