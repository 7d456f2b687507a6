//! `pcvol` subcommands.

#![cfg_attr(not(windows), allow(dead_code))]

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::Write;
use volume_controller::audio::{
    open_level_meter, open_volume_controller, AudioDevice, AudioError, AudioPlatform,
    DefaultDeviceSwitcher, DeviceRepository, SessionDirectory, SpeakerFilter,
};

#[derive(Parser)]
#[command(name = "pcvol")]
#[command(about = "Control Windows playback devices, master volume and per-app volume")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Hide devices whose description matches this regex (repeatable)
    #[arg(long = "exclude", value_name = "REGEX", global = true)]
    pub exclude: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List playback devices (active speakers by default)
    Devices {
        /// Every endpoint in every state
        #[arg(long, conflicts_with = "active")]
        all: bool,

        /// Every active endpoint, speakers or not
        #[arg(long)]
        active: bool,
    },
    /// Show or change the default playback device
    Default {
        #[command(subcommand)]
        action: Option<DefaultAction>,
    },
    /// Show or change the master volume (0-100)
    Volume {
        #[command(subcommand)]
        action: Option<VolumeAction>,

        /// Endpoint ID (default playback device if omitted)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Show or change the master mute state
    Mute {
        #[command(subcommand)]
        action: Option<MuteAction>,

        /// Endpoint ID (default playback device if omitted)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Show the current output peak level
    Level {
        /// Endpoint ID (default playback device if omitted)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Dump the property store of an endpoint
    Properties {
        /// Endpoint ID
        id: String,
    },
    /// List audio sessions of the default playback device
    Sessions,
    /// Show or change the volume of a process's session (0-100)
    AppVolume {
        pid: u32,
        level: Option<f32>,
    },
    /// Show or change the mute state of a process's session
    AppMute {
        pid: u32,
        #[arg(value_enum)]
        state: Option<Switch>,
    },
}

#[derive(Subcommand)]
pub enum DefaultAction {
    /// Show the current default playback device
    Get,
    /// Make the device the default for every role
    Set { id: String },
}

#[derive(Subcommand)]
pub enum VolumeAction {
    Get,
    Set { level: f32 },
}

#[derive(Subcommand)]
pub enum MuteAction {
    Get,
    On,
    Off,
    Toggle,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        matches!(self, Switch::On)
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "muted"
    } else {
        "unmuted"
    }
}

/// Execute a parsed command line against a platform.
pub fn run<P>(cli: &Cli, platform: P, out: &mut impl Write) -> Result<()>
where
    P: AudioPlatform + Clone,
{
    let filter = SpeakerFilter::with_patterns(&cli.exclude)?;

    match &cli.command {
        Commands::Devices { all, active } => {
            let repo = DeviceRepository::with_filter(platform, filter);
            if *all || *active {
                let devices = if *all {
                    repo.list_all_devices()
                } else {
                    repo.list_active_devices()
                };
                for device in &devices {
                    writeln!(out, "{}\t{}\t{}", device.id, device.state, device)?;
                }
            } else {
                for device in repo.playback_devices() {
                    let marker = if device.is_current_device { "*" } else { " " };
                    writeln!(out, "{marker} {}\t{}", device.name, device.id)?;
                }
            }
        }
        Commands::Default { action } => match action {
            None | Some(DefaultAction::Get) => {
                let repo = DeviceRepository::with_filter(platform, filter);
                let device = repo
                    .current_default_device()
                    .ok_or(AudioError::NoDefaultDevice)?;
                writeln!(out, "{}\t{}", device, device.id)?;
            }
            Some(DefaultAction::Set { id }) => {
                DefaultDeviceSwitcher::new(platform).set_default_playback_device(id)?;
                writeln!(out, "Default playback device set to {id}")?;
            }
        },
        Commands::Volume { action, device } => {
            let controller = open_volume_controller(&platform, device.as_deref())?;
            if let Some(VolumeAction::Set { level }) = action {
                controller.set_master_volume_scalar(level.clamp(0.0, 100.0) / 100.0)?;
            }
            let level = controller.master_volume_scalar()? * 100.0;
            writeln!(out, "{level:.0}")?;
        }
        Commands::Mute { action, device } => {
            let controller = open_volume_controller(&platform, device.as_deref())?;
            let muted = match action {
                None | Some(MuteAction::Get) => controller.mute()?,
                Some(MuteAction::On) => {
                    controller.set_mute(true)?;
                    true
                }
                Some(MuteAction::Off) => {
                    controller.set_mute(false)?;
                    false
                }
                Some(MuteAction::Toggle) => controller.toggle_mute()?,
            };
            writeln!(out, "{}", on_off(muted))?;
        }
        Commands::Level { device } => {
            let meter = open_level_meter(&platform, device.as_deref())?;
            let peaks: Vec<String> = meter
                .channel_peaks()?
                .iter()
                .map(|p| format!("{:.3}", p))
                .collect();
            writeln!(out, "peak {:.3} [{}]", meter.peak_value()?, peaks.join(", "))?;
        }
        Commands::Properties { id } => {
            let repo = DeviceRepository::with_filter(platform, filter);
            let device = repo
                .device(id)
                .ok_or_else(|| AudioError::DeviceNotFound {
                    device_id: id.clone(),
                })?;
            write_properties(&device, out)?;
        }
        Commands::Sessions => {
            for session in SessionDirectory::new(platform).summaries() {
                writeln!(
                    out,
                    "{}\t{:.0}\t{}\t{}\t{}",
                    session.process_id,
                    session.volume,
                    on_off(session.muted),
                    session.state,
                    session.label
                )?;
            }
        }
        Commands::AppVolume { pid, level } => {
            let sessions = SessionDirectory::new(platform);
            if let Some(level) = level {
                if !sessions.set_session_volume(*pid, *level)? {
                    return Err(AudioError::SessionNotFound { pid: *pid }.into());
                }
            }
            let volume = sessions
                .session_volume(*pid)?
                .ok_or(AudioError::SessionNotFound { pid: *pid })?;
            writeln!(out, "{volume:.0}")?;
        }
        Commands::AppMute { pid, state } => {
            let sessions = SessionDirectory::new(platform);
            if let Some(state) = state {
                if !sessions.set_session_mute(*pid, state.is_on())? {
                    return Err(AudioError::SessionNotFound { pid: *pid }.into());
                }
            }
            let muted = sessions
                .session_mute(*pid)?
                .ok_or(AudioError::SessionNotFound { pid: *pid })?;
            writeln!(out, "{}", on_off(muted))?;
        }
    }

    Ok(())
}

fn write_properties(device: &AudioDevice, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{} ({})", device, device.state)?;

    let mut entries: Vec<(String, String)> = device
        .properties
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    entries.sort();

    for (key, value) in entries {
        writeln!(out, "{key} = {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use volume_controller::audio::mock::{MockDevice, MockPlatform, MockSession};
    use volume_controller::audio::DeviceState;

    fn platform() -> MockPlatform {
        let platform = MockPlatform::new();
        platform.add_device(
            MockDevice::render("1", DeviceState::Active)
                .with_description("Speakers")
                .with_interface_name("Speaker")
                .with_friendly_name("Speakers (Speaker)")
                .with_session(MockSession::new(40).with_volume(0.5)),
        );
        platform.add_device(
            MockDevice::render("2", DeviceState::Active)
                .with_description("Headphones")
                .with_interface_name("Headphones"),
        );
        platform.add_device(
            MockDevice::capture("3", DeviceState::Active).with_description("Microphone"),
        );
        platform.set_default_render(Some("1"));
        platform.add_process(40, "player");
        platform
    }

    fn exec(platform: &MockPlatform, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("pcvol").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(&cli, platform.clone(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_devices_marks_current() {
        let output = exec(&platform(), &["devices"]).unwrap();
        assert_eq!(output, "* Speaker\t1\n  Headphones\t2\n");
    }

    #[test]
    fn test_devices_exclude_pattern() {
        let output = exec(&platform(), &["devices", "--exclude", "^head"]).unwrap();
        assert_eq!(output, "* Speaker\t1\n");
    }

    #[test]
    fn test_devices_all() {
        let output = exec(&platform(), &["devices", "--all"]).unwrap();
        assert_eq!(output.lines().count(), 3);
        assert!(output.starts_with("1\tactive\tSpeakers (Speaker)\n"));
    }

    #[test]
    fn test_default_get_and_set() {
        let platform = platform();
        assert_eq!(exec(&platform, &["default"]).unwrap(), "Speakers (Speaker)\t1\n");

        exec(&platform, &["default", "set", "2"]).unwrap();
        assert_eq!(platform.default_changes().len(), 3);
        assert!(exec(&platform, &["devices"]).unwrap().contains("* Headphones\t2"));
    }

    #[test]
    fn test_volume_percent() {
        let platform = platform();
        assert_eq!(exec(&platform, &["volume"]).unwrap(), "50\n");
        assert_eq!(exec(&platform, &["volume", "set", "30"]).unwrap(), "30\n");
        assert_eq!(exec(&platform, &["volume", "set", "250"]).unwrap(), "100\n");
        assert_eq!(exec(&platform, &["volume", "--device", "2", "get"]).unwrap(), "50\n");
    }

    #[test]
    fn test_mute_actions() {
        let platform = platform();
        assert_eq!(exec(&platform, &["mute"]).unwrap(), "unmuted\n");
        assert_eq!(exec(&platform, &["mute", "on"]).unwrap(), "muted\n");
        assert_eq!(exec(&platform, &["mute", "toggle"]).unwrap(), "unmuted\n");
    }

    #[test]
    fn test_properties_sorted() {
        let output = exec(&platform(), &["properties", "1"]).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "Speakers (Speaker) (active)");
        assert_eq!(lines.len(), 4);
        assert!(lines[1] < lines[2] && lines[2] < lines[3]);
        assert!(exec(&platform(), &["properties", "missing"]).is_err());
    }

    #[test]
    fn test_app_volume_and_mute() {
        let platform = platform();
        assert_eq!(exec(&platform, &["app-volume", "40"]).unwrap(), "50\n");
        assert_eq!(exec(&platform, &["app-volume", "40", "25"]).unwrap(), "25\n");
        assert_eq!(platform.session(40).unwrap().volume, 0.25);
        assert_eq!(exec(&platform, &["app-mute", "40", "on"]).unwrap(), "muted\n");
        assert!(exec(&platform, &["app-volume", "41"]).is_err());
    }

    #[test]
    fn test_sessions_listing() {
        let output = exec(&platform(), &["sessions"]).unwrap();
        assert_eq!(output, "40\t50\tunmuted\tinactive\tProcess: player\n");
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        assert!(exec(&platform(), &["devices", "--exclude", "("]).is_err());
    }
}
