//! Audio sessions of the default render endpoint.
//!
//! A session is one application's (or stream's) registration with an
//! endpoint's session manager. [`AudioSession`] owns a single session-control
//! reference; [`SessionDirectory`] finds sessions and adjusts their volume on
//! the 0-100 scale used by callers.

use super::device::{AudioError, DataFlow, DeviceRole};
use super::platform::{
    event_context, AudioPlatform, DeviceEnumerator, Endpoint, SessionControl, SessionManager,
    SessionOf, SimpleVolumeControl,
};
use super::volume::finite_level;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Activity state of a session (AudioSessionState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Inactive,
    Active,
    Expired,
}

impl SessionState {
    /// Convert a raw AudioSessionState value. Unknown values map to Expired.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => SessionState::Inactive,
            1 => SessionState::Active,
            _ => SessionState::Expired,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            SessionState::Inactive => 0,
            SessionState::Active => 1,
            SessionState::Expired => 2,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Inactive => "inactive",
            SessionState::Active => "active",
            SessionState::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// One audio session, owning its session-control reference until disposed.
pub struct AudioSession<S> {
    control: Option<S>,
}

impl<S: SessionControl> AudioSession<S> {
    pub fn new(control: S) -> Self {
        Self {
            control: Some(control),
        }
    }

    /// Release the session-control reference. Later calls are no-ops.
    pub fn dispose(&mut self) {
        self.control.take();
    }

    pub fn is_disposed(&self) -> bool {
        self.control.is_none()
    }

    fn control(&self) -> Result<&S, AudioError> {
        self.control.as_ref().ok_or_else(|| {
            error!("Audio session accessed after dispose");
            AudioError::SessionDisposed
        })
    }

    /// Owning process ID; 0 for sessions spanning several processes.
    pub fn process_id(&self) -> Result<u32, AudioError> {
        self.control()?.process_id()
    }

    pub fn state(&self) -> Result<SessionState, AudioError> {
        self.control()?.state()
    }

    pub fn display_name(&self) -> Result<String, AudioError> {
        self.control()?.display_name()
    }

    /// Write the display name, skipping the call when it is unchanged.
    pub fn set_display_name(&self, name: &str) -> Result<(), AudioError> {
        let control = self.control()?;
        if control.display_name()? != name {
            control.set_display_name(name, &event_context())?;
        }
        Ok(())
    }

    pub fn icon_path(&self) -> Result<String, AudioError> {
        self.control()?.icon_path()
    }

    /// Write the icon path, skipping the call when it is unchanged.
    pub fn set_icon_path(&self, path: &str) -> Result<(), AudioError> {
        let control = self.control()?;
        if control.icon_path()? != path {
            control.set_icon_path(path, &event_context())?;
        }
        Ok(())
    }

    pub fn grouping_param(&self) -> Result<Uuid, AudioError> {
        self.control()?.grouping_param()
    }

    pub fn set_grouping_param(&self, grouping: &Uuid) -> Result<(), AudioError> {
        self.control()?
            .set_grouping_param(grouping, &event_context())
    }

    pub fn identifier(&self) -> Result<String, AudioError> {
        self.control()?.session_identifier()
    }

    pub fn instance_identifier(&self) -> Result<String, AudioError> {
        self.control()?.session_instance_identifier()
    }

    pub fn is_system_sounds(&self) -> Result<bool, AudioError> {
        self.control()?.is_system_sounds_session()
    }

    /// Session volume (0.0 to 1.0).
    pub fn volume(&self) -> Result<f32, AudioError> {
        self.control()?.simple_volume()?.master_volume()
    }

    /// Set the session volume (0.0 to 1.0).
    pub fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        let level = finite_level(level)?.clamp(0.0, 1.0);
        self.control()?
            .simple_volume()?
            .set_master_volume(level, &event_context())
    }

    pub fn mute(&self) -> Result<bool, AudioError> {
        self.control()?.simple_volume()?.mute()
    }

    pub fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.control()?
            .simple_volume()?
            .set_mute(muted, &event_context())
    }
}

/// Point-in-time view of a session for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub process_id: u32,
    pub label: String,
    pub state: SessionState,
    /// 0 to 100
    pub volume: f32,
    pub muted: bool,
    pub is_system_sounds: bool,
}

/// Sessions of the default render endpoint.
pub struct SessionDirectory<P> {
    platform: P,
}

impl<P: AudioPlatform> SessionDirectory<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    fn session_controls(&self) -> Result<Vec<SessionOf<P>>, AudioError> {
        let enumerator = self.platform.create_enumerator()?;
        let endpoint = enumerator.default_endpoint(DataFlow::Render, DeviceRole::Multimedia)?;
        let manager = endpoint
            .activate_session_manager()
            .map_err(|_| AudioError::SessionManagerNotAvailable)?;
        manager.sessions()
    }

    /// Every session of the default render endpoint.
    ///
    /// An unavailable endpoint or session manager yields an empty list.
    pub fn list_sessions(&self) -> Vec<AudioSession<SessionOf<P>>> {
        match self.session_controls() {
            Ok(controls) => controls.into_iter().map(AudioSession::new).collect(),
            Err(e) => {
                warn!(error = %e, "Session enumeration unavailable");
                Vec::new()
            }
        }
    }

    /// First session, in enumeration order, owned by `pid`.
    ///
    /// Every other scanned session is released before this returns.
    pub fn find_session_for_process(&self, pid: u32) -> Option<AudioSession<SessionOf<P>>> {
        let controls = match self.session_controls() {
            Ok(controls) => controls,
            Err(e) => {
                warn!(pid, error = %e, "Session enumeration unavailable");
                return None;
            }
        };

        for control in controls {
            match control.process_id() {
                Ok(id) if id == pid => return Some(AudioSession::new(control)),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Skipping session without process ID"),
            }
        }

        debug!(pid, "No audio session for process");
        None
    }

    /// Session for the calling process.
    pub fn current_process_session(&self) -> Option<AudioSession<SessionOf<P>>> {
        self.find_session_for_process(std::process::id())
    }

    /// Volume of the process's session (0 to 100), `None` without a session.
    pub fn session_volume(&self, pid: u32) -> Result<Option<f32>, AudioError> {
        match self.find_session_for_process(pid) {
            Some(session) => Ok(Some(session.volume()? * 100.0)),
            None => Ok(None),
        }
    }

    /// Set the process's session volume (0 to 100, clamped).
    ///
    /// Returns `false` when the process has no session.
    pub fn set_session_volume(&self, pid: u32, level: f32) -> Result<bool, AudioError> {
        let level = finite_level(level)?;
        let Some(session) = self.find_session_for_process(pid) else {
            return Ok(false);
        };
        session.set_volume(level.clamp(0.0, 100.0) / 100.0)?;
        Ok(true)
    }

    pub fn session_mute(&self, pid: u32) -> Result<Option<bool>, AudioError> {
        match self.find_session_for_process(pid) {
            Some(session) => Ok(Some(session.mute()?)),
            None => Ok(None),
        }
    }

    pub fn set_session_mute(&self, pid: u32, muted: bool) -> Result<bool, AudioError> {
        let Some(session) = self.find_session_for_process(pid) else {
            return Ok(false);
        };
        session.set_mute(muted)?;
        Ok(true)
    }

    /// Human-readable label: the display name, else the process executable,
    /// else the bare process ID.
    pub fn describe(&self, session: &AudioSession<SessionOf<P>>) -> Result<String, AudioError> {
        let name = session.display_name()?;
        if !name.is_empty() {
            return Ok(format!("DisplayName: {name}"));
        }

        let pid = session.process_id()?;
        Ok(match self.platform.process_name(pid) {
            Some(process) => format!("Process: {process}"),
            None => format!("Pid: {pid}"),
        })
    }

    /// Summaries of every readable session.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.list_sessions()
            .iter()
            .filter_map(|session| match self.summarize(session) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable session");
                    None
                }
            })
            .collect()
    }

    fn summarize(&self, session: &AudioSession<SessionOf<P>>) -> Result<SessionSummary, AudioError> {
        Ok(SessionSummary {
            process_id: session.process_id()?,
            label: self.describe(session)?,
            state: session.state()?,
            volume: session.volume()? * 100.0,
            muted: session.mute()?,
            is_system_sounds: session.is_system_sounds()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{MockDevice, MockPlatform, MockSession};
    use crate::audio::DeviceState;

    fn platform_with_sessions(sessions: Vec<MockSession>) -> MockPlatform {
        let platform = MockPlatform::new();
        let mut device = MockDevice::render("spk", DeviceState::Active).with_description("Speakers");
        for session in sessions {
            device = device.with_session(session);
        }
        platform.add_device(device);
        platform.set_default_render(Some("spk"));
        platform
    }

    #[test]
    fn test_session_state_raw_values() {
        for state in [SessionState::Inactive, SessionState::Active, SessionState::Expired] {
            assert_eq!(SessionState::from_raw(state.raw()), state);
        }
        assert_eq!(SessionState::from_raw(7), SessionState::Expired);
    }

    #[test]
    fn test_list_sessions_in_enumeration_order() {
        let platform = platform_with_sessions(vec![
            MockSession::new(0).system_sounds(),
            MockSession::new(100).with_display_name("Music"),
            MockSession::new(200),
        ]);
        let directory = SessionDirectory::new(platform.clone());

        let sessions = directory.list_sessions();
        let pids: Vec<_> = sessions.iter().map(|s| s.process_id().unwrap()).collect();
        assert_eq!(pids, vec![0, 100, 200]);
        assert!(sessions[0].is_system_sounds().unwrap());
        assert_eq!(platform.live_references(), 3);

        drop(sessions);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_list_sessions_without_default_endpoint() {
        let platform = platform_with_sessions(vec![MockSession::new(1)]);
        platform.set_default_render(None);
        let directory = SessionDirectory::new(platform.clone());
        assert!(directory.list_sessions().is_empty());
        assert!(directory.find_session_for_process(1).is_none());
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_list_sessions_without_session_manager() {
        let platform = MockPlatform::new();
        platform.add_device(
            MockDevice::render("spk", DeviceState::Active).without_session_manager(),
        );
        platform.set_default_render(Some("spk"));

        let directory = SessionDirectory::new(platform.clone());
        assert!(directory.list_sessions().is_empty());
        assert_eq!(directory.session_volume(1).unwrap(), None);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_find_session_keeps_only_the_match() {
        let platform = platform_with_sessions(vec![
            MockSession::new(10),
            MockSession::new(20),
            MockSession::new(30),
        ]);
        let directory = SessionDirectory::new(platform.clone());

        let session = directory.find_session_for_process(20).unwrap();
        assert_eq!(session.process_id().unwrap(), 20);
        assert_eq!(platform.live_references(), 1);

        drop(session);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_find_session_first_match_wins() {
        let platform = platform_with_sessions(vec![
            MockSession::new(10).with_display_name("first"),
            MockSession::new(10).with_display_name("second"),
        ]);
        let directory = SessionDirectory::new(platform);

        let session = directory.find_session_for_process(10).unwrap();
        assert_eq!(session.display_name().unwrap(), "first");
    }

    #[test]
    fn test_unmatched_lookup_leaks_nothing() {
        let platform = platform_with_sessions(vec![MockSession::new(10), MockSession::new(20)]);
        let directory = SessionDirectory::new(platform.clone());

        assert!(directory.find_session_for_process(99).is_none());
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_session_volume_uses_percent_scale() {
        let platform = platform_with_sessions(vec![MockSession::new(42).with_volume(0.5)]);
        let directory = SessionDirectory::new(platform.clone());

        assert_eq!(directory.session_volume(42).unwrap(), Some(50.0));
        assert!(directory.set_session_volume(42, 25.0).unwrap());
        assert_eq!(platform.session(42).unwrap().volume, 0.25);
        assert_eq!(directory.session_volume(42).unwrap(), Some(25.0));
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_set_session_volume_clamps() {
        let platform = platform_with_sessions(vec![MockSession::new(42)]);
        let directory = SessionDirectory::new(platform.clone());

        assert!(directory.set_session_volume(42, 150.0).unwrap());
        assert_eq!(platform.session(42).unwrap().volume, 1.0);

        assert!(directory.set_session_volume(42, -20.0).unwrap());
        assert_eq!(platform.session(42).unwrap().volume, 0.0);
    }

    #[test]
    fn test_nan_session_volume_is_rejected() {
        let platform = platform_with_sessions(vec![MockSession::new(42).with_volume(0.5)]);
        let directory = SessionDirectory::new(platform.clone());

        assert!(matches!(
            directory.set_session_volume(42, f32::NAN),
            Err(AudioError::InvalidLevel(_))
        ));
        let session = directory.find_session_for_process(42).unwrap();
        assert!(matches!(
            session.set_volume(f32::INFINITY),
            Err(AudioError::InvalidLevel(_))
        ));
        drop(session);

        assert_eq!(platform.session(42).unwrap().volume, 0.5);
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_session_volume_without_session() {
        let platform = platform_with_sessions(vec![MockSession::new(1)]);
        let directory = SessionDirectory::new(platform);

        assert_eq!(directory.session_volume(2).unwrap(), None);
        assert!(!directory.set_session_volume(2, 10.0).unwrap());
        assert_eq!(directory.session_mute(2).unwrap(), None);
        assert!(!directory.set_session_mute(2, true).unwrap());
    }

    #[test]
    fn test_session_mute() {
        let platform = platform_with_sessions(vec![MockSession::new(7)]);
        let directory = SessionDirectory::new(platform.clone());

        assert_eq!(directory.session_mute(7).unwrap(), Some(false));
        assert!(directory.set_session_mute(7, true).unwrap());
        assert!(platform.session(7).unwrap().muted);
        assert_eq!(directory.session_mute(7).unwrap(), Some(true));
    }

    #[test]
    fn test_mutations_carry_fresh_event_contexts() {
        let platform = platform_with_sessions(vec![MockSession::new(7)]);
        let directory = SessionDirectory::new(platform.clone());

        directory.set_session_volume(7, 30.0).unwrap();
        directory.set_session_mute(7, true).unwrap();

        let contexts = platform.event_contexts();
        assert_eq!(contexts.len(), 2);
        assert_ne!(contexts[0], contexts[1]);
        assert!(contexts.iter().all(|c| c.get_version_num() == 4));
    }

    #[test]
    fn test_current_process_session() {
        let own = std::process::id();
        let platform = platform_with_sessions(vec![MockSession::new(own + 1), MockSession::new(own)]);
        let directory = SessionDirectory::new(platform);

        let session = directory.current_process_session().unwrap();
        assert_eq!(session.process_id().unwrap(), own);
    }

    #[test]
    fn test_disposed_session_fails_every_access() {
        let platform = platform_with_sessions(vec![MockSession::new(5).with_display_name("Game")]);
        let directory = SessionDirectory::new(platform.clone());

        let mut session = directory.find_session_for_process(5).unwrap();
        session.dispose();
        assert!(session.is_disposed());
        assert_eq!(platform.live_references(), 0);

        assert!(matches!(session.process_id(), Err(AudioError::SessionDisposed)));
        assert!(matches!(session.display_name(), Err(AudioError::SessionDisposed)));
        assert!(matches!(session.set_display_name("x"), Err(AudioError::SessionDisposed)));
        assert!(matches!(session.volume(), Err(AudioError::SessionDisposed)));
        assert!(matches!(session.set_mute(true), Err(AudioError::SessionDisposed)));
        assert!(matches!(session.grouping_param(), Err(AudioError::SessionDisposed)));

        // Disposing twice is harmless.
        session.dispose();
        assert_eq!(platform.live_references(), 0);
    }

    #[test]
    fn test_display_name_written_only_when_changed() {
        let platform = platform_with_sessions(vec![MockSession::new(5)
            .with_display_name("Game")
            .with_icon_path("game.ico")]);
        let directory = SessionDirectory::new(platform.clone());
        let session = directory.find_session_for_process(5).unwrap();

        session.set_display_name("Game").unwrap();
        session.set_icon_path("game.ico").unwrap();
        assert_eq!(platform.session(5).unwrap().metadata_writes, 0);

        session.set_display_name("Renamed").unwrap();
        session.set_icon_path("other.ico").unwrap();
        let stored = platform.session(5).unwrap();
        assert_eq!(stored.metadata_writes, 2);
        assert_eq!(stored.display_name, "Renamed");
        assert_eq!(stored.icon_path, "other.ico");
    }

    #[test]
    fn test_session_identity_accessors() {
        let grouping = Uuid::from_u128(0xfeed);
        let platform = platform_with_sessions(vec![MockSession::new(5)
            .with_identifiers("{0.0.0}|app.exe", "{0.0.0}|app.exe|1")
            .with_state(SessionState::Active)]);
        let directory = SessionDirectory::new(platform.clone());
        let session = directory.find_session_for_process(5).unwrap();

        assert_eq!(session.identifier().unwrap(), "{0.0.0}|app.exe");
        assert_eq!(session.instance_identifier().unwrap(), "{0.0.0}|app.exe|1");
        assert_eq!(session.state().unwrap(), SessionState::Active);

        session.set_grouping_param(&grouping).unwrap();
        assert_eq!(session.grouping_param().unwrap(), grouping);
    }

    #[test]
    fn test_describe_falls_back_to_process_then_pid() {
        let platform = platform_with_sessions(vec![
            MockSession::new(1).with_display_name("@%SystemRoot%\\audiosrv.dll"),
            MockSession::new(2),
            MockSession::new(3),
        ]);
        platform.add_process(2, "spotify.exe");
        let directory = SessionDirectory::new(platform);

        let labels: Vec<_> = directory
            .list_sessions()
            .iter()
            .map(|s| directory.describe(s).unwrap())
            .collect();
        assert_eq!(
            labels,
            vec![
                "DisplayName: @%SystemRoot%\\audiosrv.dll".to_string(),
                "Process: spotify.exe".to_string(),
                "Pid: 3".to_string(),
            ]
        );
    }

    #[test]
    fn test_summaries() {
        let platform = platform_with_sessions(vec![
            MockSession::new(8).with_volume(0.75).muted(true),
        ]);
        platform.add_process(8, "game.exe");
        let directory = SessionDirectory::new(platform.clone());

        let summaries = directory.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].process_id, 8);
        assert_eq!(summaries[0].label, "Process: game.exe");
        assert_eq!(summaries[0].volume, 75.0);
        assert!(summaries[0].muted);
        assert_eq!(platform.live_references(), 0);
    }
}
