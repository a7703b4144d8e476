use crate::audio::AudioEngine;
use crate::config::ConfigPaths;
use crate::library;
use crate::model::{
    DEFAULT_VOLUME_PERCENT, MAX_OPACITY, MIN_OPACITY, Theme, opacity_from_percent, opacity_percent,
};
use crate::playlist::PlaylistStore;
use crate::settings::SettingsStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const EMPTY_PLAYLIST_WARNING: &str = "Playlist is empty, add some songs first!";
pub const IDLE_TRACK_LABEL: &str = "Ready to play...";
const OPACITY_STEP: u8 = 5;
pub const VOLUME_STEP: i16 = 5;
pub const SEEK_STEP: i16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    OpenFolder,
    ViewPlaylist,
    GreyTheme,
    TransparentTheme,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        Self::OpenFolder,
        Self::ViewPlaylist,
        Self::GreyTheme,
        Self::TransparentTheme,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenFolder => "Open Folder",
            Self::ViewPlaylist => "Playlist",
            Self::GreyTheme => "Soft Dark",
            Self::TransparentTheme => "Transparent Mode",
        }
    }
}

/// Popup drawn over the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    FilesMenu { selected: usize },
    Playlist { selected: usize },
    Opacity { percent: u8 },
    FolderPrompt { input: String },
    About,
    Warning(String),
}

/// What the progress timer last read from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub elapsed: Duration,
    pub total: Duration,
    pub track_label: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            percent: 0,
            elapsed: Duration::ZERO,
            total: Duration::ZERO,
            track_label: String::from(IDLE_TRACK_LABEL),
        }
    }
}

#[derive(Debug)]
pub struct GapCore {
    pub playlist: PlaylistStore,
    pub settings: SettingsStore,
    pub volume_percent: u8,
    pub progress: Progress,
    pub overlay: Option<Overlay>,
    pub status: String,
    pub dirty: bool,
}

impl GapCore {
    pub fn new(playlist: PlaylistStore, settings: SettingsStore) -> Self {
        Self {
            playlist,
            settings,
            volume_percent: DEFAULT_VOLUME_PERCENT,
            progress: Progress::default(),
            overlay: None,
            status: String::from("Ready"),
            dirty: true,
        }
    }

    /// Loads the persisted playlist, theme and opacity.
    pub fn open(paths: &ConfigPaths) -> Self {
        let core = Self::new(PlaylistStore::open(paths), SettingsStore::open(paths));
        info!(
            tracks = core.playlist.count(),
            theme = ?core.settings.theme(),
            opacity = core.settings.opacity(),
            "restored session"
        );
        core
    }

    pub fn status_bar_text(&self) -> String {
        format!("♪ {} tracks loaded", self.playlist.count())
    }

    pub fn toggle_playback(&mut self, audio: &mut dyn AudioEngine) {
        if self.playlist.is_empty() {
            self.overlay = Some(Overlay::Warning(String::from(EMPTY_PLAYLIST_WARNING)));
            self.set_status("Playlist not found!");
            return;
        }

        if audio.is_playing() {
            audio.pause();
            self.set_status("Paused");
        } else if audio.current_track().is_some() && audio.is_paused() {
            audio.resume();
            self.set_status("Playing");
        } else if let Some(index) = self.playlist.queue().start_index() {
            self.play_at(index, audio);
        }
    }

    pub fn next_track(&mut self, audio: &mut dyn AudioEngine) {
        match self.playlist.queue().next_index() {
            Some(index) => self.play_at(index, audio),
            None => self.set_status("Already at the last track"),
        }
    }

    pub fn previous_track(&mut self, audio: &mut dyn AudioEngine) {
        match self.playlist.queue().previous_index() {
            Some(index) => self.play_at(index, audio),
            None => self.set_status("Already at the first track"),
        }
    }

    pub fn play_at(&mut self, index: usize, audio: &mut dyn AudioEngine) {
        let Some(path) = self.playlist.queue_mut().select(index).map(Path::to_path_buf) else {
            self.set_status("No such track");
            return;
        };

        match audio.play(&path) {
            Ok(()) => {
                audio.set_volume(volume_gain(self.volume_percent));
                self.progress = Progress {
                    track_label: library::track_label(&path),
                    ..Progress::default()
                };
                self.set_status(&format!("Playing {}", self.progress.track_label));
            }
            Err(err) => {
                warn!("playback failed: {err:#}");
                self.set_status(&format!("playback error: {err:#}"));
            }
        }
    }

    /// Seeks to `percent` of the current track. Ignored while the duration is unknown.
    pub fn seek_percent(&mut self, percent: u8, audio: &mut dyn AudioEngine) {
        let percent = percent.min(100);
        let Some(duration) = audio.duration().filter(|d| !d.is_zero()) else {
            return;
        };

        let target = duration.mul_f64(f64::from(percent) / 100.0);
        if let Err(err) = audio.seek_to(target) {
            warn!("seek failed: {err:#}");
            self.set_status(&format!("seek error: {err:#}"));
            return;
        }

        self.progress.percent = percent;
        self.progress.elapsed = target;
        self.progress.total = duration;
        self.dirty = true;
    }

    pub fn seek_by(&mut self, delta_percent: i16, audio: &mut dyn AudioEngine) {
        let target = (i16::from(self.progress.percent) + delta_percent).clamp(0, 100);
        self.seek_percent(target as u8, audio);
    }

    pub fn set_volume(&mut self, percent: u8, audio: &mut dyn AudioEngine) {
        self.volume_percent = percent.min(100);
        audio.set_volume(volume_gain(self.volume_percent));
        self.set_status(&format!("Volume: {}%", self.volume_percent));
    }

    /// Pushes the current volume to a freshly opened engine.
    pub fn sync_volume(&self, audio: &mut dyn AudioEngine) {
        audio.set_volume(volume_gain(self.volume_percent));
    }

    pub fn adjust_volume(&mut self, delta: i16, audio: &mut dyn AudioEngine) {
        let next = (i16::from(self.volume_percent) + delta).clamp(0, 100);
        self.set_volume(next as u8, audio);
    }

    /// One tick of the progress timer.
    pub fn poll_progress(&mut self, audio: &mut dyn AudioEngine) {
        if audio.current_track().is_some() && !audio.is_paused() && audio.is_finished() {
            self.advance_after_finish(audio);
        }

        if !audio.is_playing() {
            return;
        }

        let Some(duration) = audio.duration().filter(|d| !d.is_zero()) else {
            return;
        };
        let elapsed = audio.position().unwrap_or_default().min(duration);
        let ratio = elapsed.as_secs_f64() / duration.as_secs_f64();
        self.progress.percent = (ratio * 100.0) as u8;
        self.progress.elapsed = elapsed;
        self.progress.total = duration;
        if let Some(path) = audio.current_track() {
            self.progress.track_label = library::track_label(path);
        }
        self.dirty = true;
    }

    fn advance_after_finish(&mut self, audio: &mut dyn AudioEngine) {
        match self.playlist.queue().next_index() {
            Some(index) => self.play_at(index, audio),
            None => {
                audio.stop();
                self.progress.percent = 100;
                self.progress.elapsed = self.progress.total;
                self.set_status("Reached end of playlist");
            }
        }
    }

    pub fn open_folder(&mut self, dir: &Path) {
        if !dir.is_dir() {
            self.set_status(&format!("Not a folder: {}", dir.display()));
            return;
        }

        let added = self.playlist.add_folder(dir);
        self.set_status(&format!("Added {added} tracks from {}", dir.display()));
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.set_theme(theme);
        if let Err(err) = self.settings.save_theme() {
            warn!("error saving theme: {err:#}");
        }
        self.set_status(&format!("Theme: {}", theme.label()));
    }

    pub fn set_custom_opacity(&mut self, percent: u8) {
        let stored = self.settings.set_opacity(opacity_from_percent(percent));
        self.set_theme(Theme::Transparent);
        if let Err(err) = self.settings.save_opacity() {
            warn!("error saving opacity: {err:#}");
        }
        self.set_status(&format!("Opacity: {}%", opacity_percent(stored)));
    }

    pub fn save_playlist(&mut self) -> anyhow::Result<()> {
        self.playlist.save()?;
        info!(tracks = self.playlist.count(), "saved playlist");
        Ok(())
    }

    /// Normal-shutdown path: persists the playlist, logging any failure.
    pub fn shutdown(&mut self, audio: &mut dyn AudioEngine) {
        audio.stop();
        if let Err(err) = self.save_playlist() {
            warn!("failed to save playlist: {err:#}");
        }
    }

    pub fn open_files_menu(&mut self) {
        self.open_overlay(Overlay::FilesMenu { selected: 0 });
    }

    pub fn open_about(&mut self) {
        self.open_overlay(Overlay::About);
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
        self.dirty = true;
    }

    pub fn overlay_up(&mut self) {
        if let Some(Overlay::FilesMenu { selected } | Overlay::Playlist { selected }) =
            &mut self.overlay
        {
            *selected = selected.saturating_sub(1);
            self.dirty = true;
        }
    }

    pub fn overlay_down(&mut self) {
        let len = match &self.overlay {
            Some(Overlay::FilesMenu { .. }) => MenuAction::ALL.len(),
            Some(Overlay::Playlist { .. }) => self.playlist.count(),
            _ => return,
        };
        if let Some(Overlay::FilesMenu { selected } | Overlay::Playlist { selected }) =
            &mut self.overlay
        {
            *selected = (*selected + 1).min(len.saturating_sub(1));
            self.dirty = true;
        }
    }

    /// Moves the opacity slider by one step in the given direction.
    pub fn overlay_slide(&mut self, increase: bool) {
        if let Some(Overlay::Opacity { percent }) = &mut self.overlay {
            let min = opacity_percent(MIN_OPACITY);
            let max = opacity_percent(MAX_OPACITY);
            *percent = if increase {
                percent.saturating_add(OPACITY_STEP).min(max)
            } else {
                percent.saturating_sub(OPACITY_STEP).max(min)
            };
            self.dirty = true;
        }
    }

    pub fn overlay_input(&mut self, ch: char) {
        if let Some(Overlay::FolderPrompt { input }) = &mut self.overlay {
            input.push(ch);
            self.dirty = true;
        }
    }

    pub fn overlay_backspace(&mut self) {
        if let Some(Overlay::FolderPrompt { input }) = &mut self.overlay {
            input.pop();
            self.dirty = true;
        }
    }

    pub fn overlay_confirm(&mut self, audio: &mut dyn AudioEngine) {
        let Some(overlay) = self.overlay.clone() else {
            return;
        };

        match overlay {
            Overlay::FilesMenu { selected } => {
                let action = MenuAction::ALL[selected.min(MenuAction::ALL.len() - 1)];
                self.run_menu_action(action);
            }
            Overlay::Playlist { selected } => {
                if selected < self.playlist.count() {
                    self.play_at(selected, audio);
                }
            }
            Overlay::Opacity { percent } => {
                self.set_custom_opacity(percent);
                self.close_overlay();
            }
            Overlay::FolderPrompt { input } => {
                self.close_overlay();
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    self.set_status("No folder given");
                } else {
                    self.open_folder(&expand_home(trimmed));
                }
            }
            Overlay::About | Overlay::Warning(_) => self.close_overlay(),
        }
    }

    fn run_menu_action(&mut self, action: MenuAction) {
        match action {
            MenuAction::OpenFolder => self.open_overlay(Overlay::FolderPrompt {
                input: String::new(),
            }),
            MenuAction::ViewPlaylist => {
                let selected = self.playlist.queue().current_index().unwrap_or(0);
                self.open_overlay(Overlay::Playlist { selected });
            }
            MenuAction::GreyTheme => {
                self.close_overlay();
                self.set_theme(Theme::Grey);
            }
            MenuAction::TransparentTheme => {
                let percent = opacity_percent(self.settings.opacity());
                self.open_overlay(Overlay::Opacity { percent });
            }
        }
    }

    fn open_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
        self.dirty = true;
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

fn volume_gain(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Formats a duration as `m:ss`.
pub fn format_time(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioEngine;
    use anyhow::Result;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct ScriptedAudio {
        current: Option<PathBuf>,
        paused: bool,
        finished: bool,
        duration: Option<Duration>,
        position: Duration,
        volume: f32,
        played: Vec<PathBuf>,
        seeks: Vec<Duration>,
        stopped: bool,
    }

    impl AudioEngine for ScriptedAudio {
        fn play(&mut self, path: &Path) -> Result<()> {
            self.current = Some(path.to_path_buf());
            self.paused = false;
            self.finished = false;
            self.played.push(path.to_path_buf());
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn resume(&mut self) {
            self.paused = false;
        }

        fn stop(&mut self) {
            self.stopped = true;
            self.current = None;
            self.finished = false;
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn current_track(&self) -> Option<&Path> {
            self.current.as_deref()
        }

        fn position(&self) -> Option<Duration> {
            self.current.as_ref().map(|_| self.position)
        }

        fn duration(&self) -> Option<Duration> {
            self.duration
        }

        fn seek_to(&mut self, position: Duration) -> Result<()> {
            self.seeks.push(position);
            self.position = position;
            Ok(())
        }

        fn volume(&self) -> f32 {
            self.volume
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn output_name(&self) -> Option<String> {
            Some(String::from("scripted"))
        }

        fn is_finished(&self) -> bool {
            self.finished
        }
    }

    fn core_with(tracks: &[&str]) -> (GapCore, TempDir) {
        let dir = tempdir().expect("tempdir");
        let paths = ConfigPaths::new(dir.path());
        let mut core = GapCore::new(PlaylistStore::new(&paths), SettingsStore::new(&paths));
        for track in tracks {
            core.playlist.add(*track);
        }
        (core, dir)
    }

    #[test]
    fn play_on_empty_playlist_shows_warning() {
        let (mut core, _dir) = core_with(&[]);
        let mut audio = ScriptedAudio::default();

        core.toggle_playback(&mut audio);

        assert_eq!(
            core.overlay,
            Some(Overlay::Warning(String::from(EMPTY_PLAYLIST_WARNING)))
        );
        assert!(audio.played.is_empty());
    }

    #[test]
    fn toggle_starts_pauses_and_resumes() {
        let (mut core, _dir) = core_with(&["a.mp3", "b.mp3"]);
        let mut audio = ScriptedAudio::default();

        core.toggle_playback(&mut audio);
        assert_eq!(audio.played, vec![PathBuf::from("a.mp3")]);
        assert_eq!(core.progress.track_label, "a.mp3");
        assert_eq!(audio.volume, 0.7);

        core.toggle_playback(&mut audio);
        assert!(audio.paused);

        core.toggle_playback(&mut audio);
        assert!(!audio.paused);
        assert_eq!(audio.played.len(), 1);
    }

    #[test]
    fn next_and_previous_do_not_wrap() {
        let (mut core, _dir) = core_with(&["a.mp3", "b.mp3"]);
        let mut audio = ScriptedAudio::default();

        core.previous_track(&mut audio);
        assert!(audio.played.is_empty());

        core.next_track(&mut audio);
        core.next_track(&mut audio);
        core.next_track(&mut audio);
        assert_eq!(
            audio.played,
            vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3")]
        );
        assert_eq!(core.status, "Already at the last track");

        core.previous_track(&mut audio);
        assert_eq!(audio.played.last(), Some(&PathBuf::from("a.mp3")));
    }

    #[test]
    fn seek_uses_fraction_of_known_duration() {
        let (mut core, _dir) = core_with(&["a.mp3"]);
        let mut audio = ScriptedAudio::default();
        core.seek_percent(50, &mut audio);
        assert!(audio.seeks.is_empty());

        core.play_at(0, &mut audio);
        audio.duration = Some(Duration::from_secs(200));
        core.seek_percent(25, &mut audio);

        assert_eq!(audio.seeks, vec![Duration::from_secs(50)]);
        assert_eq!(core.progress.percent, 25);
    }

    #[test]
    fn zero_duration_never_seeks() {
        let (mut core, _dir) = core_with(&["a.mp3"]);
        let mut audio = ScriptedAudio::default();
        core.play_at(0, &mut audio);
        audio.duration = Some(Duration::ZERO);

        core.seek_percent(80, &mut audio);
        assert!(audio.seeks.is_empty());
    }

    #[test]
    fn poll_updates_progress_labels() {
        let (mut core, _dir) = core_with(&["/music/a.mp3"]);
        let mut audio = ScriptedAudio::default();
        core.play_at(0, &mut audio);
        audio.duration = Some(Duration::from_secs(240));
        audio.position = Duration::from_secs(60);

        core.poll_progress(&mut audio);

        assert_eq!(core.progress.percent, 25);
        assert_eq!(format_time(core.progress.elapsed), "1:00");
        assert_eq!(format_time(core.progress.total), "4:00");
        assert_eq!(core.progress.track_label, "a.mp3");
    }

    #[test]
    fn poll_leaves_progress_alone_while_paused() {
        let (mut core, _dir) = core_with(&["a.mp3"]);
        let mut audio = ScriptedAudio::default();
        core.play_at(0, &mut audio);
        audio.duration = Some(Duration::from_secs(100));
        audio.position = Duration::from_secs(10);
        audio.paused = true;

        core.poll_progress(&mut audio);
        assert_eq!(core.progress.percent, 0);
    }

    #[test]
    fn finished_track_advances_then_stops_at_end() {
        let (mut core, _dir) = core_with(&["a.mp3", "b.mp3"]);
        let mut audio = ScriptedAudio::default();
        core.play_at(0, &mut audio);

        audio.finished = true;
        core.poll_progress(&mut audio);
        assert_eq!(audio.played.last(), Some(&PathBuf::from("b.mp3")));
        assert_eq!(core.playlist.queue().current_index(), Some(1));

        audio.finished = true;
        core.poll_progress(&mut audio);
        assert!(audio.stopped);
        assert_eq!(core.status, "Reached end of playlist");
    }

    #[test]
    fn volume_is_clamped_and_forwarded() {
        let (mut core, _dir) = core_with(&[]);
        let mut audio = ScriptedAudio::default();
        core.adjust_volume(50, &mut audio);
        assert_eq!(core.volume_percent, 100);
        assert_eq!(audio.volume, 1.0);

        core.set_volume(0, &mut audio);
        core.adjust_volume(-VOLUME_STEP, &mut audio);
        assert_eq!(core.volume_percent, 0);
    }

    #[test]
    fn custom_opacity_switches_to_transparent_and_persists() {
        let (mut core, dir) = core_with(&[]);
        core.set_custom_opacity(55);

        assert_eq!(core.settings.theme(), Theme::Transparent);
        assert_eq!(core.settings.opacity(), 0.55);

        let reloaded = SettingsStore::open(&ConfigPaths::new(dir.path()));
        assert_eq!(reloaded.theme(), Theme::Transparent);
        assert_eq!(reloaded.opacity(), 0.55);
    }

    #[test]
    fn opacity_slider_stays_within_control_range() {
        let (mut core, _dir) = core_with(&[]);
        core.overlay = Some(Overlay::Opacity { percent: 45 });
        core.overlay_slide(false);
        core.overlay_slide(false);
        assert_eq!(core.overlay, Some(Overlay::Opacity { percent: 40 }));

        core.overlay = Some(Overlay::Opacity { percent: 95 });
        core.overlay_slide(true);
        core.overlay_slide(true);
        assert_eq!(core.overlay, Some(Overlay::Opacity { percent: 100 }));
    }

    #[test]
    fn files_menu_walks_into_folder_prompt_and_scans() {
        let (mut core, dir) = core_with(&[]);
        let music = dir.path().join("music");
        fs::create_dir_all(&music).expect("mkdir");
        fs::write(music.join("song.flac"), b"x").expect("write");
        let mut audio = NullAudioEngine::new();

        core.open_files_menu();
        core.overlay_confirm(&mut audio);
        assert_eq!(
            core.overlay,
            Some(Overlay::FolderPrompt {
                input: String::new()
            })
        );

        for ch in music.to_string_lossy().chars() {
            core.overlay_input(ch);
        }
        core.overlay_confirm(&mut audio);

        assert_eq!(core.overlay, None);
        assert_eq!(core.playlist.paths(), &[music.join("song.flac")]);
        assert_eq!(core.status_bar_text(), "♪ 1 tracks loaded");
    }

    #[test]
    fn playlist_view_plays_confirmed_row() {
        let (mut core, _dir) = core_with(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut audio = ScriptedAudio::default();

        core.open_files_menu();
        core.overlay_down();
        core.overlay_confirm(&mut audio);
        assert_eq!(core.overlay, Some(Overlay::Playlist { selected: 0 }));

        core.overlay_down();
        core.overlay_down();
        core.overlay_down();
        core.overlay_confirm(&mut audio);

        assert_eq!(audio.played, vec![PathBuf::from("c.mp3")]);
        assert_eq!(core.playlist.queue().current_index(), Some(2));
    }

    #[test]
    fn shutdown_persists_playlist() {
        let (mut core, dir) = core_with(&[]);
        let song = dir.path().join("kept.mp3");
        fs::write(&song, b"x").expect("write");
        core.playlist.add(&song);
        let mut audio = ScriptedAudio::default();

        core.shutdown(&mut audio);

        let reloaded = PlaylistStore::open(&ConfigPaths::new(dir.path()));
        assert_eq!(reloaded.paths(), &[song]);
    }

    #[test]
    fn time_is_formatted_as_minutes_and_padded_seconds() {
        assert_eq!(format_time(Duration::ZERO), "0:00");
        assert_eq!(format_time(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_time(Duration::from_secs(3_600)), "60:00");
    }

    proptest::proptest! {
        #[test]
        fn queue_cursor_stays_in_bounds(ops in proptest::collection::vec(0u8..6, 1..200), len in 0usize..6) {
            let names: Vec<String> = (0..len).map(|n| format!("song_{n}.mp3")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let (mut core, _dir) = core_with(&refs);
            let mut audio = ScriptedAudio::default();

            for op in ops {
                match op {
                    0 => core.toggle_playback(&mut audio),
                    1 => core.next_track(&mut audio),
                    2 => core.previous_track(&mut audio),
                    3 => {
                        audio.finished = true;
                        core.poll_progress(&mut audio);
                    }
                    4 => core.play_at(len / 2, &mut audio),
                    _ => core.close_overlay(),
                }

                if let Some(idx) = core.playlist.queue().current_index() {
                    proptest::prop_assert!(idx < core.playlist.count());
                }
                proptest::prop_assert_eq!(core.playlist.queue().len(), core.playlist.count());
            }
        }
    }
}
