use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub trait AudioEngine {
    fn play(&mut self, path: &Path) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn current_track(&self) -> Option<&Path>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    /// Linear gain in `0.0..=1.0`.
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> Option<String>;
    fn is_finished(&self) -> bool;

    fn is_playing(&self) -> bool {
        self.current_track().is_some() && !self.is_paused() && !self.is_finished()
    }
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;
        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => open_fallback_stream(default_err),
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }
}

fn open_fallback_stream(default_err: anyhow::Error) -> Result<OutputStream> {
    warn!("default output failed, trying other devices: {default_err:#}");
    let host = rodio::cpal::default_host();
    let mut candidates: Vec<String> = host
        .output_devices()
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|device| device.name().ok())
        .collect();
    candidates.sort_by_cached_key(|name| {
        let lower = name.to_ascii_lowercase();
        let rank = if lower.contains("pulse") {
            0_u8
        } else if lower.contains("pipewire") {
            1_u8
        } else if lower.contains("default") {
            2_u8
        } else {
            3_u8
        };
        (rank, lower)
    });
    candidates.dedup();

    for candidate in candidates {
        let Some(device) = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
        else {
            continue;
        };
        let opened = OutputStreamBuilder::from_device(device)
            .context("failed to open fallback output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start fallback output stream")
            });
        match opened {
            Ok(stream) => {
                debug!(device = %candidate, "opened fallback output device");
                return Ok(stream);
            }
            Err(err) => debug!(device = %candidate, "fallback device failed: {err:#}"),
        }
    }

    anyhow::bail!("unable to start any audio output stream after default failed: {default_err:#}")
}

impl AudioEngine for RodioAudioEngine {
    fn play(&mut self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.track_duration = source.total_duration();
        self.sink.append(source);
        self.sink.set_volume(self.volume);
        self.current = Some(path.to_path_buf());
        debug!(track = %path.display(), "started playback");
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn current_track(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("System default output (CPAL)"))
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

// ALSA probes write straight to stderr, which would tear the TUI.
#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent engine that keeps a wall-clock position, used without an output device.
#[derive(Debug)]
pub struct NullAudioEngine {
    loaded: Option<LoadedTrack>,
    volume: f32,
}

#[derive(Debug)]
struct LoadedTrack {
    path: PathBuf,
    length: Option<Duration>,
    clock: Clock,
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Running { since: Instant, from: Duration },
    Paused { at: Duration },
}

impl LoadedTrack {
    fn elapsed(&self) -> Duration {
        let raw = match self.clock {
            Clock::Running { since, from } => from.saturating_add(since.elapsed()),
            Clock::Paused { at } => at,
        };
        self.length.map_or(raw, |length| raw.min(length))
    }

    fn is_paused(&self) -> bool {
        matches!(self.clock, Clock::Paused { .. })
    }
}

/// Reads the track length from the file header, if it decodes at all.
fn probe_length(path: &Path) -> Option<Duration> {
    File::open(path)
        .ok()
        .and_then(|file| Decoder::try_from(file).ok())
        .and_then(|source| source.total_duration())
        .filter(|length| !length.is_zero())
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            loaded: None,
            volume: 1.0,
        }
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for NullAudioEngine {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.loaded = Some(LoadedTrack {
            path: path.to_path_buf(),
            length: probe_length(path),
            clock: Clock::Running {
                since: Instant::now(),
                from: Duration::ZERO,
            },
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(track) = self.loaded.as_mut()
            && !track.is_paused()
        {
            track.clock = Clock::Paused {
                at: track.elapsed(),
            };
        }
    }

    fn resume(&mut self) {
        if let Some(track) = self.loaded.as_mut()
            && let Clock::Paused { at } = track.clock
        {
            track.clock = Clock::Running {
                since: Instant::now(),
                from: at,
            };
        }
    }

    fn stop(&mut self) {
        self.loaded = None;
    }

    fn is_paused(&self) -> bool {
        self.loaded.as_ref().is_some_and(LoadedTrack::is_paused)
    }

    fn current_track(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|track| track.path.as_path())
    }

    fn position(&self) -> Option<Duration> {
        self.loaded.as_ref().map(LoadedTrack::elapsed)
    }

    fn duration(&self) -> Option<Duration> {
        self.loaded.as_ref().and_then(|track| track.length)
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let track = self.loaded.as_mut().context("no active track")?;
        let target = track.length.map_or(position, |length| position.min(length));
        track.clock = match track.clock {
            Clock::Running { .. } => Clock::Running {
                since: Instant::now(),
                from: target,
            },
            Clock::Paused { .. } => Clock::Paused { at: target },
        };
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("Null audio engine"))
    }

    fn is_finished(&self) -> bool {
        self.loaded.as_ref().is_some_and(|track| {
            !track.is_paused() && track.length.is_some_and(|length| track.elapsed() >= length)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use tempfile::tempdir;

    const RATE: u32 = 8_000;

    /// 16-bit mono PCM silence.
    fn silent_wav(millis: u32) -> Vec<u8> {
        let data_len = RATE * millis / 1_000 * 2;
        let header: [&[u8]; 12] = [
            b"RIFF",
            &(36 + data_len).to_le_bytes(),
            b"WAVEfmt ",
            &16_u32.to_le_bytes(),
            &1_u16.to_le_bytes(),
            &1_u16.to_le_bytes(),
            &RATE.to_le_bytes(),
            &(RATE * 2).to_le_bytes(),
            &2_u16.to_le_bytes(),
            &16_u16.to_le_bytes(),
            b"data",
            &data_len.to_le_bytes(),
        ];
        let mut wav = header.concat();
        wav.resize(wav.len() + data_len as usize, 0);
        wav
    }

    fn loaded_engine(dir: &Path, millis: u32) -> (NullAudioEngine, PathBuf) {
        let track = dir.join("silence.wav");
        fs::write(&track, silent_wav(millis)).expect("write wav");
        let mut engine = NullAudioEngine::new();
        engine.play(&track).expect("play");
        (engine, track)
    }

    #[test]
    fn probes_length_from_wav_header() {
        let dir = tempdir().expect("tempdir");
        let (engine, track) = loaded_engine(dir.path(), 500);

        assert_eq!(engine.current_track(), Some(track.as_path()));
        let length = engine.duration().expect("length");
        assert!(length >= Duration::from_millis(490) && length <= Duration::from_millis(510));
    }

    #[test]
    fn undecodable_file_plays_with_unknown_length() {
        let mut engine = NullAudioEngine::new();
        engine.play(Path::new("not-there.ogg")).expect("play");

        assert_eq!(engine.duration(), None);
        assert!(engine.is_playing());
        thread::sleep(Duration::from_millis(30));
        assert!(!engine.is_finished());
    }

    #[test]
    fn paused_clock_stands_still() {
        let mut engine = NullAudioEngine::new();
        engine.play(Path::new("not-there.ogg")).expect("play");
        thread::sleep(Duration::from_millis(15));

        engine.pause();
        let held = engine.position().expect("position");
        assert!(held >= Duration::from_millis(15));
        thread::sleep(Duration::from_millis(15));
        assert_eq!(engine.position(), Some(held));
        assert!(engine.is_paused());

        engine.resume();
        thread::sleep(Duration::from_millis(15));
        assert!(engine.position().expect("position") > held);
    }

    #[test]
    fn seek_is_clamped_and_keeps_pause_state() {
        let dir = tempdir().expect("tempdir");
        let (mut engine, _track) = loaded_engine(dir.path(), 300);
        engine.pause();

        engine.seek_to(Duration::from_secs(60)).expect("seek");
        assert!(engine.is_paused());
        assert_eq!(engine.position(), engine.duration());
        assert!(!engine.is_finished());

        engine.resume();
        assert!(engine.is_finished());
        assert!(!engine.is_playing());
    }

    #[test]
    fn finishes_once_length_has_elapsed() {
        let dir = tempdir().expect("tempdir");
        let (engine, _track) = loaded_engine(dir.path(), 40);
        assert!(!engine.is_finished());

        thread::sleep(Duration::from_millis(80));
        assert!(engine.is_finished());
    }

    #[test]
    fn idle_engine_ignores_transport_commands() {
        let mut engine = NullAudioEngine::new();
        assert!(engine.seek_to(Duration::from_secs(1)).is_err());

        engine.pause();
        engine.resume();
        assert!(!engine.is_paused());
        assert_eq!(engine.position(), None);

        engine.play(Path::new("a.mp3")).expect("play");
        engine.stop();
        assert_eq!(engine.current_track(), None);
        assert!(!engine.is_finished());
    }

    #[test]
    fn volume_stays_in_unit_range() {
        let mut engine = NullAudioEngine::new();
        engine.set_volume(3.0);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(-1.0);
        assert_eq!(engine.volume(), 0.0);
    }

    #[test]
    fn failed_play_keeps_the_previous_track() {
        let Ok(mut engine) = RodioAudioEngine::new() else {
            return;
        };
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("good.wav");
        fs::write(&good, silent_wav(2_000)).expect("write wav");
        engine.play(&good).expect("play");

        assert!(engine.play(&dir.path().join("missing.wav")).is_err());
        assert_eq!(engine.current_track(), Some(good.as_path()));
        assert!(engine.duration().is_some());
        assert!(!engine.is_finished());
    }
}
