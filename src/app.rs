use crate::audio::{AudioEngine, NullAudioEngine, RodioAudioEngine};
use crate::config::ConfigPaths;
use crate::core::{GapCore, Overlay, SEEK_STEP, VOLUME_STEP};
use crate::ui::{self, PlayerLayout};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const INPUT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default)]
pub struct AppStartupOptions {
    pub null_audio: bool,
    pub add_folders: Vec<PathBuf>,
}

/// What a key press asks the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub fn run_with_startup(paths: &ConfigPaths, options: AppStartupOptions) -> Result<()> {
    let mut core = GapCore::open(paths);
    for folder in &options.add_folders {
        core.open_folder(folder);
    }

    let mut audio = open_audio(options.null_audio);
    core.sync_volume(&mut *audio);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut core, &mut *audio);
    let closed = close_session(&mut core, &mut *audio, || restore_terminal(&mut terminal));
    result.and(closed)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs `restore`, then saves the session whether or not restoring worked.
fn close_session(
    core: &mut GapCore,
    audio: &mut dyn AudioEngine,
    restore: impl FnOnce() -> Result<()>,
) -> Result<()> {
    let restored = restore();
    core.shutdown(audio);
    info!("player closed");
    restored
}

fn open_audio(force_null: bool) -> Box<dyn AudioEngine> {
    if force_null {
        info!("using null audio engine");
        return Box::new(NullAudioEngine::new());
    }

    match RodioAudioEngine::new() {
        Ok(engine) => {
            info!(output = ?engine.output_name(), "audio output ready");
            Box::new(engine)
        }
        Err(err) => {
            warn!("no audio output, falling back to null engine: {err:#}");
            Box::new(NullAudioEngine::new())
        }
    }
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    core: &mut GapCore,
    audio: &mut dyn AudioEngine,
) -> Result<()> {
    let mut last_progress = Instant::now();
    let mut layout = PlayerLayout::default();

    loop {
        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            core.poll_progress(audio);
            last_progress = Instant::now();
        }

        if core.dirty {
            terminal.draw(|frame| {
                layout = ui::player_layout(frame.area());
                ui::draw(frame, &*core, &*audio);
            })?;
            core.dirty = false;
        }

        if !event::poll(INPUT_POLL)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if handle_key(core, audio, key) == Flow::Quit {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => handle_mouse(core, audio, mouse, &layout),
            Event::Resize(_, _) => core.dirty = true,
            _ => {}
        }
    }
}

fn handle_key(core: &mut GapCore, audio: &mut dyn AudioEngine, key: KeyEvent) -> Flow {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Flow::Quit;
    }

    if let Some(overlay) = &core.overlay {
        let typing = matches!(overlay, Overlay::FolderPrompt { .. });
        match key.code {
            KeyCode::Esc => core.close_overlay(),
            KeyCode::Enter => core.overlay_confirm(audio),
            KeyCode::Backspace if typing => core.overlay_backspace(),
            KeyCode::Char(ch) if typing => core.overlay_input(ch),
            KeyCode::Up | KeyCode::Char('k') => core.overlay_up(),
            KeyCode::Down | KeyCode::Char('j') => core.overlay_down(),
            KeyCode::Left | KeyCode::Char('h') => core.overlay_slide(false),
            KeyCode::Right | KeyCode::Char('l') => core.overlay_slide(true),
            _ => {}
        }
        return Flow::Continue;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
        KeyCode::Char(' ') => core.toggle_playback(audio),
        KeyCode::Char('n') | KeyCode::Right => core.next_track(audio),
        KeyCode::Char('p') | KeyCode::Left => core.previous_track(audio),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
            core.adjust_volume(VOLUME_STEP, audio)
        }
        KeyCode::Char('-') | KeyCode::Down => core.adjust_volume(-VOLUME_STEP, audio),
        KeyCode::Char('.') => core.seek_by(SEEK_STEP, audio),
        KeyCode::Char(',') => core.seek_by(-SEEK_STEP, audio),
        KeyCode::Char('f') => core.open_files_menu(),
        KeyCode::Char('a') => core.open_about(),
        _ => {}
    }
    Flow::Continue
}

fn handle_mouse(
    core: &mut GapCore,
    audio: &mut dyn AudioEngine,
    mouse: MouseEvent,
    layout: &PlayerLayout,
) {
    if core.overlay.is_some() {
        return;
    }

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left)
            if ui::point_in_rect(mouse.column, mouse.row, layout.progress) =>
        {
            if let Some(percent) = ui::column_percent(layout.progress, mouse.column) {
                core.seek_percent(percent, audio);
            }
        }
        MouseEventKind::ScrollUp if ui::point_in_rect(mouse.column, mouse.row, layout.volume) => {
            core.adjust_volume(VOLUME_STEP, audio)
        }
        MouseEventKind::ScrollDown if ui::point_in_rect(mouse.column, mouse.row, layout.volume) => {
            core.adjust_volume(-VOLUME_STEP, audio)
        }
        _ => {}
    }
}
