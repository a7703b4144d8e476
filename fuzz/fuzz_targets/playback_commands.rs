#![no_main]

use gap::audio::NullAudioEngine;
use gap::config::ConfigPaths;
use gap::core::GapCore;
use gap::playlist::PlaylistStore;
use gap::settings::SettingsStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let paths = ConfigPaths::new(dir.path());
    let mut core = GapCore::new(PlaylistStore::new(&paths), SettingsStore::new(&paths));
    let mut audio = NullAudioEngine::new();
    let len = data.len() % 16;
    for idx in 0..len {
        core.playlist.add(format!("track_{idx}.mp3"));
    }

    for byte in data {
        match byte % 10 {
            0 => core.toggle_playback(&mut audio),
            1 => core.next_track(&mut audio),
            2 => core.previous_track(&mut audio),
            3 => core.seek_percent(*byte, &mut audio),
            4 => core.adjust_volume(i16::from(*byte) - 128, &mut audio),
            5 => core.poll_progress(&mut audio),
            6 => core.play_at(usize::from(*byte), &mut audio),
            7 => core.open_files_menu(),
            8 => core.overlay_down(),
            _ => core.overlay_confirm(&mut audio),
        }

        if let Some(idx) = core.playlist.queue().current_index() {
            assert!(idx < core.playlist.count());
        }
        assert!(core.volume_percent <= 100);
    }
});
