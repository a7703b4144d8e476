use crate::config::{self, ConfigPaths};
use crate::library;
use crate::queue::PlaybackQueue;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One playlist entry as written to disk.
///
/// UTF-8 paths are plain JSON strings. Anything else keeps its raw bytes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredPath {
    Text(String),
    Raw { raw: Vec<u8> },
}

impl StoredPath {
    fn encode(path: &Path) -> Self {
        match path.to_str() {
            Some(text) => Self::Text(text.to_owned()),
            None => Self::Raw {
                raw: path_to_bytes(path),
            },
        }
    }

    fn decode(self) -> Option<PathBuf> {
        match self {
            Self::Text(text) => Some(PathBuf::from(text)),
            Self::Raw { raw } => path_from_bytes(raw),
        }
    }
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(raw: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(raw)))
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_bytes(raw: Vec<u8>) -> Option<PathBuf> {
    String::from_utf8(raw).ok().map(PathBuf::from)
}

/// Ordered list of track paths, mirrored into the playback queue.
///
/// Insertion order is playback order and duplicates are allowed.
#[derive(Debug)]
pub struct PlaylistStore {
    file: PathBuf,
    paths: Vec<PathBuf>,
    queue: PlaybackQueue,
}

impl PlaylistStore {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self {
            file: paths.playlist_file(),
            paths: Vec::new(),
            queue: PlaybackQueue::default(),
        }
    }

    pub fn open(paths: &ConfigPaths) -> Self {
        let mut store = Self::new(paths);
        store.load();
        store
    }

    pub fn count(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PlaybackQueue {
        &mut self.queue
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.queue.push(path.clone());
        self.paths.push(path);
    }

    /// Adds every audio file under `dir` and returns how many were added.
    pub fn add_folder(&mut self, dir: &Path) -> usize {
        let found = library::scan_folder(dir);
        let count = found.len();
        for path in found {
            self.add(path);
        }
        info!(folder = %dir.display(), count, "scanned folder into playlist");
        count
    }

    /// Replaces the playlist with the persisted one, dropping entries whose file is gone.
    ///
    /// Failures are logged and leave the playlist empty.
    pub fn load(&mut self) {
        self.paths.clear();
        self.queue.clear();

        let stored = match config::read_json::<Vec<StoredPath>>(&self.file) {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(err) => {
                warn!("failed to load playlist: {err:#}");
                return;
            }
        };

        let total = stored.len();
        for path in stored
            .into_iter()
            .filter_map(StoredPath::decode)
            .filter(|path| path.exists())
        {
            self.add(path);
        }

        let skipped = total - self.count();
        if skipped > 0 {
            info!(skipped, "skipped playlist entries whose files no longer exist");
        }
    }

    pub fn save(&self) -> Result<()> {
        let stored: Vec<StoredPath> = self
            .paths
            .iter()
            .map(|path| StoredPath::encode(path))
            .collect();
        config::write_json(&self.file, &stored)
    }
}
