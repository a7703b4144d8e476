use std::path::{Path, PathBuf};

/// Ordered media references the player advances through.
///
/// Navigation does not wrap: stepping past either end leaves the cursor alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    items: Vec<PathBuf>,
    current: Option<usize>,
}

impl PlaybackQueue {
    pub fn push(&mut self, path: PathBuf) {
        self.items.push(path);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.items.get(index).map(PathBuf::as_path)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Path> {
        self.get(self.current?)
    }

    /// Moves the cursor to `index` and returns the entry there.
    pub fn select(&mut self, index: usize) -> Option<&Path> {
        if index >= self.items.len() {
            return None;
        }
        self.current = Some(index);
        self.get(index)
    }

    /// Entry the play button starts from: the cursor, or the head of the queue.
    pub fn start_index(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.current.filter(|idx| *idx < self.items.len()).unwrap_or(0))
    }

    pub fn next_index(&self) -> Option<usize> {
        match self.current {
            Some(current) => {
                let next = current + 1;
                (next < self.items.len()).then_some(next)
            }
            None => self.start_index(),
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.current?.checked_sub(1)
    }
}
