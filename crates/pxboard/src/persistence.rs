//! Pan/scale and layer options kept in a JSON file between runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use renderer::LayerOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SAVE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default)]
    pub view: Option<SavedView>,
    #[serde(default)]
    pub layers: Vec<LayerOptions>,
}

/// Write-behind store: changes are coalesced and hit the disk at most once
/// per [`SAVE_INTERVAL`].
pub struct StateStore {
    path: Option<PathBuf>,
    state: SavedState,
    dirty: bool,
    last_write: Option<Instant>,
}

impl StateStore {
    /// Reads `path` if given. A missing or unreadable file starts empty.
    pub fn open(path: Option<PathBuf>) -> Self {
        let state = path.as_deref().map(load).unwrap_or_default();
        Self {
            path,
            state,
            dirty: false,
            last_write: None,
        }
    }

    pub fn state(&self) -> &SavedState {
        &self.state
    }

    pub fn set_view(&mut self, view: Option<SavedView>) {
        if self.state.view != view {
            self.state.view = view;
            self.dirty = true;
        }
    }

    pub fn set_layers(&mut self, layers: Vec<LayerOptions>) {
        if self.state.layers != layers {
            self.state.layers = layers;
            self.dirty = true;
        }
    }

    /// When a pending change may be written, if any; `now` when nothing was
    /// written yet.
    pub fn next_write_at(&self, now: Instant) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        Some(self.last_write.map_or(now, |last| last + SAVE_INTERVAL))
    }

    /// Writes pending changes if the throttle allows it at `now`.
    pub fn flush_due(&mut self, now: Instant) {
        if self.next_write_at(now).is_some_and(|due| due <= now) {
            self.write(now);
        }
    }

    /// Writes pending changes regardless of the throttle.
    pub fn flush(&mut self) {
        if self.dirty {
            self.write(Instant::now());
        }
    }

    fn write(&mut self, now: Instant) {
        self.dirty = false;
        self.last_write = Some(now);
        let Some(path) = self.path.as_deref() else {
            return;
        };
        match save(path, &self.state) {
            Ok(()) => debug!(path = %path.display(), "state saved"),
            Err(error) => warn!(path = %path.display(), %error, "saving state failed"),
        }
    }
}

fn load(path: &Path) -> SavedState {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return SavedState::default(),
        Err(error) => {
            warn!(path = %path.display(), %error, "reading state failed");
            return SavedState::default();
        }
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|error| {
        warn!(path = %path.display(), %error, "ignoring malformed state file");
        SavedState::default()
    })
}

fn save(path: &Path, state: &SavedState) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pxboard-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_path("roundtrip");
        let mut store = StateStore::open(Some(path.clone()));
        store.set_view(Some(SavedView {
            x: 12.0,
            y: 30.5,
            scale: 4.0,
        }));
        store.set_layers(vec![LayerOptions::new("board")]);
        store.flush();

        let reopened = StateStore::open(Some(path.clone()));
        assert_eq!(reopened.state(), store.state());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn writes_are_throttled() {
        let mut store = StateStore::open(None);
        let start = Instant::now();
        store.set_view(Some(SavedView {
            x: 1.0,
            y: 1.0,
            scale: 1.0,
        }));
        store.flush_due(start);
        assert_eq!(store.next_write_at(start), None);

        store.set_view(Some(SavedView {
            x: 2.0,
            y: 1.0,
            scale: 1.0,
        }));
        let soon = start + Duration::from_millis(100);
        store.flush_due(soon);
        assert_eq!(store.next_write_at(soon), Some(start + SAVE_INTERVAL));

        store.flush_due(start + SAVE_INTERVAL);
        assert_eq!(store.next_write_at(start + SAVE_INTERVAL), None);
    }

    #[test]
    fn malformed_file_starts_empty() {
        let path = temp_path("malformed");
        fs::write(&path, b"{not json").expect("write");
        let store = StateStore::open(Some(path.clone()));
        assert_eq!(store.state(), &SavedState::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn clearing_the_view_is_a_change() {
        let now = Instant::now();
        let mut store = StateStore::open(None);
        store.set_view(None);
        assert_eq!(store.next_write_at(now), None);
        store.set_view(Some(SavedView {
            x: 0.0,
            y: 0.0,
            scale: 2.0,
        }));
        store.flush();
        store.set_view(None);
        assert!(store.next_write_at(now).is_some());
    }
}
