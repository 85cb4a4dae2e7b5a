//! Extended M3U playlist writer
//!
//! One playlist per file, `#EXTM3U` header followed by one absolute track
//! path per line. Rekordbox imports these directly.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, Default)]
pub struct M3uPlaylist {
    name: String,
    tracks: Vec<PathBuf>,
}

impl M3uPlaylist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_track(&mut self, path: impl Into<PathBuf>) {
        self.tracks.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Render the playlist body
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(HEADER.len() + 1 + self.tracks.len() * 64);
        out.push_str(HEADER);
        out.push('\n');
        for track in &self.tracks {
            let _ = writeln!(out, "{}", track.display());
        }
        out
    }

    /// Write `<dir>/<name>.m3u`, creating `dir` if needed
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.m3u", self.name));
        fs::write(&path, self.render())?;
        Ok(path)
    }
}
