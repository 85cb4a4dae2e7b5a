//! Persisted track ID to download map
//!
//! Stores one JSON object in the library directory mapping source track IDs
//! to either a library-relative audio path or a custom YouTube URL that
//! should be downloaded instead of searching.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

/// Filename of the map inside the library directory
pub const MAP_FILE_NAME: &str = "id_to_video_map.json";

/// What a map entry points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEntry<'a> {
    /// Already downloaded, path relative to the library directory
    Downloaded(&'a str),
    /// User-supplied source URL to fetch instead of searching
    CustomUrl(&'a str),
}

/// True for values that are video URLs rather than local paths
pub fn is_custom_url(value: &str) -> bool {
    value.contains("youtube.com/") || value.contains("youtu.be/")
}

/// File-backed map of downloaded tracks
#[derive(Debug)]
pub struct DownloadMap {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DownloadMap {
    /// Load the map from `library_dir`, creating an empty file if missing
    pub fn open<P: AsRef<Path>>(library_dir: P) -> Result<Self> {
        let library_dir = library_dir.as_ref();
        fs::create_dir_all(library_dir)?;
        let path = library_dir.join(MAP_FILE_NAME);

        if !path.exists() {
            let map = Self {
                path,
                entries: BTreeMap::new(),
            };
            map.save()?;
            return Ok(map);
        }

        let reader = BufReader::new(File::open(&path)?);
        let entries = serde_json::from_reader(reader)?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, track_id: &str) -> Option<MapEntry<'_>> {
        let value = self.entries.get(track_id)?;
        if is_custom_url(value) {
            Some(MapEntry::CustomUrl(value))
        } else {
            Some(MapEntry::Downloaded(value))
        }
    }

    /// Record a value for a track, replacing any previous one
    pub fn insert(&mut self, track_id: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(track_id.into(), value.into());
    }

    /// Write the whole map back to disk
    pub fn save(&self) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &self.entries)?;
        writer.flush()?;
        Ok(())
    }

    /// Summary counts for status reporting
    pub fn stats(&self) -> MapStats {
        let custom_urls = self.entries.values().filter(|v| is_custom_url(v)).count();
        MapStats {
            entry_count: self.entries.len(),
            downloaded: self.entries.len() - custom_urls,
            custom_urls,
        }
    }
}

/// Download map statistics
#[derive(Debug, Clone, Serialize)]
pub struct MapStats {
    pub entry_count: usize,
    pub downloaded: usize,
    pub custom_urls: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file() {
        let tmp = TempDir::new().unwrap();
        let map = DownloadMap::open(tmp.path()).unwrap();

        assert!(map.is_empty());
        assert!(tmp.path().join(MAP_FILE_NAME).exists());
        assert_eq!(std::fs::read_to_string(map.path()).unwrap().trim(), "{}");
    }

    #[test]
    fn test_insert_save_reload() {
        let tmp = TempDir::new().unwrap();
        let mut map = DownloadMap::open(tmp.path()).unwrap();

        map.insert("abc", "Tracks/Artist - Song.mp3");
        map.save().unwrap();

        let reloaded = DownloadMap::open(tmp.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get("abc"),
            Some(MapEntry::Downloaded("Tracks/Artist - Song.mp3"))
        );
        assert_eq!(reloaded.get("missing"), None);
    }

    #[test]
    fn test_custom_url_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MAP_FILE_NAME),
            r#"{"id1": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "id2": "Tracks/a.mp3"}"#,
        )
        .unwrap();

        let map = DownloadMap::open(tmp.path()).unwrap();
        assert_eq!(
            map.get("id1"),
            Some(MapEntry::CustomUrl("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
        );

        let stats = map.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.custom_urls, 1);
        assert_eq!(stats.downloaded, 1);
    }

    #[test]
    fn test_corrupt_map_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MAP_FILE_NAME), "not json").unwrap();
        assert!(DownloadMap::open(tmp.path()).is_err());
    }

    #[test]
    fn test_is_custom_url() {
        assert!(is_custom_url("https://youtube.com/watch?v=x"));
        assert!(is_custom_url("https://youtu.be/x"));
        assert!(!is_custom_url("Tracks/youtube.mp3"));
    }
}
