//! Server configuration
//!
//! `Settings` is the user's JSON settings file. `Config` is built once in
//! `main` from the settings plus command line overrides and passed down.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format of `liked_songs_date_limit`, e.g. `01-03-24`
const DATE_LIMIT_FORMAT: &str = "%d-%m-%y";

/// One playlist to mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSetting {
    pub name: String,
    /// Playlist URL or bare ID
    pub url: String,
}

/// Contents of the settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spotify_client_id: String,
    #[serde(skip_serializing)]
    pub spotify_client_secret: String,
    /// User access token with `user-library-read`, required for liked songs
    #[serde(skip_serializing)]
    pub spotify_user_token: Option<String>,
    pub dj_library_directory: PathBuf,
    pub tracks_folder: String,
    pub rekordbox_playlist_folder: String,
    pub serato_subcrate_parent: String,
    pub download_liked_songs: bool,
    pub liked_songs_track_limit: Option<usize>,
    pub liked_songs_date_limit: Option<String>,
    pub playlists_to_download: Vec<PlaylistSetting>,
    pub max_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            spotify_user_token: None,
            dj_library_directory: PathBuf::from("."),
            tracks_folder: "DJ Sync Tracks".to_string(),
            rekordbox_playlist_folder: "Rekordbox Playlists".to_string(),
            serato_subcrate_parent: "DJ Sync".to_string(),
            download_liked_songs: false,
            liked_songs_track_limit: None,
            liked_songs_date_limit: None,
            playlists_to_download: Vec::new(),
            max_workers: 3,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file and apply environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open settings file {:?}", path))?;
        let mut settings: Settings = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid settings file {:?}", path))?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.date_limit()?;
        Ok(settings)
    }

    /// Override credentials from `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`
    /// and `SPOTIFY_USER_TOKEN`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("SPOTIFY_CLIENT_ID") {
            self.spotify_client_id = id;
        }
        if let Some(secret) = lookup("SPOTIFY_CLIENT_SECRET") {
            self.spotify_client_secret = secret;
        }
        if let Some(token) = lookup("SPOTIFY_USER_TOKEN") {
            self.spotify_user_token = Some(token);
        }
    }

    /// Parsed liked songs date limit
    pub fn date_limit(&self) -> anyhow::Result<Option<NaiveDate>> {
        match self.liked_songs_date_limit.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, DATE_LIMIT_FORMAT)
                .map(Some)
                .with_context(|| format!("liked_songs_date_limit {:?} is not dd-mm-yy", s)),
        }
    }

    /// Number of playlists a sync run covers, liked songs included
    pub fn total_playlists(&self) -> usize {
        usize::from(self.download_liked_songs) + self.playlists_to_download.len()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    /// TCP address for CLI communication
    pub bind_addr: String,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
}

impl Config {
    /// Library root
    pub fn library_dir(&self) -> &Path {
        &self.settings.dj_library_directory
    }

    /// Directory downloaded audio lands in
    pub fn tracks_dir(&self) -> PathBuf {
        self.library_dir().join(&self.settings.tracks_folder)
    }

    /// Directory for M3U playlists and the XML library
    pub fn playlist_dir(&self) -> PathBuf {
        self.library_dir().join(&self.settings.rekordbox_playlist_folder)
    }

    /// Copy of this config pointed at another library root
    pub fn with_library_dir(&self, library_dir: impl Into<PathBuf>) -> Self {
        let mut config = self.clone();
        config.settings.dj_library_directory = library_dir.into();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_settings() {
        let json = r#"{
            "spotify_client_id": "id",
            "spotify_client_secret": "secret",
            "dj_library_directory": "/music",
            "download_liked_songs": true,
            "liked_songs_track_limit": 50,
            "liked_songs_date_limit": "01-03-24",
            "playlists_to_download": [
                {"name": "House", "url": "https://open.spotify.com/playlist/7suQlwliFponAvWaKjyBxC"}
            ]
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.dj_library_directory, PathBuf::from("/music"));
        assert_eq!(settings.tracks_folder, "DJ Sync Tracks");
        assert_eq!(settings.max_workers, 3);
        assert_eq!(settings.liked_songs_track_limit, Some(50));
        assert_eq!(settings.total_playlists(), 2);
        assert_eq!(
            settings.date_limit().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_invalid_date_limit() {
        let settings = Settings {
            liked_songs_date_limit: Some("2024-03-01".into()),
            ..Settings::default()
        };
        assert!(settings.date_limit().is_err());
        assert_eq!(Settings::default().date_limit().unwrap(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings {
            spotify_client_id: "file-id".into(),
            ..Settings::default()
        };
        settings.apply_env(|key| match key {
            "SPOTIFY_CLIENT_SECRET" => Some("env-secret".into()),
            "SPOTIFY_USER_TOKEN" => Some("token".into()),
            _ => None,
        });

        assert_eq!(settings.spotify_client_id, "file-id");
        assert_eq!(settings.spotify_client_secret, "env-secret");
        assert_eq!(settings.spotify_user_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = Settings::load(&tmp.path().join("settings.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open settings file"));
    }

    #[test]
    fn test_config_paths() {
        let config = Config {
            settings: Settings {
                dj_library_directory: PathBuf::from("/music"),
                ..Settings::default()
            },
            bind_addr: "127.0.0.1:7878".into(),
            log_dir: PathBuf::from("/tmp"),
        };

        assert_eq!(config.tracks_dir(), PathBuf::from("/music/DJ Sync Tracks"));
        assert_eq!(config.playlist_dir(), PathBuf::from("/music/Rekordbox Playlists"));

        let moved = config.with_library_dir("/mnt/usb");
        assert_eq!(moved.tracks_dir(), PathBuf::from("/mnt/usb/DJ Sync Tracks"));
    }
}
