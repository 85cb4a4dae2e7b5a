//! Track descriptors as delivered by the playlist source
//!
//! These are the high-level representations that flow from the playlist
//! source through download and tagging into the library writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::{sanitize_filename, MAX_FILENAME_LEN};

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Source-specific unique ID (Spotify track ID)
    pub id: String,
    /// Track title
    pub name: String,
    /// Artist names, primary artist first
    pub artists: Vec<String>,
    /// Album name
    pub album: String,
    /// Cover art URLs, largest first
    pub cover_urls: Vec<String>,
    /// When the track was added to the playlist
    pub added_at: Option<DateTime<Utc>>,
}

impl TrackDescriptor {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("Unknown")
    }

    /// All artists joined for display and tagging
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            return "Unknown".to_string();
        }
        self.artists.join(", ")
    }

    /// Search query for the audio source: "Artist - Title"
    pub fn search_query(&self) -> String {
        format!(
            "{} - {}",
            sanitize_filename(self.primary_artist(), MAX_FILENAME_LEN, false),
            self.name
        )
    }

    /// Short label for log lines
    pub fn label(&self) -> String {
        format!("{} - {}", self.primary_artist(), self.name)
    }
}
