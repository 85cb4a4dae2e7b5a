//! iTunes-style XML library writer
//!
//! Rekordbox can import an iTunes `Music Library.xml`, so the whole synced
//! library is exported as a plist in that shape: a `Tracks` dict keyed by
//! track ID and a `Playlists` array whose first entry is a root folder every
//! synced playlist hangs under.
//!
//! Track IDs are global across the document and start at 0. Playlist IDs
//! start at 2; ID 1 is the root folder.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default filename for the exported library
pub const DEFAULT_FILE_NAME: &str = "DJSyncLibrary.xml";

/// Name shown for the root playlist folder
pub const ROOT_FOLDER_NAME: &str = "DJ Sync";

/// Persistent ID of the root folder, referenced by every playlist
pub const ROOT_PERSISTENT_ID: &str = "DJSync";

const ROOT_PLAYLIST_ID: u32 = 1;
const TRACK_KIND: &str = "MPEG audio file";

const DOCTYPE: &str = r#"<!DOCTYPE plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#;

/// Track metadata for the library
#[derive(Debug, Clone, PartialEq)]
pub struct XmlTrack {
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Absolute path of the audio file
    pub location: PathBuf,
    /// Duration in milliseconds, when known
    pub total_time_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct XmlPlaylist {
    id: u32,
    name: String,
    track_ids: Vec<u32>,
}

/// In-memory library document
#[derive(Debug, Clone)]
pub struct LibraryXml {
    tracks: Vec<(u32, XmlTrack)>,
    playlists: Vec<XmlPlaylist>,
    next_track_id: u32,
    next_playlist_id: u32,
}

impl Default for LibraryXml {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryXml {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            playlists: Vec::new(),
            next_track_id: 0,
            next_playlist_id: ROOT_PLAYLIST_ID + 1,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn playlist_count(&self) -> usize {
        self.playlists.len()
    }

    /// Add a playlist under the root folder. Every track gets a fresh track ID,
    /// even if the same file already appears in another playlist.
    pub fn add_playlist(&mut self, name: impl Into<String>, tracks: Vec<XmlTrack>) -> u32 {
        let mut track_ids = Vec::with_capacity(tracks.len());
        for track in tracks {
            let id = self.next_track_id;
            self.next_track_id += 1;
            track_ids.push(id);
            self.tracks.push((id, track));
        }

        let id = self.next_playlist_id;
        self.next_playlist_id += 1;
        self.playlists.push(XmlPlaylist {
            id,
            name: name.into(),
            track_ids,
        });
        id
    }

    /// Render the full plist document
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_document(&mut out);
        out
    }

    /// Write the document to `<dir>/<file_name>`, creating `dir` if needed
    pub fn save(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        fs::write(&path, self.render())?;
        Ok(path)
    }

    fn write_document(&self, out: &mut String) -> fmt::Result {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, "{}", DOCTYPE)?;
        writeln!(out, r#"<plist version="1.0">"#)?;
        writeln!(out, "  <dict>")?;

        // Rekordbox rejects the file without a (blank) library ID
        write_string(out, 2, "Library Persistent ID", " ")?;

        writeln!(out, "    <key>Tracks</key>")?;
        writeln!(out, "    <dict>")?;
        for (id, track) in &self.tracks {
            self.write_track(out, *id, track)?;
        }
        writeln!(out, "    </dict>")?;

        writeln!(out, "    <key>Playlists</key>")?;
        writeln!(out, "    <array>")?;
        write_root_folder(out)?;
        for playlist in &self.playlists {
            write_playlist(out, playlist)?;
        }
        writeln!(out, "    </array>")?;

        writeln!(out, "  </dict>")?;
        writeln!(out, "</plist>")
    }

    fn write_track(&self, out: &mut String, id: u32, track: &XmlTrack) -> fmt::Result {
        writeln!(out, "      <key>{}</key>", id)?;
        writeln!(out, "      <dict>")?;
        write_integer(out, 4, "Track ID", u64::from(id))?;
        write_string(out, 4, "Name", &track.name)?;
        write_string(out, 4, "Artist", &track.artist)?;
        write_string(out, 4, "Album", &track.album)?;
        write_string(out, 4, "Kind", TRACK_KIND)?;
        if let Some(ms) = track.total_time_ms {
            write_integer(out, 4, "Total Time", ms)?;
        }
        write_string(out, 4, "Persistent ID", &id.to_string())?;
        write_string(out, 4, "Track Type", "File")?;
        write_string(out, 4, "Location", &location_url(&track.location))?;
        writeln!(out, "      </dict>")
    }
}

fn write_root_folder(out: &mut String) -> fmt::Result {
    writeln!(out, "      <dict>")?;
    write_string(out, 4, "Name", ROOT_FOLDER_NAME)?;
    write_string(out, 4, "Description", " ")?;
    write_integer(out, 4, "Playlist ID", u64::from(ROOT_PLAYLIST_ID))?;
    write_string(out, 4, "Playlist Persistent ID", ROOT_PERSISTENT_ID)?;
    write_true(out, 4, "All Items")?;
    write_true(out, 4, "Folder")?;
    writeln!(out, "      </dict>")
}

fn write_playlist(out: &mut String, playlist: &XmlPlaylist) -> fmt::Result {
    writeln!(out, "      <dict>")?;
    write_string(out, 4, "Name", &playlist.name)?;
    write_string(out, 4, "Description", " ")?;
    write_integer(out, 4, "Playlist ID", u64::from(playlist.id))?;
    write_string(out, 4, "Playlist Persistent ID", &playlist.id.to_string())?;
    write_string(out, 4, "Parent Persistent ID", ROOT_PERSISTENT_ID)?;
    write_true(out, 4, "All Items")?;
    writeln!(out, "        <key>Playlist Items</key>")?;
    writeln!(out, "        <array>")?;
    for track_id in &playlist.track_ids {
        writeln!(
            out,
            "          <dict><key>Track ID</key><integer>{}</integer></dict>",
            track_id
        )?;
    }
    writeln!(out, "        </array>")?;
    writeln!(out, "      </dict>")
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn write_string(out: &mut String, level: usize, key: &str, value: &str) -> fmt::Result {
    indent(out, level);
    writeln!(out, "<key>{}</key><string>{}</string>", escape(key), escape(value))
}

fn write_integer(out: &mut String, level: usize, key: &str, value: u64) -> fmt::Result {
    indent(out, level);
    writeln!(out, "<key>{}</key><integer>{}</integer>", escape(key), value)
}

fn write_true(out: &mut String, level: usize, key: &str) -> fmt::Result {
    indent(out, level);
    writeln!(out, "<key>{}</key><true/>", escape(key))
}

/// Escape text for XML element content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// `file://localhost/` URL for a local path, each segment percent-encoded.
/// A leading drive letter keeps its colon (`D:/Music/...`).
pub fn location_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .enumerate()
        .map(|(index, segment)| {
            if index == 0 && is_drive_letter(segment) {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect();
    format!("file://localhost/{}", encoded.join("/"))
}

fn is_drive_letter(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
