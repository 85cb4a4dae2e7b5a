//! ID3 tag writer with cover art download

use std::path::{Path, PathBuf};

use djsync_core::TrackDescriptor;
use id3::frame::{Comment, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tracing::{debug, warn};

use crate::sync::TagWriter;

const PNG_MAGIC: &[u8] = b"\x89PNG";

/// Writes title, artists, album, source ID and front cover
pub struct Id3Tagger {
    client: reqwest::Client,
}

impl Default for Id3Tagger {
    fn default() -> Self {
        Self::new()
    }
}

impl Id3Tagger {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Largest cover image, or None if it cannot be fetched
    async fn fetch_cover(&self, track: &TrackDescriptor) -> Option<Vec<u8>> {
        let url = track.cover_urls.first()?;
        debug!("Fetching cover art {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Cover art for {} returned HTTP {}", track.label(), response.status());
                return None;
            }
            Err(e) => {
                warn!("Cover art for {} failed: {}", track.label(), e);
                return None;
            }
        };

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("Cover art for {} failed: {}", track.label(), e);
                None
            }
        }
    }
}

fn cover_mime(data: &[u8]) -> &'static str {
    if data.starts_with(PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Write the track's tags into the file at `path`, replacing earlier values
fn apply_tags(path: &Path, track: &TrackDescriptor, cover: Option<Vec<u8>>) -> id3::Result<()> {
    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());

    tag.set_title(track.name.as_str());
    tag.set_artist(track.artist_line());
    tag.set_album(track.album.as_str());

    tag.remove_comment(Some("Spotify"), None);
    tag.add_frame(Comment {
        lang: "eng".to_string(),
        description: "Spotify".to_string(),
        text: track.id.clone(),
    });

    if let Some(data) = cover {
        tag.remove_all_pictures();
        tag.add_frame(Picture {
            mime_type: cover_mime(&data).to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data,
        });
    }

    tag.write_to_path(path, Version::Id3v24)
}

impl TagWriter for Id3Tagger {
    async fn write_tags(&self, track: &TrackDescriptor, path: &Path) -> anyhow::Result<()> {
        let cover = self.fetch_cover(track).await;
        let track = track.clone();
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || apply_tags(&path, &track, cover)).await??;
        Ok(())
    }
}
