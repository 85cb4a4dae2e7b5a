//! Spotify Web API client, the playlist source for sync jobs
//!
//! Playlists are read with an app token from the client credentials flow.
//! Liked songs belong to a user, so they need a user access token with the
//! `user-library-read` scope supplied in the settings.
//!
//! Reference: https://developer.spotify.com/documentation/web-api

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use djsync_core::TrackDescriptor;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::sync::{LikedLimits, PlaylistSource};

pub const API_BASE: &str = "https://api.spotify.com/v1";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Longest `Retry-After` we are willing to sleep through
const MAX_RETRY_AFTER_SECS: u64 = 120;
const MAX_ATTEMPTS: usize = 3;

/// Spotify Web API client
pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    user_token: Option<String>,
    api_base: String,
    token_url: String,
    app_token: Mutex<Option<AppToken>>,
}

struct AppToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

// Web API response structures
#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct SavedItem {
    added_at: Option<DateTime<Utc>>,
    // Null for removed tracks and local files
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiAlbum {
    name: String,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Deserialize)]
struct ApiImage {
    url: String,
    width: Option<u32>,
}

impl SavedItem {
    fn into_descriptor(self) -> Option<TrackDescriptor> {
        let track = self.track?;
        let id = track.id?;

        let (album, cover_urls) = match track.album {
            Some(album) => {
                let mut images = album.images;
                images.sort_by(|a, b| b.width.unwrap_or(0).cmp(&a.width.unwrap_or(0)));
                (album.name, images.into_iter().map(|i| i.url).collect())
            }
            None => ("Unknown".to_string(), Vec::new()),
        };

        Some(TrackDescriptor {
            id,
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album,
            cover_urls,
            added_at: self.added_at,
        })
    }
}

/// Whether a liked track still fits the limits, given how many were kept so far
fn accept_liked(kept: usize, added_at: Option<DateTime<Utc>>, limits: &LikedLimits) -> bool {
    if let (Some(date_limit), Some(added_at)) = (limits.date_limit, added_at) {
        if added_at.date_naive() < date_limit {
            return false;
        }
    }
    // A zero limit means no limit
    limits
        .track_limit
        .filter(|max| *max > 0)
        .map_or(true, |max| kept < max)
}

impl SpotifyClient {
    pub fn new(client_id: &str, client_secret: &str, user_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            user_token,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            app_token: Mutex::new(None),
        }
    }

    /// Point the client at other API and token endpoints
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.spotify_client_id,
            &settings.spotify_client_secret,
            settings.spotify_user_token.clone(),
        )
    }

    /// App token from the client credentials flow, cached until expiry
    async fn app_token(&self) -> anyhow::Result<String> {
        let mut cached = self.app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        if self.client_id.is_empty() || self.client_secret.is_empty() {
            anyhow::bail!("Spotify client id and secret are not configured");
        }

        debug!("Requesting Spotify app token");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Spotify token request failed: HTTP {}", response.status());
        }

        let body: TokenResponse = response.json().await?;
        // Refresh a minute early
        let lifetime = Duration::from_secs(body.expires_in.saturating_sub(60));
        *cached = Some(AppToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }

    /// GET a JSON document, waiting out rate limits
    async fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> anyhow::Result<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            debug!("GET {} (attempt {})", url, attempt);
            let response = self.client.get(url).bearer_auth(token).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                if retry_after > MAX_RETRY_AFTER_SECS {
                    anyhow::bail!("Spotify rate limit, retry after {} seconds", retry_after);
                }
                warn!("Rate limited by Spotify, retrying in {}s", retry_after);
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            if !status.is_success() {
                anyhow::bail!("Spotify request failed: HTTP {} for {}", status, url);
            }
            return Ok(response.json().await?);
        }
        anyhow::bail!("Spotify request failed after {} attempts: {}", MAX_ATTEMPTS, url)
    }
}

impl PlaylistSource for SpotifyClient {
    async fn playlist_tracks(&self, playlist_id: &str) -> anyhow::Result<Vec<TrackDescriptor>> {
        let token = self.app_token().await?;
        let mut url = Some(format!(
            "{}/playlists/{}/tracks?limit=100",
            self.api_base, playlist_id
        ));
        let mut tracks = Vec::new();

        while let Some(page_url) = url {
            let page: Page<SavedItem> = self.get_json(&page_url, &token).await?;
            tracks.extend(page.items.into_iter().filter_map(SavedItem::into_descriptor));
            url = page.next;
        }

        info!("Playlist {} has {} tracks", playlist_id, tracks.len());
        Ok(tracks)
    }

    async fn liked_tracks(&self, limits: &LikedLimits) -> anyhow::Result<Vec<TrackDescriptor>> {
        let Some(token) = self.user_token.as_deref() else {
            anyhow::bail!("Liked songs need spotify_user_token (or SPOTIFY_USER_TOKEN)");
        };

        let mut url = Some(format!("{}/me/tracks?limit=50", self.api_base));
        let mut tracks = Vec::new();

        // Saved tracks come newest first, so the first rejection ends the scan
        'pages: while let Some(page_url) = url {
            let page: Page<SavedItem> = self.get_json(&page_url, token).await?;
            for item in page.items {
                if !accept_liked(tracks.len(), item.added_at, limits) {
                    break 'pages;
                }
                if let Some(track) = item.into_descriptor() {
                    tracks.push(track);
                }
            }
            url = page.next;
        }

        info!("Found {} liked tracks within limits", tracks.len());
        Ok(tracks)
    }
}
