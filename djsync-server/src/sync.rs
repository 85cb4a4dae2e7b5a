//! Sync orchestrator
//!
//! For every configured playlist (liked songs first, when enabled):
//! 1. Read the track list from the playlist source
//! 2. Download missing tracks through a bounded pool of concurrent workers
//! 3. Tag each new file and record it in the shared download map
//! 4. Write the playlist's crate and M3U file from the tracks that succeeded
//!
//! One XML library covering every playlist is written at the end of the run.
//! A failing track is reported and skipped; it never aborts its playlist.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use djsync_core::download_map::MapEntry;
use djsync_core::library_xml::{self, LibraryXml, XmlTrack};
use djsync_core::m3u::M3uPlaylist;
use djsync_core::util::{extract_spotify_playlist_id, sanitize_filename, MAX_FILENAME_LEN};
use djsync_core::{Crate, DownloadMap, TrackDescriptor};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::events::EventSink;
use crate::probe;
use crate::spotify::SpotifyClient;
use crate::tagger::Id3Tagger;
use crate::youtube::YtDlp;

/// Playlist name used for the user's liked songs
pub const LIKED_SONGS_NAME: &str = "Liked Songs";

/// Limits applied while reading liked songs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LikedLimits {
    pub track_limit: Option<usize>,
    /// Tracks added before this day are ignored
    pub date_limit: Option<NaiveDate>,
}

/// Where playlists come from
pub trait PlaylistSource {
    async fn playlist_tracks(&self, playlist_id: &str) -> anyhow::Result<Vec<TrackDescriptor>>;

    async fn liked_tracks(&self, limits: &LikedLimits) -> anyhow::Result<Vec<TrackDescriptor>>;
}

/// What to download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest<'a> {
    /// Best match for a free-text query
    Search(&'a str),
    /// A specific video
    Url(&'a str),
}

impl FetchRequest<'_> {
    pub fn target(&self) -> &str {
        match self {
            FetchRequest::Search(query) => query,
            FetchRequest::Url(url) => url,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no results for {0}")]
    NotFound(String),
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("download failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Downloads audio to a local file
pub trait AudioFetcher {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<PathBuf, FetchError>;
}

/// Writes metadata into a downloaded file
pub trait TagWriter {
    async fn write_tags(&self, track: &TrackDescriptor, path: &Path) -> anyhow::Result<()>;
}

/// Counts for one sync run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub playlists: usize,
    pub failed_playlists: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum PlaylistRef<'a> {
    Liked,
    Spotify { url: &'a str },
}

enum Outcome {
    Skipped(PathBuf),
    Downloaded(PathBuf),
}

/// Map entry resolved against the library directory
enum Known {
    Path(PathBuf),
    Url(String),
}

/// Shared state for the workers of one playlist
struct TrackContext<'a, E> {
    config: &'a Config,
    map: &'a Mutex<DownloadMap>,
    events: &'a E,
}

/// Forwards progress, dropping values that would move backwards
struct Progress<'a, E> {
    events: &'a E,
    last: f64,
}

impl<'a, E: EventSink> Progress<'a, E> {
    fn new(events: &'a E) -> Self {
        Self { events, last: 0.0 }
    }

    fn report(&mut self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        if value >= self.last {
            self.last = value;
            self.events.progress(value);
        }
    }
}

fn report_failure<E: EventSink>(events: &E, track: &TrackDescriptor, err: &anyhow::Error) {
    let label = track.label();
    match err.downcast_ref::<FetchError>() {
        Some(FetchError::NotFound(_)) => {
            events.error(&format!("No results for \"{}\", skipping", label))
        }
        Some(FetchError::Unavailable(_)) => {
            events.error(&format!("Video unavailable, \"{}\" can't be downloaded", label))
        }
        _ => events.error(&format!("Error downloading track: \"{}\"", label)),
    }
    events.debug(&format!("track={} error={:#}", track.id, err));
}

pub struct Syncer<S, F, T> {
    source: S,
    fetcher: F,
    tagger: T,
}

impl<S, F, T> Syncer<S, F, T>
where
    S: PlaylistSource,
    F: AudioFetcher,
    T: TagWriter,
{
    pub fn new(source: S, fetcher: F, tagger: T) -> Self {
        Self {
            source,
            fetcher,
            tagger,
        }
    }

    /// Run a full sync of every configured playlist
    pub async fn run<E: EventSink>(&self, config: &Config, events: &E) -> anyhow::Result<SyncSummary> {
        let settings = &config.settings;
        events.info("Starting download");
        events.debug(&format!("Library directory: {:?}", config.library_dir()));

        let map = Mutex::new(DownloadMap::open(config.library_dir())?);
        let limits = LikedLimits {
            track_limit: settings.liked_songs_track_limit,
            date_limit: settings.date_limit()?,
        };

        let mut playlists = Vec::with_capacity(settings.total_playlists());
        if settings.download_liked_songs {
            playlists.push((LIKED_SONGS_NAME, PlaylistRef::Liked));
        }
        for playlist in &settings.playlists_to_download {
            playlists.push((playlist.name.as_str(), PlaylistRef::Spotify { url: &playlist.url }));
        }

        let total = playlists.len();
        let mut summary = SyncSummary::default();
        let mut progress = Progress::new(events);
        let mut xml = LibraryXml::new();
        progress.report(0.0);

        if total == 0 {
            events.info("No playlists configured, nothing to download");
        }

        let ctx = TrackContext {
            config,
            map: &map,
            events,
        };

        for (playlist_index, (name, playlist)) in playlists.iter().enumerate() {
            events.info(&format!("Downloading playlist: {}", name));

            let tracks = match self.playlist_tracks(playlist, &limits).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    events.error(&format!("Error retrieving tracks for playlist {}: {:#}", name, e));
                    summary.failed_playlists += 1;
                    progress.report((playlist_index + 1) as f64 / total as f64);
                    continue;
                }
            };

            let paths = self
                .download_playlist(&tracks, playlist_index, total, &ctx, &mut progress, &mut summary)
                .await;
            let kept: Vec<(&TrackDescriptor, PathBuf)> = tracks
                .iter()
                .zip(paths)
                .filter_map(|(track, path)| Some((track, path?)))
                .collect();

            match save_playlist(config, name, &kept, &mut xml, events).await {
                Ok(()) => summary.playlists += 1,
                Err(e) => {
                    events.error(&format!("Failed to save DJ library data for {}: {:#}", name, e));
                    summary.failed_playlists += 1;
                }
            }
            progress.report((playlist_index + 1) as f64 / total as f64);
        }

        let xml_path = xml.save(&config.playlist_dir(), library_xml::DEFAULT_FILE_NAME)?;
        events.debug(&format!("Wrote XML library {:?}", xml_path));

        progress.report(1.0);
        events.info("Download completed!");
        Ok(summary)
    }

    async fn playlist_tracks(
        &self,
        playlist: &PlaylistRef<'_>,
        limits: &LikedLimits,
    ) -> anyhow::Result<Vec<TrackDescriptor>> {
        match playlist {
            PlaylistRef::Liked => self.source.liked_tracks(limits).await,
            PlaylistRef::Spotify { url } => {
                let id = extract_spotify_playlist_id(url)
                    .ok_or_else(|| anyhow::anyhow!("No playlist ID in {:?}", url))?;
                debug!("Playlist url {} has id {}", url, id);
                self.source.playlist_tracks(id).await
            }
        }
    }

    /// Download a playlist's tracks, returning a path per track in playlist order
    async fn download_playlist<E: EventSink>(
        &self,
        tracks: &[TrackDescriptor],
        playlist_index: usize,
        total_playlists: usize,
        ctx: &TrackContext<'_, E>,
        progress: &mut Progress<'_, E>,
        summary: &mut SyncSummary,
    ) -> Vec<Option<PathBuf>> {
        let mut paths = vec![None; tracks.len()];
        let workers = ctx.config.settings.max_workers.max(1);

        let mut results = stream::iter(tracks.iter().enumerate())
            .map(move |(index, track)| async move { (index, self.process_track(track, ctx).await) })
            .buffer_unordered(workers);

        let mut completed = 0usize;
        while let Some((index, result)) = results.next().await {
            match result {
                Ok(Outcome::Skipped(path)) => {
                    summary.skipped += 1;
                    paths[index] = Some(path);
                }
                Ok(Outcome::Downloaded(path)) => {
                    summary.downloaded += 1;
                    paths[index] = Some(path);
                }
                Err(e) => {
                    summary.failed += 1;
                    report_failure(ctx.events, &tracks[index], &e);
                }
            }

            progress.report(
                (completed as f64 / tracks.len() as f64 + playlist_index as f64)
                    / total_playlists as f64,
            );
            completed += 1;
        }

        paths
    }

    async fn process_track<E: EventSink>(
        &self,
        track: &TrackDescriptor,
        ctx: &TrackContext<'_, E>,
    ) -> anyhow::Result<Outcome> {
        let library_dir = ctx.config.library_dir();

        let known = {
            let map = ctx.map.lock().await;
            map.get(&track.id).map(|entry| match entry {
                MapEntry::Downloaded(path) => Known::Path(library_dir.join(path)),
                MapEntry::CustomUrl(url) => Known::Url(url.to_string()),
            })
        };

        let path = match known {
            Some(Known::Path(path)) if path.exists() => {
                ctx.events.info(&format!(
                    "Skipping track \"{}\" as it is already downloaded",
                    track.name
                ));
                return Ok(Outcome::Skipped(path));
            }
            Some(Known::Url(url)) => {
                ctx.events.info(&format!(
                    "Downloading track: \"{}\" from custom url {}",
                    track.name, url
                ));
                self.fetcher.fetch(FetchRequest::Url(&url)).await?
            }
            _ => {
                ctx.events.info(&format!("Downloading track: \"{}\"", track.name));
                let query = track.search_query();
                self.fetcher.fetch(FetchRequest::Search(&query)).await?
            }
        };

        // Untagged audio is still usable in the library
        if let Err(e) = self.tagger.write_tags(track, &path).await {
            ctx.events.error(&format!("Failed to tag \"{}\": {:#}", track.label(), e));
        }

        let stored = path
            .strip_prefix(library_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let mut map = ctx.map.lock().await;
        map.insert(track.id.clone(), stored);
        if let Err(e) = map.save() {
            ctx.events.error(&format!("Failed to save download map: {}", e));
        }

        Ok(Outcome::Downloaded(path))
    }
}

/// Sync with the Spotify source, yt-dlp and ID3 tagging
pub async fn run_sync<E: EventSink>(config: &Config, events: &E) -> anyhow::Result<SyncSummary> {
    let syncer = Syncer::new(
        SpotifyClient::from_settings(&config.settings),
        YtDlp::new(config.tracks_dir()),
        Id3Tagger::new(),
    );
    syncer.run(config, events).await
}

/// Write the crate and M3U file for one playlist and add it to the XML library
async fn save_playlist<E: EventSink>(
    config: &Config,
    name: &str,
    tracks: &[(&TrackDescriptor, PathBuf)],
    xml: &mut LibraryXml,
    events: &E,
) -> anyhow::Result<()> {
    events.info("Saving DJ library data...");
    let file_name = sanitize_filename(name, MAX_FILENAME_LEN, false);

    let mut krate = Crate::with_default_version(file_name.as_str());
    let mut m3u = M3uPlaylist::new(file_name.as_str());
    for (_, path) in tracks {
        krate.add_track(path);
        m3u.add_track(path.clone());
    }

    let crate_path =
        krate.save_to_library(config.library_dir(), &config.settings.serato_subcrate_parent)?;
    events.debug(&format!("Wrote crate {:?}", crate_path));
    let m3u_path = m3u.save(&config.playlist_dir())?;
    events.debug(&format!("Wrote playlist {:?}", m3u_path));

    let paths: Vec<PathBuf> = tracks.iter().map(|(_, path)| path.clone()).collect();
    let durations = tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|path| {
                probe::duration_ms(path).unwrap_or_else(|e| {
                    debug!("No duration for {:?}: {}", path, e);
                    None
                })
            })
            .collect::<Vec<_>>()
    })
    .await?;

    let xml_tracks = tracks
        .iter()
        .zip(durations)
        .map(|((track, path), total_time_ms)| XmlTrack {
            name: track.name.clone(),
            artist: track.artist_line(),
            album: track.album.clone(),
            location: path.clone(),
            total_time_ms,
        })
        .collect();
    xml.add_playlist(name, xml_tracks);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use djsync_core::download_map::MAP_FILE_NAME;
    use tempfile::TempDir;

    use crate::config::{PlaylistSetting, Settings};
    use crate::events::{LogLevel, SyncEvent};

    const HOUSE_ID: &str = "7suQlwliFponAvWaKjyBxC";
    const TECHNO_ID: &str = "1mjGp0ddtuC5DDx0lWtCNQ";

    fn make_track(id: &str, artist: &str, name: &str) -> TrackDescriptor {
        TrackDescriptor {
            id: id.into(),
            name: name.into(),
            artists: vec![artist.into()],
            album: "Album".into(),
            cover_urls: Vec::new(),
            added_at: None,
        }
    }

    #[derive(Default)]
    struct StubSource {
        playlists: HashMap<String, Vec<TrackDescriptor>>,
        liked: Vec<TrackDescriptor>,
    }

    impl PlaylistSource for StubSource {
        async fn playlist_tracks(&self, playlist_id: &str) -> anyhow::Result<Vec<TrackDescriptor>> {
            self.playlists
                .get(playlist_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("playlist {} not found", playlist_id))
        }

        async fn liked_tracks(&self, limits: &LikedLimits) -> anyhow::Result<Vec<TrackDescriptor>> {
            let limit = limits.track_limit.unwrap_or(usize::MAX);
            Ok(self.liked.iter().take(limit).cloned().collect())
        }
    }

    /// Writes a small file per request; queries containing "missing" find nothing
    struct StubFetcher {
        output_dir: PathBuf,
        calls: AtomicUsize,
        urls: std::sync::Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(output_dir: PathBuf) -> Self {
            Self {
                output_dir,
                calls: AtomicUsize::new(0),
                urls: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl AudioFetcher for StubFetcher {
        async fn fetch(&self, request: FetchRequest<'_>) -> Result<PathBuf, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let target = request.target().to_string();

            // Finish out of order
            for _ in 0..(target.len() % 4) {
                tokio::task::yield_now().await;
            }

            let stem = match request {
                FetchRequest::Search(query) if query.contains("missing") => {
                    return Err(FetchError::NotFound(target));
                }
                FetchRequest::Search(query) => query.to_string(),
                FetchRequest::Url(url) => {
                    self.urls.lock().unwrap().push(url.to_string());
                    "custom".to_string()
                }
            };

            std::fs::create_dir_all(&self.output_dir)?;
            let path = self.output_dir.join(format!("{}.mp3", stem));
            std::fs::write(&path, b"audio")?;
            Ok(path)
        }
    }

    #[derive(Default)]
    struct StubTagger {
        calls: AtomicUsize,
    }

    impl TagWriter for StubTagger {
        async fn write_tags(&self, _track: &TrackDescriptor, _path: &Path) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: std::sync::Mutex<Vec<SyncEvent>>,
    }

    impl RecordingSink {
        fn progress_values(&self) -> Vec<f64> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    SyncEvent::Progress { value } => Some(*value),
                    _ => None,
                })
                .collect()
        }

        fn messages(&self, level: LogLevel) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    SyncEvent::Log { level: l, message } if *l == level => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn progress(&self, value: f64) {
            self.events.lock().unwrap().push(SyncEvent::Progress { value });
        }

        fn log(&self, level: LogLevel, message: &str) {
            self.events.lock().unwrap().push(SyncEvent::Log {
                level,
                message: message.to_string(),
            });
        }
    }

    fn make_config(library: &Path, playlists: &[(&str, &str)]) -> Config {
        Config {
            settings: Settings {
                dj_library_directory: library.to_path_buf(),
                playlists_to_download: playlists
                    .iter()
                    .map(|(name, id)| PlaylistSetting {
                        name: name.to_string(),
                        url: format!("https://open.spotify.com/playlist/{}", id),
                    })
                    .collect(),
                max_workers: 3,
                ..Settings::default()
            },
            bind_addr: "127.0.0.1:0".into(),
            log_dir: library.join("logs"),
        }
    }

    fn house_tracks() -> Vec<TrackDescriptor> {
        vec![
            make_track("t1", "Daft Punk", "Around the World"),
            make_track("t2", "Nobody", "missing track"),
            make_track("t3", "Stardust", "Music Sounds Better"),
            make_track("t4", "Modjo", "Lady"),
        ]
    }

    fn syncer(
        source: StubSource,
        config: &Config,
    ) -> Syncer<StubSource, StubFetcher, StubTagger> {
        Syncer::new(source, StubFetcher::new(config.tracks_dir()), StubTagger::default())
    }

    #[tokio::test]
    async fn test_sync_writes_library_artifacts() {
        let tmp = TempDir::new().unwrap();
        let config = make_config(tmp.path(), &[("House", HOUSE_ID)]);
        let mut source = StubSource::default();
        source.playlists.insert(HOUSE_ID.into(), house_tracks());

        let syncer = syncer(source, &config);
        let sink = RecordingSink::default();
        let summary = syncer.run(&config, &sink).await.unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                playlists: 1,
                failed_playlists: 0,
                downloaded: 3,
                skipped: 0,
                failed: 1,
            }
        );
        assert_eq!(syncer.tagger.calls.load(Ordering::SeqCst), 3);

        // Crate keeps playlist order, failed track left out
        let crate_path = tmp.path().join("_Serato_/Subcrates/DJ Sync%%House.crate");
        let krate = Crate::load(&crate_path).unwrap();
        let tracks_dir = config.tracks_dir();
        let expected: Vec<String> = ["Daft Punk - Around the World", "Stardust - Music Sounds Better", "Modjo - Lady"]
            .iter()
            .map(|stem| tracks_dir.join(format!("{}.mp3", stem)).to_string_lossy().into_owned())
            .collect();
        assert_eq!(krate.track_paths().collect::<Vec<_>>(), expected);

        let m3u = std::fs::read_to_string(config.playlist_dir().join("House.m3u")).unwrap();
        assert_eq!(m3u, format!("#EXTM3U\n{}\n", expected.join("\n")));

        let xml = std::fs::read_to_string(
            config.playlist_dir().join(library_xml::DEFAULT_FILE_NAME),
        )
        .unwrap();
        assert!(xml.contains("<key>Name</key><string>House</string>"));
        assert_eq!(xml.matches("<key>Track Type</key>").count(), 3);

        let map = DownloadMap::open(tmp.path()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.get("t1"),
            Some(MapEntry::Downloaded("DJ Sync Tracks/Daft Punk - Around the World.mp3"))
        );

        let errors = sink.messages(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Nobody - missing track"));
    }

    #[tokio::test]
    async fn test_skips_already_downloaded() {
        let tmp = TempDir::new().unwrap();
        let config = make_config(tmp.path(), &[("House", HOUSE_ID)]);
        let mut source = StubSource::default();
        source.playlists.insert(
            HOUSE_ID.into(),
            vec![make_track("t1", "Daft Punk", "Around the World")],
        );

        std::fs::create_dir_all(tmp.path().join("old")).unwrap();
        std::fs::write(tmp.path().join("old/song.mp3"), b"audio").unwrap();
        std::fs::write(tmp.path().join(MAP_FILE_NAME), r#"{"t1": "old/song.mp3"}"#).unwrap();

        let syncer = syncer(source, &config);
        let summary = syncer.run(&config, &RecordingSink::default()).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(syncer.fetcher.calls.load(Ordering::SeqCst), 0);

        let krate = Crate::load(tmp.path().join("_Serato_/Subcrates/DJ Sync%%House.crate")).unwrap();
        let expected = tmp.path().join("old/song.mp3").to_string_lossy().into_owned();
        assert_eq!(krate.track_paths().collect::<Vec<_>>(), vec![expected.as_str()]);
    }

    #[tokio::test]
    async fn test_redownloads_missing_file_and_custom_url() {
        let tmp = TempDir::new().unwrap();
        let config = make_config(tmp.path(), &[("House", HOUSE_ID)]);
        let mut source = StubSource::default();
        source.playlists.insert(
            HOUSE_ID.into(),
            vec![
                make_track("gone", "Daft Punk", "Around the World"),
                make_track("custom", "Modjo", "Lady"),
            ],
        );
        std::fs::write(
            tmp.path().join(MAP_FILE_NAME),
            r#"{"gone": "old/deleted.mp3", "custom": "https://www.youtube.com/watch?v=abc"}"#,
        )
        .unwrap();

        let syncer = syncer(source, &config);
        let summary = syncer.run(&config, &RecordingSink::default()).await.unwrap();

        assert_eq!(summary.downloaded, 2);
        assert_eq!(
            *syncer.fetcher.urls.lock().unwrap(),
            vec!["https://www.youtube.com/watch?v=abc".to_string()]
        );

        // Custom URL entries are replaced by the downloaded path
        let map = DownloadMap::open(tmp.path()).unwrap();
        assert_eq!(map.get("custom"), Some(MapEntry::Downloaded("DJ Sync Tracks/custom.mp3")));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_finishes() {
        let tmp = TempDir::new().unwrap();
        let mut config = make_config(tmp.path(), &[("House", HOUSE_ID), ("Techno", TECHNO_ID)]);
        config.settings.download_liked_songs = true;
        config.settings.max_workers = 2;

        let mut source = StubSource::default();
        source.playlists.insert(HOUSE_ID.into(), house_tracks());
        source.playlists.insert(
            TECHNO_ID.into(),
            vec![make_track("t9", "Jeff Mills", "The Bells")],
        );
        source.liked = vec![make_track("l1", "Robin S", "Show Me Love")];

        let sink = RecordingSink::default();
        let summary = syncer(source, &config).run(&config, &sink).await.unwrap();
        assert_eq!(summary.playlists, 3);

        let values = sink.progress_values();
        assert!(values.len() > 3);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
        assert_eq!(*values.last().unwrap(), 1.0);

        assert!(tmp
            .path()
            .join("_Serato_/Subcrates/DJ Sync%%Liked Songs.crate")
            .exists());
    }

    #[tokio::test]
    async fn test_playlist_failure_does_not_stop_run() {
        let tmp = TempDir::new().unwrap();
        let mut config = make_config(tmp.path(), &[("Unknown", TECHNO_ID), ("House", HOUSE_ID)]);
        config.settings.playlists_to_download.push(PlaylistSetting {
            name: "Broken".into(),
            url: "not a playlist".into(),
        });

        let mut source = StubSource::default();
        source.playlists.insert(HOUSE_ID.into(), house_tracks());

        let sink = RecordingSink::default();
        let summary = syncer(source, &config).run(&config, &sink).await.unwrap();

        assert_eq!(summary.playlists, 1);
        assert_eq!(summary.failed_playlists, 2);
        assert!(!tmp.path().join("_Serato_/Subcrates/DJ Sync%%Unknown.crate").exists());
        assert!(tmp.path().join("_Serato_/Subcrates/DJ Sync%%House.crate").exists());
        assert_eq!(*sink.progress_values().last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let tmp = TempDir::new().unwrap();
        let config = make_config(tmp.path(), &[]);

        let sink = RecordingSink::default();
        let summary = syncer(StubSource::default(), &config)
            .run(&config, &sink)
            .await
            .unwrap();

        assert_eq!(summary, SyncSummary::default());
        assert_eq!(sink.progress_values(), vec![0.0, 1.0]);
        assert!(tmp.path().join(MAP_FILE_NAME).exists());
    }
}
