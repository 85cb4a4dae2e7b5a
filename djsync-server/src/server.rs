//! TCP server for CLI communication
//!
//! One JSON request per line. Every request gets one response line; a sync
//! request first streams its progress and log events, one JSON line each.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use djsync_core::crate_file::SUBCRATE_DIR;
use djsync_core::validate::validate_crate;
use djsync_core::{Crate, DownloadMap};

use crate::config::Config;
use crate::events::ChannelSink;
use crate::sync::{self, SyncSummary};

/// Server state
struct ServerState {
    config: Config,
    running: bool,
    last_sync: Option<LastSync>,
}

#[derive(Debug, Clone, Serialize)]
struct LastSync {
    finished_at: DateTime<Utc>,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SyncSummary>,
}

/// Request from CLI client
#[derive(Debug, Deserialize)]
#[serde(tag = "method")]
#[serde(rename_all = "snake_case")]
enum Request {
    /// Run a sync, optionally against another library root
    Sync { drive: Option<String> },
    Status,
    ListCrates,
    /// Validate one crate file
    Inspect { path: String },
    MapStats,
}

/// Response to CLI client
#[derive(Debug, Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    fn ok_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    fn error_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

/// Run the server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();

    // Create TCP listener
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    let state = Arc::new(Mutex::new(ServerState {
        config,
        running: false,
        last_sync: None,
    }));

    // Clients and their sync jobs all run on this thread
    let local = tokio::task::LocalSet::new();
    local.run_until(accept_loop(listener, state)).await
}

async fn accept_loop(listener: TcpListener, state: Arc<Mutex<ServerState>>) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Client connected from {}", addr);
                let state = Arc::clone(&state);
                tokio::task::spawn_local(async move {
                    if let Err(e) = handle_client(stream, state).await {
                        error!("Client error: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("Accept error: {}", e);
            }
        }
    }
}

async fn write_line<W, T>(writer: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Handle a single client connection
async fn handle_client(stream: TcpStream, state: Arc<Mutex<ServerState>>) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        debug!("Received: {}", line.trim());

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(Request::Sync { drive }) => handle_sync(drive, &state, &mut writer).await,
            Ok(request) => handle_request(request, &state).await,
            Err(e) => Response::error(format!("Invalid request: {}", e)),
        };

        write_line(&mut writer, &response).await?;
        line.clear();
    }

    Ok(())
}

/// Run a sync job, streaming its events to the client
async fn handle_sync<W>(
    drive: Option<String>,
    state: &Arc<Mutex<ServerState>>,
    writer: &mut W,
) -> Response
where
    W: AsyncWrite + Unpin,
{
    let config = {
        let mut state_guard = state.lock().await;
        if state_guard.running {
            return Response::error("A sync is already running");
        }
        state_guard.running = true;
        match drive {
            Some(drive) => state_guard.config.with_library_dir(drive),
            None => state_guard.config.clone(),
        }
    };

    info!("Sync requested for {:?}", config.library_dir());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let job = tokio::task::spawn_local(async move {
        let sink = ChannelSink::new(tx);
        sync::run_sync(&config, &sink).await
    });

    // The channel closes when the job drops its sink
    let mut client_connected = true;
    while let Some(event) = rx.recv().await {
        if client_connected {
            if let Err(e) = write_line(writer, &event).await {
                warn!("Client disconnected during sync: {}", e);
                client_connected = false;
            }
        }
    }

    let (response, summary) = match job.await {
        Ok(Ok(summary)) => (
            Response::ok_with_data(
                format!(
                    "Synced {} playlists: {} downloaded, {} skipped, {} failed",
                    summary.playlists, summary.downloaded, summary.skipped, summary.failed
                ),
                serde_json::json!(summary),
            ),
            Some(summary),
        ),
        Ok(Err(e)) => (Response::error(format!("Sync failed: {:#}", e)), None),
        Err(e) => (Response::error(format!("Sync task failed: {}", e)), None),
    };

    let mut state_guard = state.lock().await;
    state_guard.running = false;
    state_guard.last_sync = Some(LastSync {
        finished_at: Utc::now(),
        success: response.success,
        message: response.message.clone().unwrap_or_default(),
        summary,
    });

    response
}

/// Resolve a client-supplied path against the library directory
fn resolve_path(library_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        library_dir.join(path)
    }
}

/// Crate files in the library, sorted by filename
fn list_crates(library_dir: &Path) -> Vec<serde_json::Value> {
    let subcrate_dir = library_dir.join(SUBCRATE_DIR);
    let mut paths: Vec<PathBuf> = WalkDir::new(&subcrate_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "crate"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| match Crate::load(&path) {
            Ok(krate) => serde_json::json!({
                "name": krate.name(),
                "path": path,
                "track_count": krate.track_count(),
            }),
            Err(e) => {
                warn!("Failed to read crate {:?}: {}", path, e);
                serde_json::json!({
                    "path": path,
                    "error": e.to_string(),
                })
            }
        })
        .collect()
}

/// Process a request
async fn handle_request(request: Request, state: &Arc<Mutex<ServerState>>) -> Response {
    let state_guard = state.lock().await;
    let library_dir = state_guard.config.library_dir().to_path_buf();

    match request {
        Request::Sync { .. } => Response::error("Sync must be handled by the connection"),

        Request::Status => Response::ok_with_data(
            if state_guard.running {
                "Sync running"
            } else {
                "Server running"
            },
            serde_json::json!({
                "running": state_guard.running,
                "library_dir": library_dir,
                "playlists": state_guard.config.settings.total_playlists(),
                "max_workers": state_guard.config.settings.max_workers,
                "last_sync": state_guard.last_sync,
            }),
        ),

        Request::ListCrates => {
            let crates = list_crates(&library_dir);
            Response::ok_with_data(
                format!("{} crates found", crates.len()),
                serde_json::json!({ "crates": crates }),
            )
        }

        Request::Inspect { path } => {
            let path = resolve_path(&library_dir, &path);
            match std::fs::read(&path) {
                Ok(data) => {
                    let result = validate_crate(&data);
                    let data = serde_json::json!(result);
                    if result.valid {
                        Response::ok_with_data(format!("{:?} is a valid crate", path), data)
                    } else {
                        Response::error_with_data(
                            format!("{:?} has {} errors", path, result.errors.len()),
                            data,
                        )
                    }
                }
                Err(e) => Response::error(format!("Failed to read {:?}: {}", path, e)),
            }
        }

        Request::MapStats => match DownloadMap::open(&library_dir) {
            Ok(map) => Response::ok_with_data(
                "Download map statistics",
                serde_json::json!({
                    "path": map.path(),
                    "stats": map.stats(),
                }),
            ),
            Err(e) => Response::error(format!("Failed to open download map: {}", e)),
        },
    }
}
