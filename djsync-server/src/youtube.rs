//! Audio acquisition through the `yt-dlp` command line tool
//!
//! Searches take the first YouTube result for the query. Audio is extracted
//! to MP3 in the tracks folder and yt-dlp reports the final file path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::sync::{AudioFetcher, FetchError, FetchRequest};

const DEFAULT_PROGRAM: &str = "yt-dlp";

/// yt-dlp backed fetcher
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    output_dir: PathBuf,
}

impl YtDlp {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Installed yt-dlp version, or an error if it cannot be run
    pub async fn version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!("{:?} --version exited with {}", self.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Command line for one download
fn build_args(request: &FetchRequest<'_>, output_dir: &Path) -> Vec<OsString> {
    let target = match request {
        FetchRequest::Search(query) => format!("ytsearch1:{}", query),
        FetchRequest::Url(url) => url.to_string(),
    };

    let mut args: Vec<OsString> = [
        "--extract-audio",
        "--audio-format",
        "mp3",
        "--audio-quality",
        "0",
        "--no-playlist",
        "--no-progress",
        "--windows-filenames",
        "--print",
        "after_move:filepath",
        "--paths",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(output_dir.as_os_str().to_os_string());
    args.push("--output".into());
    args.push("%(title)s.%(ext)s".into());
    args.push(target.into());
    args
}

/// Final file path from yt-dlp's stdout (last non-empty line)
fn parse_output_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

/// Map a failed run's stderr to a fetch error
fn classify_failure(target: &str, stderr: &str) -> FetchError {
    const UNAVAILABLE: [&str; 4] = [
        "Video unavailable",
        "Sign in to confirm your age",
        "Private video",
        "This video is not available",
    ];

    if UNAVAILABLE.iter().any(|marker| stderr.contains(marker)) {
        return FetchError::Unavailable(target.to_string());
    }
    let detail = stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .unwrap_or(stderr.trim());
    FetchError::Failed(detail.to_string())
}

impl AudioFetcher for YtDlp {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<PathBuf, FetchError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let args = build_args(&request, &self.output_dir);
        debug!("Running {:?} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let target = request.target();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(classify_failure(target, &stderr));
        }

        // A search without hits exits cleanly but downloads nothing
        let path = parse_output_path(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| FetchError::NotFound(target.to_string()))?;
        if !path.exists() {
            return Err(FetchError::Failed(format!(
                "yt-dlp reported {:?} but the file is missing",
                path
            )));
        }
        Ok(path)
    }
}
