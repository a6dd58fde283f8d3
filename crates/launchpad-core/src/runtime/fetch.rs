//! Runtime download with progress reporting.
//!
//! Provides:
//! - [`download`]: streamed HTTP download to a `.part` file, renamed on success
//! - [`NodeDistFetcher`]: fetch + extract of the versioned Node.js archive

use super::archive;
use super::RuntimeFetcher;
use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, RuntimeConfig};
use crate::error::{LaunchpadError, Result};
use crate::platform::{self, PlatformStrategy};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Archive URL for a Node.js release on Windows.
pub fn archive_url(version: &str, arch: &str) -> String {
    format!(
        "{base}/v{version}/node-v{version}-win-{arch}.zip",
        base = NetworkConfig::NODE_DIST_BASE,
    )
}

/// Fetches the pinned Node.js release into the runtime directory.
pub struct NodeDistFetcher {
    client: reqwest::Client,
    url: String,
    cancel: CancellationToken,
}

impl NodeDistFetcher {
    /// Fetcher for the given platform, or `None` where automatic download is
    /// not supported.
    pub fn for_platform(strategy: PlatformStrategy) -> Result<Option<Self>> {
        if !strategy.supports_runtime_fetch() {
            return Ok(None);
        }
        let url = archive_url(RuntimeConfig::NODE_VERSION, platform::archive_arch());
        Ok(Some(Self::new(url)?))
    }

    pub fn new(url: impl Into<String>) -> Result<Self> {
        // No overall timeout: the archive is large and links can be slow.
        let client = reqwest::Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| LaunchpadError::FetchFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            cancel: CancellationToken::new(),
        })
    }

    /// Abort the download when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
impl RuntimeFetcher for NodeDistFetcher {
    fn source(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self, runtime_dir: &Path) -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let archive_path = temp_dir.path().join("node.zip");

        download(&self.client, &self.url, &archive_path, &self.cancel)
            .await
            .map_err(|e| match e {
                LaunchpadError::FetchFailed { .. } | LaunchpadError::SignalInterrupt => e,
                other => LaunchpadError::FetchFailed {
                    message: format!("Download of {} failed: {}", self.url, other),
                },
            })?;

        if runtime_dir.exists() {
            info!("Removing previous runtime at {}", runtime_dir.display());
            std::fs::remove_dir_all(runtime_dir)
                .map_err(|e| LaunchpadError::io_with_path(e, runtime_dir))?;
        }

        archive::extract_stripped(&archive_path, runtime_dir)?;
        Ok(())
    }
}

/// Download `url` to `destination`, showing byte-level progress.
///
/// Returns the number of bytes written. A cancellation request ends the
/// transfer with `SignalInterrupt`, even while the connection is stalled.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let temp_path = PathBuf::from(format!(
        "{}{}",
        destination.display(),
        NetworkConfig::DOWNLOAD_TEMP_SUFFIX
    ));

    match do_download(client, url, &temp_path, cancel).await {
        Ok(bytes) => {
            std::fs::rename(&temp_path, destination).map_err(|e| {
                let _ = std::fs::remove_file(&temp_path);
                LaunchpadError::io_with_path(e, destination)
            })?;
            info!("Downloaded {} bytes to {}", bytes, destination.display());
            Ok(bytes)
        }
        Err(e) => {
            // Cleanup temp file on error
            let _ = std::fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

async fn do_download(
    client: &reqwest::Client,
    url: &str,
    temp_path: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    info!("Downloading {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(LaunchpadError::FetchFailed {
            message: format!("Download of {} failed with status {}", url, status),
        });
    }

    let bar = progress_bar(response.content_length());
    let mut file =
        std::fs::File::create(temp_path).map_err(|e| LaunchpadError::io_with_path(e, temp_path))?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    loop {
        if cancel.is_cancelled() {
            bar.abandon_with_message("download interrupted");
            return Err(LaunchpadError::SignalInterrupt);
        }
        let next = match tokio::time::timeout(NetworkConfig::CANCEL_CHECK_INTERVAL, stream.next())
            .await
        {
            Ok(next) => next,
            Err(_) => continue,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| LaunchpadError::Network {
            message: format!("Error reading download stream: {}", e),
            source: Some(e),
        })?;
        file.write_all(&chunk)
            .map_err(|e| LaunchpadError::io_with_path(e, temp_path))?;
        downloaded += chunk.len() as u64;
        bar.set_position(downloaded);
    }

    file.flush()
        .map_err(|e| LaunchpadError::io_with_path(e, temp_path))?;
    bar.finish_with_message("download complete");
    Ok(downloaded)
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let style = ProgressStyle::with_template(
                "{msg} [{bar:50.blue}] {percent}% ({bytes}/{total_bytes})",
            )
            .map(|s| s.progress_chars("█>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            ProgressBar::new(len)
                .with_style(style)
                .with_message("Downloading")
        }
        None => {
            let style = ProgressStyle::with_template("{spinner} Downloading {bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            ProgressBar::new_spinner().with_style(style)
        }
    }
}
