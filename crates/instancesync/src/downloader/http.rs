//! HTTP client with integrated streaming download functionality

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::config::DownloadConfig;
use super::error::{DownloadError, FileOperation, Result};
use super::progress::{ProgressCallback, ProgressEvent};

/// HTTP client shared by every transfer of one orchestrator.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client })
    }

    /// Stream `url` into `dest_path`.
    ///
    /// Bytes go to a `.part` sibling first and are moved into place only once
    /// the body is complete, so `dest_path` never holds a truncated file.
    pub async fn download_to_file(
        &self,
        url: &Url,
        dest_path: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<u64> {
        let temp_path = part_path(dest_path);
        let result = self.stream_to(url, dest_path, &temp_path, progress_callback).await;

        if result.is_err() && fs::try_exists(&temp_path).await.unwrap_or(false) {
            if let Err(e) = fs::remove_file(&temp_path).await {
                debug!("Failed to remove partial file {}: {}", temp_path.display(), e);
            }
        }

        result
    }

    async fn stream_to(
        &self,
        url: &Url,
        dest_path: &Path,
        temp_path: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<u64> {
        debug!("Stream downloading: {} to {}", url, dest_path.display());
        let file_name = display_name(dest_path);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::request(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_size = response.content_length();
        if let Some(callback) = progress_callback {
            callback(ProgressEvent::DownloadStarted {
                file: file_name.clone(),
                url: url.to_string(),
                total_size,
            });
        }

        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| DownloadError::fs(temp_path, FileOperation::Create, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let start_time = Instant::now();
        let mut last_progress_time = start_time;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::request(url.as_str(), e))?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;

            downloaded += chunk.len() as u64;

            // Report progress at most every 100ms
            let now = Instant::now();
            if now.duration_since(last_progress_time).as_millis() >= 100 {
                if let Some(callback) = progress_callback {
                    let elapsed = start_time.elapsed().as_secs_f64();
                    let speed_bps = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };
                    callback(ProgressEvent::DownloadProgress {
                        file: file_name.clone(),
                        downloaded,
                        total: total_size,
                        speed_bps,
                    });
                }
                last_progress_time = now;
            }
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::fs(temp_path, FileOperation::Write, e))?;
        drop(file);

        fs::rename(temp_path, dest_path)
            .await
            .map_err(|e| DownloadError::fs(dest_path, FileOperation::Move, e))?;

        debug!("Stream download completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}

/// `<dest>.part`, kept next to the destination so the final rename stays on one filesystem
pub fn part_path(dest_path: &Path) -> PathBuf {
    let mut name: OsString = dest_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
