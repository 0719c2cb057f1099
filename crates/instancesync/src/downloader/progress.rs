//! Progress tracking and reporting for download operations

use std::sync::Arc;
use std::time::Duration;

/// Progress callback for download operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a category's files are fetched
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DownloadStarted {
        file: String,
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        file: String,
        downloaded: u64,
        total: Option<u64>,
        speed_bps: f64,
    },
    DownloadComplete {
        file: String,
        final_size: u64,
        elapsed: Duration,
    },
    /// Primary host failed; trying the fallback host once
    FallbackAttempt {
        file: String,
        failed_url: String,
        fallback_url: String,
    },
    /// No further attempts will be made for this file
    DownloadAbandoned {
        file: String,
        error: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _file: &str, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _file: &str, _downloaded: u64, _total: Option<u64>, _speed_bps: f64) {}
    fn on_download_complete(&self, _file: &str, _final_size: u64, _elapsed: Duration) {}
    fn on_fallback_attempt(&self, _file: &str, _failed_url: &str, _fallback_url: &str) {}
    fn on_download_abandoned(&self, _file: &str, _error: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { file, url, total_size } => {
                self.on_download_started(&file, &url, total_size);
            }
            ProgressEvent::DownloadProgress { file, downloaded, total, speed_bps } => {
                self.on_download_progress(&file, downloaded, total, speed_bps);
            }
            ProgressEvent::DownloadComplete { file, final_size, elapsed } => {
                self.on_download_complete(&file, final_size, elapsed);
            }
            ProgressEvent::FallbackAttempt { file, failed_url, fallback_url } => {
                self.on_fallback_attempt(&file, &failed_url, &fallback_url);
            }
            ProgressEvent::DownloadAbandoned { file, error } => {
                self.on_download_abandoned(&file, &error);
            }
        })
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_download_started(&self, file: &str, url: &str, total_size: Option<u64>) {
        match (self.verbose, total_size) {
            (true, Some(size)) => println!("Downloading {} from {} ({} bytes)", file, url, size),
            (true, None) => println!("Downloading {} from {}", file, url),
            (false, _) => println!("Downloading {}", file),
        }
    }

    fn on_download_progress(&self, file: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        if self.verbose {
            let speed_mb = speed_bps / 1_000_000.0;
            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!("  {}: {:.1}% ({}/{} bytes, {:.1} MB/s)", file, percent, downloaded, total, speed_mb);
                }
                _ => println!("  {}: {} bytes ({:.1} MB/s)", file, downloaded, speed_mb),
            }
        }
    }

    fn on_download_complete(&self, file: &str, _final_size: u64, elapsed: Duration) {
        println!("Finished downloading {} (Took {:.2}s)", file, elapsed.as_secs_f32());
    }

    fn on_fallback_attempt(&self, file: &str, failed_url: &str, fallback_url: &str) {
        println!("File not found at URL: {}", failed_url);
        match url::Url::parse(fallback_url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            Some(host) => println!("Retrying {} with {}", file, host),
            None => println!("Retrying {} with {}", file, fallback_url),
        }
    }

    fn on_download_abandoned(&self, file: &str, error: &str) {
        eprintln!("Failed to download {}: {}", file, error);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
