//! Configuration types for the downloader system

use std::time::Duration;

use tracing::{debug, warn};

pub const DEFAULT_CURSEFORGE_HOST: &str = "https://mediafilez.forgecdn.net";
pub const DEFAULT_CURSEFORGE_FALLBACK_HOST: &str = "https://edge.forgecdn.net";
pub const DEFAULT_MODRINTH_HOST: &str = "https://cdn.modrinth.com";

/// Configuration for download operations
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Base URL of the CurseForge CDN
    pub curseforge_host: String,
    /// Base URL tried once when a CurseForge download fails
    pub curseforge_fallback_host: String,
    /// Base URL of the Modrinth CDN
    pub modrinth_host: String,
    /// Size of the per-category worker pool
    pub max_concurrent_downloads: usize,
    /// Upper bound on waiting for a category's downloads before cleanup runs anyway
    pub join_timeout: Duration,
    /// Timeout for a single HTTP transfer
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            curseforge_host: DEFAULT_CURSEFORGE_HOST.to_string(),
            curseforge_fallback_host: DEFAULT_CURSEFORGE_FALLBACK_HOST.to_string(),
            modrinth_host: DEFAULT_MODRINTH_HOST.to_string(),
            max_concurrent_downloads: 10,
            join_timeout: Duration::from_secs(24 * 60 * 60),
            request_timeout: Duration::from_secs(600), // 10 minutes for large packs
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("instancesync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloadConfig {
    /// Defaults overridden by `INSTANCESYNC_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Self {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded environment variables from .env file");
        }

        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("INSTANCESYNC_CURSEFORGE_HOST") {
            self.curseforge_host = host;
        }
        if let Some(host) = lookup("INSTANCESYNC_CURSEFORGE_FALLBACK_HOST") {
            self.curseforge_fallback_host = host;
        }
        if let Some(host) = lookup("INSTANCESYNC_MODRINTH_HOST") {
            self.modrinth_host = host;
        }
        if let Some(raw) = lookup("INSTANCESYNC_MAX_CONCURRENT") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrent_downloads = n,
                _ => warn!("Ignoring invalid INSTANCESYNC_MAX_CONCURRENT value '{}'", raw),
            }
        }
        if let Some(raw) = lookup("INSTANCESYNC_JOIN_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.join_timeout = Duration::from_secs(secs),
                Err(_) => warn!("Ignoring invalid INSTANCESYNC_JOIN_TIMEOUT_SECS value '{}'", raw),
            }
        }
    }
}

/// Builder for [`DownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the environment-derived configuration
    pub fn from_env() -> Self {
        Self {
            config: DownloadConfig::from_env(),
        }
    }

    pub fn curseforge_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.curseforge_host = host.into();
        self
    }

    pub fn curseforge_fallback_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.curseforge_fallback_host = host.into();
        self
    }

    pub fn modrinth_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.modrinth_host = host.into();
        self
    }

    pub fn max_concurrent_downloads(mut self, n: usize) -> Self {
        self.config.max_concurrent_downloads = n.max(1);
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> DownloadConfig {
        self.config
    }
}
