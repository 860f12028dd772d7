//! Wallet directory: the list of wallet apps users can connect through.
//!
//! Lookup order is cache → registry fetch → fallback file → bundled list.
//! A successful fetch refreshes both the cache and the fallback file.
//! There is no retry or backoff; a failed fetch simply falls through.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::Instant;

use wl_domain::config::WalletsConfig;
use wl_domain::error::{Error, Result};
use wl_domain::trace::TraceEvent;
use wl_domain::wallet::WalletApp;

const BUNDLED_WALLETS: &str = include_str!("../data/wallets_fallback.json");

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Anything that can produce the list of connectable wallets.
#[async_trait::async_trait]
pub trait WalletList: Send + Sync {
    async fn list_wallets(&self) -> Result<Vec<WalletApp>>;
}

/// Source of the raw registry document (a JSON array).
#[async_trait::async_trait]
pub trait WalletFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<serde_json::Value>>;

    /// Human-readable origin, used in logs.
    fn source(&self) -> &str;
}

/// Fetches the registry over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl WalletFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<serde_json::Value>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("wallet list fetch returned {status}")));
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        match body {
            serde_json::Value::Array(items) => Ok(items),
            _ => Err(Error::Directory("wallet list must be a JSON array".into())),
        }
    }

    fn source(&self) -> &str {
        &self.url
    }
}

/// Fixed wallet list.
pub struct StaticWallets(pub Vec<WalletApp>);

#[async_trait::async_trait]
impl WalletList for StaticWallets {
    async fn list_wallets(&self) -> Result<Vec<WalletApp>> {
        Ok(self.0.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct RawBridge {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWallet {
    app_name: String,
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    about_url: Option<String>,
    #[serde(default)]
    universal_url: Option<String>,
    #[serde(default, alias = "deepLink")]
    deep_link: Option<String>,
    #[serde(default)]
    bridge: Vec<RawBridge>,
    #[serde(default)]
    platforms: Vec<String>,
}

impl RawWallet {
    /// Convert to a [`WalletApp`] if the wallet exposes an SSE bridge.
    fn into_app(self) -> Option<WalletApp> {
        let bridge_url = self
            .bridge
            .into_iter()
            .find(|b| b.kind.contains("sse") && b.url.is_some())?
            .url?;
        Some(WalletApp {
            app_name: self.app_name,
            name: self.name,
            image: self.image,
            bridge_url,
            universal_url: self.universal_url,
            deep_link: self.deep_link,
            about_url: self.about_url,
            platforms: self.platforms,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct CachedList {
    fetched_at: Instant,
    raw: Vec<serde_json::Value>,
}

pub struct WalletDirectory {
    fetcher: Arc<dyn WalletFetcher>,
    exclude: Vec<String>,
    order: Vec<String>,
    ttl: Duration,
    fallback_path: Option<PathBuf>,
    cache: Mutex<Option<CachedList>>,
}

impl WalletDirectory {
    pub fn new(fetcher: Arc<dyn WalletFetcher>, config: &WalletsConfig) -> Self {
        Self {
            fetcher,
            exclude: config.exclude.clone(),
            order: config.order.clone(),
            ttl: Duration::from_secs(config.cache_ttl_secs),
            fallback_path: config.fallback_path.clone(),
            cache: Mutex::new(None),
        }
    }

    /// Directory backed by the HTTP registry named in the config.
    pub fn from_config(config: &WalletsConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            config.source_url.clone(),
            Duration::from_millis(config.fetch_timeout_ms),
        )?;
        Ok(Self::new(Arc::new(fetcher), config))
    }

    fn cached(&self) -> Option<Vec<serde_json::Value>> {
        let cache = self.cache.lock();
        cache
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.raw.clone())
    }

    async fn load_fallback_file(&self) -> Option<Vec<serde_json::Value>> {
        let path = self.fallback_path.as_ref()?;
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no wallet fallback file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "wallet fallback file unreadable");
                None
            }
        }
    }

    async fn save_fallback_file(&self, raw: &[serde_json::Value]) {
        let Some(path) = self.fallback_path.as_ref() else {
            return;
        };
        let json = match serde_json::to_string(raw) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize wallet list");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            tracing::warn!(path = %path.display(), error = %e, "could not write wallet fallback file");
        }
    }

    /// Raw registry entries and where they came from.
    async fn raw_wallets(&self) -> Result<(Vec<serde_json::Value>, &'static str)> {
        if let Some(raw) = self.cached() {
            return Ok((raw, "cache"));
        }

        match self.fetcher.fetch().await {
            Ok(raw) if self.process(raw.clone()).is_empty() => {
                TraceEvent::WalletsFetchFailed {
                    url: self.fetcher.source().to_string(),
                    error: "no supported wallets".to_string(),
                }
                .emit();
            }
            Ok(raw) => {
                *self.cache.lock() = Some(CachedList {
                    fetched_at: Instant::now(),
                    raw: raw.clone(),
                });
                self.save_fallback_file(&raw).await;
                return Ok((raw, "registry"));
            }
            Err(e) => {
                TraceEvent::WalletsFetchFailed {
                    url: self.fetcher.source().to_string(),
                    error: e.to_string(),
                }
                .emit();
            }
        }

        if let Some(raw) = self.load_fallback_file().await {
            if !self.process(raw.clone()).is_empty() {
                return Ok((raw, "fallback_file"));
            }
        }

        let raw = serde_json::from_str(BUNDLED_WALLETS)
            .map_err(|e| Error::Directory(format!("bundled wallet list: {e}")))?;
        Ok((raw, "bundled"))
    }

    /// Filter raw entries down to connectable, non-excluded wallets in the
    /// preferred order.
    fn process(&self, raw: Vec<serde_json::Value>) -> Vec<WalletApp> {
        let mut apps: Vec<WalletApp> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawWallet>(v).ok())
            .filter(|w| !self.exclude.contains(&w.app_name))
            .filter_map(RawWallet::into_app)
            .collect();

        if !self.order.is_empty() {
            // Stable sort keeps registry order among unlisted wallets.
            apps.sort_by_key(|app| {
                self.order
                    .iter()
                    .position(|name| *name == app.app_name)
                    .unwrap_or(usize::MAX)
            });
        }
        apps
    }
}

#[async_trait::async_trait]
impl WalletList for WalletDirectory {
    async fn list_wallets(&self) -> Result<Vec<WalletApp>> {
        let (raw, source) = self.raw_wallets().await?;
        let total = raw.len();
        let apps = self.process(raw);
        TraceEvent::WalletsLoaded {
            source: source.to_string(),
            total,
            supported: apps.len(),
        }
        .emit();
        Ok(apps)
    }
}
