use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wallet directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletsConfig {
    /// Registry JSON listing wallet apps (wallets-v2 format).
    #[serde(default = "d_source_url")]
    pub source_url: String,
    /// `app_name`s never offered to users.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// `app_name`s moved to the front of the list, in this order.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default = "d_86400")]
    pub cache_ttl_secs: u64,
    /// Last-known-good copy of the registry.  `None` keeps only the
    /// in-memory cache and the bundled list.
    #[serde(default)]
    pub fallback_path: Option<PathBuf>,
    #[serde(default = "d_8000")]
    pub fetch_timeout_ms: u64,
}

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            source_url: d_source_url(),
            exclude: Vec::new(),
            order: Vec::new(),
            cache_ttl_secs: 86_400,
            fallback_path: None,
            fetch_timeout_ms: 8000,
        }
    }
}

fn d_source_url() -> String {
    "https://raw.githubusercontent.com/ton-blockchain/wallets-list/main/wallets-v2.json".into()
}
fn d_86400() -> u64 {
    86_400
}
fn d_8000() -> u64 {
    8000
}
