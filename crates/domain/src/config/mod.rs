mod bridge;
mod flows;
mod observability;
mod store;
mod ui;
mod wallets;

pub use bridge::*;
pub use flows::*;
pub use observability::*;
pub use store::*;
pub use ui::*;
pub use wallets::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
    #[serde(default)]
    pub flows: FlowsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.bridge.manifest_url.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "bridge.manifest_url".into(),
                message: "manifest_url must not be empty".into(),
            });
        } else if !self.bridge.manifest_url.starts_with("https://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "bridge.manifest_url".into(),
                message: "wallets only fetch manifests over https".into(),
            });
        }

        if self.wallets.source_url.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "wallets.source_url".into(),
                message: "source_url must not be empty".into(),
            });
        }

        if self.wallets.cache_ttl_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "wallets.cache_ttl_secs".into(),
                message: "a zero ttl refetches the wallet list on every flow".into(),
            });
        }

        for (field, value) in [
            ("flows.connect_timeout_secs", self.flows.connect_timeout_secs),
            ("flows.transaction_timeout_secs", self.flows.transaction_timeout_secs),
            ("flows.transaction_validity_secs", self.flows.transaction_validity_secs),
            ("flows.proof_ttl_secs", self.flows.proof_ttl_secs),
        ] {
            if value == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if self.store.backend == StoreBackend::File && self.store.path.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.path".into(),
                message: "file backend requires a path".into(),
            });
        }

        if !SUPPORTED_LANGUAGES.contains(&self.ui.default_language.as_str()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "ui.default_language".into(),
                message: format!(
                    "'{}' has no text table, prompts fall back to \"en\"",
                    self.ui.default_language
                ),
            });
        }

        errors
    }
}
