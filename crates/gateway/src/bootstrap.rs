//! Flow manager construction shared by the CLI commands.

use std::sync::Arc;

use anyhow::Context;

use wl_bridge::{SecureChannel, WalletDirectory, WalletList};
use wl_domain::config::{Config, ConfigSeverity};
use wl_flows::{qr, ChatSurface, ContinuationTable, FlowManager, FlowParts, FlowSettings, TaskRegistry, Texts};
use wl_sessions::open_store;

/// Refuse to start on config errors; log warnings.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// The wallet directory described by `[wallets]`.
pub fn wallet_directory(config: &Config) -> anyhow::Result<Arc<dyn WalletList>> {
    let directory =
        WalletDirectory::from_config(&config.wallets).context("building wallet directory")?;
    Ok(Arc::new(directory))
}

/// Wire a [`FlowManager`] for `channel` and `surface` from the config.
pub fn build_manager(
    config: &Config,
    channel: Arc<dyn SecureChannel>,
    surface: Arc<dyn ChatSurface>,
    continuations: Arc<ContinuationTable>,
) -> anyhow::Result<FlowManager> {
    check_config(config)?;

    let store = open_store(&config.store).context("opening session store")?;
    let wallets = wallet_directory(config)?;

    let parts = FlowParts {
        store,
        channel,
        wallets,
        surface,
        qr: Arc::from(qr::from_config(&config.ui)),
        texts: Arc::new(Texts::builtin()),
        continuations,
        tasks: Arc::new(TaskRegistry::new()),
        buttons_per_row: config.ui.wallet_buttons_per_row,
    };
    tracing::info!(
        store = ?config.store.backend,
        qr = ?config.ui.qr,
        language = %config.ui.default_language,
        "flow manager ready"
    );
    Ok(FlowManager::new(parts, FlowSettings::from_config(config)))
}
