use wl_domain::config::Config;

use crate::bootstrap;

/// List the directory's wallets, one per line, or as JSON.
pub async fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let wallets = bootstrap::wallet_directory(config)?.list_wallets().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wallets)?);
        return Ok(());
    }

    let width = wallets.iter().map(|w| w.app_name.len()).max().unwrap_or(0);
    for w in &wallets {
        println!("{:<width$}  {:<20}  {}", w.app_name, w.name, w.bridge_url);
    }
    println!("\n{} wallet(s)", wallets.len());
    Ok(())
}
