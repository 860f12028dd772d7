pub mod config;
pub mod demo;
pub mod proof;
pub mod wallets;

use clap::{Parser, Subcommand};

/// WalletLink: wallet connect and transaction flows for chat bots.
#[derive(Debug, Parser)]
#[command(name = "walletlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the wallets the directory currently offers.
    Wallets {
        /// Print the full entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// `ton_proof` challenge utilities.
    #[command(subcommand)]
    Proof(ProofCommand),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run a connect + send-transaction flow against a simulated wallet.
    Demo {
        /// Require a signed proof on connect.
        #[arg(long)]
        check_proof: bool,
        /// Have the wallet answer the proof for a different challenge.
        #[arg(long)]
        forge_proof: bool,
        /// Have the wallet reject the connection.
        #[arg(long)]
        reject: bool,
        /// Number of messages in the demo transaction.
        #[arg(long, default_value_t = 1)]
        messages: usize,
        /// Leave the transaction unanswered until it times out.
        #[arg(long)]
        ignore_transaction: bool,
        /// Seconds the simulated wallet takes to answer.
        #[arg(long, default_value_t = 1)]
        delay_secs: u64,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ProofCommand {
    /// Generate a fresh challenge payload.
    Generate {
        /// Seconds until the challenge expires.
        #[arg(long, default_value_t = 600)]
        ttl_secs: u64,
    },
    /// Answer a challenge with a throwaway simulated wallet and print the
    /// resulting wallet info as JSON.
    Simulate {
        payload: String,
        /// Domain the proof is signed for.
        #[arg(long, default_value = "example.com")]
        domain: String,
    },
    /// Verify a wallet's proof against a challenge.
    Check {
        payload: String,
        /// JSON file holding the wallet info (`-` for stdin).
        #[arg(long, default_value = "-")]
        wallet: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `WL_CONFIG` (or
/// `config.toml` by default).  A missing file yields the defaults.
/// Returns the parsed [`Config`](wl_domain::config::Config) and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(wl_domain::config::Config, String)> {
    let config_path = std::env::var("WL_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        wl_domain::config::Config::default()
    };

    Ok((config, config_path))
}
