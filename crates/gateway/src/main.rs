use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use wl_domain::config::{LogFormat, ObservabilityConfig};
use wl_gateway::cli::demo::DemoOptions;
use wl_gateway::cli::{Cli, Command, ConfigCommand, ProofCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Wallets { json } => {
            init_cli_tracing();
            let (config, _) = wl_gateway::cli::load_config()?;
            wl_gateway::cli::wallets::list(&config, json).await
        }
        Command::Proof(ProofCommand::Generate { ttl_secs }) => {
            wl_gateway::cli::proof::generate(ttl_secs);
            Ok(())
        }
        Command::Proof(ProofCommand::Simulate { payload, domain }) => {
            wl_gateway::cli::proof::simulate(&payload, &domain)
        }
        Command::Proof(ProofCommand::Check { payload, wallet }) => {
            if !wl_gateway::cli::proof::check(&payload, &wallet)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = wl_gateway::cli::load_config()?;
            if !wl_gateway::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = wl_gateway::cli::load_config()?;
            wl_gateway::cli::config::show(&config)
        }
        Command::Demo {
            check_proof,
            forge_proof,
            reject,
            messages,
            ignore_transaction,
            delay_secs,
        } => {
            let (config, _) = wl_gateway::cli::load_config()?;
            init_tracing(&config.observability);
            let opts = DemoOptions {
                check_proof: check_proof || forge_proof,
                forge_proof,
                reject,
                messages,
                ignore_transaction,
                delay: Duration::from_secs(delay_secs),
            };
            wl_gateway::cli::demo::run(config, opts).await
        }
        Command::Version => {
            println!("walletlink {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing for flow-running commands in the configured format.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.default_filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

/// Initialize compact stderr-only tracing for one-shot commands.
///
/// Defaults to `warn` level so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
