use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flow budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wait budgets and validity windows for the connect / transaction flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    /// How long a connect prompt waits for the wallet.
    #[serde(default = "d_180")]
    pub connect_timeout_secs: u64,
    /// How long a transaction prompt waits for a signature.
    #[serde(default = "d_300")]
    pub transaction_timeout_secs: u64,
    /// `valid_until` offset applied to new and retried transactions.
    #[serde(default = "d_300")]
    pub transaction_validity_secs: u64,
    /// Expiry embedded in generated proof challenges.
    #[serde(default = "d_600")]
    pub proof_ttl_secs: u64,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 180,
            transaction_timeout_secs: 300,
            transaction_validity_secs: 300,
            proof_ttl_secs: 600,
        }
    }
}

impl FlowsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }
}

fn d_180() -> u64 {
    180
}
fn d_300() -> u64 {
    300
}
fn d_600() -> u64 {
    600
}
