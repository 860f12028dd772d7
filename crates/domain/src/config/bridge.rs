use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bridge / secure channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Public URL of the dApp manifest wallets fetch before connecting.
    #[serde(default = "d_manifest_url")]
    pub manifest_url: String,
    /// Where the wallet should send the user back after approving.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Universal link used when a wallet entry does not carry its own.
    #[serde(default = "d_universal_url")]
    pub default_universal_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            manifest_url: d_manifest_url(),
            redirect_url: None,
            default_universal_url: d_universal_url(),
        }
    }
}

fn d_manifest_url() -> String {
    "https://example.com/tonconnect-manifest.json".into()
}
fn d_universal_url() -> String {
    "https://app.tonkeeper.com/ton-connect".into()
}
