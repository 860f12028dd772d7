use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wallet apps (directory entries)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A wallet application a user can connect through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletApp {
    /// Stable identifier from the registry (e.g. `"tonkeeper"`).
    pub app_name: String,
    /// Human-readable name shown on buttons.
    pub name: String,
    pub image: String,
    /// HTTP bridge endpoint the wallet listens on.
    pub bridge_url: String,
    /// Universal link template the wallet opens (`https://app.tonkeeper.com/ton-connect`).
    #[serde(default)]
    pub universal_url: Option<String>,
    #[serde(default)]
    pub deep_link: Option<String>,
    #[serde(default)]
    pub about_url: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl WalletApp {
    /// Link that brings the user back into the wallet app (used by the
    /// "confirm in your wallet" prompt).
    pub fn open_url(&self) -> Option<&str> {
        self.universal_url
            .as_deref()
            .or(self.deep_link.as_deref())
            .or(self.about_url.as_deref())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connected wallet info (from the bridge `connect` event)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Network a wallet account lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chain {
    #[serde(rename = "-239")]
    Mainnet,
    #[serde(rename = "-3")]
    Testnet,
}

/// The account a connected wallet exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Raw form `<workchain>:<hex hash>`.
    pub address: String,
    pub chain: Chain,
    #[serde(default)]
    pub wallet_state_init: Option<String>,
    /// Hex-encoded ed25519 public key.
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Domain the proof was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDomain {
    pub length_bytes: u32,
    pub value: String,
}

/// Signed `ton_proof` item returned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProof {
    pub timestamp: u64,
    pub domain: ProofDomain,
    pub payload: String,
    /// Base64-encoded ed25519 signature.
    pub signature: String,
}

/// A device feature entry: either the legacy bare name or a detailed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WalletFeature {
    Detailed {
        name: String,
        #[serde(rename = "maxMessages", default)]
        max_messages: Option<u32>,
    },
    Named(String),
}

/// Message count implied by the legacy bare `"SendTransaction"` feature.
const LEGACY_SEND_TRANSACTION_MAX_MESSAGES: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub app_name: String,
    pub app_version: String,
    #[serde(default)]
    pub max_protocol_version: u32,
    #[serde(default)]
    pub features: Vec<WalletFeature>,
}

impl DeviceInfo {
    /// Maximum number of messages the wallet accepts in one
    /// `sendTransaction` request, or `None` if it does not declare the feature.
    pub fn max_messages(&self) -> Option<u32> {
        let mut legacy = None;
        for feature in &self.features {
            match feature {
                WalletFeature::Detailed { name, max_messages } if name == "SendTransaction" => {
                    return Some(max_messages.unwrap_or(LEGACY_SEND_TRANSACTION_MAX_MESSAGES));
                }
                WalletFeature::Named(name) if name == "SendTransaction" => {
                    legacy = Some(LEGACY_SEND_TRANSACTION_MAX_MESSAGES);
                }
                _ => {}
            }
        }
        legacy
    }
}

/// Everything the bridge reports about a freshly connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub device: DeviceInfo,
    pub account: Account,
    #[serde(default)]
    pub ton_proof: Option<TonProof>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(features: serde_json::Value) -> DeviceInfo {
        serde_json::from_value(serde_json::json!({
            "platform": "iphone",
            "appName": "tonkeeper",
            "appVersion": "4.0.0",
            "maxProtocolVersion": 2,
            "features": features,
        }))
        .unwrap()
    }

    #[test]
    fn detailed_feature_wins() {
        let d = device(serde_json::json!([
            "SendTransaction",
            { "name": "SendTransaction", "maxMessages": 255 }
        ]));
        assert_eq!(d.max_messages(), Some(255));
    }

    #[test]
    fn legacy_feature_implies_four() {
        let d = device(serde_json::json!(["SendTransaction"]));
        assert_eq!(d.max_messages(), Some(4));
    }

    #[test]
    fn missing_feature() {
        let d = device(serde_json::json!([{ "name": "SignData" }]));
        assert_eq!(d.max_messages(), None);
    }

    #[test]
    fn chain_wire_values() {
        assert_eq!(serde_json::to_string(&Chain::Mainnet).unwrap(), "\"-239\"");
        let c: Chain = serde_json::from_str("\"-3\"").unwrap();
        assert_eq!(c, Chain::Testnet);
    }

    #[test]
    fn open_url_prefers_universal() {
        let app = WalletApp {
            app_name: "w".into(),
            name: "W".into(),
            image: String::new(),
            bridge_url: "https://bridge".into(),
            universal_url: None,
            deep_link: Some("w://".into()),
            about_url: Some("https://w.app".into()),
            platforms: vec![],
        };
        assert_eq!(app.open_url(), Some("w://"));
    }
}
