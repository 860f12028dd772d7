use serde::{Deserialize, Serialize};

use crate::wallet::Chain;

/// One outgoing message of a `sendTransaction` request.
///
/// `payload` and `state_init` are opaque base64 BOCs built by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub address: String,
    /// Amount in nanotons, as a decimal string.
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_init: Option<String>,
}

/// A transaction request submitted to the connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unix timestamp after which the wallet must refuse to sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Chain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub messages: Vec<TransactionMessage>,
}

impl Transaction {
    pub fn new(messages: Vec<TransactionMessage>) -> Self {
        Self {
            valid_until: None,
            network: None,
            from: None,
            messages,
        }
    }

    /// Builder-style validity window.
    pub fn valid_until(mut self, unix_secs: i64) -> Self {
        self.valid_until = Some(unix_secs);
        self
    }
}

/// What the wallet returns after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Base64 BOC of the signed external message.
    pub boc: String,
    #[serde(default)]
    pub hash: Option<String>,
}
