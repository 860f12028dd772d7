use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Language codes that ship with text and button tables.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ru"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrMode {
    /// Hidden link to a QR image service, rendered as a link preview.
    #[default]
    Url,
    /// Unicode block art embedded in the message (console surfaces).
    Unicode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "d_lang")]
    pub default_language: String,
    #[serde(default)]
    pub qr: QrMode,
    #[serde(default = "d_qr_base_url")]
    pub qr_base_url: String,
    /// Wallet buttons per keyboard row on the connect prompt.
    #[serde(default = "d_2")]
    pub wallet_buttons_per_row: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_language: d_lang(),
            qr: QrMode::Url,
            qr_base_url: d_qr_base_url(),
            wallet_buttons_per_row: 2,
        }
    }
}

fn d_lang() -> String {
    "en".into()
}
fn d_qr_base_url() -> String {
    "https://qrcode.ness.su".into()
}
fn d_2() -> usize {
    2
}
