//! QR renderings of the connect link.

use base64::Engine;
use qrcode::{Color, QrCode};

use wl_domain::config::{QrMode, UiConfig};
use wl_domain::error::{Error, Result};

/// How a QR code ends up in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrImage {
    /// Image served by an external renderer; attached as a link preview.
    Url(String),
    /// Text drawing, for terminals and plain-text surfaces.
    Text(String),
}

pub trait QrRenderer: Send + Sync {
    fn render(&self, universal_url: &str, wallet_image: &str) -> Result<QrImage>;
}

pub fn from_config(ui: &UiConfig) -> Box<dyn QrRenderer> {
    match ui.qr {
        QrMode::Url => Box::new(QrServiceUrl::new(ui.qr_base_url.clone())),
        QrMode::Unicode => Box::new(UnicodeQr),
    }
}

/// Builds a link to a QR rendering service that overlays the wallet logo.
pub struct QrServiceUrl {
    base_url: String,
}

impl QrServiceUrl {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl QrRenderer for QrServiceUrl {
    fn render(&self, universal_url: &str, wallet_image: &str) -> Result<QrImage> {
        let engine = base64::engine::general_purpose::STANDARD;
        let base = format!("{}/create", self.base_url.trim_end_matches('/'));
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("box_size", "20".to_string()),
                ("border", "7".to_string()),
                ("image_padding", "20".to_string()),
                ("data", engine.encode(universal_url)),
                ("image_url", engine.encode(wallet_image)),
            ],
        )
        .map_err(|e| Error::Config(format!("qr base url {base}: {e}")))?;
        Ok(QrImage::Url(url.into()))
    }
}

/// Half-block drawing: each character cell covers two module rows.
pub struct UnicodeQr;

impl QrRenderer for UnicodeQr {
    fn render(&self, universal_url: &str, _wallet_image: &str) -> Result<QrImage> {
        let code = QrCode::new(universal_url.as_bytes())
            .map_err(|e| Error::Other(format!("qr encode: {e}")))?;
        let modules = code.to_colors();
        let width = code.width();

        let mut out = String::new();
        let mut y = 0;
        while y < width {
            out.push_str("  ");
            for x in 0..width {
                let top = modules[y * width + x];
                let bottom = if y + 1 < width {
                    modules[(y + 1) * width + x]
                } else {
                    Color::Light
                };
                out.push(match (top, bottom) {
                    (Color::Dark, Color::Dark) => '█',
                    (Color::Dark, Color::Light) => '▀',
                    (Color::Light, Color::Dark) => '▄',
                    (Color::Light, Color::Light) => ' ',
                });
            }
            out.push('\n');
            y += 2;
        }
        Ok(QrImage::Text(out))
    }
}
