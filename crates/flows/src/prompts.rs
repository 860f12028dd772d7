//! Prompt construction: text tables, QR renderings and keyboards.

use std::sync::Arc;

use wl_domain::error::Result;
use wl_domain::wallet::WalletApp;

use crate::actions::{BACK, RETRY, SELECT_WALLET_PREFIX};
use crate::qr::{QrImage, QrRenderer};
use crate::surface::{Button, Keyboard, Prompt};
use crate::texts::{with_wallet_name, ButtonKey, TextKey, Texts};

pub struct PromptBuilder {
    texts: Arc<Texts>,
    qr: Arc<dyn QrRenderer>,
    buttons_per_row: usize,
}

impl PromptBuilder {
    pub fn new(texts: Arc<Texts>, qr: Arc<dyn QrRenderer>, buttons_per_row: usize) -> Self {
        Self {
            texts,
            qr,
            buttons_per_row,
        }
    }

    pub fn texts(&self) -> &Texts {
        &self.texts
    }

    pub fn outdated_text(&self, lang: &str) -> &str {
        self.texts.text(lang, TextKey::Outdated)
    }

    pub fn loader(&self, lang: &str) -> Prompt {
        Prompt::plain(self.texts.text(lang, TextKey::Loader))
    }

    fn back(&self, lang: &str) -> Button {
        Button::callback(self.texts.button(lang, ButtonKey::Back), BACK)
    }

    fn retry_keyboard(&self, lang: &str) -> Keyboard {
        Keyboard::default().row(vec![
            self.back(lang),
            Button::callback(self.texts.button(lang, ButtonKey::Retry), RETRY),
        ])
    }

    fn retry_prompt(&self, lang: &str, key: TextKey) -> Prompt {
        Prompt {
            text: self.texts.text(lang, key).to_string(),
            keyboard: self.retry_keyboard(lang),
        }
    }

    /// QR code, "connect" link, one button per listed wallet (the selected
    /// one marked), and "back".
    pub fn connect_wallet(
        &self,
        lang: &str,
        wallets: &[WalletApp],
        selected: &WalletApp,
        universal_url: &str,
    ) -> Result<Prompt> {
        let body = with_wallet_name(self.texts.text(lang, TextKey::ConnectWallet), &selected.name);
        let text = match self.qr.render(universal_url, &selected.image)? {
            // Zero-width anchor so the chat client previews the QR image.
            QrImage::Url(url) => format!("<a href='{url}'>\u{200b}</a>{body}"),
            QrImage::Text(art) => format!("{body}\n\n{art}"),
        };

        let wallet_buttons = wallets
            .iter()
            .map(|w| {
                let label = if w.app_name == selected.app_name {
                    format!("• {} •", w.name)
                } else {
                    w.name.clone()
                };
                Button::callback(label, format!("{SELECT_WALLET_PREFIX}{}", w.app_name))
            })
            .collect();

        let connect = Button::url(
            with_wallet_name(self.texts.button(lang, ButtonKey::ConnectWallet), &selected.name),
            universal_url,
        );
        let keyboard = Keyboard::default()
            .row(vec![connect])
            .grid(wallet_buttons, self.buttons_per_row)
            .row(vec![self.back(lang)]);
        Ok(Prompt { text, keyboard })
    }

    pub fn proof_wrong(&self, lang: &str) -> Prompt {
        self.retry_prompt(lang, TextKey::ProofWrong)
    }

    pub fn connect_timeout(&self, lang: &str) -> Prompt {
        self.retry_prompt(lang, TextKey::ConnectTimeout)
    }

    pub fn connect_rejected(&self, lang: &str) -> Prompt {
        self.retry_prompt(lang, TextKey::ConnectRejected)
    }

    /// "Confirm in your wallet", with a link into the wallet app when one
    /// is known.
    pub fn send_transaction(&self, lang: &str, wallet_name: &str, open_url: Option<&str>) -> Prompt {
        let text = with_wallet_name(self.texts.text(lang, TextKey::SendTransaction), wallet_name);
        let mut keyboard = Keyboard::default();
        if let Some(url) = open_url {
            keyboard = keyboard.row(vec![Button::url(
                with_wallet_name(self.texts.button(lang, ButtonKey::OpenWallet), wallet_name),
                url,
            )]);
        }
        Prompt {
            text,
            keyboard: keyboard.row(vec![self.back(lang)]),
        }
    }

    pub fn transaction_timeout(&self, lang: &str) -> Prompt {
        self.retry_prompt(lang, TextKey::TransactionTimeout)
    }

    pub fn transaction_rejected(&self, lang: &str) -> Prompt {
        self.retry_prompt(lang, TextKey::TransactionRejected)
    }
}
