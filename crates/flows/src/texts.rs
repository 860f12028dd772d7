//! Localized message and button tables.

use std::collections::HashMap;

const FALLBACK_LANGUAGE: &str = "en";
const GET_A_WALLET_LINK: &str =
    "https://ton.org/wallets?filters[wallet_features][slug][$in]=dapp-auth&pagination[limit]=-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    Loader,
    /// Placeholder for a message that could not be deleted.
    Outdated,
    ConnectWallet,
    ProofWrong,
    ConnectTimeout,
    ConnectRejected,
    SendTransaction,
    TransactionTimeout,
    TransactionRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKey {
    Back,
    Retry,
    ConnectWallet,
    OpenWallet,
}

type Table<K> = HashMap<String, HashMap<K, String>>;

#[derive(Debug, Clone)]
pub struct Texts {
    messages: Table<TextKey>,
    buttons: Table<ButtonKey>,
}

impl Default for Texts {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Texts {
    /// English and Russian tables.
    pub fn builtin() -> Self {
        let mut texts = Self {
            messages: HashMap::new(),
            buttons: HashMap::new(),
        };

        let connect_en = format!(
            "<a href='{GET_A_WALLET_LINK}'>Get a Wallet</a>\n\n<b>Connect your {{wallet_name}}!</b>\n\nScan with your mobile app wallet:"
        );
        for (key, value) in [
            (TextKey::Loader, "⏳".to_string()),
            (TextKey::Outdated, "...".to_string()),
            (TextKey::ConnectWallet, connect_en),
            (
                TextKey::ProofWrong,
                "<b>Warning</b>\n\nThe wallet signature is wrong or the connection timeout has expired.".into(),
            ),
            (TextKey::ConnectTimeout, "<b>Warning</b>\n\nThe connection timeout has expired.".into()),
            (TextKey::ConnectRejected, "<b>Warning</b>\n\nYou rejected the connection!".into()),
            (
                TextKey::SendTransaction,
                "<b>Transaction</b>\n\nGo to the {wallet_name} app and confirm the transaction.".into(),
            ),
            (TextKey::TransactionTimeout, "<b>Warning</b>\n\nThe transaction timeout has expired.".into()),
            (TextKey::TransactionRejected, "<b>Warning</b>\n\nYou rejected the transaction!".into()),
        ] {
            texts.set_text("en", key, value);
        }

        let connect_ru = format!(
            "<a href='{GET_A_WALLET_LINK}'>Установить кошелек</a>\n\n<b>Подключите свой {{wallet_name}}!</b>\n\nОтсканируйте с помощью мобильного кошелька:"
        );
        for (key, value) in [
            (TextKey::Loader, "⏳".to_string()),
            (TextKey::Outdated, "...".to_string()),
            (TextKey::ConnectWallet, connect_ru),
            (
                TextKey::ProofWrong,
                "<b>Предупреждение</b>\n\nПодпись кошелька поддельна или истекло время ожидания подключения.".into(),
            ),
            (TextKey::ConnectTimeout, "<b>Предупреждение</b>\n\nВремя ожидания подключения истекло.".into()),
            (TextKey::ConnectRejected, "<b>Предупреждение</b>\n\nВы отменили подключение!".into()),
            (
                TextKey::SendTransaction,
                "<b>Транзакция</b>\n\nПерейдите в приложение {wallet_name} и подтвердите транзакцию.".into(),
            ),
            (
                TextKey::TransactionTimeout,
                "<b>Предупреждение</b>\n\nВремя ожидания подтверждения транзакции истекло.".into(),
            ),
            (TextKey::TransactionRejected, "<b>Предупреждение</b>\n\nВы отменили транзакцию!".into()),
        ] {
            texts.set_text("ru", key, value);
        }

        for (lang, back, retry, connect, open) in [
            ("en", "‹ Back", "↻ Retry", "Connect {wallet_name}", "Go to {wallet_name}"),
            ("ru", "‹ Назад", "↻ Повторить", "Подключить {wallet_name}", "Перейти в {wallet_name}"),
        ] {
            texts.set_button(lang, ButtonKey::Back, back);
            texts.set_button(lang, ButtonKey::Retry, retry);
            texts.set_button(lang, ButtonKey::ConnectWallet, connect);
            texts.set_button(lang, ButtonKey::OpenWallet, open);
        }
        texts
    }

    pub fn set_text(&mut self, lang: &str, key: TextKey, value: impl Into<String>) {
        self.messages
            .entry(lang.to_string())
            .or_default()
            .insert(key, value.into());
    }

    pub fn set_button(&mut self, lang: &str, key: ButtonKey, value: impl Into<String>) {
        self.buttons
            .entry(lang.to_string())
            .or_default()
            .insert(key, value.into());
    }

    /// A language is usable only if both tables carry it.
    pub fn supports(&self, lang: &str) -> bool {
        self.messages.contains_key(lang) && self.buttons.contains_key(lang)
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self
            .messages
            .keys()
            .filter(|l| self.buttons.contains_key(*l))
            .map(String::as_str)
            .collect();
        langs.sort_unstable();
        langs
    }

    fn lookup<'a, K: Copy + Eq + std::hash::Hash>(table: &'a Table<K>, lang: &str, key: K) -> &'a str {
        table
            .get(lang)
            .and_then(|t| t.get(&key))
            .or_else(|| table.get(FALLBACK_LANGUAGE).and_then(|t| t.get(&key)))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn text(&self, lang: &str, key: TextKey) -> &str {
        Self::lookup(&self.messages, lang, key)
    }

    pub fn button(&self, lang: &str, key: ButtonKey) -> &str {
        Self::lookup(&self.buttons, lang, key)
    }
}

/// Substitute `{wallet_name}` in a table entry.
pub fn with_wallet_name(template: &str, wallet_name: &str) -> String {
    template.replace("{wallet_name}", wallet_name)
}
