use crate::state::FlowKind;

/// Shared error type used across all WalletLink crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("store: {0}")]
    Store(String),

    #[error("channel: {0}")]
    Channel(String),

    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("no wallets available from the directory or its fallbacks")]
    NoWalletsAvailable,

    #[error("wallet directory: {0}")]
    Directory(String),

    #[error("no previous {flow} attempt to retry")]
    RetryWithoutPriorAttempt { flow: FlowKind },

    #[error("transaction has {requested} messages, wallet supports at most {max}")]
    UnsupportedTransaction { requested: usize, max: u32 },

    #[error("language code '{0}' is not supported by the text or button tables")]
    UnsupportedLanguage(String),

    #[error("unknown continuation: {0}")]
    UnknownContinuation(String),

    #[error("chat surface: {0}")]
    Surface(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
