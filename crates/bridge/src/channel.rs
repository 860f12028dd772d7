use std::pin::Pin;

use serde::{Deserialize, Serialize};

use wl_domain::error::Result;
use wl_domain::transaction::{Transaction, TransactionResult};
use wl_domain::wallet::{WalletApp, WalletInfo};
use wl_domain::UserId;

/// A boxed event stream handed out by a [`SecureChannel`].
pub type EventStream<T> = Pin<Box<dyn futures_util::Stream<Item = T> + Send + 'static>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the bot asks the wallet for when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub manifest_url: String,
    /// Challenge the wallet must sign into a `ton_proof` item.  `None`
    /// requests the address only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_payload: Option<String>,
}

impl ConnectRequest {
    /// Protocol form of the request (`{"manifestUrl", "items": [...]}`).
    pub fn to_wire(&self) -> serde_json::Value {
        let mut items = vec![serde_json::json!({ "name": "ton_addr" })];
        if let Some(ref payload) = self.proof_payload {
            items.push(serde_json::json!({ "name": "ton_proof", "payload": payload }));
        }
        serde_json::json!({ "manifestUrl": self.manifest_url, "items": items })
    }
}

/// Terminal outcome of a connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(WalletInfo),
    Rejected,
}

/// Terminal outcome of a `sendTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    Signed(TransactionResult),
    Rejected,
    /// The bridge gave up on the request before the wallet answered.
    Timeout,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-user encrypted relay between the bot and a wallet app.
///
/// One implementation per transport, picked at construction time.  Event
/// streams end (yield `None`) when the underlying request is cancelled or
/// superseded; callers treat an ended stream like a timeout.
#[async_trait::async_trait]
pub trait SecureChannel: Send + Sync {
    /// Re-establish a previously persisted connection.  Returns whether a
    /// wallet is connected afterwards.
    async fn restore(&self, user_id: UserId) -> Result<bool>;

    /// Wallet currently connected for the user, if any.
    async fn connected_wallet(&self, user_id: UserId) -> Result<Option<WalletInfo>>;

    /// Start a connection request to `app` and return the universal link
    /// the user has to open (directly or via QR).
    async fn open_connection(
        &self,
        user_id: UserId,
        app: &WalletApp,
        request: &ConnectRequest,
    ) -> Result<String>;

    /// Subscribe to the outcome of the user's latest connection request.
    async fn connection_events(&self, user_id: UserId) -> Result<EventStream<ConnectionEvent>>;

    /// Abandon the user's pending connection request.
    async fn cancel_connection(&self, user_id: UserId) -> Result<()>;

    /// Submit a transaction to the connected wallet.  Returns the bridge
    /// request id.
    async fn submit_transaction(&self, user_id: UserId, tx: &Transaction) -> Result<u64>;

    /// Subscribe to the outcome of one submitted transaction.
    async fn transaction_events(
        &self,
        user_id: UserId,
        request_id: u64,
    ) -> Result<EventStream<TransactionEvent>>;

    /// Cancel a pending transaction request.  Unknown ids are ignored.
    async fn cancel_pending(&self, user_id: UserId, request_id: u64) -> Result<()>;

    /// Drop the wallet connection.  Fails with
    /// [`Error::WalletNotConnected`](wl_domain::error::Error::WalletNotConnected)
    /// if nothing is connected.
    async fn disconnect(&self, user_id: UserId) -> Result<()>;
}

/// Wrap an unbounded receiver as an [`EventStream`].
pub(crate) fn receiver_stream<T: Send + 'static>(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<T>,
) -> EventStream<T> {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };
    Box::pin(stream)
}
