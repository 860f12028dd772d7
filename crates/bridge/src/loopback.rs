//! In-process [`SecureChannel`] whose outcomes are driven by the host.
//!
//! Nothing leaves the process: `open_connection` records the request and
//! hands back a universal link, and the host later decides what the
//! "wallet" does (`approve_connection`, `reject_connection`, `sign`, ...).
//! Used by the demo CLI and by the flow tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use wl_domain::error::{Error, Result};
use wl_domain::transaction::{Transaction, TransactionResult};
use wl_domain::wallet::{Account, Chain, DeviceInfo, WalletApp, WalletFeature, WalletInfo};
use wl_domain::UserId;

use crate::channel::{
    receiver_stream, ConnectRequest, ConnectionEvent, EventStream, SecureChannel, TransactionEvent,
};
use crate::proof;

struct PendingConnection {
    id: u64,
    app: WalletApp,
    request: ConnectRequest,
    senders: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

struct PendingTransaction {
    tx: Transaction,
    senders: Vec<mpsc::UnboundedSender<TransactionEvent>>,
}

/// Superseded connection requests kept per user, the live one included.
const KEPT_CONNECTIONS: usize = 8;

#[derive(Default)]
struct UserSlot {
    connected: Option<WalletInfo>,
    /// Connection persisted across a restart, picked up by `restore`.
    saved: Option<WalletInfo>,
    /// Recent connection requests, oldest first.  Superseded requests stay
    /// (up to [`KEPT_CONNECTIONS`]) so the host can still answer them.
    connections: Vec<PendingConnection>,
    transactions: HashMap<u64, PendingTransaction>,
}

impl UserSlot {
    fn current_connection_id(&self) -> Option<u64> {
        self.connections.last().map(|c| c.id)
    }
}

pub struct LoopbackChannel {
    default_universal_url: String,
    return_strategy: String,
    users: Mutex<HashMap<UserId, UserSlot>>,
    next_id: AtomicU64,
    calls: AtomicU64,
}

impl LoopbackChannel {
    pub fn new(default_universal_url: impl Into<String>) -> Self {
        Self {
            default_universal_url: default_universal_url.into(),
            return_strategy: "none".into(),
            users: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            calls: AtomicU64::new(0),
        }
    }

    /// Value of the `ret` link parameter: `back`, `none` or a URL the
    /// wallet opens after the user answers.
    pub fn with_return_strategy(mut self, ret: impl Into<String>) -> Self {
        self.return_strategy = ret.into();
        self
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of channel operations performed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    // ── Host-side controls ──────────────────────────────────────────

    /// Ids of all connection requests opened for the user, oldest first.
    pub fn connection_request_ids(&self, user_id: UserId) -> Vec<u64> {
        self.users
            .lock()
            .get(&user_id)
            .map(|s| s.connections.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    /// The app and request behind a connection id.
    pub fn connection_request(&self, user_id: UserId, request_id: u64) -> Option<(WalletApp, ConnectRequest)> {
        let users = self.users.lock();
        let slot = users.get(&user_id)?;
        slot.connections
            .iter()
            .find(|c| c.id == request_id)
            .map(|c| (c.app.clone(), c.request.clone()))
    }

    /// Ids of transaction requests still awaiting an answer.
    pub fn pending_transaction_ids(&self, user_id: UserId) -> Vec<u64> {
        let users = self.users.lock();
        let mut ids: Vec<u64> = users
            .get(&user_id)
            .map(|s| s.transactions.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn pending_transaction(&self, user_id: UserId, request_id: u64) -> Option<Transaction> {
        let users = self.users.lock();
        users.get(&user_id)?.transactions.get(&request_id).map(|p| p.tx.clone())
    }

    /// Answer a connection request as the wallet.  The connection only
    /// takes effect if `request_id` is the user's latest request; the
    /// event is delivered to subscribers of that request either way.
    /// Returns whether any subscriber received it.
    pub fn approve_connection(&self, user_id: UserId, request_id: u64, info: WalletInfo) -> bool {
        let mut users = self.users.lock();
        let slot = users.entry(user_id).or_default();
        if slot.current_connection_id() == Some(request_id) {
            slot.connected = Some(info.clone());
        }
        deliver_connection(slot, request_id, ConnectionEvent::Connected(info))
    }

    pub fn reject_connection(&self, user_id: UserId, request_id: u64) -> bool {
        let mut users = self.users.lock();
        let slot = users.entry(user_id).or_default();
        deliver_connection(slot, request_id, ConnectionEvent::Rejected)
    }

    pub fn sign(&self, user_id: UserId, request_id: u64, result: TransactionResult) -> bool {
        self.finish_transaction(user_id, request_id, TransactionEvent::Signed(result))
    }

    pub fn reject_transaction(&self, user_id: UserId, request_id: u64) -> bool {
        self.finish_transaction(user_id, request_id, TransactionEvent::Rejected)
    }

    /// Report a bridge-side timeout for a transaction request.
    pub fn expire_transaction(&self, user_id: UserId, request_id: u64) -> bool {
        self.finish_transaction(user_id, request_id, TransactionEvent::Timeout)
    }

    fn finish_transaction(&self, user_id: UserId, request_id: u64, event: TransactionEvent) -> bool {
        let mut users = self.users.lock();
        let Some(pending) = users
            .get_mut(&user_id)
            .and_then(|s| s.transactions.remove(&request_id))
        else {
            return false;
        };
        let mut delivered = false;
        for sender in pending.senders {
            delivered |= sender.send(event.clone()).is_ok();
        }
        delivered
    }

    /// Mark a wallet as connected without going through a request.
    pub fn set_connected(&self, user_id: UserId, info: Option<WalletInfo>) {
        self.users.lock().entry(user_id).or_default().connected = info;
    }

    /// Drop every live connection the way a process restart would.  The
    /// wallets stay saved and come back through `restore`.
    pub fn restart(&self) {
        for slot in self.users.lock().values_mut() {
            if let Some(info) = slot.connected.take() {
                slot.saved = Some(info);
            }
        }
    }
}

fn deliver_connection(slot: &mut UserSlot, request_id: u64, event: ConnectionEvent) -> bool {
    let Some(conn) = slot.connections.iter_mut().find(|c| c.id == request_id) else {
        return false;
    };
    let mut delivered = false;
    for sender in conn.senders.drain(..) {
        delivered |= sender.send(event.clone()).is_ok();
    }
    delivered
}

fn client_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait::async_trait]
impl SecureChannel for LoopbackChannel {
    async fn restore(&self, user_id: UserId) -> Result<bool> {
        self.touch();
        let mut users = self.users.lock();
        let Some(slot) = users.get_mut(&user_id) else {
            return Ok(false);
        };
        if slot.connected.is_none() {
            slot.connected = slot.saved.take();
        }
        Ok(slot.connected.is_some())
    }

    async fn connected_wallet(&self, user_id: UserId) -> Result<Option<WalletInfo>> {
        self.touch();
        Ok(self.users.lock().get(&user_id).and_then(|s| s.connected.clone()))
    }

    async fn open_connection(
        &self,
        user_id: UserId,
        app: &WalletApp,
        request: &ConnectRequest,
    ) -> Result<String> {
        self.touch();
        let base = app
            .universal_url
            .as_deref()
            .unwrap_or(&self.default_universal_url);
        let wire = serde_json::to_string(&request.to_wire())?;
        let url = reqwest::Url::parse_with_params(
            base,
            &[
                ("v", "2"),
                ("id", client_id().as_str()),
                ("r", wire.as_str()),
                ("ret", self.return_strategy.as_str()),
            ],
        )
        .map_err(|e| Error::Channel(format!("bad universal url '{base}': {e}")))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut users = self.users.lock();
        let slot = users.entry(user_id).or_default();
        slot.connections.push(PendingConnection {
            id,
            app: app.clone(),
            request: request.clone(),
            senders: Vec::new(),
        });
        let excess = slot.connections.len().saturating_sub(KEPT_CONNECTIONS);
        slot.connections.drain(..excess);
        tracing::debug!(user_id, request_id = id, wallet = %app.app_name, "loopback: connection opened");
        Ok(url.to_string())
    }

    async fn connection_events(&self, user_id: UserId) -> Result<EventStream<ConnectionEvent>> {
        self.touch();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut users = self.users.lock();
        let slot = users.entry(user_id).or_default();
        match slot.connections.last_mut() {
            Some(conn) => conn.senders.push(tx),
            None => return Err(Error::Channel("no connection request to listen on".into())),
        }
        Ok(receiver_stream(rx))
    }

    async fn cancel_connection(&self, user_id: UserId) -> Result<()> {
        self.touch();
        if let Some(slot) = self.users.lock().get_mut(&user_id) {
            if let Some(conn) = slot.connections.last_mut() {
                conn.senders.clear();
            }
        }
        Ok(())
    }

    async fn submit_transaction(&self, user_id: UserId, tx: &Transaction) -> Result<u64> {
        self.touch();
        let mut users = self.users.lock();
        let slot = users.entry(user_id).or_default();
        if slot.connected.is_none() {
            return Err(Error::WalletNotConnected);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        slot.transactions.insert(
            id,
            PendingTransaction {
                tx: tx.clone(),
                senders: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn transaction_events(
        &self,
        user_id: UserId,
        request_id: u64,
    ) -> Result<EventStream<TransactionEvent>> {
        self.touch();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut users = self.users.lock();
        let pending = users
            .get_mut(&user_id)
            .and_then(|s| s.transactions.get_mut(&request_id))
            .ok_or_else(|| Error::Channel(format!("unknown transaction request {request_id}")))?;
        pending.senders.push(tx);
        Ok(receiver_stream(rx))
    }

    async fn cancel_pending(&self, user_id: UserId, request_id: u64) -> Result<()> {
        self.touch();
        if let Some(slot) = self.users.lock().get_mut(&user_id) {
            slot.transactions.remove(&request_id);
        }
        Ok(())
    }

    async fn disconnect(&self, user_id: UserId) -> Result<()> {
        self.touch();
        let mut users = self.users.lock();
        let Some(slot) = users.get_mut(&user_id) else {
            return Err(Error::WalletNotConnected);
        };
        slot.saved = None;
        match slot.connected.take() {
            Some(_) => Ok(()),
            None => Err(Error::WalletNotConnected),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Simulated wallet
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A wallet with a real ed25519 key that answers connect requests with a
/// correctly signed `ton_proof`.
#[derive(Clone)]
pub struct SimulatedWallet {
    key: SigningKey,
    app_name: String,
    max_messages: u32,
}

impl SimulatedWallet {
    pub fn new(app_name: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
            app_name: app_name.into(),
            max_messages: 4,
        }
    }

    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Raw `0:<hex>` address derived from the public key.
    pub fn address(&self) -> String {
        format!("0:{}", hex::encode(Sha256::digest(self.key.verifying_key().as_bytes())))
    }

    /// Wallet info for `request`, signing its proof challenge (if any)
    /// for `domain` at `timestamp`.
    pub fn answer(&self, request: &ConnectRequest, domain: &str, timestamp: u64) -> Result<WalletInfo> {
        let address = self.address();
        let ton_proof = match request.proof_payload.as_deref() {
            Some(payload) => Some(proof::sign(&self.key, &address, domain, timestamp, payload)?),
            None => None,
        };
        Ok(WalletInfo {
            device: DeviceInfo {
                platform: "linux".into(),
                app_name: self.app_name.clone(),
                app_version: "1.0.0".into(),
                max_protocol_version: 2,
                features: vec![WalletFeature::Detailed {
                    name: "SendTransaction".into(),
                    max_messages: Some(self.max_messages),
                }],
            },
            account: Account {
                address,
                chain: Chain::Testnet,
                wallet_state_init: None,
                public_key: Some(hex::encode(self.key.verifying_key().as_bytes())),
            },
            ton_proof,
        })
    }
}
