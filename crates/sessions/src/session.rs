//! Per-user session record.
//!
//! One JSON object per user under `session:<user_id>`.  Reads of a user
//! with no record return `Session::default()`; records that fail to
//! deserialize are logged and treated the same way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wl_domain::error::Result;
use wl_domain::state::FlowState;
use wl_domain::transaction::{Transaction, TransactionResult};
use wl_domain::wallet::{WalletApp, WalletInfo};
use wl_domain::UserId;

use crate::kv::KvStore;

const COLLECTION: &str = "session";

/// Everything the flow manager remembers about one user between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub state: FlowState,
    /// Wallet app picked on the connect prompt.
    #[serde(default)]
    pub selected_wallet: Option<WalletApp>,
    /// Whether the last connect attempt asked for a `ton_proof`.
    #[serde(default)]
    pub check_proof: bool,
    /// Hex challenge awaiting verification.  Cleared once checked.
    #[serde(default)]
    pub proof_challenge: Option<String>,
    #[serde(default)]
    pub last_message_id: Option<i64>,
    /// Last submitted transaction, kept for "retry".
    #[serde(default)]
    pub pending_transaction: Option<Transaction>,
    #[serde(default)]
    pub last_request_id: Option<u64>,
    #[serde(default)]
    pub last_transaction: Option<TransactionResult>,
    #[serde(default)]
    pub connected_wallet: Option<WalletInfo>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Forget everything tied to the current wallet connection.
    pub fn clear_connection(&mut self) {
        self.connected_wallet = None;
        self.proof_challenge = None;
        self.pending_transaction = None;
        self.last_request_id = None;
    }
}

/// Typed access to [`Session`] records over any [`KvStore`].
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(user_id: UserId) -> String {
        format!("{COLLECTION}:{user_id}")
    }

    /// Load the session for a user, or a default one if none exists.
    pub async fn get(&self, user_id: UserId) -> Result<Session> {
        let Some(raw) = self.kv.get_item(&Self::key(user_id)).await? else {
            return Ok(Session::default());
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "unreadable session record, using defaults");
                Ok(Session::default())
            }
        }
    }

    /// Overwrite the session for a user.
    pub async fn put(&self, user_id: UserId, session: &Session) -> Result<()> {
        let mut session = session.clone();
        session.updated_at = Some(Utc::now());
        let json = serde_json::to_string(&session)?;
        self.kv.set_item(&Self::key(user_id), json).await
    }

    /// Read-modify-write a session.  Returns the stored value.
    pub async fn update<F>(&self, user_id: UserId, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.get(user_id).await?;
        f(&mut session);
        self.put(user_id, &session).await?;
        Ok(session)
    }

    pub async fn state(&self, user_id: UserId) -> Result<FlowState> {
        Ok(self.get(user_id).await?.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use wl_domain::transaction::TransactionMessage;

    fn store() -> (SessionStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (SessionStore::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn missing_user_gets_default() {
        let (sessions, _) = store();
        let s = sessions.get(7).await.unwrap();
        assert_eq!(s.state, FlowState::Idle);
        assert!(s.pending_transaction.is_none());
    }

    #[tokio::test]
    async fn update_persists() {
        let (sessions, kv) = store();
        sessions
            .update(7, |s| {
                s.state = FlowState::AwaitingConnection;
                s.last_message_id = Some(99);
            })
            .await
            .unwrap();
        let s = sessions.get(7).await.unwrap();
        assert_eq!(s.state, FlowState::AwaitingConnection);
        assert_eq!(s.last_message_id, Some(99));
        assert!(s.updated_at.is_some());
        assert!(kv.get_item("session:7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn users_do_not_interfere() {
        let (sessions, _) = store();
        sessions
            .update(1, |s| s.state = FlowState::AwaitingTransaction)
            .await
            .unwrap();
        sessions
            .update(2, |s| s.state = FlowState::ConnectionTimeout)
            .await
            .unwrap();
        assert_eq!(sessions.state(1).await.unwrap(), FlowState::AwaitingTransaction);
        assert_eq!(sessions.state(2).await.unwrap(), FlowState::ConnectionTimeout);
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_default() {
        let (sessions, kv) = store();
        kv.set_item("session:5", "{broken".into()).await.unwrap();
        assert_eq!(sessions.get(5).await.unwrap().state, FlowState::Idle);
    }

    #[test]
    fn clear_connection_keeps_history() {
        let mut s = Session {
            proof_challenge: Some("ab".into()),
            pending_transaction: Some(Transaction::new(vec![TransactionMessage {
                address: "0:00".into(),
                amount: "1".into(),
                payload: None,
                state_init: None,
            }])),
            last_transaction: Some(TransactionResult {
                boc: "te6".into(),
                hash: None,
            }),
            language_code: Some("ru".into()),
            ..Default::default()
        };
        s.clear_connection();
        assert!(s.proof_challenge.is_none());
        assert!(s.pending_transaction.is_none());
        assert!(s.last_transaction.is_some());
        assert_eq!(s.language_code.as_deref(), Some("ru"));
    }
}
