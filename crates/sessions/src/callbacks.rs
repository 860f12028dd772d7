//! Continuation storage.
//!
//! A flow remembers *which* continuations to resume with, not the
//! continuations themselves: each pair is a couple of tags that the flow
//! runtime resolves against its in-process handler table.  Tags stay
//! meaningful across restarts as long as the process registers the same
//! handlers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use wl_domain::error::Result;
use wl_domain::state::FlowKind;
use wl_domain::UserId;

use crate::kv::KvStore;

/// `before` runs when the user backs out of a flow, `after` when it
/// completes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPair {
    pub before: String,
    pub after: String,
}

impl CallbackPair {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Per-user, per-flow slot holding the most recent [`CallbackPair`].
#[derive(Clone)]
pub struct CallbackStore {
    kv: Arc<dyn KvStore>,
}

impl CallbackStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(user_id: UserId, kind: FlowKind) -> String {
        let collection = match kind {
            FlowKind::Connect => "ConnectWalletCallbacks",
            FlowKind::Transaction => "SendTransactionCallbacks",
        };
        format!("{collection}:{user_id}")
    }

    pub async fn get(&self, user_id: UserId, kind: FlowKind) -> Result<Option<CallbackPair>> {
        let Some(raw) = self.kv.get_item(&Self::key(user_id, kind)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(pair) => Ok(Some(pair)),
            Err(e) => {
                tracing::warn!(user_id, flow = %kind, error = %e, "unreadable callback pair");
                Ok(None)
            }
        }
    }

    /// Store a pair, replacing whatever the slot held before.
    pub async fn set(&self, user_id: UserId, kind: FlowKind, pair: &CallbackPair) -> Result<()> {
        let json = serde_json::to_string(pair)?;
        self.kv.set_item(&Self::key(user_id, kind), json).await
    }

    pub async fn remove(&self, user_id: UserId, kind: FlowKind) -> Result<()> {
        self.kv.remove_item(&Self::key(user_id, kind)).await
    }
}
