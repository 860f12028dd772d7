//! Button presses on flow prompts.
//!
//! Prompts carry callback data (`back`, `retry`, `app_wallet:<app_name>`);
//! [`FlowManager::handle_action`] routes a parsed press according to the
//! user's current state.  Presses that make no sense in that state are
//! ignored.

use wl_domain::error::Result;
use wl_domain::state::{FlowKind, FlowState};
use wl_domain::UserId;

use crate::continuations::FlowContext;
use crate::manager::{FlowManager, WaitHandle};

pub const BACK: &str = "back";
pub const RETRY: &str = "retry";
pub const SELECT_WALLET_PREFIX: &str = "app_wallet:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    SelectWallet(String),
    Back,
    Retry,
}

impl FlowAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            BACK => Some(Self::Back),
            RETRY => Some(Self::Retry),
            _ => data
                .strip_prefix(SELECT_WALLET_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| Self::SelectWallet(name.to_string())),
        }
    }
}

/// What a press led to.
#[derive(Debug)]
pub enum ActionOutcome {
    /// Not applicable in the current state.
    Ignored,
    /// A flow was (re)opened; the handle resolves when its wait ends.
    Reopened(WaitHandle),
    /// The flow was abandoned and the `before` continuation ran.
    WentBack,
}

impl FlowManager {
    pub async fn handle_action(&self, user_id: UserId, action: FlowAction) -> Result<ActionOutcome> {
        let state = self.state(user_id).await?;
        let inner = &self.inner;

        match (state, action) {
            (FlowState::AwaitingConnection, FlowAction::SelectWallet(app_name)) => {
                inner.tasks.cancel(user_id);
                let wallets = inner.wallets.list_wallets().await?;
                let chosen = wallets
                    .iter()
                    .find(|w| w.app_name == app_name)
                    .or_else(|| wallets.first())
                    .cloned();
                inner
                    .sessions
                    .update(user_id, |s| s.selected_wallet = chosen)
                    .await?;
                Ok(ActionOutcome::Reopened(self.retry_connect_wallet(user_id).await?))
            }
            (FlowState::AwaitingConnection, FlowAction::Back) => {
                inner.tasks.cancel(user_id);
                inner.channel.cancel_connection(user_id).await?;
                self.go_back(user_id, FlowKind::Connect).await
            }
            (
                FlowState::ProofMismatch | FlowState::ConnectionTimeout | FlowState::ConnectionRejected,
                FlowAction::Retry,
            ) => Ok(ActionOutcome::Reopened(self.retry_connect_wallet(user_id).await?)),
            (
                FlowState::ProofMismatch | FlowState::ConnectionTimeout | FlowState::ConnectionRejected,
                FlowAction::Back,
            ) => self.go_back(user_id, FlowKind::Connect).await,
            (FlowState::AwaitingTransaction, FlowAction::Back) => {
                inner.tasks.cancel(user_id);
                if let Some(id) = inner.sessions.get(user_id).await?.last_request_id {
                    inner.channel.cancel_pending(user_id, id).await?;
                }
                self.go_back(user_id, FlowKind::Transaction).await
            }
            (FlowState::TransactionTimeout | FlowState::TransactionRejected, FlowAction::Retry) => {
                Ok(ActionOutcome::Reopened(
                    self.retry_last_send_transaction(user_id).await?,
                ))
            }
            (FlowState::TransactionTimeout | FlowState::TransactionRejected, FlowAction::Back) => {
                self.go_back(user_id, FlowKind::Transaction).await
            }
            (state, action) => {
                tracing::debug!(user_id, %state, ?action, "action ignored");
                Ok(ActionOutcome::Ignored)
            }
        }
    }

    async fn go_back(&self, user_id: UserId, kind: FlowKind) -> Result<ActionOutcome> {
        let session = self.transition(user_id, FlowState::Idle, |_| {}).await?;
        let ctx = FlowContext {
            user_id,
            wallet: session.connected_wallet,
            transaction: None,
        };
        if self.run_continuation(user_id, kind, false, ctx).await? {
            Ok(ActionOutcome::WentBack)
        } else {
            Ok(ActionOutcome::Ignored)
        }
    }
}
