//! Connect-wallet and send-transaction flows.
//!
//! The manager is the only writer of [`Session`] records.  Opening a flow
//! registers a new wait (cancelling the user's previous one), talks to the
//! secure channel, spawns the background wait, renders the prompt and
//! stores the new state.  The wait is held back by a gate until the prompt
//! and the session are written, so its outcome never lands before the
//! prompt it answers.  An opener that is superseded while it is still
//! awaiting stops before its next write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use wl_bridge::proof;
use wl_bridge::{ConnectRequest, SecureChannel, WalletList};
use wl_domain::config::Config;
use wl_domain::error::{Error, Result};
use wl_domain::state::{FlowKind, FlowState};
use wl_domain::trace::TraceEvent;
use wl_domain::transaction::Transaction;
use wl_domain::wallet::WalletApp;
use wl_domain::UserId;
use wl_sessions::{CallbackPair, CallbackStore, KvStore, Session, SessionStore};

use crate::continuations::{ContinuationTable, FlowContext};
use crate::prompts::PromptBuilder;
use crate::qr::QrRenderer;
use crate::surface::{ChatSurface, MessageId, Prompt, PromptRenderer};
use crate::tasks::TaskRegistry;
use crate::texts::Texts;
use crate::waits;

/// Handle to a spawned background wait.  Resolves once the wait reached a
/// terminal outcome or was cancelled.
pub type WaitHandle = JoinHandle<Result<()>>;

/// Handle returned by an opener that a newer opener overtook.
fn superseded(user_id: UserId, flow: FlowKind) -> WaitHandle {
    tracing::debug!(user_id, flow = %flow, "opener superseded");
    tokio::spawn(async { Ok(()) })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Settings & wiring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub manifest_url: String,
    pub connect_timeout: Duration,
    pub transaction_timeout: Duration,
    /// Validity window given to transactions without `valid_until`, and
    /// to every retried transaction.
    pub transaction_validity: Duration,
    pub proof_ttl: Duration,
    pub default_language: String,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            manifest_url: config.bridge.manifest_url.clone(),
            connect_timeout: config.flows.connect_timeout(),
            transaction_timeout: config.flows.transaction_timeout(),
            transaction_validity: Duration::from_secs(config.flows.transaction_validity_secs),
            proof_ttl: Duration::from_secs(config.flows.proof_ttl_secs),
            default_language: config.ui.default_language.clone(),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Collaborators a [`FlowManager`] is built from.
pub struct FlowParts {
    pub store: Arc<dyn KvStore>,
    pub channel: Arc<dyn SecureChannel>,
    pub wallets: Arc<dyn WalletList>,
    pub surface: Arc<dyn ChatSurface>,
    pub qr: Arc<dyn QrRenderer>,
    pub texts: Arc<Texts>,
    pub continuations: Arc<ContinuationTable>,
    pub tasks: Arc<TaskRegistry>,
    pub buttons_per_row: usize,
}

pub(crate) struct Inner {
    pub(crate) sessions: SessionStore,
    pub(crate) callbacks: CallbackStore,
    pub(crate) channel: Arc<dyn SecureChannel>,
    pub(crate) wallets: Arc<dyn WalletList>,
    pub(crate) tasks: Arc<TaskRegistry>,
    pub(crate) continuations: Arc<ContinuationTable>,
    pub(crate) renderer: PromptRenderer,
    pub(crate) prompts: PromptBuilder,
    pub(crate) settings: FlowSettings,
}

#[derive(Clone)]
pub struct FlowManager {
    pub(crate) inner: Arc<Inner>,
}

impl FlowManager {
    pub fn new(parts: FlowParts, settings: FlowSettings) -> Self {
        let inner = Inner {
            sessions: SessionStore::new(parts.store.clone()),
            callbacks: CallbackStore::new(parts.store),
            channel: parts.channel,
            wallets: parts.wallets,
            tasks: parts.tasks,
            continuations: parts.continuations,
            renderer: PromptRenderer::new(parts.surface),
            prompts: PromptBuilder::new(parts.texts, parts.qr, parts.buttons_per_row),
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.inner.tasks
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.inner.settings
    }

    pub async fn session(&self, user_id: UserId) -> Result<Session> {
        self.inner.sessions.get(user_id).await
    }

    pub async fn state(&self, user_id: UserId) -> Result<FlowState> {
        self.inner.sessions.state(user_id).await
    }

    pub(crate) fn language(&self, session: &Session) -> String {
        session
            .language_code
            .clone()
            .unwrap_or_else(|| self.inner.settings.default_language.clone())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Shared helpers
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Disconnect, ignoring "nothing connected".  A connection persisted
    /// by an earlier process is restored first so it is really dropped.
    pub(crate) async fn quiet_disconnect(&self, user_id: UserId) -> Result<()> {
        self.inner.channel.restore(user_id).await?;
        match self.inner.channel.disconnect(user_id).await {
            Ok(()) | Err(Error::WalletNotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Move the session to `to`, applying `f` in the same write.
    pub(crate) async fn transition<F>(&self, user_id: UserId, to: FlowState, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut from = FlowState::Idle;
        let session = self
            .inner
            .sessions
            .update(user_id, |s| {
                from = s.state;
                s.state = to;
                f(s);
            })
            .await?;
        if from != to {
            TraceEvent::FlowTransition { user_id, from, to }.emit();
        }
        Ok(session)
    }

    /// Render a prompt that replaces the user's live message and remember
    /// the message now holding it.
    pub(crate) async fn show<F>(&self, user_id: UserId, build: F) -> Result<()>
    where
        F: FnOnce(&PromptBuilder, &str) -> Prompt,
    {
        let session = self.inner.sessions.get(user_id).await?;
        let lang = self.language(&session);
        let prompt = build(&self.inner.prompts, &lang);
        let id = self
            .render(user_id, session.last_message_id, &lang, &prompt)
            .await?;
        self.inner
            .sessions
            .update(user_id, |s| s.last_message_id = Some(id))
            .await?;
        Ok(())
    }

    /// Put `prompt` on screen, replacing `previous`, without touching the
    /// session.
    async fn render(
        &self,
        user_id: UserId,
        previous: Option<MessageId>,
        lang: &str,
        prompt: &Prompt,
    ) -> Result<MessageId> {
        let outdated = self.inner.prompts.outdated_text(lang).to_string();
        self.inner
            .renderer
            .show(user_id, previous, prompt, &outdated)
            .await
    }

    /// Run the stored continuation of `kind` (`before` or `after`).
    pub(crate) async fn run_continuation(
        &self,
        user_id: UserId,
        kind: FlowKind,
        after: bool,
        ctx: FlowContext,
    ) -> Result<bool> {
        let Some(pair) = self.inner.callbacks.get(user_id, kind).await? else {
            tracing::warn!(user_id, flow = %kind, "no stored continuations");
            return Ok(false);
        };
        let tag = if after { &pair.after } else { &pair.before };
        self.inner.continuations.invoke(tag, ctx).await?;
        Ok(true)
    }

    fn pick_wallet(wallets: &[WalletApp], preferred: Option<&WalletApp>) -> Result<WalletApp> {
        preferred
            .and_then(|p| wallets.iter().find(|w| w.app_name == p.app_name))
            .or_else(|| wallets.first())
            .cloned()
            .ok_or(Error::NoWalletsAvailable)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Connect wallet
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Start a connect-wallet flow.
    ///
    /// With `check_proof`, the wallet must sign `proof_payload` (or a
    /// freshly generated challenge) and the connection only counts if the
    /// signature verifies.
    pub async fn open_connect_wallet(
        &self,
        user_id: UserId,
        callbacks: CallbackPair,
        check_proof: bool,
        proof_payload: Option<String>,
    ) -> Result<WaitHandle> {
        let inner = &self.inner;
        inner.continuations.ensure(&callbacks)?;
        let ticket = inner.tasks.register(user_id, FlowKind::Connect);
        let token = ticket.token().clone();

        self.quiet_disconnect(user_id).await?;
        if token.is_cancelled() {
            return Ok(superseded(user_id, FlowKind::Connect));
        }
        inner.callbacks.set(user_id, FlowKind::Connect, &callbacks).await?;

        let session = inner.sessions.get(user_id).await?;
        let lang = self.language(&session);
        let loader_id = self
            .render(user_id, session.last_message_id, &lang, &inner.prompts.loader(&lang))
            .await?;
        if token.is_cancelled() {
            return Ok(superseded(user_id, FlowKind::Connect));
        }

        let wallets = inner.wallets.list_wallets().await?;
        let selected = Self::pick_wallet(&wallets, session.selected_wallet.as_ref())?;

        let challenge = check_proof
            .then(|| proof_payload.unwrap_or_else(|| proof::generate_payload(inner.settings.proof_ttl)));
        let request = ConnectRequest {
            manifest_url: inner.settings.manifest_url.clone(),
            proof_payload: challenge.clone(),
        };
        let universal_url = inner.channel.open_connection(user_id, &selected, &request).await?;
        let events = inner.channel.connection_events(user_id).await?;
        if token.is_cancelled() {
            return Ok(superseded(user_id, FlowKind::Connect));
        }

        let (gate, armed) = oneshot::channel();
        let handle = waits::spawn_connect(self.clone(), user_id, ticket, events, armed);

        let prompt = inner
            .prompts
            .connect_wallet(&lang, &wallets, &selected, &universal_url)?;
        let message_id = self.render(user_id, Some(loader_id), &lang, &prompt).await?;
        if token.is_cancelled() {
            return Ok(handle);
        }

        self.transition(user_id, FlowState::AwaitingConnection, |s| {
            s.selected_wallet = Some(selected.clone());
            s.check_proof = check_proof;
            s.proof_challenge = challenge;
            s.last_message_id = Some(message_id);
        })
        .await?;

        TraceEvent::FlowOpened {
            user_id,
            flow: FlowKind::Connect,
            wallet: selected.app_name.clone(),
            check_proof,
        }
        .emit();
        let _ = gate.send(());
        Ok(handle)
    }

    /// Re-open the connect flow with the callbacks and proof mode of the
    /// previous attempt.
    pub async fn retry_connect_wallet(&self, user_id: UserId) -> Result<WaitHandle> {
        let Some(callbacks) = self.inner.callbacks.get(user_id, FlowKind::Connect).await? else {
            return Err(Error::RetryWithoutPriorAttempt {
                flow: FlowKind::Connect,
            });
        };
        let check_proof = self.inner.sessions.get(user_id).await?.check_proof;
        self.open_connect_wallet(user_id, callbacks, check_proof, None).await
    }

    /// Forget the connected wallet and anything tied to it.
    pub async fn disconnect_wallet(&self, user_id: UserId) -> Result<()> {
        self.inner.tasks.cancel(user_id);
        self.quiet_disconnect(user_id).await?;
        self.inner
            .callbacks
            .remove(user_id, FlowKind::Transaction)
            .await?;
        self.transition(user_id, FlowState::Idle, Session::clear_connection)
            .await?;
        Ok(())
    }

    /// Switch the user's interface language.
    pub async fn set_language(&self, user_id: UserId, code: &str) -> Result<()> {
        if !self.inner.prompts.texts().supports(code) {
            return Err(Error::UnsupportedLanguage(code.to_string()));
        }
        self.inner
            .sessions
            .update(user_id, |s| s.language_code = Some(code.to_string()))
            .await?;
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Send transaction
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Ask the connected wallet to sign `transaction`.
    pub async fn open_send_transaction(
        &self,
        user_id: UserId,
        mut transaction: Transaction,
        callbacks: CallbackPair,
    ) -> Result<WaitHandle> {
        let inner = &self.inner;
        inner.continuations.ensure(&callbacks)?;

        inner.channel.restore(user_id).await?;
        let wallet = inner
            .channel
            .connected_wallet(user_id)
            .await?
            .ok_or(Error::WalletNotConnected)?;
        if let Some(max) = wallet.device.max_messages() {
            if transaction.messages.len() > max as usize {
                return Err(Error::UnsupportedTransaction {
                    requested: transaction.messages.len(),
                    max,
                });
            }
        }
        if transaction.valid_until.is_none() {
            transaction.valid_until = Some(valid_until(inner.settings.transaction_validity));
        }

        let ticket = inner.tasks.register(user_id, FlowKind::Transaction);
        let token = ticket.token().clone();
        let session = inner.sessions.get(user_id).await?;
        if let Some(previous) = session.last_request_id {
            inner.channel.cancel_pending(user_id, previous).await?;
        }
        if token.is_cancelled() {
            return Ok(superseded(user_id, FlowKind::Transaction));
        }

        inner
            .callbacks
            .set(user_id, FlowKind::Transaction, &callbacks)
            .await?;
        inner
            .sessions
            .update(user_id, |s| s.pending_transaction = Some(transaction.clone()))
            .await?;

        let request_id = inner.channel.submit_transaction(user_id, &transaction).await?;
        TraceEvent::TransactionSubmitted {
            user_id,
            request_id,
            messages: transaction.messages.len(),
        }
        .emit();
        let events = inner.channel.transaction_events(user_id, request_id).await?;
        if token.is_cancelled() {
            drop(events);
            inner.channel.cancel_pending(user_id, request_id).await?;
            return Ok(superseded(user_id, FlowKind::Transaction));
        }

        let (gate, armed) = oneshot::channel();
        let handle = waits::spawn_transaction(self.clone(), user_id, ticket, events, armed);

        let (wallet_name, open_url) = match session.selected_wallet.as_ref() {
            Some(app) => (app.name.clone(), app.open_url().map(String::from)),
            None => (wallet.device.app_name.clone(), None),
        };
        let lang = self.language(&session);
        let prompt = inner
            .prompts
            .send_transaction(&lang, &wallet_name, open_url.as_deref());
        let message_id = self
            .render(user_id, session.last_message_id, &lang, &prompt)
            .await?;
        if token.is_cancelled() {
            inner.channel.cancel_pending(user_id, request_id).await?;
            return Ok(handle);
        }

        self.transition(user_id, FlowState::AwaitingTransaction, |s| {
            s.last_request_id = Some(request_id);
            s.last_message_id = Some(message_id);
        })
        .await?;

        TraceEvent::FlowOpened {
            user_id,
            flow: FlowKind::Transaction,
            wallet: wallet.device.app_name.clone(),
            check_proof: false,
        }
        .emit();
        let _ = gate.send(());
        Ok(handle)
    }

    /// Resubmit the last transaction with a fresh validity window.
    pub async fn retry_last_send_transaction(&self, user_id: UserId) -> Result<WaitHandle> {
        let session = self.inner.sessions.get(user_id).await?;
        let callbacks = self
            .inner
            .callbacks
            .get(user_id, FlowKind::Transaction)
            .await?;
        let (Some(mut transaction), Some(callbacks)) = (session.pending_transaction, callbacks) else {
            return Err(Error::RetryWithoutPriorAttempt {
                flow: FlowKind::Transaction,
            });
        };
        transaction.valid_until = Some(valid_until(self.inner.settings.transaction_validity));
        self.open_send_transaction(user_id, transaction, callbacks).await
    }
}

fn valid_until(window: Duration) -> i64 {
    chrono::Utc::now().timestamp() + window.as_secs() as i64
}
