//! Background waits for connection and transaction outcomes.
//!
//! Every wait owns a [`WaitTicket`] and a deadline fixed when the task
//! starts.  Cancellation is observed while waiting and re-checked before
//! each side effect; a cancelled wait never touches the session, the chat
//! or a continuation.

use std::future::Future;

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wl_bridge::proof;
use wl_bridge::{ConnectionEvent, EventStream, TransactionEvent};
use wl_domain::error::Result;
use wl_domain::state::{FlowKind, FlowState};
use wl_domain::trace::TraceEvent;
use wl_domain::wallet::WalletInfo;
use wl_domain::UserId;

use crate::continuations::FlowContext;
use crate::manager::{FlowManager, WaitHandle};
use crate::tasks::WaitTicket;

enum Waited<E> {
    /// Cancelled, or the opener gave up before arming the wait.
    Aborted,
    Event(E),
    /// Deadline passed or the event stream ended.
    TimedOut,
}

async fn next_event<E>(
    token: &CancellationToken,
    armed: oneshot::Receiver<()>,
    deadline: Instant,
    events: &mut EventStream<E>,
) -> Waited<E> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Waited::Aborted,
        waited = async {
            if armed.await.is_err() {
                return Waited::Aborted;
            }
            match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(Some(event)) => Waited::Event(event),
                Ok(None) | Err(_) => Waited::TimedOut,
            }
        } => waited,
    }
}

fn spawn_logged<F>(user_id: UserId, flow: FlowKind, fut: F) -> WaitHandle
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = fut.await;
        if let Err(ref e) = result {
            tracing::error!(user_id, flow = %flow, error = %e, "wait task failed");
        }
        result
    })
}

fn finished(user_id: UserId, flow: FlowKind, outcome: &str, started: Instant) {
    TraceEvent::WaitFinished {
        user_id,
        flow,
        outcome: outcome.to_string(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn spawn_connect(
    manager: FlowManager,
    user_id: UserId,
    ticket: WaitTicket,
    events: EventStream<ConnectionEvent>,
    armed: oneshot::Receiver<()>,
) -> WaitHandle {
    spawn_logged(
        user_id,
        FlowKind::Connect,
        connect_wait(manager, user_id, ticket, events, armed),
    )
}

async fn connect_wait(
    manager: FlowManager,
    user_id: UserId,
    mut ticket: WaitTicket,
    mut events: EventStream<ConnectionEvent>,
    armed: oneshot::Receiver<()>,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + manager.settings().connect_timeout;
    let token = ticket.token().clone();

    let waited = next_event(&token, armed, deadline, &mut events).await;
    drop(events);
    if ticket.is_cancelled() {
        finished(user_id, FlowKind::Connect, "cancelled", started);
        return Ok(());
    }

    match waited {
        Waited::Aborted => {
            finished(user_id, FlowKind::Connect, "cancelled", started);
            Ok(())
        }
        Waited::Event(ConnectionEvent::Connected(info)) => {
            finished(user_id, FlowKind::Connect, "connected", started);
            on_connected(&manager, user_id, &mut ticket, info).await
        }
        Waited::Event(ConnectionEvent::Rejected) => {
            finished(user_id, FlowKind::Connect, "rejected", started);
            manager
                .transition(user_id, FlowState::ConnectionRejected, |_| {})
                .await?;
            if ticket.is_cancelled() {
                return Ok(());
            }
            manager.show(user_id, |p, lang| p.connect_rejected(lang)).await
        }
        Waited::TimedOut => {
            finished(user_id, FlowKind::Connect, "timeout", started);
            manager
                .transition(user_id, FlowState::ConnectionTimeout, |_| {})
                .await?;
            if ticket.is_cancelled() {
                return Ok(());
            }
            manager.show(user_id, |p, lang| p.connect_timeout(lang)).await
        }
    }
}

async fn on_connected(
    manager: &FlowManager,
    user_id: UserId,
    ticket: &mut WaitTicket,
    info: WalletInfo,
) -> Result<()> {
    let sessions = &manager.inner.sessions;
    let session = sessions
        .update(user_id, |s| s.connected_wallet = Some(info.clone()))
        .await?;

    if session.check_proof {
        let valid = session
            .proof_challenge
            .as_deref()
            .is_some_and(|challenge| proof::verify(challenge, &info, proof::unix_now()));
        TraceEvent::ProofChecked { user_id, valid }.emit();

        if !valid {
            if ticket.is_cancelled() {
                return Ok(());
            }
            manager
                .transition(user_id, FlowState::ProofMismatch, |s| s.proof_challenge = None)
                .await?;
            ticket.release();
            manager.show(user_id, |p, lang| p.proof_wrong(lang)).await?;
            manager.quiet_disconnect(user_id).await?;
            sessions
                .update(user_id, |s| s.connected_wallet = None)
                .await?;
            return Ok(());
        }
    }

    if ticket.is_cancelled() {
        return Ok(());
    }
    manager
        .transition(user_id, FlowState::Idle, |s| s.proof_challenge = None)
        .await?;
    ticket.release();

    let ctx = FlowContext {
        user_id,
        wallet: Some(info),
        transaction: None,
    };
    manager
        .run_continuation(user_id, FlowKind::Connect, true, ctx)
        .await?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Send transaction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn spawn_transaction(
    manager: FlowManager,
    user_id: UserId,
    ticket: WaitTicket,
    events: EventStream<TransactionEvent>,
    armed: oneshot::Receiver<()>,
) -> WaitHandle {
    spawn_logged(
        user_id,
        FlowKind::Transaction,
        transaction_wait(manager, user_id, ticket, events, armed),
    )
}

async fn transaction_wait(
    manager: FlowManager,
    user_id: UserId,
    mut ticket: WaitTicket,
    mut events: EventStream<TransactionEvent>,
    armed: oneshot::Receiver<()>,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + manager.settings().transaction_timeout;
    let token = ticket.token().clone();

    let waited = next_event(&token, armed, deadline, &mut events).await;
    drop(events);
    if ticket.is_cancelled() {
        finished(user_id, FlowKind::Transaction, "cancelled", started);
        return Ok(());
    }

    let (to, outcome) = match waited {
        Waited::Aborted => {
            finished(user_id, FlowKind::Transaction, "cancelled", started);
            return Ok(());
        }
        Waited::Event(TransactionEvent::Signed(result)) => {
            finished(user_id, FlowKind::Transaction, "signed", started);
            let session = manager
                .transition(user_id, FlowState::Idle, |s| {
                    s.last_transaction = Some(result.clone());
                })
                .await?;
            ticket.release();
            let ctx = FlowContext {
                user_id,
                wallet: session.connected_wallet,
                transaction: Some(result),
            };
            manager
                .run_continuation(user_id, FlowKind::Transaction, true, ctx)
                .await?;
            return Ok(());
        }
        Waited::Event(TransactionEvent::Rejected) => (FlowState::TransactionRejected, "rejected"),
        Waited::Event(TransactionEvent::Timeout) | Waited::TimedOut => {
            (FlowState::TransactionTimeout, "timeout")
        }
    };
    finished(user_id, FlowKind::Transaction, outcome, started);

    // The user may have moved on (e.g. pressed "back") while we waited.
    if manager.state(user_id).await? != FlowState::AwaitingTransaction {
        return Ok(());
    }
    if ticket.is_cancelled() {
        return Ok(());
    }
    manager.transition(user_id, to, |_| {}).await?;
    if ticket.is_cancelled() {
        return Ok(());
    }
    match to {
        FlowState::TransactionRejected => {
            manager
                .show(user_id, |p, lang| p.transaction_rejected(lang))
                .await
        }
        _ => {
            manager
                .show(user_id, |p, lang| p.transaction_timeout(lang))
                .await
        }
    }
}
