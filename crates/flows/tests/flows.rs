use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use wl_bridge::proof;
use wl_bridge::{ConnectRequest, LoopbackChannel, SecureChannel, SimulatedWallet, StaticWallets};
use wl_domain::error::Error;
use wl_domain::state::{FlowKind, FlowState};
use wl_domain::transaction::{Transaction, TransactionMessage, TransactionResult};
use wl_domain::wallet::WalletApp;
use wl_domain::UserId;
use wl_flows::qr::QrServiceUrl;
use wl_flows::{
    ActionOutcome, ChatSurface, ContinuationTable, FlowAction, FlowContext, FlowManager, FlowParts,
    FlowSettings, MessageId, Prompt, SurfaceError, TaskRegistry, Texts,
};
use wl_sessions::{CallbackPair, CallbackStore, MemoryStore};

const USER: UserId = 42;

// ── Fixtures ────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSurface {
    prompts: Mutex<Vec<Prompt>>,
    next_id: AtomicUsize,
    /// Hold the next `send_message` for a second.
    slow_once: AtomicBool,
}

impl RecordingSurface {
    fn last_text(&self) -> String {
        self.prompts.lock().last().map(|p| p.text.clone()).unwrap_or_default()
    }

    fn last(&self) -> Option<Prompt> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait::async_trait]
impl ChatSurface for RecordingSurface {
    async fn send_message(&self, _: UserId, prompt: &Prompt) -> Result<MessageId, SurfaceError> {
        if self.slow_once.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.prompts.lock().push(prompt.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) as MessageId + 1)
    }

    async fn edit_message(&self, _: UserId, _: MessageId, prompt: &Prompt) -> Result<(), SurfaceError> {
        self.prompts.lock().push(prompt.clone());
        Ok(())
    }

    async fn delete_message(&self, _: UserId, _: MessageId) -> Result<(), SurfaceError> {
        Ok(())
    }
}

#[derive(Default)]
struct Hits {
    before: AtomicUsize,
    after: AtomicUsize,
    last: Mutex<Option<FlowContext>>,
}

impl Hits {
    fn before(&self) -> usize {
        self.before.load(Ordering::SeqCst)
    }

    fn after(&self) -> usize {
        self.after.load(Ordering::SeqCst)
    }
}

struct Harness {
    manager: FlowManager,
    store: Arc<MemoryStore>,
    table: Arc<ContinuationTable>,
    channel: Arc<LoopbackChannel>,
    surface: Arc<RecordingSurface>,
    wallet: SimulatedWallet,
    hits: Arc<Hits>,
}

fn app(name: &str) -> WalletApp {
    WalletApp {
        app_name: name.to_lowercase(),
        name: name.into(),
        image: format!("https://img.example/{name}.png"),
        bridge_url: format!("https://{}.example/bridge", name.to_lowercase()),
        universal_url: Some(format!("https://{}.example/tc", name.to_lowercase())),
        deep_link: None,
        about_url: None,
        platforms: vec![],
    }
}

fn harness_with(wallet: SimulatedWallet) -> Harness {
    let channel = Arc::new(LoopbackChannel::new("https://app.tonkeeper.com/ton-connect"));
    let surface = Arc::new(RecordingSurface::default());
    let hits = Arc::new(Hits::default());

    let table = Arc::new(ContinuationTable::new());
    let h = hits.clone();
    table.register_fn("menu", move |_ctx: FlowContext| {
        let h = h.clone();
        async move {
            h.before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    let h = hits.clone();
    table.register_fn("done", move |ctx: FlowContext| {
        let h = h.clone();
        async move {
            h.after.fetch_add(1, Ordering::SeqCst);
            *h.last.lock() = Some(ctx);
            Ok(())
        }
    });

    let store = Arc::new(MemoryStore::new());
    Harness {
        manager: manager_over(&store, &table, &channel, &surface),
        store,
        table,
        channel,
        surface,
        wallet,
        hits,
    }
}

fn manager_over(
    store: &Arc<MemoryStore>,
    table: &Arc<ContinuationTable>,
    channel: &Arc<LoopbackChannel>,
    surface: &Arc<RecordingSurface>,
) -> FlowManager {
    let parts = FlowParts {
        store: store.clone(),
        channel: channel.clone(),
        wallets: Arc::new(StaticWallets(vec![app("Alpha"), app("Beta")])),
        surface: surface.clone(),
        qr: Arc::new(QrServiceUrl::new("https://qr.example")),
        texts: Arc::new(Texts::builtin()),
        continuations: table.clone(),
        tasks: Arc::new(TaskRegistry::new()),
        buttons_per_row: 2,
    };
    FlowManager::new(parts, FlowSettings::default())
}

fn harness() -> Harness {
    harness_with(SimulatedWallet::new("alpha", [3; 32]))
}

fn callbacks() -> CallbackPair {
    CallbackPair::new("menu", "done")
}

fn message(amount: &str) -> TransactionMessage {
    TransactionMessage {
        address: "0:1111111111111111111111111111111111111111111111111111111111111111".into(),
        amount: amount.into(),
        payload: None,
        state_init: None,
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

impl Harness {
    fn latest_request(&self) -> (u64, ConnectRequest) {
        let id = *self.channel.connection_request_ids(USER).last().unwrap();
        let (_, req) = self.channel.connection_request(USER, id).unwrap();
        (id, req)
    }

    fn approve(&self, id: u64, req: &ConnectRequest) -> bool {
        let info = self
            .wallet
            .answer(req, "bot.example", proof::unix_now())
            .unwrap();
        self.channel.approve_connection(USER, id, info)
    }

    fn approve_latest(&self) -> u64 {
        let (id, req) = self.latest_request();
        self.approve(id, &req);
        id
    }

    /// Put the user in a connected, idle state without going through a flow.
    fn connect_directly(&self) {
        let req = ConnectRequest {
            manifest_url: "m".into(),
            proof_payload: None,
        };
        let info = self.wallet.answer(&req, "bot.example", 0).unwrap();
        self.channel.set_connected(USER, Some(info));
    }

    /// A fresh manager over the same store and channel, as after a process
    /// restart.  It has its own task registry.
    fn rebuilt_manager(&self) -> FlowManager {
        manager_over(&self.store, &self.table, &self.channel, &self.surface)
    }

    async fn state(&self) -> FlowState {
        self.manager.state(USER).await.unwrap()
    }
}

// ── Connect flow ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_without_proof_invokes_after_once() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    assert_eq!(h.state().await, FlowState::AwaitingConnection);
    assert!(h.manager.tasks().is_running(USER));
    assert!(h.surface.last_text().contains("Connect your Alpha!"));
    assert_eq!(h.surface.prompts.lock()[0].text, "⏳");

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.approve_latest();
    handle.await.unwrap().unwrap();

    assert_eq!(h.hits.after(), 1);
    assert_eq!(h.hits.before(), 0);
    let ctx = h.hits.last.lock().clone().unwrap();
    assert_eq!(ctx.wallet.unwrap().account.address, h.wallet.address());
    assert_eq!(h.state().await, FlowState::Idle);
    assert!(!h.manager.tasks().is_running(USER));

    let session = h.manager.session(USER).await.unwrap();
    assert_eq!(session.selected_wallet.unwrap().app_name, "alpha");
    assert!(session.connected_wallet.is_some());
}

#[tokio::test(start_paused = true)]
async fn connect_without_proof_sends_no_challenge() {
    let h = harness();
    let _handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    let (_, req) = h.latest_request();
    assert!(req.proof_payload.is_none());
    assert!(h.manager.session(USER).await.unwrap().proof_challenge.is_none());
}

#[tokio::test(start_paused = true)]
async fn bad_proof_disconnects_without_continuation() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), true, None)
        .await
        .unwrap();

    let (id, req) = h.latest_request();
    let challenge = req.proof_payload.clone().unwrap();
    assert_eq!(challenge.len(), 32);
    assert_eq!(
        h.manager.session(USER).await.unwrap().proof_challenge.as_deref(),
        Some(challenge.as_str())
    );

    // The wallet signs something other than our challenge.
    let forged = ConnectRequest {
        proof_payload: Some(proof::generate_payload(Duration::from_secs(600))),
        ..req
    };
    h.approve(id, &forged);
    handle.await.unwrap().unwrap();

    assert_eq!(h.state().await, FlowState::ProofMismatch);
    assert_eq!(h.hits.after(), 0);
    assert!(h.channel.connected_wallet(USER).await.unwrap().is_none());
    let session = h.manager.session(USER).await.unwrap();
    assert!(session.connected_wallet.is_none());
    assert!(session.proof_challenge.is_none());
    assert!(h.surface.last_text().contains("signature is wrong"));
    assert!(!h.manager.tasks().is_running(USER));
}

#[tokio::test(start_paused = true)]
async fn good_proof_connects_and_consumes_challenge() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), true, None)
        .await
        .unwrap();
    h.approve_latest();
    handle.await.unwrap().unwrap();

    assert_eq!(h.hits.after(), 1);
    assert_eq!(h.state().await, FlowState::Idle);
    assert!(h.manager.session(USER).await.unwrap().proof_challenge.is_none());
}

#[tokio::test(start_paused = true)]
async fn caller_supplied_proof_payload_is_used() {
    let h = harness();
    let payload = proof::generate_payload(Duration::from_secs(60));
    let _handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), true, Some(payload.clone()))
        .await
        .unwrap();
    let (_, req) = h.latest_request();
    assert_eq!(req.proof_payload, Some(payload));
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_at_budget_and_not_before() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(179)).await;
    settle().await;
    assert_eq!(h.state().await, FlowState::AwaitingConnection);

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.await.unwrap().unwrap();
    assert_eq!(h.state().await, FlowState::ConnectionTimeout);
    assert!(h.surface.last_text().contains("connection timeout has expired"));
    assert!(!h.manager.tasks().is_running(USER));
}

#[tokio::test(start_paused = true)]
async fn rejected_connection_prompts_retry() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    let (id, _) = h.latest_request();
    h.channel.reject_connection(USER, id);
    handle.await.unwrap().unwrap();

    assert_eq!(h.state().await, FlowState::ConnectionRejected);
    let prompt = h.surface.last().unwrap();
    assert!(prompt.text.contains("You rejected the connection!"));
    assert_eq!(prompt.keyboard.rows[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_open_cancels_first() {
    let h = harness();
    let first = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();

    first.await.unwrap().unwrap();
    assert_eq!(h.manager.tasks().len(), 1);

    let ids = h.channel.connection_request_ids(USER);
    assert_eq!(ids.len(), 2);
    let (_, first_req) = h.channel.connection_request(USER, ids[0]).unwrap();
    h.approve(ids[0], &first_req);
    settle().await;
    assert_eq!(h.hits.after(), 0);
    assert_eq!(h.state().await, FlowState::AwaitingConnection);

    let (_, second_req) = h.channel.connection_request(USER, ids[1]).unwrap();
    h.approve(ids[1], &second_req);
    second.await.unwrap().unwrap();
    assert_eq!(h.hits.after(), 1);
}

#[tokio::test(start_paused = true)]
async fn overtaken_opener_leaves_session_to_newer_one() {
    let h = harness();
    h.surface.slow_once.store(true, Ordering::SeqCst);
    let manager = h.manager.clone();
    let first = tokio::spawn(async move {
        manager.open_connect_wallet(USER, callbacks(), true, None).await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = h
        .manager
        .open_connect_wallet(USER, callbacks(), true, None)
        .await
        .unwrap();

    first.await.unwrap().unwrap().await.unwrap().unwrap();
    assert_eq!(h.channel.connection_request_ids(USER).len(), 1);
    let (_, req) = h.latest_request();
    let session = h.manager.session(USER).await.unwrap();
    assert_eq!(session.proof_challenge, req.proof_payload);
    assert_eq!(session.state, FlowState::AwaitingConnection);

    h.approve_latest();
    second.await.unwrap().unwrap();
    assert_eq!(h.hits.after(), 1);
    assert_eq!(h.state().await, FlowState::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_invokes_nothing() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    assert!(h.manager.tasks().cancel(USER));
    h.approve_latest();
    handle.await.unwrap().unwrap();

    assert_eq!(h.hits.after(), 0);
    assert_eq!(h.hits.before(), 0);
    assert_eq!(h.state().await, FlowState::AwaitingConnection);
}

#[tokio::test(start_paused = true)]
async fn retry_connect_reuses_callbacks_and_proof_mode() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), true, None)
        .await
        .unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(h.state().await, FlowState::ConnectionTimeout);

    let first_retry = h.manager.retry_connect_wallet(USER).await.unwrap();
    let (_, req_a) = h.latest_request();
    let second_retry = h.manager.retry_connect_wallet(USER).await.unwrap();
    let (_, req_b) = h.latest_request();
    first_retry.await.unwrap().unwrap();

    assert!(req_a.proof_payload.is_some());
    assert!(req_b.proof_payload.is_some());
    assert_ne!(req_a.proof_payload, req_b.proof_payload);
    assert!(h.manager.session(USER).await.unwrap().check_proof);

    h.approve_latest();
    second_retry.await.unwrap().unwrap();
    assert_eq!(h.hits.after(), 1);
}

#[tokio::test]
async fn retry_without_history_fails_closed() {
    let h = harness();
    let err = h.manager.retry_connect_wallet(USER).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RetryWithoutPriorAttempt {
            flow: FlowKind::Connect
        }
    ));
    let err = h.manager.retry_last_send_transaction(USER).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RetryWithoutPriorAttempt {
            flow: FlowKind::Transaction
        }
    ));
    assert_eq!(h.channel.calls(), 0);
    assert!(h.surface.last().is_none());
}

#[tokio::test]
async fn unknown_continuation_rejected_up_front() {
    let h = harness();
    let err = h
        .manager
        .open_connect_wallet(USER, CallbackPair::new("menu", "nope"), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownContinuation(tag) if tag == "nope"));
    assert_eq!(h.channel.calls(), 0);
}

#[tokio::test]
async fn empty_directory_is_fatal() {
    let h = harness();
    let parts = FlowParts {
        store: Arc::new(MemoryStore::new()),
        channel: h.channel.clone(),
        wallets: Arc::new(StaticWallets(vec![])),
        surface: h.surface.clone(),
        qr: Arc::new(QrServiceUrl::new("https://qr.example")),
        texts: Arc::new(Texts::builtin()),
        continuations: {
            let t = ContinuationTable::new();
            t.register_fn("menu", |_| async { Ok(()) });
            t.register_fn("done", |_| async { Ok(()) });
            Arc::new(t)
        },
        tasks: Arc::new(TaskRegistry::new()),
        buttons_per_row: 2,
    };
    let manager = FlowManager::new(parts, FlowSettings::default());
    let err = manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoWalletsAvailable));
    assert!(!manager.tasks().is_running(USER));
}

// ── Send transaction ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transaction_timeout_then_retry_resubmits() {
    let h = harness();
    h.connect_directly();
    let tx = Transaction::new(vec![message("1000"), message("2000")]);
    let handle = h
        .manager
        .open_send_transaction(USER, tx.clone(), callbacks())
        .await
        .unwrap();
    assert_eq!(h.state().await, FlowState::AwaitingTransaction);
    let first_id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();

    tokio::time::sleep(Duration::from_secs(299)).await;
    settle().await;
    assert_eq!(h.state().await, FlowState::AwaitingTransaction);

    handle.await.unwrap().unwrap();
    assert_eq!(h.state().await, FlowState::TransactionTimeout);
    assert!(h.surface.last_text().contains("transaction timeout has expired"));

    let now = chrono::Utc::now().timestamp();
    let _retry = h.manager.retry_last_send_transaction(USER).await.unwrap();
    let pending = h.channel.pending_transaction_ids(USER);
    assert_eq!(pending.len(), 1);
    assert_ne!(pending[0], first_id);

    let resubmitted = h.channel.pending_transaction(USER, pending[0]).unwrap();
    assert_eq!(resubmitted.messages, tx.messages);
    assert!(resubmitted.valid_until.unwrap() >= now + 300);
    assert_eq!(h.state().await, FlowState::AwaitingTransaction);
}

#[tokio::test(start_paused = true)]
async fn signed_transaction_invokes_after_with_boc() {
    let h = harness();
    h.connect_directly();
    let handle = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    let id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();
    assert!(h.channel.pending_transaction(USER, id).unwrap().valid_until.is_some());

    h.channel.sign(
        USER,
        id,
        TransactionResult {
            boc: "te6cckEBAQEA".into(),
            hash: Some("abcd".into()),
        },
    );
    handle.await.unwrap().unwrap();

    assert_eq!(h.hits.after(), 1);
    let ctx = h.hits.last.lock().clone().unwrap();
    assert_eq!(ctx.transaction.unwrap().boc, "te6cckEBAQEA");

    let session = h.manager.session(USER).await.unwrap();
    assert_eq!(session.state, FlowState::Idle);
    assert_eq!(session.last_transaction.unwrap().hash.as_deref(), Some("abcd"));
    // Kept around for a later retry.
    assert!(session.pending_transaction.is_some());
}

#[tokio::test(start_paused = true)]
async fn rejected_transaction_prompts_retry() {
    let h = harness();
    h.connect_directly();
    let handle = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    let id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();
    h.channel.reject_transaction(USER, id);
    handle.await.unwrap().unwrap();

    assert_eq!(h.state().await, FlowState::TransactionRejected);
    assert!(h.surface.last_text().contains("You rejected the transaction!"));
    assert_eq!(h.hits.after(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_transaction_cancels_first_request() {
    let h = harness();
    h.connect_directly();
    let signed = || TransactionResult {
        boc: "te6cckEBAQEA".into(),
        hash: None,
    };
    let first = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    let first_id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();
    let second = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("6")]), callbacks())
        .await
        .unwrap();
    let second_id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(h.channel.pending_transaction_ids(USER), vec![second_id]);
    assert!(!h.channel.sign(USER, first_id, signed()));
    settle().await;
    assert_eq!(h.hits.after(), 0);
    assert_eq!(h.state().await, FlowState::AwaitingTransaction);

    assert!(h.channel.sign(USER, second_id, signed()));
    second.await.unwrap().unwrap();
    assert_eq!(h.hits.after(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_outcome_after_leaving_is_dropped() {
    let h = harness();
    h.connect_directly();
    let handle = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();

    // Another manager has no record of the wait, so it cannot cancel it;
    // cancelling the request ends the wait's stream instead.
    let other = h.rebuilt_manager();
    let outcome = other.handle_action(USER, FlowAction::Back).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::WentBack));
    handle.await.unwrap().unwrap();

    assert_eq!(h.state().await, FlowState::Idle);
    assert!(!h.surface.last_text().contains("transaction timeout has expired"));
    assert_eq!(h.hits.before(), 1);
    assert_eq!(h.hits.after(), 0);
}

#[tokio::test(start_paused = true)]
async fn connection_survives_restart() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    h.approve_latest();
    handle.await.unwrap().unwrap();

    h.channel.restart();
    let manager = h.rebuilt_manager();
    let handle = manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    assert_eq!(manager.state(USER).await.unwrap(), FlowState::AwaitingTransaction);

    let id = h.channel.pending_transaction_ids(USER)[0];
    h.channel.sign(
        USER,
        id,
        TransactionResult {
            boc: "te6cckEBAQEA".into(),
            hash: None,
        },
    );
    handle.await.unwrap().unwrap();
    assert_eq!(h.hits.after(), 2);
}

#[tokio::test]
async fn too_many_messages_rejected_before_submit() {
    let h = harness_with(SimulatedWallet::new("alpha", [3; 32]).with_max_messages(1));
    h.connect_directly();
    let err = h
        .manager
        .open_send_transaction(
            USER,
            Transaction::new(vec![message("1"), message("2")]),
            callbacks(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedTransaction {
            requested: 2,
            max: 1
        }
    ));
    assert!(h.channel.pending_transaction_ids(USER).is_empty());
    assert!(h.manager.session(USER).await.unwrap().pending_transaction.is_none());
}

#[tokio::test]
async fn transaction_requires_connected_wallet() {
    let h = harness();
    let err = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("1")]), callbacks())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WalletNotConnected));
}

// ── Actions ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn selecting_a_wallet_reopens_for_it() {
    let h = harness();
    let first = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();

    let data = "app_wallet:beta";
    let outcome = h
        .manager
        .handle_action(USER, FlowAction::parse(data).unwrap())
        .await
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Reopened(_)));
    first.await.unwrap().unwrap();

    let (app, _) = h
        .channel
        .connection_request(USER, *h.channel.connection_request_ids(USER).last().unwrap())
        .unwrap();
    assert_eq!(app.app_name, "beta");
    let prompt = h.surface.last().unwrap();
    assert!(prompt.keyboard.buttons().any(|b| b.text == "• Beta •"));
    assert_eq!(h.manager.tasks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn back_while_connecting_runs_before() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    let outcome = h.manager.handle_action(USER, FlowAction::Back).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::WentBack));
    handle.await.unwrap().unwrap();

    assert_eq!(h.hits.before(), 1);
    assert_eq!(h.hits.after(), 0);
    assert_eq!(h.state().await, FlowState::Idle);
    assert!(h.manager.tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn retry_after_rejection_reopens() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    let (id, _) = h.latest_request();
    h.channel.reject_connection(USER, id);
    handle.await.unwrap().unwrap();

    let outcome = h.manager.handle_action(USER, FlowAction::Retry).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Reopened(_)));
    assert_eq!(h.state().await, FlowState::AwaitingConnection);
    assert_eq!(h.channel.connection_request_ids(USER).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn back_while_signing_cancels_request() {
    let h = harness();
    h.connect_directly();
    let handle = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    let outcome = h.manager.handle_action(USER, FlowAction::Back).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::WentBack));
    handle.await.unwrap().unwrap();

    assert!(h.channel.pending_transaction_ids(USER).is_empty());
    assert_eq!(h.state().await, FlowState::Idle);
    assert_eq!(h.hits.before(), 1);
}

#[tokio::test]
async fn inapplicable_action_is_ignored() {
    let h = harness();
    let outcome = h.manager.handle_action(USER, FlowAction::Retry).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Ignored));
    assert_eq!(h.channel.calls(), 0);
}

// ── Language & disconnect ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn language_switch_changes_prompts() {
    let h = harness();
    let err = h.manager.set_language(USER, "de").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedLanguage(code) if code == "de"));

    h.manager.set_language(USER, "ru").await.unwrap();
    let _handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    assert!(h.surface.last_text().contains("Подключите свой Alpha!"));
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_connection_state() {
    let h = harness();
    let handle = h
        .manager
        .open_connect_wallet(USER, callbacks(), false, None)
        .await
        .unwrap();
    h.approve_latest();
    handle.await.unwrap().unwrap();

    h.manager.disconnect_wallet(USER).await.unwrap();
    let session = h.manager.session(USER).await.unwrap();
    assert!(session.connected_wallet.is_none());
    assert!(session.pending_transaction.is_none());
    assert!(h.channel.connected_wallet(USER).await.unwrap().is_none());

    // A second disconnect with nothing connected is fine.
    h.manager.disconnect_wallet(USER).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disconnect_forgets_transaction_callbacks() {
    let h = harness();
    h.connect_directly();
    let handle = h
        .manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap();
    let id = h.manager.session(USER).await.unwrap().last_request_id.unwrap();
    h.channel.reject_transaction(USER, id);
    handle.await.unwrap().unwrap();

    let stored = CallbackStore::new(h.store.clone());
    assert!(stored.get(USER, FlowKind::Transaction).await.unwrap().is_some());
    h.manager.disconnect_wallet(USER).await.unwrap();
    assert!(stored.get(USER, FlowKind::Transaction).await.unwrap().is_none());

    let err = h.manager.retry_last_send_transaction(USER).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RetryWithoutPriorAttempt {
            flow: FlowKind::Transaction
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn disconnect_after_restart_drops_saved_connection() {
    let h = harness();
    h.connect_directly();
    h.channel.restart();

    let manager = h.rebuilt_manager();
    manager.disconnect_wallet(USER).await.unwrap();
    assert!(!h.channel.restore(USER).await.unwrap());
    let err = manager
        .open_send_transaction(USER, Transaction::new(vec![message("5")]), callbacks())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WalletNotConnected));
}
