//! `walletlink demo`: both flows end to end on the console.
//!
//! The bot side is the real [`FlowManager`]; the wallet side is a
//! [`SimulatedWallet`] answering through the [`LoopbackChannel`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use tokio::sync::mpsc;

use wl_bridge::{proof, ConnectRequest, LoopbackChannel, SimulatedWallet};
use wl_domain::config::Config;
use wl_domain::state::FlowState;
use wl_domain::transaction::{Transaction, TransactionMessage, TransactionResult};
use wl_domain::UserId;
use wl_flows::{ContinuationTable, FlowContext};
use wl_sessions::CallbackPair;

use crate::bootstrap;
use crate::console::ConsoleSurface;

const DEMO_USER: UserId = 1;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub check_proof: bool,
    pub forge_proof: bool,
    pub reject: bool,
    pub messages: usize,
    pub ignore_transaction: bool,
    pub delay: Duration,
}

#[derive(Debug)]
enum DemoEvent {
    Menu,
    Connected(FlowContext),
    Paid(FlowContext),
}

fn continuations(events: mpsc::UnboundedSender<DemoEvent>) -> Arc<ContinuationTable> {
    let table = ContinuationTable::new();
    let tx = events.clone();
    table.register_fn("demo:menu", move |_ctx: FlowContext| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(DemoEvent::Menu);
            Ok(())
        }
    });
    let tx = events.clone();
    table.register_fn("demo:connected", move |ctx: FlowContext| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(DemoEvent::Connected(ctx));
            Ok(())
        }
    });
    let tx = events;
    table.register_fn("demo:paid", move |ctx: FlowContext| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(DemoEvent::Paid(ctx));
            Ok(())
        }
    });
    Arc::new(table)
}

/// Host part of the manifest URL; the domain wallets sign proofs for.
fn manifest_domain(manifest_url: &str) -> &str {
    let rest = manifest_url
        .split_once("://")
        .map_or(manifest_url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

pub async fn run(config: Config, opts: DemoOptions) -> anyhow::Result<()> {
    let ret = config.bridge.redirect_url.clone().unwrap_or_else(|| "none".into());
    let channel = Arc::new(
        LoopbackChannel::new(config.bridge.default_universal_url.clone()).with_return_strategy(ret),
    );
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let manager = bootstrap::build_manager(
        &config,
        channel.clone(),
        Arc::new(ConsoleSurface::new()),
        continuations(events_tx),
    )?;
    let wallet = SimulatedWallet::new("simulated", rand::random());
    let domain = manifest_domain(&config.bridge.manifest_url).to_string();

    // ── Connect ──────────────────────────────────────────────────────
    let wait = manager
        .open_connect_wallet(
            DEMO_USER,
            CallbackPair::new("demo:menu", "demo:connected"),
            opts.check_proof,
            None,
        )
        .await?;

    tokio::time::sleep(opts.delay).await;
    let request_id = channel
        .connection_request_ids(DEMO_USER)
        .last()
        .copied()
        .context("no connection request was opened")?;
    let (app, request) = channel
        .connection_request(DEMO_USER, request_id)
        .context("connection request vanished")?;
    println!("wallet: got request {request_id} through {}", app.name);

    if opts.reject {
        println!("wallet: rejecting");
        channel.reject_connection(DEMO_USER, request_id);
    } else {
        let answered = if opts.forge_proof {
            println!("wallet: signing a different challenge");
            ConnectRequest {
                proof_payload: Some(proof::generate_payload(Duration::from_secs(
                    config.flows.proof_ttl_secs,
                ))),
                ..request
            }
        } else {
            request
        };
        let info = wallet.answer(&answered, &domain, proof::unix_now())?;
        println!("wallet: approving as {}", info.account.address);
        channel.approve_connection(DEMO_USER, request_id, info);
    }
    wait.await.context("connect wait panicked")??;

    let state = manager.state(DEMO_USER).await?;
    if state != FlowState::Idle {
        println!("connect flow ended in {state}");
        return report(&manager, &mut events).await;
    }

    // ── Send transaction ─────────────────────────────────────────────
    let messages = (0..opts.messages)
        .map(|i| TransactionMessage {
            address: wallet.address(),
            amount: (1_000_000 * (i as u64 + 1)).to_string(),
            payload: None,
            state_init: None,
        })
        .collect();
    let wait = manager
        .open_send_transaction(
            DEMO_USER,
            Transaction::new(messages),
            CallbackPair::new("demo:menu", "demo:paid"),
        )
        .await?;

    if opts.ignore_transaction {
        println!("wallet: ignoring the transaction");
    } else {
        tokio::time::sleep(opts.delay).await;
        let request_id = manager
            .session(DEMO_USER)
            .await?
            .last_request_id
            .context("no transaction was submitted")?;
        let boc = base64::engine::general_purpose::STANDARD.encode(rand::random::<[u8; 32]>());
        println!("wallet: signing request {request_id}");
        channel.sign(DEMO_USER, request_id, TransactionResult { boc, hash: None });
    }
    wait.await.context("transaction wait panicked")??;

    report(&manager, &mut events).await
}

async fn report(
    manager: &wl_flows::FlowManager,
    events: &mut mpsc::UnboundedReceiver<DemoEvent>,
) -> anyhow::Result<()> {
    while let Ok(event) = events.try_recv() {
        match event {
            DemoEvent::Menu => println!("bot: back to menu"),
            DemoEvent::Connected(ctx) => {
                let address = ctx.wallet.map(|w| w.account.address).unwrap_or_default();
                println!("bot: connected {address}");
            }
            DemoEvent::Paid(ctx) => {
                let boc = ctx.transaction.map(|t| t.boc).unwrap_or_default();
                println!("bot: transaction signed, boc {boc}");
            }
        }
    }
    let session = manager.session(DEMO_USER).await?;
    println!("\nsession:\n{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_from_manifest_url() {
        assert_eq!(
            manifest_domain("https://example.com/tonconnect-manifest.json"),
            "example.com"
        );
        assert_eq!(manifest_domain("https://bot.example:8443?x=1"), "bot.example:8443");
        assert_eq!(manifest_domain("bot.example"), "bot.example");
    }

    #[tokio::test]
    async fn continuations_forward_to_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let table = continuations(tx);
        table.invoke("demo:menu", FlowContext::new(DEMO_USER)).await.unwrap();
        assert!(matches!(rx.recv().await, Some(DemoEvent::Menu)));
        assert!(table.contains("demo:paid"));
    }
}
