use serde::Serialize;

use crate::state::{FlowKind, FlowState};
use crate::UserId;

/// Structured trace events emitted across all WalletLink crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    FlowOpened {
        user_id: UserId,
        flow: FlowKind,
        wallet: String,
        check_proof: bool,
    },
    FlowTransition {
        user_id: UserId,
        from: FlowState,
        to: FlowState,
    },
    WaitReplaced {
        user_id: UserId,
        flow: FlowKind,
        generation: u64,
        replaced: bool,
    },
    WaitFinished {
        user_id: UserId,
        flow: FlowKind,
        outcome: String,
        elapsed_ms: u64,
    },
    ProofChecked {
        user_id: UserId,
        valid: bool,
    },
    TransactionSubmitted {
        user_id: UserId,
        request_id: u64,
        messages: usize,
    },
    WalletsLoaded {
        source: String,
        total: usize,
        supported: usize,
    },
    WalletsFetchFailed {
        url: String,
        error: String,
    },
    PromptFallback {
        user_id: UserId,
        step: String,
        description: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "wl_event");
    }
}
