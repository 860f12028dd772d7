use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-user position in the connect / send-transaction state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    AwaitingConnection,
    ProofMismatch,
    ConnectionTimeout,
    ConnectionRejected,
    AwaitingTransaction,
    TransactionTimeout,
    TransactionRejected,
}

impl FlowState {
    /// The flow a state belongs to, or `None` for `Idle`.
    pub fn kind(self) -> Option<FlowKind> {
        match self {
            Self::Idle => None,
            Self::AwaitingConnection
            | Self::ProofMismatch
            | Self::ConnectionTimeout
            | Self::ConnectionRejected => Some(FlowKind::Connect),
            Self::AwaitingTransaction
            | Self::TransactionTimeout
            | Self::TransactionRejected => Some(FlowKind::Transaction),
        }
    }

    /// States that show a retry/back prompt after a failed attempt.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ProofMismatch
                | Self::ConnectionTimeout
                | Self::ConnectionRejected
                | Self::TransactionTimeout
                | Self::TransactionRejected
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingConnection => "awaiting_connection",
            Self::ProofMismatch => "proof_mismatch",
            Self::ConnectionTimeout => "connection_timeout",
            Self::ConnectionRejected => "connection_rejected",
            Self::AwaitingTransaction => "awaiting_transaction",
            Self::TransactionTimeout => "transaction_timeout",
            Self::TransactionRejected => "transaction_rejected",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of flows a user can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Connect,
    Transaction,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
