//! Wallet-bridge collaborators: the secure channel abstraction, an
//! in-process loopback channel, `ton_proof` verification, and the wallet
//! directory.

pub mod channel;
pub mod directory;
pub mod loopback;
pub mod proof;

pub use channel::{
    ConnectRequest, ConnectionEvent, EventStream, SecureChannel, TransactionEvent,
};
pub use directory::{HttpFetcher, StaticWallets, WalletDirectory, WalletFetcher, WalletList};
pub use loopback::{LoopbackChannel, SimulatedWallet};
