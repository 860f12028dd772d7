//! Session persistence for WalletLink.
//!
//! A [`KvStore`] holds opaque string values keyed per user.  On top of it,
//! [`SessionStore`] keeps the typed per-user [`Session`] record and
//! [`CallbackStore`] keeps the continuation tags each flow resumes with.

pub mod callbacks;
pub mod kv;
pub mod session;

pub use callbacks::{CallbackPair, CallbackStore};
pub use kv::{open_store, JsonFileStore, KvStore, MemoryStore};
pub use session::{Session, SessionStore};
