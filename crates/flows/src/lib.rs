//! Wallet connect and send-transaction flows for chat bots.
//!
//! [`FlowManager`] drives the per-user state machine on top of a
//! [`SecureChannel`](wl_bridge::SecureChannel), a session store and a chat
//! surface.  At most one background wait runs per user; see [`tasks`].

pub mod actions;
pub mod continuations;
pub mod manager;
pub mod prompts;
pub mod qr;
pub mod surface;
pub mod tasks;
pub mod texts;
mod waits;

pub use actions::{ActionOutcome, FlowAction};
pub use continuations::{Continuation, ContinuationTable, FlowContext};
pub use manager::{FlowManager, FlowParts, FlowSettings, WaitHandle};
pub use qr::{QrImage, QrRenderer};
pub use surface::{Button, ButtonAction, ChatSurface, Keyboard, MessageId, Prompt, PromptRenderer, SurfaceError};
pub use tasks::{TaskRegistry, WaitTicket};
pub use texts::{ButtonKey, TextKey, Texts};
