//! Per-user registry of in-flight background waits.
//!
//! At most one wait per user.  Registering a new wait cancels the previous
//! one under the same lock, so two waits for one user never overlap.  Each
//! registration carries a generation number; a finishing wait only removes
//! the entry if it still owns it, so a late exit cannot evict its
//! replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use wl_domain::state::FlowKind;
use wl_domain::trace::TraceEvent;
use wl_domain::UserId;

struct Entry {
    token: CancellationToken,
    generation: u64,
    kind: FlowKind,
}

#[derive(Default)]
pub struct TaskRegistry {
    entries: Mutex<HashMap<UserId, Entry>>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the user's current wait (if any) and register a new one.
    pub fn register(self: &Arc<Self>, user_id: UserId, kind: FlowKind) -> WaitTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let replaced = {
            let mut entries = self.entries.lock();
            let old = entries.insert(
                user_id,
                Entry {
                    token: token.clone(),
                    generation,
                    kind,
                },
            );
            match old {
                Some(old) => {
                    old.token.cancel();
                    true
                }
                None => false,
            }
        };
        TraceEvent::WaitReplaced {
            user_id,
            flow: kind,
            generation,
            replaced,
        }
        .emit();
        WaitTicket {
            registry: Arc::clone(self),
            user_id,
            generation,
            token,
            released: false,
        }
    }

    /// Cancel the user's current wait.  Returns true if one was running.
    pub fn cancel(&self, user_id: UserId) -> bool {
        match self.entries.lock().remove(&user_id) {
            Some(entry) => {
                entry.token.cancel();
                tracing::debug!(user_id, flow = %entry.kind, generation = entry.generation, "wait cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, user_id: UserId) -> bool {
        self.entries.lock().contains_key(&user_id)
    }

    /// Flow kind of the user's current wait.
    pub fn running_kind(&self, user_id: UserId) -> Option<FlowKind> {
        self.entries.lock().get(&user_id).map(|e| e.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn remove_if(&self, user_id: UserId, generation: u64) {
        let mut entries = self.entries.lock();
        if entries.get(&user_id).is_some_and(|e| e.generation == generation) {
            entries.remove(&user_id);
        }
    }
}

/// Ownership of one registration.  Dropping the ticket deregisters it
/// (only if it is still current), including on panic unwinding.
pub struct WaitTicket {
    registry: Arc<TaskRegistry>,
    user_id: UserId,
    generation: u64,
    token: CancellationToken,
    released: bool,
}

impl WaitTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deregister now, before the ticket is dropped.  Used right before a
    /// continuation runs, so the continuation can open a new flow.
    pub fn release(&mut self) {
        if !self.released {
            self.registry.remove_if(self.user_id, self.generation);
            self.released = true;
        }
    }
}

impl Drop for WaitTicket {
    fn drop(&mut self) {
        self.release();
    }
}
