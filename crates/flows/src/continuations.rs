//! Named continuations.
//!
//! Flows persist continuation *tags*; the process resolves them through a
//! [`ContinuationTable`] registered at startup.  A tag that is no longer
//! registered fails with [`Error::UnknownContinuation`] instead of running
//! something else.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use wl_domain::error::{Error, Result};
use wl_domain::transaction::TransactionResult;
use wl_domain::wallet::WalletInfo;
use wl_domain::UserId;
use wl_sessions::CallbackPair;

/// What a continuation gets to see when a flow finishes or backs out.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub user_id: UserId,
    /// Connected wallet (set after a successful connect, and on a
    /// transaction flow if one is still connected).
    pub wallet: Option<WalletInfo>,
    /// Signed transaction (set after a successful send).
    pub transaction: Option<TransactionResult>,
}

impl FlowContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            wallet: None,
            transaction: None,
        }
    }
}

#[async_trait::async_trait]
pub trait Continuation: Send + Sync {
    async fn call(&self, ctx: FlowContext) -> Result<()>;
}

struct FnContinuation<F>(F);

#[async_trait::async_trait]
impl<F, Fut> Continuation for FnContinuation<F>
where
    F: Fn(FlowContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: FlowContext) -> Result<()> {
        (self.0)(ctx).await
    }
}

#[derive(Default)]
pub struct ContinuationTable {
    handlers: RwLock<HashMap<String, Arc<dyn Continuation>>>,
}

impl ContinuationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tag: impl Into<String>, handler: Arc<dyn Continuation>) {
        self.handlers.write().insert(tag.into(), handler);
    }

    /// Register an async closure under `tag`.
    pub fn register_fn<F, Fut>(&self, tag: impl Into<String>, f: F)
    where
        F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(tag, Arc::new(FnContinuation(f)));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.read().contains_key(tag)
    }

    /// Fail early if either tag of a pair is unknown.
    pub fn ensure(&self, pair: &CallbackPair) -> Result<()> {
        for tag in [&pair.before, &pair.after] {
            if !self.contains(tag) {
                return Err(Error::UnknownContinuation(tag.clone()));
            }
        }
        Ok(())
    }

    pub async fn invoke(&self, tag: &str, ctx: FlowContext) -> Result<()> {
        let handler = self
            .handlers
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::UnknownContinuation(tag.to_string()))?;
        tracing::debug!(user_id = ctx.user_id, tag, "invoking continuation");
        handler.call(ctx).await
    }
}
