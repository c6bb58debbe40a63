//! Cancellation scopes
//!
//! A [`CancelScope`] is a one-shot stop flag shared by every suspending call
//! in a session. Scopes form a tree: cancelling a scope cancels all of its
//! children, while cancelling a child leaves the parent running. The session
//! owns the root scope (tripped by SIGINT/SIGTERM) and hands a child scope to
//! each background ticking loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable handle to a one-shot cancellation flag
#[derive(Debug, Clone)]
pub struct CancelScope {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    flag: watch::Sender<bool>,
    parent: Option<CancelScope>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelScope {
    /// Create a root scope
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner { flag, parent: None }),
        }
    }

    /// Create a scope that is also cancelled when this one is
    pub fn child(&self) -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                flag,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Trip the flag. Returns `true` only for the call that actually
    /// cancelled the scope; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.inner.flag.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    /// Whether this scope or any ancestor has been cancelled
    pub fn is_cancelled(&self) -> bool {
        *self.inner.flag.borrow()
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }

    /// Resolve once this scope or any ancestor is cancelled
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let own = wait_for_flag(self.inner.flag.subscribe());
            match &self.inner.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = own => {}
                        _ = parent.cancelled() => {}
                    }
                }
                None => own.await,
            }
        })
    }
}

async fn wait_for_flag(mut rx: watch::Receiver<bool>) {
    // The sender lives as long as the scope, so this only errors on teardown.
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}
