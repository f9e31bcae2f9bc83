// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keyed registry of in-flight asynchronous operations.
//
// At most one deferred exists per action kind. Callers use get-or-create:
// only the caller that created the entry issues the underlying platform
// request, everyone else awaits the same shared handle. An entry is removed
// the moment it settles.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use playbridge_core::error::BridgeError;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Settled value of a deferred.
pub type Outcome = Result<Value, BridgeError>;

/// Cloneable consumer side of a deferred.
pub type DeferredHandle = Shared<BoxFuture<'static, Outcome>>;

struct Pending {
    sender: oneshot::Sender<Outcome>,
    handle: DeferredHandle,
}

fn pending_pair() -> Pending {
    let (sender, receiver) = oneshot::channel();
    // A dropped sender means the entry was overwritten or abandoned.
    let handle = receiver
        .map(|settled| settled.unwrap_or(Err(BridgeError::Cancelled)))
        .boxed()
        .shared();
    Pending { sender, handle }
}

/// Registry of pending operations keyed by `K`.
pub struct DeferredRegistry<K> {
    pending: Mutex<HashMap<K, Pending>>,
}

impl<K> Default for DeferredRegistry<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> DeferredRegistry<K>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Handle of the outstanding deferred for `kind`, if any.
    pub fn get(&self, kind: K) -> Option<DeferredHandle> {
        self.lock().get(&kind).map(|p| p.handle.clone())
    }

    pub fn is_pending(&self, kind: K) -> bool {
        self.lock().contains_key(&kind)
    }

    /// Create a fresh deferred for `kind`, replacing any outstanding one.
    ///
    /// Waiters on a replaced deferred observe [`BridgeError::Cancelled`].
    pub fn create(&self, kind: K) -> DeferredHandle {
        let pending = pending_pair();
        let handle = pending.handle.clone();
        if self.lock().insert(kind, pending).is_some() {
            warn!(?kind, "replaced an outstanding deferred");
        }
        handle
    }

    /// The outstanding handle for `kind`, or a new one. The flag is `true`
    /// when this call created it and must therefore start the operation.
    pub fn get_or_create(&self, kind: K) -> (DeferredHandle, bool) {
        let mut pending = self.lock();
        if let Some(existing) = pending.get(&kind) {
            return (existing.handle.clone(), false);
        }
        let fresh = pending_pair();
        let handle = fresh.handle.clone();
        pending.insert(kind, fresh);
        (handle, true)
    }

    /// Settle `kind` successfully. No-op (returns `false`) when nothing is
    /// pending.
    pub fn resolve(&self, kind: K, value: Value) -> bool {
        self.settle(kind, Ok(value))
    }

    /// Settle `kind` with an error. No-op (returns `false`) when nothing is
    /// pending.
    pub fn reject(&self, kind: K, error: BridgeError) -> bool {
        self.settle(kind, Err(error))
    }

    fn settle(&self, kind: K, outcome: Outcome) -> bool {
        let Some(pending) = self.lock().remove(&kind) else {
            return false;
        };
        debug!(?kind, ok = outcome.is_ok(), "deferred settled");
        // Receiver side lives in the shared handle; a send error only means
        // nobody is waiting any more.
        let _ = pending.sender.send(outcome);
        true
    }

    /// Run `op` at most once per concurrent burst of callers.
    ///
    /// The caller that creates the entry runs `op` and settles the entry with
    /// its outcome; every caller returns the shared outcome. If the creating
    /// future is dropped before `op` finishes, the entry is rejected with
    /// [`BridgeError::Cancelled`].
    pub async fn run_exclusive<F, Fut>(&self, kind: K, op: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let (handle, created) = self.get_or_create(kind);
        if created {
            let mut guard = SettleGuard {
                registry: self,
                kind,
                armed: true,
            };
            let outcome = op().await;
            guard.armed = false;
            self.settle(kind, outcome);
        } else {
            debug!(?kind, "joining in-flight operation");
        }
        handle.await
    }

    /// Await `handle`, rejecting `kind` with [`BridgeError::Timeout`] if it
    /// has not settled within `limit`.
    pub async fn wait_with_timeout(
        &self,
        kind: K,
        handle: DeferredHandle,
        limit: Duration,
    ) -> Outcome {
        match tokio::time::timeout(limit, handle.clone()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(?kind, limit_ms = limit.as_millis() as u64, "deferred timed out");
                self.reject(kind, BridgeError::Timeout(format!("{kind:?}")));
                handle.await
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SettleGuard<'a, K>
where
    K: Copy + Eq + Hash + Debug,
{
    registry: &'a DeferredRegistry<K>,
    kind: K,
    armed: bool,
}

impl<K> Drop for SettleGuard<'_, K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn drop(&mut self) {
        if self.armed {
            self.registry.reject(self.kind, BridgeError::Cancelled);
        }
    }
}
