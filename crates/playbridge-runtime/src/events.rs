// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synchronous publish/subscribe owned by each stateful component.
//
// Listeners run on the emitting thread, in subscription order, after the
// listener list lock has been released, so a listener may subscribe,
// unsubscribe or emit again without deadlocking. A panicking listener is not
// caught.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

/// Handle returned by [`EventEmitter::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Fan-out of events of type `E` to registered listeners.
pub struct EventEmitter<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener. It stays registered until [`unsubscribe`] is
    /// called with the returned id.
    ///
    /// [`unsubscribe`]: EventEmitter::unsubscribe
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        trace!(listeners = snapshot.len(), "emitting event");
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|l| l.len())
            .unwrap_or(0)
    }
}
