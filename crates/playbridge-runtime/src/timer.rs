// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Countdown timer used to space out interstitial ads.
//
// created/completed --start()--> started --stop()--> stopped
//                                started --(remaining hits 0)--> completed
//
// A background task ticks once per second while the timer is started. The
// task is aborted on stop and exits by itself on completion.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use crate::events::{EventEmitter, ListenerId};

const TICK: Duration = Duration::from_secs(1);

/// Timer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Created,
    Started,
    Stopped,
    Completed,
}

#[derive(Debug)]
struct TimerInner {
    state: TimerState,
    remaining_secs: u64,
}

/// One-second resolution countdown with observable state.
pub struct CooldownTimer {
    duration_secs: u64,
    inner: Arc<Mutex<TimerInner>>,
    events: Arc<EventEmitter<TimerState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl CooldownTimer {
    /// Create a timer in the `Created` state. Ticks are spawned on `runtime`.
    pub fn new(duration: Duration, runtime: Handle) -> Self {
        let duration_secs = duration.as_secs();
        Self {
            duration_secs,
            inner: Arc::new(Mutex::new(TimerInner {
                state: TimerState::Created,
                remaining_secs: duration_secs,
            })),
            events: Arc::new(EventEmitter::new()),
            task: Mutex::new(None),
            runtime,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn state(&self) -> TimerState {
        self.inner.lock().map(|i| i.state).unwrap_or(TimerState::Stopped)
    }

    pub fn remaining(&self) -> Duration {
        let secs = self.inner.lock().map(|i| i.remaining_secs).unwrap_or(0);
        Duration::from_secs(secs)
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Started
    }

    /// Start counting down from the full duration. Ignored unless the timer
    /// is `Created` or `Completed`.
    pub fn start(&self) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if !matches!(inner.state, TimerState::Created | TimerState::Completed) {
                debug!(state = ?inner.state, "timer start ignored");
                return;
            }
            inner.state = TimerState::Started;
            inner.remaining_secs = self.duration_secs;
        }
        info!(secs = self.duration_secs, "cooldown timer started");
        self.events.emit(&TimerState::Started);

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let handle = self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let completed = {
                    let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
                    if guard.state != TimerState::Started {
                        return;
                    }
                    guard.remaining_secs = guard.remaining_secs.saturating_sub(1);
                    if guard.remaining_secs == 0 {
                        guard.state = TimerState::Completed;
                        true
                    } else {
                        false
                    }
                };
                if completed {
                    debug!("cooldown timer completed");
                    events.emit(&TimerState::Completed);
                    return;
                }
            }
        });

        if let Some(previous) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    /// Stop a running timer. Ignored unless the timer is `Started`.
    pub fn stop(&self) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.state != TimerState::Started {
                return;
            }
            inner.state = TimerState::Stopped;
        }
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
        debug!("cooldown timer stopped");
        self.events.emit(&TimerState::Stopped);
    }

    pub fn subscribe(&self, listener: impl Fn(&TimerState) + Send + Sync + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}
