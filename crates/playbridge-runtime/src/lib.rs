// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Playbridge Runtime: the platform-independent machinery every adapter
// shares: synchronous event emitters, ad lifecycle state machines, the
// keyed registry of in-flight operations, and the interstitial cooldown
// timer.

pub mod deferred;
pub mod events;
pub mod state;
pub mod timer;

pub use deferred::{DeferredHandle, DeferredRegistry, Outcome};
pub use events::{EventEmitter, ListenerId};
pub use state::{AdLifecycle, StateMachine};
pub use timer::{CooldownTimer, TimerState};
