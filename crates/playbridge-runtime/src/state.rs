// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ad surface lifecycles.
//
// Each surface (interstitial, rewarded, banner) is an independent state
// variable. Setting the current state again is ignored, except `failed`,
// which is always re-emitted so callers observe every failure.

use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use playbridge_core::types::{BannerState, InterstitialState, RewardedState};
use tracing::{debug, warn};

use crate::events::{EventEmitter, ListenerId};

/// Behaviour shared by the ad state enums.
pub trait AdLifecycle: Copy + Eq + Debug + Send + Sync + 'static {
    /// Name used in logs.
    const SURFACE: &'static str;

    fn is_failed(&self) -> bool;

    /// Whether `to` is an expected successor of `from` (`None` = no state yet).
    fn is_valid_transition(from: Option<Self>, to: Self) -> bool;
}

impl AdLifecycle for InterstitialState {
    const SURFACE: &'static str = "interstitial";

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    fn is_valid_transition(from: Option<Self>, to: Self) -> bool {
        use InterstitialState::*;
        match (from, to) {
            (_, Failed) => true,
            (None | Some(Closed) | Some(Failed), Loading) => true,
            (Some(Loading), Opened) => true,
            (Some(Opened), Closed) => true,
            // Platforms that only report completion.
            (Some(Loading), Closed) => true,
            _ => false,
        }
    }
}

impl AdLifecycle for RewardedState {
    const SURFACE: &'static str = "rewarded";

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    fn is_valid_transition(from: Option<Self>, to: Self) -> bool {
        use RewardedState::*;
        match (from, to) {
            (_, Failed) => true,
            (None | Some(Closed) | Some(Failed), Loading) => true,
            (Some(Loading), Opened) => true,
            (Some(Loading) | Some(Opened), Rewarded) => true,
            (Some(Loading) | Some(Opened) | Some(Rewarded), Closed) => true,
            _ => false,
        }
    }
}

impl AdLifecycle for BannerState {
    const SURFACE: &'static str = "banner";

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    fn is_valid_transition(from: Option<Self>, to: Self) -> bool {
        use BannerState::*;
        match (from, to) {
            (_, Failed) => true,
            (_, Loading) => true,
            (Some(Loading) | Some(Hidden), Shown) => true,
            (Some(Loading) | Some(Shown), Hidden) => true,
            _ => false,
        }
    }
}

/// One observable lifecycle variable.
pub struct StateMachine<S: AdLifecycle> {
    current: Mutex<Option<S>>,
    events: EventEmitter<S>,
}

impl<S: AdLifecycle> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AdLifecycle> StateMachine<S> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            events: EventEmitter::new(),
        }
    }

    /// Current state; `None` until the first transition.
    pub fn get(&self) -> Option<S> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `state`, notifying subscribers. Returns whether an event was
    /// emitted.
    pub fn set(&self, state: S) -> bool {
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *current;
            if previous == Some(state) && !state.is_failed() {
                return false;
            }
            *current = Some(state);
            previous
        };

        if !S::is_valid_transition(previous, state) {
            warn!(surface = S::SURFACE, from = ?previous, to = ?state, "unexpected ad state transition");
        } else {
            debug!(surface = S::SURFACE, from = ?previous, to = ?state, "ad state changed");
        }

        self.events.emit(&state);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn recorder<S: AdLifecycle>(machine: &StateMachine<S>) -> Arc<Mutex<Vec<S>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        machine.subscribe(move |s| sink.lock().unwrap().push(*s));
        seen
    }

    #[test]
    fn repeated_state_is_ignored() {
        let machine = StateMachine::<InterstitialState>::new();
        let seen = recorder(&machine);

        assert!(machine.set(InterstitialState::Loading));
        assert!(!machine.set(InterstitialState::Loading));
        assert!(machine.set(InterstitialState::Opened));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![InterstitialState::Loading, InterstitialState::Opened]
        );
    }

    #[test]
    fn failed_always_reemits() {
        let machine = StateMachine::<BannerState>::new();
        let seen = recorder(&machine);

        machine.set(BannerState::Failed);
        machine.set(BannerState::Failed);

        assert_eq!(*seen.lock().unwrap(), vec![BannerState::Failed, BannerState::Failed]);
        assert_eq!(machine.get(), Some(BannerState::Failed));
    }

    #[test]
    fn interstitial_transition_table() {
        use InterstitialState::*;
        assert!(InterstitialState::is_valid_transition(None, Loading));
        assert!(InterstitialState::is_valid_transition(Some(Loading), Opened));
        assert!(InterstitialState::is_valid_transition(Some(Opened), Closed));
        assert!(InterstitialState::is_valid_transition(Some(Opened), Failed));
        assert!(InterstitialState::is_valid_transition(Some(Closed), Loading));
        assert!(!InterstitialState::is_valid_transition(Some(Closed), Opened));
        assert!(!InterstitialState::is_valid_transition(Some(Opened), Loading));
    }

    #[test]
    fn rewarded_may_close_without_reward() {
        use RewardedState::*;
        assert!(RewardedState::is_valid_transition(Some(Opened), Rewarded));
        assert!(RewardedState::is_valid_transition(Some(Rewarded), Closed));
        assert!(RewardedState::is_valid_transition(Some(Opened), Closed));
        assert!(!RewardedState::is_valid_transition(Some(Closed), Rewarded));
    }

    #[test]
    fn banner_toggles_between_shown_and_hidden() {
        use BannerState::*;
        assert!(BannerState::is_valid_transition(Some(Loading), Shown));
        assert!(BannerState::is_valid_transition(Some(Shown), Hidden));
        assert!(BannerState::is_valid_transition(Some(Hidden), Shown));
        assert!(!BannerState::is_valid_transition(None, Shown));
    }

    #[test]
    fn unexpected_transition_is_still_applied() {
        let machine = StateMachine::<InterstitialState>::new();
        machine.set(InterstitialState::Closed);
        assert!(machine.set(InterstitialState::Opened));
        assert_eq!(machine.get(), Some(InterstitialState::Opened));
    }
}
