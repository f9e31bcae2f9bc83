// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Game-facing advertisement calls.
//
// Sits in front of the adapter's `AdvertisementCapability`: resolves
// per-platform options, drops requests while another ad is on screen, and
// enforces the minimum delay between interstitials. The delay starts every
// time an interstitial closes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use playbridge_core::error::Result;
use playbridge_core::types::{BannerState, InterstitialState, PlatformId, RewardedState};
use playbridge_runtime::{CooldownTimer, ListenerId};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::options::platform_options;
use crate::traits::{AdapterBase, AdvertisementCapability, PlatformAdapter};

/// Interstitial spacing shared with the state listener.
struct Cooldown {
    runtime: Handle,
    delay: Mutex<Duration>,
    timer: Mutex<Option<Arc<CooldownTimer>>>,
}

impl Cooldown {
    /// Replace any current timer with a fresh one. A zero delay only clears.
    fn restart(&self) {
        let delay = *lock(&self.delay);
        let fresh = (!delay.is_zero()).then(|| Arc::new(CooldownTimer::new(delay, self.runtime.clone())));
        let previous = std::mem::replace(&mut *lock(&self.timer), fresh.clone());
        if let Some(previous) = previous {
            previous.stop();
        }
        if let Some(timer) = fresh {
            timer.start();
        }
    }

    fn timer(&self) -> Option<Arc<CooldownTimer>> {
        lock(&self.timer).clone()
    }

    fn is_running(&self) -> bool {
        self.timer().is_some_and(|timer| timer.is_running())
    }
}

pub struct AdvertisementModule {
    adapter: Arc<dyn PlatformAdapter>,
    cooldown: Arc<Cooldown>,
    listener: ListenerId,
}

impl AdvertisementModule {
    /// Attach to `adapter`'s interstitial state. Cooldown ticks are spawned
    /// on `runtime`.
    pub fn new(adapter: Arc<dyn PlatformAdapter>, delay: Duration, runtime: Handle) -> Self {
        let cooldown = Arc::new(Cooldown {
            runtime,
            delay: Mutex::new(delay),
            timer: Mutex::new(None),
        });
        let on_state = Arc::clone(&cooldown);
        let listener = adapter.core().interstitial().subscribe(move |state: &InterstitialState| {
            if *state == InterstitialState::Closed {
                on_state.restart();
            }
        });
        Self {
            adapter,
            cooldown,
            listener,
        }
    }

    fn platform_id(&self) -> PlatformId {
        self.adapter.platform_id()
    }

    // -- State ---------------------------------------------------------------

    pub fn interstitial_state(&self) -> Option<InterstitialState> {
        self.adapter.interstitial_state()
    }

    pub fn rewarded_state(&self) -> Option<RewardedState> {
        self.adapter.rewarded_state()
    }

    pub fn banner_state(&self) -> Option<BannerState> {
        self.adapter.banner_state()
    }

    pub fn is_banner_supported(&self) -> bool {
        self.adapter.is_banner_supported()
    }

    pub fn is_interstitial_supported(&self) -> bool {
        self.adapter.is_interstitial_supported()
    }

    pub fn is_rewarded_supported(&self) -> bool {
        self.adapter.is_rewarded_supported()
    }

    // -- Cooldown ------------------------------------------------------------

    pub fn minimum_delay_between_interstitial(&self) -> Duration {
        *lock(&self.cooldown.delay)
    }

    /// Time left before the next interstitial may be shown.
    pub fn interstitial_cooldown_remaining(&self) -> Duration {
        match self.cooldown.timer() {
            Some(timer) if timer.is_running() => timer.remaining(),
            _ => Duration::ZERO,
        }
    }

    /// Reconfigure the delay from a number of seconds, a numeric string, or
    /// an object keyed by platform id with an optional `default`. Anything
    /// else leaves the delay unchanged and returns `false`.
    ///
    /// A running cooldown restarts with the new duration.
    #[instrument(skip(self), fields(platform = %self.platform_id()))]
    pub fn set_minimum_delay_between_interstitial(&self, setting: &Value) -> bool {
        let Some(secs) = parse_delay(setting, self.platform_id()) else {
            debug!("delay setting ignored");
            return false;
        };
        *lock(&self.cooldown.delay) = Duration::from_secs(secs);
        info!(secs, "minimum delay between interstitials changed");
        if self.cooldown.is_running() {
            self.cooldown.restart();
        }
        true
    }

    // -- Requests ------------------------------------------------------------

    fn ad_in_progress(&self) -> bool {
        matches!(
            self.interstitial_state(),
            Some(InterstitialState::Loading | InterstitialState::Opened)
        ) || matches!(
            self.rewarded_state(),
            Some(RewardedState::Loading | RewardedState::Opened | RewardedState::Rewarded)
        )
    }

    /// Show an interstitial unless one is on screen or the cooldown is
    /// running. `ignoreDelay: true` in `options` bypasses the cooldown as
    /// well.
    #[instrument(skip_all, fields(platform = %self.platform_id()))]
    pub async fn show_interstitial(&self, options: Value, ignore_delay: bool) {
        if self.ad_in_progress() {
            debug!("interstitial dropped, ad in progress");
            return;
        }
        let options = platform_options(&options, self.platform_id());
        let ignore_delay =
            ignore_delay || options.get("ignoreDelay").and_then(Value::as_bool).unwrap_or(false);

        if !ignore_delay && self.cooldown.is_running() {
            debug!(
                remaining_secs = self.interstitial_cooldown_remaining().as_secs(),
                "interstitial refused during cooldown"
            );
            let state = self.adapter.core().interstitial();
            state.set(InterstitialState::Loading);
            state.set(InterstitialState::Failed);
            return;
        }
        self.adapter.show_interstitial(options).await;
    }

    #[instrument(skip_all, fields(platform = %self.platform_id()))]
    pub async fn show_rewarded(&self, options: Value) {
        if self.ad_in_progress() {
            debug!("rewarded dropped, ad in progress");
            return;
        }
        let options = platform_options(&options, self.platform_id());
        self.adapter.show_rewarded(options).await;
    }

    /// Ignored while a banner is loading or shown.
    pub async fn show_banner(&self, options: Value) {
        if matches!(self.banner_state(), Some(BannerState::Loading | BannerState::Shown)) {
            return;
        }
        if !self.is_banner_supported() {
            self.adapter.core().banner().set(BannerState::Failed);
            return;
        }
        let options = platform_options(&options, self.platform_id());
        self.adapter.show_banner(options).await;
    }

    pub async fn hide_banner(&self) {
        if matches!(self.banner_state(), Some(BannerState::Loading | BannerState::Hidden)) {
            return;
        }
        if !self.is_banner_supported() {
            return;
        }
        self.adapter.hide_banner().await;
    }

    pub async fn check_ad_block(&self) -> Result<bool> {
        self.adapter.check_ad_block().await
    }
}

impl Drop for AdvertisementModule {
    fn drop(&mut self) {
        self.adapter.core().interstitial().unsubscribe(self.listener);
        if let Some(timer) = self.cooldown.timer() {
            timer.stop();
        }
    }
}

fn parse_delay(setting: &Value, platform: PlatformId) -> Option<u64> {
    match setting {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map
            .get(platform.as_str())
            .or_else(|| map.get("default"))
            .and_then(|inner| parse_delay(inner, platform)),
        _ => None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
