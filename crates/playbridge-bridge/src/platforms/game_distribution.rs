// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// GameDistribution adapter.
//
// The SDK reads its options (`gameId`) before the script loads and reports
// everything afterwards through `SDK_*` events. Pause/start events do not
// say which ad caused them, so the adapter remembers the last requested kind.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playbridge_core::error::Result;
use playbridge_core::types::{BannerState, InterstitialState, RewardedState, SdkEvent};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::str_field;
use crate::core::AdapterCore;
use crate::traits::*;

pub const SDK_URL: &str = "https://html5.api.gamedistribution.com/main.min.js";
const SDK_GLOBAL: &str = "gdsdk";

pub struct GameDistributionAdapter {
    core: AdapterCore,
    rewarded_in_flight: AtomicBool,
}

impl GameDistributionAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            rewarded_in_flight: AtomicBool::new(false),
        }
    }

    fn rewarded_in_flight(&self) -> bool {
        self.rewarded_in_flight.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AdapterBase for GameDistributionAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "game_distribution"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let game_id = self.core.require_option("gameId")?;
                self.core
                    .call("GD_OPTIONS.configure", json!({ "gameId": game_id }))
                    .await?;
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                if let Err(e) = self
                    .core
                    .call("gdsdk.preloadAd", json!({ "type": "rewarded" }))
                    .await
                {
                    warn!(error = %e, "rewarded preload failed");
                }
                info!(game_id = %game_id, "gamedistribution sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let rewarded = self.rewarded_in_flight();
        match event.name.as_str() {
            "SDK_GAME_PAUSE" if rewarded => {
                self.core.rewarded().set(RewardedState::Opened);
            }
            "SDK_GAME_PAUSE" => {
                self.core.interstitial().set(InterstitialState::Opened);
            }
            "SDK_GAME_START" if rewarded => {
                self.core.rewarded().set(RewardedState::Closed);
            }
            "SDK_GAME_START" => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            "SDK_REWARDED_WATCH_COMPLETE" => {
                self.core.rewarded().set(RewardedState::Rewarded);
            }
            "AD_ERROR" if rewarded => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            "AD_ERROR" => {
                self.core.interstitial().set(InterstitialState::Failed);
            }
            other => debug!(event = other, "ignored gamedistribution event"),
        }
    }
}

impl SessionCapability for GameDistributionAdapter {}
impl StorageCapability for GameDistributionAdapter {}

#[async_trait]
impl AdvertisementCapability for GameDistributionAdapter {
    fn is_banner_supported(&self) -> bool {
        true
    }

    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_banner(&self, options: Value) {
        let banner = self.core.banner();
        let Some(container) = str_field(&options, "containerId") else {
            warn!("display ad requested without containerId");
            banner.set(BannerState::Failed);
            return;
        };
        banner.set(BannerState::Loading);
        let shown = self
            .core
            .call("gdsdk.showAd", json!({ "type": "display", "containerId": container }))
            .await;
        banner.set(if shown.is_ok() { BannerState::Shown } else { BannerState::Failed });
    }

    /// The SDK has no call to remove display ads.
    async fn hide_banner(&self) {
        self.core.banner().set(BannerState::Hidden);
    }

    async fn show_interstitial(&self, _options: Value) {
        self.rewarded_in_flight.store(false, Ordering::Release);
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("gdsdk.showAd", json!({ "type": "interstitial" })).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        self.rewarded_in_flight.store(true, Ordering::Release);
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("gdsdk.showAd", json!({ "type": "rewarded" })).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }
}

impl SocialCapability for GameDistributionAdapter {}
impl LeaderboardCapability for GameDistributionAdapter {}
impl PaymentsCapability for GameDistributionAdapter {}
impl RemoteConfigCapability for GameDistributionAdapter {}
impl ClipboardCapability for GameDistributionAdapter {}
