// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Playgama adapter.
//
// Ads only. `advService.showInterstitial` and `advService.showRewarded` take
// callbacks, which the host reports as `interstitial.<callback>` and
// `rewarded.<callback>` SDK events.

use async_trait::async_trait;
use playbridge_core::error::Result;
use playbridge_core::types::{InterstitialState, RewardedState, SdkEvent};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::AdapterCore;
use crate::traits::*;

pub const SDK_URL: &str = "https://developer.playgama.com/sdk/v1.js";
const SDK_GLOBAL: &str = "PLAYGAMA_SDK";

pub struct PlaygamaAdapter {
    core: AdapterCore,
}

impl PlaygamaAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl AdapterBase for PlaygamaAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "playgama"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                info!("playgama sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        match event.name.as_str() {
            "interstitial.open" => {
                self.core.interstitial().set(InterstitialState::Opened);
            }
            "interstitial.close" => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            "interstitial.empty" | "interstitial.error" => {
                self.core.interstitial().set(InterstitialState::Failed);
            }
            "rewarded.open" => {
                self.core.rewarded().set(RewardedState::Opened);
            }
            "rewarded.rewarded" => {
                self.core.rewarded().set(RewardedState::Rewarded);
            }
            "rewarded.close" => {
                self.core.rewarded().set(RewardedState::Closed);
            }
            "rewarded.empty" | "rewarded.error" => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            other => debug!(event = other, "ignored playgama event"),
        }
    }
}

impl SessionCapability for PlaygamaAdapter {}
impl StorageCapability for PlaygamaAdapter {}

#[async_trait]
impl AdvertisementCapability for PlaygamaAdapter {
    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("PLAYGAMA_SDK.advService.showInterstitial", json!({})).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("PLAYGAMA_SDK.advService.showRewarded", json!({})).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }
}

#[async_trait]
impl SocialCapability for PlaygamaAdapter {
    fn is_external_links_allowed(&self) -> bool {
        false
    }
}

impl LeaderboardCapability for PlaygamaAdapter {}
impl PaymentsCapability for PlaygamaAdapter {}
impl RemoteConfigCapability for PlaygamaAdapter {}
impl ClipboardCapability for PlaygamaAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    async fn playgama() -> (PlaygamaAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        let adapter = PlaygamaAdapter::new(core_with(
            PlatformId::Playgama,
            "https://playgama.com/game/1",
            sdk.clone(),
            Value::Null,
        ));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn rewarded_callbacks_drive_state() {
        let (adapter, sdk) = playgama().await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(sdk.count("PLAYGAMA_SDK.advService.showRewarded"), 1);
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Loading));
        for name in ["rewarded.open", "rewarded.rewarded", "rewarded.close"] {
            adapter.handle_sdk_event(&SdkEvent::new(name));
        }
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));
    }

    #[tokio::test]
    async fn empty_inventory_fails_interstitial() {
        let (adapter, _) = playgama().await;
        adapter.show_interstitial(json!({})).await;
        adapter.handle_sdk_event(&SdkEvent::new("interstitial.empty"));
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Failed));
        assert!(!adapter.is_external_links_allowed());
    }
}
