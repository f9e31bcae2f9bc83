// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Poki adapter.
//
// Poki breaks resolve when the ad is over, so ad state is driven directly
// from the call rather than from SDK events.

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{ActionKind, InterstitialState, PlatformMessage, RewardedState};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::AdapterCore;
use crate::traits::*;

pub const SDK_URL: &str = "https://game-cdn.poki.com/scripts/v2/poki-sdk.js";
const SDK_GLOBAL: &str = "PokiSDK";

pub struct PokiAdapter {
    core: AdapterCore,
}

impl PokiAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl AdapterBase for PokiAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "poki"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.core.call("PokiSDK.init", Value::Null).await?;
                info!("poki sdk ready");
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SessionCapability for PokiAdapter {
    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let method = match message {
            PlatformMessage::GameReady => "PokiSDK.gameLoadingFinished",
            PlatformMessage::GameplayStarted => "PokiSDK.gameplayStart",
            PlatformMessage::GameplayStopped => "PokiSDK.gameplayStop",
            _ => return Ok(()),
        };
        self.core.call(method, Value::Null).await.map(|_| ())
    }
}

impl StorageCapability for PokiAdapter {}

#[async_trait]
impl AdvertisementCapability for PokiAdapter {
    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "commercial break before initialize");
            state.set(InterstitialState::Failed);
            return;
        }
        state.set(InterstitialState::Opened);
        match self.core.call("PokiSDK.commercialBreak", Value::Null).await {
            Ok(_) => {
                state.set(InterstitialState::Closed);
            }
            Err(e) => {
                warn!(error = %e, "commercial break failed");
                state.set(InterstitialState::Failed);
            }
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "rewarded break before initialize");
            state.set(RewardedState::Failed);
            return;
        }
        state.set(RewardedState::Opened);
        match self.core.call("PokiSDK.rewardedBreak", Value::Null).await {
            Ok(Value::Bool(true)) => {
                state.set(RewardedState::Rewarded);
                state.set(RewardedState::Closed);
            }
            Ok(_) => {
                warn!("rewarded break ended without reward");
                state.set(RewardedState::Failed);
            }
            Err(e) => {
                warn!(error = %e, "rewarded break failed");
                state.set(RewardedState::Failed);
            }
        }
    }
}

#[async_trait]
impl SocialCapability for PokiAdapter {
    fn is_share_supported(&self) -> bool {
        true
    }

    fn is_external_links_allowed(&self) -> bool {
        false
    }

    /// Creates a shareable URL from the `options` object.
    async fn share(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::Share, || async {
                match self.core.call("PokiSDK.shareableURL", options).await? {
                    Value::String(url) if !url.is_empty() => Ok(()),
                    other => Err(BridgeError::MalformedResponse(format!(
                        "shareable URL is not a string: {other}"
                    ))),
                }
            })
            .await
    }
}

impl LeaderboardCapability for PokiAdapter {}
impl PaymentsCapability for PokiAdapter {}
impl RemoteConfigCapability for PokiAdapter {}
impl ClipboardCapability for PokiAdapter {}
