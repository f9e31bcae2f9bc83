// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CrazyGames adapter (SDK v3).
//
// Both ad kinds share one callback set, reported as `ad.adStarted`,
// `ad.adFinished` and `ad.adError` events. The adapter remembers which kind
// was requested last to route them.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, DeviceType, InterstitialState, PlatformMessage, PlayerInfo,
    RewardedState, SdkEvent, StorageType,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{decode, str_field};
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

pub const SDK_URL: &str = "https://sdk.crazygames.com/crazygames-sdk-v3.js";
const SDK_GLOBAL: &str = "CrazyGames.SDK";

pub struct CrazyGamesAdapter {
    core: AdapterCore,
    account_available: AtomicBool,
    rewarded_in_flight: AtomicBool,
    device: Mutex<Option<DeviceType>>,
}

impl CrazyGamesAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            account_available: AtomicBool::new(false),
            rewarded_in_flight: AtomicBool::new(false),
            device: Mutex::new(None),
        }
    }

    fn account_available(&self) -> bool {
        self.account_available.load(Ordering::Acquire)
    }

    /// Country code and device class from `user.systemInfo`.
    async fn load_system_info(&self) -> Result<()> {
        let info = self.core.call("user.systemInfo", Value::Null).await?;
        if let Some(country) = str_field(&info, "countryCode") {
            self.core.set_language(country.to_ascii_lowercase());
        }
        if let Some(kind) = info.pointer("/device/type").and_then(Value::as_str) {
            match decode::<DeviceType>("device type", json!(kind.to_ascii_lowercase())) {
                Ok(device) => *self.device.lock().unwrap_or_else(|e| e.into_inner()) = Some(device),
                Err(e) => debug!(error = %e, "ignoring device type"),
            }
        }
        Ok(())
    }

    /// Signed-in user, if any. Switches storage to the platform once known.
    async fn load_player(&self) -> Result<()> {
        let user = self.core.call("user.getUser", Value::Null).await?;
        if user.is_null() {
            return Err(BridgeError::Sdk("no signed-in user".into()));
        }
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(&user, "userId"),
            name: str_field(&user, "username"),
            photos: str_field(&user, "profilePictureUrl").into_iter().collect(),
        });
        self.core.set_default_storage_type(StorageType::PlatformInternal);
        Ok(())
    }
}

#[async_trait]
impl AdapterBase for CrazyGamesAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "crazy_games"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.core.call("CrazyGames.SDK.init", Value::Null).await?;

                let available = self
                    .core
                    .call("user.isUserAccountAvailable", Value::Null)
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                self.account_available.store(available, Ordering::Release);

                if available {
                    if let Err(e) = self.load_system_info().await {
                        warn!(error = %e, "system info unavailable");
                    }
                    // A guest session is not a failed start.
                    if let Err(e) = self.load_player().await {
                        debug!(error = %e, "player not signed in");
                    }
                }
                info!(account_available = available, "crazygames sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let rewarded = self.rewarded_in_flight.load(Ordering::Acquire);
        match (event.name.as_str(), rewarded) {
            ("ad.adStarted", false) => {
                self.core.interstitial().set(InterstitialState::Opened);
            }
            ("ad.adStarted", true) => {
                self.core.rewarded().set(RewardedState::Opened);
            }
            ("ad.adFinished", false) => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            ("ad.adFinished", true) => {
                self.core.rewarded().set(RewardedState::Rewarded);
                self.core.rewarded().set(RewardedState::Closed);
            }
            ("ad.adError", false) => {
                self.core.interstitial().set(InterstitialState::Failed);
            }
            ("ad.adError", true) => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            (other, _) => debug!(event = other, "unhandled crazygames event"),
        }
    }
}

#[async_trait]
impl SessionCapability for CrazyGamesAdapter {
    fn device_type(&self) -> DeviceType {
        if let Some(device) = *self.device.lock().unwrap_or_else(|e| e.into_inner()) {
            return device;
        }
        self.core
            .page()
            .user_agent()
            .map(DeviceType::from_user_agent)
            .unwrap_or(DeviceType::Desktop)
    }

    fn is_player_authorization_supported(&self) -> bool {
        self.account_available()
    }

    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.account_available() {
            return Err(BridgeError::Unsupported);
        }
        if self.core.player().authorized {
            return Ok(());
        }
        self.core
            .exclusive(ActionKind::AuthorizePlayer, || async {
                self.core.call("user.showAuthPrompt", Value::Null).await?;
                self.load_player().await
            })
            .await
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let method = match message {
            PlatformMessage::InGameLoadingStarted => "game.loadingStart",
            PlatformMessage::InGameLoadingStopped => "game.loadingStop",
            PlatformMessage::GameplayStarted => "game.gameplayStart",
            PlatformMessage::GameplayStopped => "game.gameplayStop",
            PlatformMessage::PlayerGotAchievement => "game.happytime",
            PlatformMessage::GameReady | PlatformMessage::GameOver => return Ok(()),
        };
        self.core.call(method, Value::Null).await.map(|_| ())
    }
}

#[async_trait]
impl StorageCapability for CrazyGamesAdapter {
    fn is_storage_supported(&self, _storage: StorageType) -> bool {
        true
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => self.core.is_initialized(),
        }
    }

    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.core.ensure_initialized()?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let raw = self.core.call("data.getItem", json!({ "key": key })).await?;
            values.push(match raw {
                Value::String(raw) => decode_value(&raw, try_parse_json),
                other => other,
            });
        }
        Ok(values)
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        for (key, value) in keys.iter().zip(values) {
            self.core
                .call("data.setItem", json!({ "key": key, "value": encode_value(value) }))
                .await?;
        }
        Ok(())
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        for key in keys {
            self.core.call("data.removeItem", json!({ "key": key })).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AdvertisementCapability for CrazyGamesAdapter {
    fn is_banner_supported(&self) -> bool {
        true
    }

    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    /// Requires a `containerId` naming the element that hosts the banner.
    async fn show_banner(&self, options: Value) {
        let banner = self.core.banner();
        let Some(container) = str_field(&options, "containerId") else {
            warn!("banner requested without containerId");
            banner.set(BannerState::Failed);
            return;
        };
        banner.set(BannerState::Loading);
        let shown = self
            .core
            .call("banner.requestResponsiveBanner", json!({ "containerId": container }))
            .await;
        banner.set(match shown {
            Ok(_) => BannerState::Shown,
            Err(e) => {
                warn!(error = %e, "responsive banner failed");
                BannerState::Failed
            }
        });
    }

    async fn hide_banner(&self) {
        if let Err(e) = self.core.call("banner.clearAllBanners", Value::Null).await {
            warn!(error = %e, "clearing banners failed");
        }
        self.core.banner().set(BannerState::Hidden);
    }

    async fn show_interstitial(&self, _options: Value) {
        self.rewarded_in_flight.store(false, Ordering::Release);
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let requested = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("ad.requestAd", json!({ "adType": "midgame" })).await,
            Err(e) => Err(e),
        };
        if let Err(e) = requested {
            warn!(error = %e, "midgame ad request failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        self.rewarded_in_flight.store(true, Ordering::Release);
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let requested = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("ad.requestAd", json!({ "adType": "rewarded" })).await,
            Err(e) => Err(e),
        };
        if let Err(e) = requested {
            warn!(error = %e, "rewarded ad request failed");
            state.set(RewardedState::Failed);
        }
    }

    async fn check_ad_block(&self) -> Result<bool> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::CheckAdBlock, || async {
                Ok(self
                    .core
                    .call("ad.hasAdblock", Value::Null)
                    .await?
                    .as_bool()
                    .unwrap_or(false))
            })
            .await
    }
}

#[async_trait]
impl SocialCapability for CrazyGamesAdapter {
    fn is_invite_friends_supported(&self) -> bool {
        true
    }

    /// Builds an invite link carrying `options` as query parameters.
    async fn invite_friends(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::InviteFriends, || async {
                let link = self.core.call("game.inviteLink", options).await?;
                match link.as_str() {
                    Some(link) if !link.is_empty() => {
                        debug!(link, "invite link created");
                        Ok(())
                    }
                    _ => Err(BridgeError::MalformedResponse("invite link is not a string".into())),
                }
            })
            .await
    }
}

impl LeaderboardCapability for CrazyGamesAdapter {}
impl PaymentsCapability for CrazyGamesAdapter {}
impl RemoteConfigCapability for CrazyGamesAdapter {}
impl ClipboardCapability for CrazyGamesAdapter {}
