// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Facebook Instant Games adapter.
//
// Capability flags follow `FBInstant.getSupportedAPIs()`, which differs per
// client. Ads use the single `placementId` option, which is required.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, CatalogItem, DeviceType, InterstitialState, LeaderboardEntry,
    LeaderboardQuery, PlatformMessage, PlayerInfo, PurchaseResult, RewardedState, StorageType,
};
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use super::{
    array, catalog_from_sdk, decode, purchase_from_sdk, purchases_from_sdk, rank_field, str_field,
};
use crate::core::AdapterCore;
use crate::traits::*;

pub const SDK_URL: &str = "https://connect.facebook.net/en_US/fbinstant.7.1.js";
const SDK_GLOBAL: &str = "FBInstant";

/// Entries returned when a query asks for none.
const DEFAULT_ENTRY_COUNT: u32 = 5;

#[derive(Default)]
struct Session {
    placement_id: String,
    supported_apis: HashSet<String>,
    client: Option<String>,
}

pub struct FacebookAdapter {
    core: AdapterCore,
    session: Mutex<Session>,
}

impl FacebookAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            session: Mutex::new(Session::default()),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn supports(&self, api: &str) -> bool {
        self.session().supported_apis.contains(api)
    }

    fn placement_id(&self) -> String {
        self.session().placement_id.clone()
    }

    async fn load_player(&self) -> Result<()> {
        let id = self.core.call("FBInstant.player.getID", Value::Null).await?;
        let name = self.core.call("FBInstant.player.getName", Value::Null).await?;
        let photo = self.core.call("FBInstant.player.getPhoto", Value::Null).await?;
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: id.as_str().map(String::from),
            name: name.as_str().map(String::from),
            photos: photo.as_str().map(String::from).into_iter().collect(),
        });
        Ok(())
    }

    /// `en_US` becomes `en`.
    async fn load_language(&self) -> Result<()> {
        let locale = self.core.call("FBInstant.getLocale", Value::Null).await?;
        if let Some(language) = locale.as_str().and_then(|l| l.split('_').next()).filter(|l| !l.is_empty()) {
            self.core.set_language(language.to_ascii_lowercase());
        }
        Ok(())
    }

    async fn start_game(&self) -> Result<()> {
        self.core
            .call("FBInstant.setLoadingProgress", json!({ "percentage": 100 }))
            .await?;
        self.core.call("FBInstant.startGameAsync", Value::Null).await.map(|_| ())
    }

    /// Load, then show, a full-screen ad of `prefix` (`interstitial` or
    /// `rewarded`). `on_open` runs between the two.
    async fn load_and_show(&self, getter: &str, prefix: &str, on_open: impl FnOnce()) -> Result<()> {
        self.core.ensure_initialized()?;
        let ad = self
            .core
            .call(getter, json!({ "placementId": self.placement_id() }))
            .await?;
        self.core.call(&format!("{prefix}.loadAsync"), json!({ "ad": ad })).await?;
        on_open();
        self.core.call(&format!("{prefix}.showAsync"), json!({ "ad": ad })).await?;
        Ok(())
    }

    fn leaderboard_entry(entry: &Value) -> Result<LeaderboardEntry> {
        let player = entry.get("player").unwrap_or(&Value::Null);
        Ok(LeaderboardEntry {
            id: str_field(player, "player_id")
                .ok_or_else(|| BridgeError::MalformedResponse("entry without player_id".into()))?,
            name: str_field(player, "name"),
            score: entry.get("score").and_then(Value::as_i64).unwrap_or(0),
            rank: rank_field(entry, "rank"),
            photo: str_field(player, "photo"),
        })
    }
}

#[async_trait]
impl AdapterBase for FacebookAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "facebook"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let placement_id = self.core.require_option("placementId")?;
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.core.call("FBInstant.initializeAsync", Value::Null).await?;

                self.load_player().await?;
                self.load_language().await?;
                let apis: Vec<String> =
                    decode("supported APIs", self.core.call("FBInstant.getSupportedAPIs", Value::Null).await?)?;
                let client = self.core.call("FBInstant.getPlatform", Value::Null).await?;
                {
                    let mut session = self.session();
                    session.placement_id = placement_id;
                    session.supported_apis = apis.into_iter().collect();
                    session.client = client.as_str().map(String::from);
                }

                self.core.call("FBInstant.startGameAsync", Value::Null).await?;
                info!("instant games sdk ready");
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SessionCapability for FacebookAdapter {
    fn device_type(&self) -> DeviceType {
        match self.session().client.as_deref() {
            Some("IOS" | "ANDROID" | "MOBILE_WEB") => DeviceType::Mobile,
            Some("WEB") => DeviceType::Desktop,
            _ => self
                .core
                .page()
                .user_agent()
                .map(DeviceType::from_user_agent)
                .unwrap_or(DeviceType::Desktop),
        }
    }

    fn is_player_authorization_supported(&self) -> bool {
        true
    }

    /// Instant Games players are always signed in.
    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        match message {
            PlatformMessage::GameReady => self.start_game().await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageCapability for FacebookAdapter {
    fn is_storage_supported(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => true,
            StorageType::PlatformInternal => self.supports("player.getDataAsync"),
        }
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => self.core.is_initialized(),
        }
    }

    /// Values are stored as JSON, so only nested values need stringifying
    /// when parsing is off.
    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.core.ensure_initialized()?;
        let data = self
            .core
            .call("FBInstant.player.getDataAsync", json!({ "keys": keys }))
            .await?;
        Ok(keys
            .iter()
            .map(|key| match data.get(key) {
                None | Some(Value::Null) => Value::Null,
                Some(nested @ (Value::Object(_) | Value::Array(_))) if !try_parse_json => {
                    Value::String(nested.to_string())
                }
                Some(value) => value.clone(),
            })
            .collect())
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        let data: Map<String, Value> = keys.iter().cloned().zip(values.iter().cloned()).collect();
        self.core
            .call("FBInstant.player.setDataAsync", json!({ "data": data }))
            .await
            .map(|_| ())
    }

    /// Deleting writes `null` for each key.
    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        let data: Map<String, Value> = keys.iter().map(|key| (key.clone(), Value::Null)).collect();
        self.core
            .call("FBInstant.player.setDataAsync", json!({ "data": data }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AdvertisementCapability for FacebookAdapter {
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
        banner.set(BannerState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => {
                self.core
                    .call(
                        "FBInstant.loadBannerAdAsync",
                        json!({ "placementId": self.placement_id(), "options": options }),
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        banner.set(match shown {
            Ok(_) => BannerState::Shown,
            Err(e) => {
                warn!(error = %e, "banner failed");
                BannerState::Failed
            }
        });
    }

    async fn hide_banner(&self) {
        let hidden = self.core.call("FBInstant.hideBannerAdAsync", Value::Null).await;
        self.core
            .banner()
            .set(if hidden.is_ok() { BannerState::Hidden } else { BannerState::Failed });
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let shown = self
            .load_and_show("FBInstant.getInterstitialAdAsync", "interstitial", || {
                state.set(InterstitialState::Opened);
            })
            .await;
        match shown {
            Ok(()) => {
                state.set(InterstitialState::Closed);
            }
            Err(e) => {
                warn!(error = %e, "interstitial failed");
                state.set(InterstitialState::Failed);
            }
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let shown = self
            .load_and_show("FBInstant.getRewardedVideoAsync", "rewarded", || {
                state.set(RewardedState::Opened);
            })
            .await;
        match shown {
            Ok(()) => {
                state.set(RewardedState::Rewarded);
                state.set(RewardedState::Closed);
            }
            Err(e) => {
                warn!(error = %e, "rewarded video failed");
                state.set(RewardedState::Failed);
            }
        }
    }
}

#[async_trait]
impl SocialCapability for FacebookAdapter {
    fn is_share_supported(&self) -> bool {
        self.supports("shareAsync")
    }

    fn is_invite_friends_supported(&self) -> bool {
        self.supports("inviteAsync")
    }

    fn is_external_links_allowed(&self) -> bool {
        false
    }

    async fn share(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.is_share_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::Share, || async {
                self.core.call("FBInstant.shareAsync", options).await.map(|_| ())
            })
            .await
    }

    async fn invite_friends(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.is_invite_friends_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::InviteFriends, || async {
                self.core.call("FBInstant.inviteAsync", options).await.map(|_| ())
            })
            .await
    }
}

#[async_trait]
impl LeaderboardCapability for FacebookAdapter {
    fn is_leaderboard_supported(&self) -> bool {
        self.supports("getLeaderboardAsync")
    }

    fn is_leaderboard_multiple_boards_supported(&self) -> bool {
        self.is_leaderboard_supported()
    }

    fn is_leaderboard_set_score_supported(&self) -> bool {
        self.is_leaderboard_supported()
    }

    fn is_leaderboard_get_score_supported(&self) -> bool {
        self.is_leaderboard_supported()
    }

    fn is_leaderboard_get_entries_supported(&self) -> bool {
        self.is_leaderboard_supported()
    }

    async fn set_leaderboard_score(&self, leaderboard: &str, score: i64) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.is_leaderboard_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::SetLeaderboardScore, || async {
                self.core
                    .call(
                        "leaderboard.setScoreAsync",
                        json!({ "leaderboardName": leaderboard, "score": score }),
                    )
                    .await
                    .map(|_| ())
            })
            .await
    }

    async fn get_leaderboard_score(&self, leaderboard: &str) -> Result<i64> {
        self.core.ensure_initialized()?;
        if !self.is_leaderboard_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::GetLeaderboardScore, || async {
                let entry = self
                    .core
                    .call("leaderboard.getPlayerEntryAsync", json!({ "leaderboardName": leaderboard }))
                    .await?;
                entry
                    .get("score")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| BridgeError::MalformedResponse("player entry without score".into()))
            })
            .await
    }

    /// Entries among the player's connected friends.
    async fn get_leaderboard_entries(&self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>> {
        self.core.ensure_initialized()?;
        if !self.is_leaderboard_supported() {
            return Err(BridgeError::Unsupported);
        }
        let count = match query.quantity_top {
            0 => DEFAULT_ENTRY_COUNT,
            n => n,
        };
        let args = json!({ "leaderboardName": query.leaderboard, "count": count, "offset": 0 });
        self.core
            .exclusive(ActionKind::GetLeaderboardEntries, || async {
                let result = self
                    .core
                    .call("leaderboard.getConnectedPlayerEntriesAsync", args)
                    .await?;
                match result.get("entries") {
                    None | Some(Value::Null) => Ok(Vec::new()),
                    Some(entries) => array(entries, "leaderboard entries")?
                        .iter()
                        .map(Self::leaderboard_entry)
                        .collect(),
                }
            })
            .await
    }
}

#[async_trait]
impl PaymentsCapability for FacebookAdapter {
    fn is_payments_supported(&self) -> bool {
        self.supports("payments.purchaseAsync")
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseResult> {
        self.core.ensure_initialized()?;
        if !self.is_payments_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::Purchase, || async {
                let purchase = self
                    .core
                    .call("FBInstant.payments.purchaseAsync", json!({ "productID": product_id }))
                    .await?;
                purchase_from_sdk(&purchase)
            })
            .await
    }

    async fn consume_purchase(&self, token: &str) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.is_payments_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::ConsumePurchase, || async {
                self.core
                    .call("FBInstant.payments.consumePurchaseAsync", json!({ "purchaseToken": token }))
                    .await
                    .map(|_| ())
            })
            .await
    }

    async fn get_catalog(&self) -> Result<Vec<CatalogItem>> {
        self.core.ensure_initialized()?;
        if !self.is_payments_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::GetCatalog, || async {
                catalog_from_sdk(&self.core.call("FBInstant.payments.getCatalogAsync", Value::Null).await?)
            })
            .await
    }

    async fn get_purchases(&self) -> Result<Vec<PurchaseResult>> {
        self.core.ensure_initialized()?;
        if !self.is_payments_supported() {
            return Err(BridgeError::Unsupported);
        }
        self.core
            .exclusive(ActionKind::GetPurchases, || async {
                purchases_from_sdk(&self.core.call("FBInstant.payments.getPurchasesAsync", Value::Null).await?)
            })
            .await
    }
}

impl RemoteConfigCapability for FacebookAdapter {}
impl ClipboardCapability for FacebookAdapter {}
