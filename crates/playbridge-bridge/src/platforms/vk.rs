// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// VK Mini Apps adapter.
//
// SDK methods are the vk-bridge event names passed to `vkBridge.send`, with
// the event parameters as arguments.

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, InterstitialState, PlayerInfo, RewardedState, StorageType,
};
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use super::{array, bool_field, str_field};
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

pub const SDK_URL: &str = "https://unpkg.com/@vkontakte/vk-bridge/dist/browser.min.js";
const SDK_GLOBAL: &str = "vkBridge";

pub struct VkAdapter {
    core: AdapterCore,
}

impl VkAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.core.call(method, params).await
    }

    /// Calls that answer `{result: true}` on success.
    async fn send_confirmed(&self, kind: ActionKind, method: &str, params: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(kind, || async {
                let response = self.send(method, params).await?;
                if bool_field(&response, "result") {
                    Ok(())
                } else {
                    Err(BridgeError::Sdk(format!("{method} was not confirmed")))
                }
            })
            .await
    }

    async fn load_player(&self) -> Result<()> {
        let user = self.send("VKWebAppGetUserInfo", json!({})).await?;
        let id = str_field(&user, "id")
            .ok_or_else(|| BridgeError::MalformedResponse("VK user without id".into()))?;
        let name = [str_field(&user, "first_name"), str_field(&user, "last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let photos = ["photo_100", "photo_200", "photo_max_orig"]
            .iter()
            .filter_map(|key| str_field(&user, key))
            .collect();
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: Some(id),
            name: (!name.is_empty()).then_some(name),
            photos,
        });
        Ok(())
    }

    /// Show a native ad; resolves to whether it was displayed.
    async fn show_native_ad(&self, format: &str) -> Result<bool> {
        self.core.ensure_initialized()?;
        let response = self
            .send("VKWebAppShowNativeAds", json!({ "ad_format": format }))
            .await?;
        Ok(bool_field(&response, "result"))
    }
}

#[async_trait]
impl AdapterBase for VkAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "vk"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.send("VKWebAppInit", json!({})).await?;
                if let Some(language) = self.core.page().query_param("vk_language") {
                    self.core.set_language(language);
                }
                self.load_player().await?;
                self.core.set_default_storage_type(StorageType::PlatformInternal);
                info!("vk bridge ready");
                Ok(())
            })
            .await
    }
}

impl SessionCapability for VkAdapter {}

#[async_trait]
impl StorageCapability for VkAdapter {
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
        let response = self.send("VKWebAppStorageGet", json!({ "keys": keys })).await?;
        let stored: Map<String, Value> = array(response.get("keys").unwrap_or(&Value::Null), "storage keys")?
            .iter()
            .filter_map(|entry| Some((str_field(entry, "key")?, entry.get("value")?.clone())))
            .collect();
        // VK reports unset keys as empty strings.
        Ok(keys
            .iter()
            .map(|key| match stored.get(key) {
                Some(Value::String(raw)) if !raw.is_empty() => decode_value(raw, try_parse_json),
                _ => Value::Null,
            })
            .collect())
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        for (key, value) in keys.iter().zip(values) {
            self.send(
                "VKWebAppStorageSet",
                json!({ "key": key, "value": encode_value(value) }),
            )
            .await?;
        }
        Ok(())
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        for key in keys {
            self.send("VKWebAppStorageSet", json!({ "key": key, "value": "" }))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AdvertisementCapability for VkAdapter {
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
        if self.core.ensure_initialized().is_err() {
            banner.set(BannerState::Failed);
            return;
        }
        let mut params = json!({ "banner_location": "bottom" });
        if let (Some(params), Some(extra)) = (params.as_object_mut(), options.as_object()) {
            params.extend(extra.clone());
        }
        match self.send("VKWebAppShowBannerAd", params).await {
            Ok(response) if bool_field(&response, "result") => {
                banner.set(BannerState::Shown);
            }
            Ok(_) => {
                banner.set(BannerState::Failed);
            }
            Err(e) => {
                warn!(error = %e, "banner failed");
                banner.set(BannerState::Failed);
            }
        }
    }

    async fn hide_banner(&self) {
        let hidden = match self.send("VKWebAppHideBannerAd", json!({})).await {
            Ok(response) => bool_field(&response, "result"),
            Err(_) => false,
        };
        self.core
            .banner()
            .set(if hidden { BannerState::Hidden } else { BannerState::Failed });
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        match self.show_native_ad("interstitial").await {
            Ok(true) => {
                state.set(InterstitialState::Opened);
                state.set(InterstitialState::Closed);
            }
            Ok(false) => {
                state.set(InterstitialState::Failed);
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
        match self.show_native_ad("reward").await {
            Ok(true) => {
                state.set(RewardedState::Opened);
                state.set(RewardedState::Rewarded);
                state.set(RewardedState::Closed);
            }
            Ok(false) => {
                state.set(RewardedState::Failed);
            }
            Err(e) => {
                warn!(error = %e, "rewarded failed");
                state.set(RewardedState::Failed);
            }
        }
    }
}

#[async_trait]
impl SocialCapability for VkAdapter {
    fn is_share_supported(&self) -> bool {
        true
    }

    fn is_invite_friends_supported(&self) -> bool {
        true
    }

    fn is_join_community_supported(&self) -> bool {
        true
    }

    fn is_create_post_supported(&self) -> bool {
        true
    }

    fn is_add_to_home_screen_supported(&self) -> bool {
        true
    }

    fn is_add_to_favorites_supported(&self) -> bool {
        true
    }

    async fn share(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let params = match str_field(&options, "link") {
            Some(link) => json!({ "link": link }),
            None => json!({}),
        };
        self.core
            .exclusive(ActionKind::Share, || async {
                // VKWebAppShare answers with the list of recipients.
                self.send("VKWebAppShare", params).await.map(|_| ())
            })
            .await
    }

    async fn invite_friends(&self, _options: Value) -> Result<()> {
        self.send_confirmed(ActionKind::InviteFriends, "VKWebAppShowInviteBox", json!({}))
            .await
    }

    async fn join_community(&self, options: Value) -> Result<()> {
        let group_id = options
            .get("groupId")
            .and_then(Value::as_i64)
            .ok_or_else(|| BridgeError::InvalidArgument("groupId is required".into()))?;
        self.send_confirmed(
            ActionKind::JoinCommunity,
            "VKWebAppJoinGroup",
            json!({ "group_id": group_id }),
        )
        .await
    }

    async fn create_post(&self, options: Value) -> Result<()> {
        let mut params = Map::new();
        for (from, to) in [("message", "message"), ("attachments", "attachments")] {
            if let Some(value) = options.get(from) {
                params.insert(to.to_string(), value.clone());
            }
        }
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::CreatePost, || async {
                let response = self.send("VKWebAppShowWallPostBox", Value::Object(params)).await?;
                match str_field(&response, "post_id") {
                    Some(_) => Ok(()),
                    None => Err(BridgeError::Sdk("post was not published".into())),
                }
            })
            .await
    }

    async fn add_to_home_screen(&self) -> Result<()> {
        self.send_confirmed(ActionKind::AddToHomeScreen, "VKWebAppAddToHomeScreen", json!({}))
            .await
    }

    async fn add_to_favorites(&self) -> Result<()> {
        self.send_confirmed(ActionKind::AddToFavorites, "VKWebAppAddToFavorites", json!({}))
            .await
    }
}

#[async_trait]
impl LeaderboardCapability for VkAdapter {
    fn is_leaderboard_native_popup_supported(&self) -> bool {
        true
    }

    async fn show_leaderboard_native_popup(&self, options: Value) -> Result<()> {
        let score = options
            .get("userResult")
            .and_then(Value::as_i64)
            .ok_or_else(|| BridgeError::InvalidArgument("userResult is required".into()))?;
        self.send_confirmed(
            ActionKind::ShowLeaderboardPopup,
            "VKWebAppShowLeaderBoardBox",
            json!({ "user_result": score, "global": bool_field(&options, "global") }),
        )
        .await
    }
}

impl PaymentsCapability for VkAdapter {}
impl RemoteConfigCapability for VkAdapter {}
impl ClipboardCapability for VkAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    const VK_URL: &str = "https://vk.example/?api_id=1&viewer_id=2&auth_key=3&vk_language=ru";

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    async fn vk() -> (VkAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        sdk.respond(
            "VKWebAppGetUserInfo",
            json!({ "id": 743784474, "first_name": "Ivan", "last_name": "Petrov", "photo_100": "https://vk.example/100.jpg" }),
        );
        let vk = VkAdapter::new(core_with(PlatformId::Vk, VK_URL, sdk.clone(), Value::Null));
        vk.initialize().await.unwrap();
        (vk, sdk)
    }

    #[tokio::test]
    async fn initialize_loads_player_and_language() {
        let (vk, sdk) = vk().await;
        let player = vk.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("743784474"));
        assert_eq!(player.name.as_deref(), Some("Ivan Petrov"));
        assert_eq!(player.photos, vec!["https://vk.example/100.jpg"]);
        assert_eq!(vk.language(), "ru");
        assert_eq!(vk.default_storage_type(), StorageType::PlatformInternal);
        assert_eq!(sdk.count("VKWebAppInit"), 1);
    }

    #[tokio::test]
    async fn missing_global_rejects_initialize() {
        let sdk = ScriptedSdk::new();
        sdk.without_global(SDK_GLOBAL);
        let vk = VkAdapter::new(core_with(PlatformId::Vk, VK_URL, sdk.clone(), Value::Null));
        assert!(matches!(vk.initialize().await, Err(BridgeError::Sdk(_))));
        assert!(!vk.is_initialized());
        assert_eq!(sdk.count("VKWebAppInit"), 0);
    }

    #[tokio::test]
    async fn platform_storage_maps_key_list() {
        let (vk, sdk) = vk().await;
        sdk.respond(
            "VKWebAppStorageGet",
            json!({ "keys": [ { "key": "b", "value": "2" }, { "key": "a", "value": "" } ] }),
        );
        let values = vk
            .get_data(&keys(&["a", "b"]), StorageType::PlatformInternal, true)
            .await
            .unwrap();
        assert_eq!(values, vec![Value::Null, json!(2)]);

        vk.set_data(&keys(&["level"]), &[json!({ "n": 4 })], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(
            sdk.last_args("VKWebAppStorageSet"),
            Some(json!({ "key": "level", "value": r#"{"n":4}"# }))
        );
    }

    #[tokio::test]
    async fn rewarded_walks_through_reward() {
        let (vk, sdk) = vk().await;
        sdk.respond("VKWebAppShowNativeAds", json!({ "result": true }));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        vk.subscribe_rewarded(Box::new(move |s| sink.lock().unwrap().push(*s)));

        vk.show_rewarded(json!({})).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                RewardedState::Loading,
                RewardedState::Opened,
                RewardedState::Rewarded,
                RewardedState::Closed
            ]
        );
        assert_eq!(
            sdk.last_args("VKWebAppShowNativeAds"),
            Some(json!({ "ad_format": "reward" }))
        );
    }

    #[tokio::test]
    async fn unconfirmed_interstitial_fails() {
        let (vk, sdk) = vk().await;
        sdk.respond("VKWebAppShowNativeAds", json!({ "result": false }));
        vk.show_interstitial(json!({})).await;
        assert_eq!(vk.interstitial_state(), Some(InterstitialState::Failed));
    }

    #[tokio::test]
    async fn join_community_requires_group_id() {
        let (vk, sdk) = vk().await;
        assert!(matches!(
            vk.join_community(json!({})).await,
            Err(BridgeError::InvalidArgument(_))
        ));
        sdk.respond("VKWebAppJoinGroup", json!({ "result": true }));
        vk.join_community(json!({ "groupId": 199 })).await.unwrap();
        assert_eq!(sdk.last_args("VKWebAppJoinGroup"), Some(json!({ "group_id": 199 })));
    }

    #[tokio::test]
    async fn leaderboard_only_offers_the_native_popup() {
        let (vk, sdk) = vk().await;
        assert!(!vk.is_leaderboard_supported());
        assert!(vk.is_leaderboard_native_popup_supported());
        sdk.respond("VKWebAppShowLeaderBoardBox", json!({ "result": true }));
        vk.show_leaderboard_native_popup(json!({ "userResult": 120 }))
            .await
            .unwrap();
    }
}
