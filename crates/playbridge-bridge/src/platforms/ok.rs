// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OK (Odnoklassniki) adapter.
//
// FAPI reports UI results through the global `API_callback(method, result,
// data)`. UI methods with a single answer are awaited as SDK calls resolving
// to `{result, data}`. Answers that keep arriving after the call (interstitial
// progress, rewarded playback, banner visibility) come back as `API_callback`
// SDK events. REST methods go through `FAPI.Client.call` and resolve to the
// response data.
//
// Cloud storage needs the VALUABLE_ACCESS permission, requested once at
// start-up for signed-in players.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, InterstitialState, PlayerInfo, RewardedState, SdkEvent, StorageType,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::str_field;
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

pub const SDK_URL: &str = "https://api.ok.ru/js/fapi5.js";
const SDK_GLOBAL: &str = "FAPI";
const AUTH_STATE: &str = "AUTHORIZED";
const VALUABLE_ACCESS: &str = "VALUABLE_ACCESS";
const PERMISSIONS: [&str; 2] = [VALUABLE_ACCESS, "PHOTO_CONTENT"];
const INVITE_MAX_CHARS: usize = 120;

/// One `API_callback` answer.
struct UiAnswer {
    result: String,
    data: Value,
}

impl UiAnswer {
    fn from_sdk(response: &Value) -> Self {
        Self {
            result: str_field(response, "result").unwrap_or_else(|| "ok".into()),
            data: response.get("data").cloned().unwrap_or(Value::Null),
        }
    }

    fn is_error(&self) -> bool {
        self.result == "error"
    }

    fn into_result(self, what: &str) -> Result<Value> {
        if self.is_error() {
            let reason = self.data.as_str().map_or_else(|| format!("{what} failed"), String::from);
            Err(BridgeError::Sdk(reason))
        } else {
            Ok(self.data)
        }
    }
}

pub struct OkAdapter {
    core: AdapterCore,
    valuable_access: AtomicBool,
}

impl OkAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            valuable_access: AtomicBool::new(false),
        }
    }

    async fn ui(&self, method: &str, args: Value) -> Result<UiAnswer> {
        let response = self.core.call(&format!("FAPI.UI.{method}"), args).await?;
        Ok(UiAnswer::from_sdk(&response))
    }

    async fn rest(&self, params: Value) -> Result<Value> {
        self.core.call("FAPI.Client.call", params).await
    }

    async fn load_player(&self) -> Result<()> {
        let profile = self
            .rest(json!({ "method": "users.getCurrentUser", "fields": "uid,name,pic50x50,pic128x128,pic_base" }))
            .await?;
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(&profile, "uid"),
            name: str_field(&profile, "name"),
            photos: ["pic50x50", "pic128x128", "pic_base"]
                .iter()
                .filter_map(|key| str_field(&profile, key))
                .collect(),
        });
        Ok(())
    }

    async fn has_valuable_access(&self) -> Result<bool> {
        let granted = self
            .rest(json!({ "method": "users.hasAppPermission", "ext_perm": VALUABLE_ACCESS }))
            .await?;
        Ok(match granted {
            Value::Bool(granted) => granted,
            Value::String(s) => s == "true",
            Value::Null => false,
            _ => true,
        })
    }

    /// Check the storage permission, asking for it once when missing.
    async fn resolve_permissions(&self) -> Result<()> {
        let mut granted = self.has_valuable_access().await?;
        if !granted {
            let permissions = PERMISSIONS.map(|p| format!("\"{p}\"")).join(",");
            self.ui("showPermissions", json!({ "permissions": format!("[{permissions}]") }))
                .await?;
            granted = self.has_valuable_access().await?;
        }
        self.valuable_access.store(granted, Ordering::Release);
        self.core.set_default_storage_type(if granted {
            StorageType::PlatformInternal
        } else {
            StorageType::LocalStorage
        });
        Ok(())
    }

    fn require_valuable_access(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        if self.valuable_access.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BridgeError::Storage("storage permission not granted".into()))
        }
    }

    fn apply_callback(&self, payload: &Value) {
        let method = str_field(payload, "method");
        let answer = UiAnswer::from_sdk(payload);
        let data = answer.data.as_str();
        match method.as_deref() {
            Some("showAd") => {
                let state = self.core.interstitial();
                match data {
                    Some("ready" | "ad_prepared") => {}
                    Some("ad_shown") => {
                        state.set(InterstitialState::Opened);
                        state.set(InterstitialState::Closed);
                    }
                    _ => {
                        state.set(InterstitialState::Failed);
                    }
                }
            }
            Some("showLoadedAd") => {
                let state = self.core.rewarded();
                match data {
                    Some("complete") => {
                        state.set(RewardedState::Rewarded);
                        state.set(RewardedState::Closed);
                    }
                    Some("skip") => {
                        state.set(RewardedState::Closed);
                    }
                    _ => {
                        state.set(RewardedState::Failed);
                    }
                }
            }
            Some("requestBannerAds") => match data {
                _ if answer.is_error() => {
                    self.core.banner().set(BannerState::Failed);
                }
                Some("banner_shown" | "ad_shown") => {
                    self.core.banner().set(BannerState::Shown);
                }
                Some("hidden_by_user") => {
                    self.core.banner().set(BannerState::Hidden);
                }
                other => debug!(data = ?other, "banner progress"),
            },
            other => debug!(method = ?other, "ignored ok callback"),
        }
    }
}

#[async_trait]
impl AdapterBase for OkAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "ok"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let page = self.core.page();
                let api_server = page
                    .query_param("api_server")
                    .ok_or_else(|| BridgeError::missing_config("ok", "api_server"))?;
                let connection = page
                    .query_param("apiconnection")
                    .ok_or_else(|| BridgeError::missing_config("ok", "apiconnection"))?;
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                let session = self
                    .core
                    .call("FAPI.init", json!({ "apiServer": api_server, "apiConnection": connection }))
                    .await?;
                // No saved state means the player is signed in.
                let authorized = str_field(&session, "saved_state").is_none_or(|state| state == AUTH_STATE);
                if authorized {
                    self.load_player().await?;
                    self.resolve_permissions().await?;
                }
                info!(
                    authorized,
                    storage = self.valuable_access.load(Ordering::Acquire),
                    "ok sdk ready"
                );
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        match event.name.as_str() {
            "API_callback" => self.apply_callback(&event.payload),
            other => debug!(event = other, "ignored ok event"),
        }
    }
}

#[async_trait]
impl SessionCapability for OkAdapter {
    fn is_player_authorization_supported(&self) -> bool {
        true
    }

    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if self.core.player().authorized {
            return Ok(());
        }
        self.core
            .exclusive(ActionKind::AuthorizePlayer, || async {
                self.ui("showLoginSuggestion", json!({ "state": AUTH_STATE }))
                    .await?
                    .into_result("login")?;
                self.core.set_player(PlayerInfo {
                    authorized: true,
                    ..self.core.player()
                });
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl StorageCapability for OkAdapter {
    fn is_storage_supported(&self, _storage: StorageType) -> bool {
        true
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => self.valuable_access.load(Ordering::Acquire),
        }
    }

    /// Empty strings read as missing.
    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.require_valuable_access()?;
        let response = self
            .rest(json!({ "method": "storage.get", "keys": keys, "scope": "CUSTOM" }))
            .await?;
        let stored = response.get("data").cloned().unwrap_or(Value::Null);
        Ok(keys
            .iter()
            .map(|key| match stored.get(key) {
                Some(Value::String(raw)) if !raw.is_empty() => decode_value(raw, try_parse_json),
                Some(Value::String(_)) | Some(Value::Null) | None => Value::Null,
                Some(other) => other.clone(),
            })
            .collect())
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.require_valuable_access()?;
        let writes = keys.iter().zip(values).map(|(key, value)| {
            self.rest(json!({ "method": "storage.set", "key": key, "value": encode_value(value) }))
        });
        futures::future::try_join_all(writes).await.map(|_| ())
    }

    /// `storage.set` without a value removes the key.
    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.require_valuable_access()?;
        let removals = keys
            .iter()
            .map(|key| self.rest(json!({ "method": "storage.set", "key": key })));
        futures::future::try_join_all(removals).await.map(|_| ())
    }
}

#[async_trait]
impl AdvertisementCapability for OkAdapter {
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
        let position = str_field(&options, "position").unwrap_or_else(|| "bottom".into());
        let shown: Result<()> = async {
            self.core.ensure_initialized()?;
            if let Some(layout) = str_field(&options, "layoutType") {
                self.ui("invokeUIMethod", json!({ "method": "setBannerFormat", "args": [layout] }))
                    .await?
                    .into_result("banner format")?;
            }
            let requested = self
                .ui("invokeUIMethod", json!({ "method": "requestBannerAds", "args": [position] }))
                .await?
                .into_result("banner request")?;
            if requested.as_str() == Some("ad_loaded") {
                let shown = self
                    .ui("invokeUIMethod", json!({ "method": "showBannerAds", "args": [] }))
                    .await?
                    .into_result("banner show")?;
                if matches!(shown, Value::Null | Value::Bool(false)) {
                    return Err(BridgeError::Sdk("banner was not shown".into()));
                }
            }
            Ok(())
        }
        .await;
        match shown {
            Ok(()) => {
                banner.set(BannerState::Shown);
            }
            Err(e) => {
                warn!(error = %e, "banner failed");
                banner.set(BannerState::Failed);
            }
        }
    }

    async fn hide_banner(&self) {
        let hidden = match self.core.ensure_initialized() {
            Ok(()) => self
                .ui("invokeUIMethod", json!({ "method": "hideBannerAds", "args": [] }))
                .await
                .and_then(|answer| answer.into_result("banner hide")),
            Err(e) => Err(e),
        };
        match hidden {
            Ok(data) if !matches!(data, Value::Null | Value::Bool(false)) => {
                self.core.banner().set(BannerState::Hidden);
            }
            Ok(_) => {
                self.core.banner().set(BannerState::Failed);
            }
            Err(e) => {
                warn!(error = %e, "banner hide failed");
                self.core.banner().set(BannerState::Failed);
            }
        }
    }

    /// Progress arrives as `showAd` callbacks.
    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("FAPI.UI.showAd", json!({})).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    /// `loadAd` answers once; playback is reported as `showLoadedAd` callbacks.
    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let shown: Result<()> = async {
            self.core.ensure_initialized()?;
            self.ui("loadAd", json!({})).await?.into_result("rewarded load")?;
            state.set(RewardedState::Opened);
            self.core.call("FAPI.UI.showLoadedAd", json!({})).await.map(|_| ())
        }
        .await;
        if let Err(e) = shown {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }

    async fn check_ad_block(&self) -> Result<bool> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::CheckAdBlock, || async {
                let answer = self
                    .ui("invokeUIMethod", json!({ "method": "isAdBlockEnabled", "args": [] }))
                    .await?;
                if answer.result != "ok" {
                    return Err(BridgeError::Sdk("ad block check failed".into()));
                }
                Ok(answer.data.as_str() == Some("true") || answer.data == Value::Bool(true))
            })
            .await
    }
}

#[async_trait]
impl SocialCapability for OkAdapter {
    fn is_invite_friends_supported(&self) -> bool {
        true
    }

    fn is_join_community_supported(&self) -> bool {
        true
    }

    fn is_create_post_supported(&self) -> bool {
        true
    }

    fn is_rate_supported(&self) -> bool {
        true
    }

    fn is_external_links_allowed(&self) -> bool {
        false
    }

    async fn invite_friends(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let text = str_field(&options, "text")
            .ok_or_else(|| BridgeError::InvalidArgument("invite text is required".into()))?;
        if text.chars().count() > INVITE_MAX_CHARS {
            return Err(BridgeError::InvalidArgument(format!(
                "invite text exceeds {INVITE_MAX_CHARS} characters"
            )));
        }
        self.core
            .exclusive(ActionKind::InviteFriends, || async {
                self.ui("showInvite", json!({ "text": text })).await?.into_result("invite").map(|_| ())
            })
            .await
    }

    async fn join_community(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let group_id = str_field(&options, "groupId")
            .ok_or_else(|| BridgeError::InvalidArgument("groupId is required".into()))?;
        let enable_messages = options.get("enableMessages").and_then(Value::as_bool).unwrap_or(false);
        self.core
            .exclusive(ActionKind::JoinCommunity, || async {
                self.ui("joinGroup", json!({ "groupId": group_id, "enableMessages": enable_messages }))
                    .await?
                    .into_result("join group")
                    .map(|_| ())
            })
            .await
    }

    async fn create_post(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if options.get("media").is_none_or(Value::is_null) {
            return Err(BridgeError::InvalidArgument("post media is required".into()));
        }
        let status = options.get("status").and_then(Value::as_bool).unwrap_or(false);
        self.core
            .exclusive(ActionKind::CreatePost, || async {
                self.ui("postMediatopic", json!({ "attachment": options, "status": status }))
                    .await?
                    .into_result("post")
                    .map(|_| ())
            })
            .await
    }

    async fn rate(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::Rate, || async {
                self.ui("showRatingDialog", json!({})).await?.into_result("rating").map(|_| ())
            })
            .await
    }
}

impl LeaderboardCapability for OkAdapter {}
impl PaymentsCapability for OkAdapter {}
impl RemoteConfigCapability for OkAdapter {}
impl ClipboardCapability for OkAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    const GAME_URL: &str = "https://ok.ru/game/1?api_server=https%3A%2F%2Fapi.ok.ru%2F&apiconnection=conn_1";

    async fn ok(sdk: Arc<ScriptedSdk>) -> OkAdapter {
        let adapter = OkAdapter::new(core_with(PlatformId::Ok, GAME_URL, sdk, Value::Null));
        adapter.initialize().await.unwrap();
        adapter
    }

    /// REST calls answer with the profile, which also reads as a granted permission.
    fn signed_in_sdk() -> Arc<ScriptedSdk> {
        let sdk = ScriptedSdk::new();
        sdk.respond(
            "FAPI.Client.call",
            json!({ "uid": "ok-1", "name": "Lena", "pic50x50": "https://ok/50.png", "pic_base": "https://ok/b.png" }),
        );
        sdk
    }

    #[tokio::test]
    async fn connection_params_are_required() {
        let sdk = ScriptedSdk::new();
        let adapter = OkAdapter::new(core_with(
            PlatformId::Ok,
            "https://ok.ru/game/1?api_server=x",
            sdk.clone(),
            Value::Null,
        ));
        assert_eq!(
            adapter.initialize().await,
            Err(BridgeError::missing_config("ok", "apiconnection"))
        );
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn signed_in_player_is_loaded() {
        let sdk = signed_in_sdk();
        let adapter = ok(sdk.clone()).await;
        assert_eq!(
            sdk.last_args("FAPI.init"),
            Some(json!({ "apiServer": "https://api.ok.ru/", "apiConnection": "conn_1" }))
        );
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("ok-1"));
        assert_eq!(player.photos, vec!["https://ok/50.png", "https://ok/b.png"]);
        assert_eq!(adapter.default_storage_type(), StorageType::PlatformInternal);
        assert_eq!(sdk.count("FAPI.UI.showPermissions"), 0);
    }

    #[tokio::test]
    async fn missing_permission_is_requested_once() {
        let sdk = ScriptedSdk::new();
        sdk.respond("FAPI.init", json!({ "saved_state": AUTH_STATE }));
        // Every REST call answers `false`: the profile is empty and access stays denied.
        sdk.respond("FAPI.Client.call", json!(false));
        let adapter = ok(sdk.clone()).await;
        assert_eq!(sdk.count("FAPI.UI.showPermissions"), 1);
        assert_eq!(adapter.default_storage_type(), StorageType::LocalStorage);
        assert!(!adapter.is_storage_available(StorageType::PlatformInternal));
        assert!(matches!(
            adapter.get_data(&["a".to_string()], StorageType::PlatformInternal, true).await,
            Err(BridgeError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn guest_skips_profile_and_permissions() {
        let sdk = ScriptedSdk::new();
        sdk.respond("FAPI.init", json!({ "saved_state": "GUEST" }));
        let adapter = ok(sdk.clone()).await;
        assert!(!adapter.player().authorized);
        assert_eq!(sdk.count("FAPI.Client.call"), 0);

        sdk.respond("FAPI.UI.showLoginSuggestion", json!({ "result": "error", "data": "cancel" }));
        assert_eq!(
            adapter.authorize_player(json!({})).await,
            Err(BridgeError::Sdk("cancel".into()))
        );
        sdk.respond("FAPI.UI.showLoginSuggestion", json!({ "result": "ok" }));
        adapter.authorize_player(json!({})).await.unwrap();
        assert!(adapter.player().authorized);
    }

    #[tokio::test]
    async fn storage_reads_treat_empty_as_missing() {
        let sdk = signed_in_sdk();
        let adapter = ok(sdk.clone()).await;
        sdk.respond("FAPI.Client.call", json!({ "data": { "a": "{\"x\":1}", "b": "" } }));
        let values = adapter
            .get_data(&["a".to_string(), "b".to_string()], StorageType::PlatformInternal, true)
            .await
            .unwrap();
        assert_eq!(values, vec![json!({ "x": 1 }), Value::Null]);

        adapter
            .delete_data(&["a".to_string()], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(
            sdk.last_args("FAPI.Client.call"),
            Some(json!({ "method": "storage.set", "key": "a" }))
        );
    }

    #[tokio::test]
    async fn long_invites_are_rejected() {
        let adapter = ok(signed_in_sdk()).await;
        let text = "x".repeat(INVITE_MAX_CHARS + 1);
        assert!(matches!(
            adapter.invite_friends(json!({ "text": text })).await,
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            adapter.create_post(json!({ "status": true })).await,
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            adapter.join_community(json!({})).await,
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn rewarded_playback_comes_from_callbacks() {
        let sdk = signed_in_sdk();
        let adapter = ok(sdk.clone()).await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Opened));
        assert_eq!(sdk.count("FAPI.UI.showLoadedAd"), 1);
        adapter.handle_sdk_event(
            &SdkEvent::new("API_callback").with_payload(json!({ "method": "showLoadedAd", "result": "ok", "data": "skip" })),
        );
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));

        sdk.respond("FAPI.UI.loadAd", json!({ "result": "error" }));
        adapter.show_rewarded(json!({})).await;
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Failed));
    }

    #[tokio::test]
    async fn interstitial_shown_closes_immediately() {
        let adapter = ok(signed_in_sdk()).await;
        adapter.show_interstitial(json!({})).await;
        for data in ["ready", "ad_shown"] {
            adapter.handle_sdk_event(
                &SdkEvent::new("API_callback").with_payload(json!({ "method": "showAd", "result": "ok", "data": data })),
            );
        }
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Closed));
    }

    #[tokio::test]
    async fn ad_block_answer_is_a_string() {
        let sdk = signed_in_sdk();
        let adapter = ok(sdk.clone()).await;
        sdk.respond("FAPI.UI.invokeUIMethod", json!({ "result": "ok", "data": "true" }));
        assert_eq!(adapter.check_ad_block().await, Ok(true));
        sdk.respond("FAPI.UI.invokeUIMethod", json!({ "result": "error" }));
        assert!(adapter.check_ad_block().await.is_err());
    }
}
