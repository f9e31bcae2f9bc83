// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Yandex Games adapter.
//
// The SDK is served from the game's own origin at `/sdk.js`. Methods are
// addressed from the `ysdk` instance returned by `YaGames.init`. Fullscreen
// and rewarded ad callbacks arrive as `adv.fullscreen.*` and `adv.rewarded.*`
// SDK events.
//
// Player data is read and written as one object, so the adapter keeps a
// snapshot and writes the merged object back. Edits land in the snapshot
// before the write is sent, so overlapping writes never drop each other's
// keys.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, CatalogItem, InterstitialState, LeaderboardEntry, LeaderboardQuery,
    PlatformMessage, PlayerInfo, PurchaseResult, RewardedState, SdkEvent, StorageType,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::{
    array, bool_field, catalog_from_sdk, purchase_from_sdk, purchases_from_sdk, rank_field,
    str_field, string_map,
};
use crate::core::AdapterCore;
use crate::storage::{encode_value, read_snapshot};
use crate::traits::*;

const SDK_PATH: &str = "/sdk.js";
const SDK_GLOBAL: &str = "YaGames";

pub struct YandexAdapter {
    core: AdapterCore,
    tld: Mutex<Option<String>>,
}

impl YandexAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            tld: Mutex::new(None),
        }
    }

    fn sdk_url(&self) -> Result<String> {
        self.core
            .page()
            .url()
            .join(SDK_PATH)
            .map(String::from)
            .map_err(|e| BridgeError::InvalidConfig(format!("cannot resolve {SDK_PATH}: {e}")))
    }

    async fn load_player(&self) -> Result<()> {
        let player = self.core.call("ysdk.getPlayer", json!({ "scopes": false })).await?;
        // "lite" players have not signed in.
        let authorized = player.is_object() && player.get("mode").and_then(Value::as_str) != Some("lite");
        let photos = ["small", "medium", "large"]
            .iter()
            .filter_map(|size| player.get("photo").and_then(|p| str_field(p, size)))
            .collect();
        self.core.set_player(PlayerInfo {
            authorized,
            id: str_field(&player, "uniqueID"),
            name: str_field(&player, "name"),
            photos,
        });
        Ok(())
    }

    async fn read_player_data(&self) -> Result<Map<String, Value>> {
        match self.core.call("player.getData", json!({})).await? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(BridgeError::MalformedResponse(format!(
                "player data is not an object: {other}"
            ))),
        }
    }

    /// Replace the snapshot with the player's stored data.
    async fn fetch_snapshot(&self) -> Result<()> {
        let data = self.read_player_data().await?;
        self.core.set_platform_snapshot(data);
        Ok(())
    }

    /// The cached snapshot, fetching it on first use. A snapshot cached while
    /// the fetch was in flight wins over the fetched copy.
    async fn snapshot(&self) -> Result<Map<String, Value>> {
        if let Some(snapshot) = self.core.platform_snapshot() {
            return Ok(snapshot);
        }
        let data = self.read_player_data().await?;
        Ok(self.core.seed_platform_snapshot(data))
    }

    /// Apply `edit` to the snapshot and send the merged object.
    async fn write_snapshot(&self, edit: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        self.snapshot().await?;
        let merged = self.core.update_platform_snapshot(edit);
        self.core
            .call("player.setData", json!({ "data": Value::Object(merged), "flush": true }))
            .await
            .map(|_| ())
    }

    fn leaderboard_entry(entry: &Value) -> Result<LeaderboardEntry> {
        let player = entry.get("player").unwrap_or(&Value::Null);
        Ok(LeaderboardEntry {
            id: str_field(player, "uniqueID")
                .ok_or_else(|| BridgeError::MalformedResponse("entry without player id".into()))?,
            name: str_field(player, "publicName"),
            score: entry.get("score").and_then(Value::as_i64).unwrap_or(0),
            rank: rank_field(entry, "rank"),
            photo: str_field(player, "avatar"),
        })
    }
}

#[async_trait]
impl AdapterBase for YandexAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "yandex"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let url = self.sdk_url()?;
                self.core.load_sdk(&url, SDK_GLOBAL).await?;
                self.core.call("YaGames.init", json!({})).await?;

                let environment = self.core.call("ysdk.environment", Value::Null).await?;
                if let Some(lang) = environment.pointer("/i18n/lang").and_then(Value::as_str) {
                    self.core.set_language(lang);
                }
                if let Some(tld) = environment.pointer("/i18n/tld").and_then(Value::as_str) {
                    *self.tld.lock().unwrap_or_else(PoisonError::into_inner) = Some(tld.to_ascii_lowercase());
                }

                self.load_player().await?;
                self.core.set_default_storage_type(StorageType::PlatformInternal);
                if let Err(e) = self.fetch_snapshot().await {
                    warn!(error = %e, "player data unavailable at startup");
                }
                info!(authorized = self.core.player().authorized, "yandex sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let interstitial = self.core.interstitial();
        let rewarded = self.core.rewarded();
        match event.name.as_str() {
            "adv.fullscreen.open" => {
                interstitial.set(InterstitialState::Opened);
            }
            "adv.fullscreen.close" => {
                // `wasShown == false` means the ad was skipped by the SDK.
                let shown = event.payload.get("wasShown").and_then(Value::as_bool).unwrap_or(true);
                interstitial.set(if shown {
                    InterstitialState::Closed
                } else {
                    InterstitialState::Failed
                });
            }
            "adv.fullscreen.error" | "adv.fullscreen.offline" => {
                interstitial.set(InterstitialState::Failed);
            }
            "adv.rewarded.open" => {
                rewarded.set(RewardedState::Opened);
            }
            "adv.rewarded.rewarded" => {
                rewarded.set(RewardedState::Rewarded);
            }
            "adv.rewarded.close" => {
                rewarded.set(RewardedState::Closed);
            }
            "adv.rewarded.error" => {
                rewarded.set(RewardedState::Failed);
            }
            other => debug!(event = other, "unhandled yandex event"),
        }
    }
}

#[async_trait]
impl SessionCapability for YandexAdapter {
    fn platform_tld(&self) -> Option<String> {
        self.tld.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

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
                self.core.call("ysdk.auth.openAuthDialog", Value::Null).await?;
                self.load_player().await?;
                // Data of the anonymous player is not carried over.
                self.fetch_snapshot().await?;
                Ok(())
            })
            .await
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        self.core.ensure_initialized()?;
        let millis = self
            .core
            .call("ysdk.serverTime", Value::Null)
            .await?
            .as_i64()
            .ok_or_else(|| BridgeError::MalformedResponse("server time is not a number".into()))?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| BridgeError::MalformedResponse(format!("server time {millis} out of range")))
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let method = match message {
            PlatformMessage::GameReady => "ysdk.features.LoadingAPI.ready",
            PlatformMessage::GameplayStarted => "ysdk.features.GameplayAPI.start",
            PlatformMessage::GameplayStopped => "ysdk.features.GameplayAPI.stop",
            _ => return Ok(()),
        };
        self.core.call(method, Value::Null).await.map(|_| ())
    }
}

#[async_trait]
impl StorageCapability for YandexAdapter {
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
        let snapshot = self.snapshot().await?;
        Ok(read_snapshot(&snapshot, keys, try_parse_json))
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        self.write_snapshot(|snapshot| {
            for (key, value) in keys.iter().zip(values) {
                snapshot.insert(key.clone(), Value::String(encode_value(value)));
            }
        })
        .await
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        self.write_snapshot(|snapshot| {
            for key in keys {
                snapshot.remove(key);
            }
        })
        .await
    }
}

#[async_trait]
impl AdvertisementCapability for YandexAdapter {
    fn is_banner_supported(&self) -> bool {
        true
    }

    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_banner(&self, _options: Value) {
        let banner = self.core.banner();
        banner.set(BannerState::Loading);
        let shown = match self.core.call("ysdk.adv.showBannerAdv", Value::Null).await {
            Ok(status) => {
                let showing = bool_field(&status, "stickyAdvIsShowing");
                if !showing {
                    warn!(reason = ?status.get("reason"), "sticky banner not shown");
                }
                showing
            }
            Err(e) => {
                warn!(error = %e, "sticky banner failed");
                false
            }
        };
        banner.set(if shown { BannerState::Shown } else { BannerState::Failed });
    }

    async fn hide_banner(&self) {
        let hidden = self.core.call("ysdk.adv.hideBannerAdv", Value::Null).await.is_ok();
        self.core
            .banner()
            .set(if hidden { BannerState::Hidden } else { BannerState::Failed });
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "interstitial requested before initialize");
            state.set(InterstitialState::Failed);
            return;
        }
        if let Err(e) = self.core.call("ysdk.adv.showFullscreenAdv", Value::Null).await {
            warn!(error = %e, "fullscreen ad failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "rewarded requested before initialize");
            state.set(RewardedState::Failed);
            return;
        }
        if let Err(e) = self.core.call("ysdk.adv.showRewardedVideo", Value::Null).await {
            warn!(error = %e, "rewarded video failed");
            state.set(RewardedState::Failed);
        }
    }
}

#[async_trait]
impl SocialCapability for YandexAdapter {
    fn is_add_to_home_screen_supported(&self) -> bool {
        true
    }

    fn is_rate_supported(&self) -> bool {
        true
    }

    fn is_external_links_allowed(&self) -> bool {
        false
    }

    async fn add_to_home_screen(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::AddToHomeScreen, || async {
                let prompt = self.core.call("ysdk.shortcut.canShowPrompt", Value::Null).await?;
                if !bool_field(&prompt, "canShow") {
                    return Err(BridgeError::Sdk("shortcut prompt unavailable".into()));
                }
                let result = self.core.call("ysdk.shortcut.showPrompt", Value::Null).await?;
                match result.get("outcome").and_then(Value::as_str) {
                    Some("accepted") => Ok(()),
                    other => Err(BridgeError::Sdk(format!("shortcut prompt outcome {other:?}"))),
                }
            })
            .await
    }

    async fn rate(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::Rate, || async {
                let check = self.core.call("ysdk.feedback.canReview", Value::Null).await?;
                if !bool_field(&check, "value") {
                    let reason = str_field(&check, "reason").unwrap_or_else(|| "UNKNOWN".into());
                    return Err(BridgeError::Sdk(reason));
                }
                let result = self.core.call("ysdk.feedback.requestReview", Value::Null).await?;
                if bool_field(&result, "feedbackSent") {
                    Ok(())
                } else {
                    Err(BridgeError::Sdk("review was not sent".into()))
                }
            })
            .await
    }
}

#[async_trait]
impl LeaderboardCapability for YandexAdapter {
    fn is_leaderboard_supported(&self) -> bool {
        true
    }

    fn is_leaderboard_multiple_boards_supported(&self) -> bool {
        true
    }

    fn is_leaderboard_set_score_supported(&self) -> bool {
        true
    }

    fn is_leaderboard_get_score_supported(&self) -> bool {
        true
    }

    fn is_leaderboard_get_entries_supported(&self) -> bool {
        true
    }

    async fn set_leaderboard_score(&self, leaderboard: &str, score: i64) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.core.player().authorized {
            return Err(BridgeError::Sdk("player is not authorized".into()));
        }
        self.core
            .exclusive(ActionKind::SetLeaderboardScore, || async {
                self.core
                    .call(
                        "ysdk.leaderboards.setScore",
                        json!({ "leaderboardName": leaderboard, "score": score }),
                    )
                    .await
                    .map(|_| ())
            })
            .await
    }

    async fn get_leaderboard_score(&self, leaderboard: &str) -> Result<i64> {
        self.core.ensure_initialized()?;
        if !self.core.player().authorized {
            return Err(BridgeError::Sdk("player is not authorized".into()));
        }
        self.core
            .exclusive(ActionKind::GetLeaderboardScore, || async {
                let entry = self
                    .core
                    .call("ysdk.leaderboards.getPlayerEntry", json!({ "leaderboardName": leaderboard }))
                    .await?;
                entry
                    .get("score")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| BridgeError::MalformedResponse("player entry without score".into()))
            })
            .await
    }

    async fn get_leaderboard_entries(&self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>> {
        self.core.ensure_initialized()?;
        let args = json!({
            "leaderboardName": query.leaderboard,
            "includeUser": query.include_player && self.core.player().authorized,
            "quantityAround": query.quantity_around,
            "quantityTop": query.quantity_top,
        });
        self.core
            .exclusive(ActionKind::GetLeaderboardEntries, || async {
                let response = self.core.call("ysdk.leaderboards.getEntries", args).await?;
                array(response.get("entries").unwrap_or(&Value::Null), "leaderboard entries")?
                    .iter()
                    .map(Self::leaderboard_entry)
                    .collect::<Result<Vec<_>>>()
            })
            .await
    }
}

#[async_trait]
impl PaymentsCapability for YandexAdapter {
    fn is_payments_supported(&self) -> bool {
        true
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseResult> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::Purchase, || async {
                let purchase = self
                    .core
                    .call("ysdk.payments.purchase", json!({ "id": product_id }))
                    .await?;
                purchase_from_sdk(&purchase)
            })
            .await
    }

    async fn consume_purchase(&self, token: &str) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::ConsumePurchase, || async {
                self.core
                    .call("ysdk.payments.consumePurchase", json!({ "token": token }))
                    .await
                    .map(|_| ())
            })
            .await
    }

    async fn get_catalog(&self) -> Result<Vec<CatalogItem>> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::GetCatalog, || async {
                catalog_from_sdk(&self.core.call("ysdk.payments.getCatalog", Value::Null).await?)
            })
            .await
    }

    async fn get_purchases(&self) -> Result<Vec<PurchaseResult>> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::GetPurchases, || async {
                purchases_from_sdk(&self.core.call("ysdk.payments.getPurchases", Value::Null).await?)
            })
            .await
    }
}

#[async_trait]
impl RemoteConfigCapability for YandexAdapter {
    fn is_remote_config_supported(&self) -> bool {
        true
    }

    /// Yandex flags; `options` may carry `defaultFlags` and `clientFeatures`.
    async fn get_remote_config(&self, options: Value) -> Result<HashMap<String, String>> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::GetRemoteConfig, || async {
                string_map(&self.core.call("ysdk.getFlags", options).await?)
            })
            .await
    }
}

impl ClipboardCapability for YandexAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{RecordingScripts, ScriptedSdk, core_with, host_with, page};

    const GAME_URL: &str = "https://app-100.games.s3.yandex.net/100/index.html";

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    fn scripted() -> Arc<ScriptedSdk> {
        let sdk = ScriptedSdk::new();
        sdk.respond("ysdk.environment", json!({ "i18n": { "lang": "tr", "tld": "COM.TR" } }))
            .respond(
                "ysdk.getPlayer",
                json!({ "mode": "", "uniqueID": "ya-1", "name": "Deniz", "photo": { "small": "s.png" } }),
            )
            .respond("player.getData", json!({ "coins": 5, "name": "\"ann\"" }));
        sdk
    }

    async fn yandex() -> (YandexAdapter, Arc<ScriptedSdk>) {
        let sdk = scripted();
        let adapter = YandexAdapter::new(core_with(PlatformId::Yandex, GAME_URL, sdk.clone(), Value::Null));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn loads_sdk_from_game_origin() {
        let sdk = scripted();
        let scripts = Arc::new(RecordingScripts::default());
        let host = host_with(sdk).with_scripts(scripts.clone());
        let adapter = YandexAdapter::new(AdapterCore::new(PlatformId::Yandex, page(GAME_URL), host));
        adapter.initialize().await.unwrap();
        assert_eq!(
            *scripts.urls.lock().unwrap(),
            vec!["https://app-100.games.s3.yandex.net/sdk.js"]
        );
    }

    #[tokio::test]
    async fn initialize_reads_environment_and_player() {
        let (adapter, _) = yandex().await;
        assert_eq!(adapter.language(), "tr");
        assert_eq!(adapter.platform_tld().as_deref(), Some("com.tr"));
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("ya-1"));
        assert_eq!(player.photos, vec!["s.png"]);
    }

    #[tokio::test]
    async fn lite_player_is_unauthorized() {
        let sdk = scripted();
        sdk.respond("ysdk.getPlayer", json!({ "mode": "lite", "uniqueID": "" }));
        let adapter = YandexAdapter::new(core_with(PlatformId::Yandex, GAME_URL, sdk.clone(), Value::Null));
        adapter.initialize().await.unwrap();
        assert!(!adapter.player().authorized);
        assert_eq!(
            adapter.set_leaderboard_score("main", 10).await,
            Err(BridgeError::Sdk("player is not authorized".into()))
        );
        assert_eq!(sdk.count("ysdk.leaderboards.setScore"), 0);
    }

    #[tokio::test]
    async fn storage_reads_from_snapshot_and_writes_merged_object() {
        let (adapter, sdk) = yandex().await;
        let platform = StorageType::PlatformInternal;
        assert_eq!(
            adapter.get_data(&keys(&["coins", "name", "missing"]), platform, true).await.unwrap(),
            vec![json!(5), json!("ann"), Value::Null]
        );
        assert_eq!(sdk.count("player.getData"), 1);

        adapter.set_data(&keys(&["level"]), &[json!(2)], platform).await.unwrap();
        assert_eq!(
            sdk.last_args("player.setData"),
            Some(json!({ "data": { "coins": 5, "name": "\"ann\"", "level": "2" }, "flush": true }))
        );

        adapter.delete_data(&keys(&["coins"]), platform).await.unwrap();
        assert_eq!(
            adapter.get_data(&keys(&["coins", "level"]), platform, true).await.unwrap(),
            vec![Value::Null, json!(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_writes_keep_both_keys() {
        let (adapter, sdk) = yandex().await;
        sdk.slow("player.setData", Duration::from_millis(100));
        let platform = StorageType::PlatformInternal;

        let (keys_a, vals_a) = (keys(&["a"]), [json!(1)]);
        let (keys_b, vals_b) = (keys(&["b"]), [json!(2)]);
        let (a, b) = tokio::join!(
            adapter.set_data(&keys_a, &vals_a, platform),
            adapter.set_data(&keys_b, &vals_b, platform),
        );
        a.unwrap();
        b.unwrap();

        let last = sdk.last_args("player.setData").unwrap();
        assert_eq!(last["data"]["a"], "1");
        assert_eq!(last["data"]["b"], "2");
        assert_eq!(
            adapter.get_data(&keys(&["a", "b"]), platform, true).await.unwrap(),
            vec![json!(1), json!(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn write_during_first_fetch_is_not_overwritten() {
        let sdk = scripted();
        let adapter = YandexAdapter::new(core_with(PlatformId::Yandex, GAME_URL, sdk.clone(), Value::Null));
        sdk.fail("player.getData", BridgeError::Sdk("offline".into()));
        adapter.initialize().await.unwrap();
        assert_eq!(adapter.core.platform_snapshot(), None);

        sdk.respond("player.getData", json!({ "coins": 5 }))
            .slow("player.getData", Duration::from_millis(50))
            .slow("player.setData", Duration::from_millis(100));
        let platform = StorageType::PlatformInternal;
        let (keys_a, vals_a) = (keys(&["a"]), [json!(1)]);
        let (keys_b, vals_b) = (keys(&["b"]), [json!(2)]);
        let (a, b) = tokio::join!(
            adapter.set_data(&keys_a, &vals_a, platform),
            adapter.set_data(&keys_b, &vals_b, platform),
        );
        a.unwrap();
        b.unwrap();
        let last = sdk.last_args("player.setData").unwrap();
        assert_eq!(last["data"], json!({ "coins": 5, "a": "1", "b": "2" }));
    }

    #[tokio::test]
    async fn fullscreen_events_drive_interstitial() {
        let (adapter, sdk) = yandex().await;
        adapter.show_interstitial(json!({})).await;
        assert_eq!(sdk.count("ysdk.adv.showFullscreenAdv"), 1);
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Loading));

        adapter.handle_sdk_event(&SdkEvent::new("adv.fullscreen.open"));
        adapter.handle_sdk_event(&SdkEvent::new("adv.fullscreen.close").with_payload(json!({ "wasShown": true })));
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Closed));

        adapter.show_interstitial(json!({})).await;
        adapter.handle_sdk_event(&SdkEvent::new("adv.fullscreen.close").with_payload(json!({ "wasShown": false })));
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Failed));
    }

    #[tokio::test]
    async fn rewarded_events_include_reward() {
        let (adapter, _) = yandex().await;
        adapter.show_rewarded(json!({})).await;
        for name in ["adv.rewarded.open", "adv.rewarded.rewarded", "adv.rewarded.close"] {
            adapter.handle_sdk_event(&SdkEvent::new(name));
        }
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_purchases_open_one_dialog() {
        let (adapter, sdk) = yandex().await;
        sdk.respond(
            "ysdk.payments.purchase",
            json!({ "productID": "gems", "purchaseToken": "tok", "developerPayload": "p" }),
        )
        .slow("ysdk.payments.purchase", Duration::from_secs(1));

        let (a, b) = tokio::join!(adapter.purchase("gems"), adapter.purchase("gems"));
        assert_eq!(a.unwrap().token.as_deref(), Some("tok"));
        assert_eq!(b.unwrap().payload.as_deref(), Some("p"));
        assert_eq!(sdk.count("ysdk.payments.purchase"), 1);
    }

    #[tokio::test]
    async fn leaderboard_entries_are_normalized() {
        let (adapter, sdk) = yandex().await;
        sdk.respond(
            "ysdk.leaderboards.getEntries",
            json!({ "entries": [ { "score": 900, "rank": 1, "player": { "uniqueID": "u1", "publicName": "Ada", "avatar": "a.png" } } ] }),
        );
        let entries = adapter
            .get_leaderboard_entries(&LeaderboardQuery::top("main", 5))
            .await
            .unwrap();
        assert_eq!(
            entries,
            vec![LeaderboardEntry {
                id: "u1".into(),
                name: Some("Ada".into()),
                score: 900,
                rank: 1,
                photo: Some("a.png".into()),
            }]
        );
    }

    #[tokio::test]
    async fn own_score_comes_from_player_entry() {
        let (adapter, sdk) = yandex().await;
        assert!(adapter.is_leaderboard_get_score_supported());
        sdk.respond("ysdk.leaderboards.getPlayerEntry", json!({ "score": 420, "rank": 3 }));
        assert_eq!(adapter.get_leaderboard_score("main").await, Ok(420));
        assert_eq!(
            sdk.last_args("ysdk.leaderboards.getPlayerEntry"),
            Some(json!({ "leaderboardName": "main" }))
        );
    }

    #[tokio::test]
    async fn flags_become_remote_config() {
        let (adapter, sdk) = yandex().await;
        sdk.respond("ysdk.getFlags", json!({ "difficulty": "hard" }));
        let config = adapter
            .get_remote_config(json!({ "defaultFlags": { "difficulty": "easy" } }))
            .await
            .unwrap();
        assert_eq!(config["difficulty"], "hard");
    }

    #[tokio::test]
    async fn server_time_is_parsed_from_millis() {
        let (adapter, sdk) = yandex().await;
        sdk.respond("ysdk.serverTime", json!(1_700_000_000_000i64));
        let time = adapter.get_server_time().await.unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn rate_reports_review_refusal() {
        let (adapter, sdk) = yandex().await;
        sdk.respond("ysdk.feedback.canReview", json!({ "value": false, "reason": "REVIEW_ALREADY_REQUESTED" }));
        assert_eq!(
            adapter.rate().await,
            Err(BridgeError::Sdk("REVIEW_ALREADY_REQUESTED".into()))
        );
        assert_eq!(sdk.count("ysdk.feedback.requestReview"), 0);
    }

    #[tokio::test]
    async fn messages_map_to_loading_and_gameplay_apis() {
        let (adapter, sdk) = yandex().await;
        adapter.send_message(PlatformMessage::GameReady, Value::Null).await.unwrap();
        adapter.send_message(PlatformMessage::GameplayStopped, Value::Null).await.unwrap();
        adapter.send_message(PlatformMessage::PlayerGotAchievement, Value::Null).await.unwrap();
        assert_eq!(sdk.count("ysdk.features.LoadingAPI.ready"), 1);
        assert_eq!(sdk.count("ysdk.features.GameplayAPI.stop"), 1);
    }
}
