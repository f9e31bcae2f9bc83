// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wortal adapter.
//
// Banner and cloud storage availability follow `Wortal.getSupportedAPIs()`.
// Ad callbacks and `player.onLogin` reach the adapter as SDK events.
// `player.setDataAsync` replaces the whole save, so writes go through the
// core's snapshot.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use playbridge_core::error::Result;
use playbridge_core::types::{
    BannerState, DeviceType, InterstitialState, PlatformMessage, PlayerInfo, RewardedState,
    SdkEvent, StorageType,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::str_field;
use crate::core::AdapterCore;
use crate::storage::read_snapshot;
use crate::traits::*;

pub const SDK_URL: &str = "https://storage.googleapis.com/cdn-wortal-ai/v2/wortal-core.js";
const SDK_GLOBAL: &str = "Wortal";

#[derive(Default)]
struct Session {
    supported_apis: HashSet<String>,
    device: Option<DeviceType>,
}

pub struct WortalAdapter {
    core: AdapterCore,
    session: Mutex<Session>,
}

impl WortalAdapter {
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

    async fn load_session(&self) -> Result<()> {
        let apis = self.core.call("Wortal.getSupportedAPIs", Value::Null).await?;
        let supported_apis = apis
            .as_array()
            .map(|apis| apis.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        let device = self.core.call("Wortal.session.getDevice", Value::Null).await?;
        let device = device
            .as_str()
            .and_then(|d| serde_json::from_value(Value::String(d.to_ascii_lowercase())).ok());

        let locale = self.core.call("Wortal.session.getLocale", Value::Null).await?;
        if let Some(language) = locale.as_str().and_then(|l| l.get(..2)) {
            self.core.set_language(language.to_ascii_lowercase());
        }

        *self.session() = Session {
            supported_apis,
            device,
        };
        Ok(())
    }

    async fn fire(&self, method: &str, args: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core.call(method, args).await.map(|_| ())
    }
}

#[async_trait]
impl AdapterBase for WortalAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "wortal"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.core.call("Wortal.initializeAsync", Value::Null).await?;
                self.load_session().await?;
                info!(apis = self.session().supported_apis.len(), "wortal sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let payload = &event.payload;
        match event.name.as_str() {
            "player.login" => self.core.set_player(PlayerInfo {
                authorized: true,
                id: str_field(payload, "id"),
                name: str_field(payload, "name"),
                photos: str_field(payload, "photo").into_iter().collect(),
            }),
            "interstitial.open" => {
                self.core.interstitial().set(InterstitialState::Opened);
            }
            "interstitial.close" => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            "interstitial.fail" => {
                self.core.interstitial().set(InterstitialState::Failed);
            }
            "rewarded.open" => {
                self.core.rewarded().set(RewardedState::Opened);
            }
            "rewarded.reward" => {
                self.core.rewarded().set(RewardedState::Rewarded);
            }
            "rewarded.close" | "rewarded.dismiss" => {
                self.core.rewarded().set(RewardedState::Closed);
            }
            "rewarded.fail" => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            other => debug!(event = other, "ignored wortal event"),
        }
    }
}

#[async_trait]
impl SessionCapability for WortalAdapter {
    fn device_type(&self) -> DeviceType {
        match self.session().device {
            Some(device) => device,
            None => self
                .core
                .page()
                .user_agent()
                .map(DeviceType::from_user_agent)
                .unwrap_or(DeviceType::Desktop),
        }
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        match message {
            PlatformMessage::GameplayStarted => self.fire("Wortal.session.gameplayStart", Value::Null).await,
            PlatformMessage::GameplayStopped => self.fire("Wortal.session.gameplayStop", Value::Null).await,
            PlatformMessage::PlayerGotAchievement => self.fire("Wortal.session.happyTime", Value::Null).await,
            PlatformMessage::GameReady => {
                self.fire("Wortal.setLoadingProgress", json!({ "value": 100 })).await?;
                self.fire("Wortal.startGameAsync", Value::Null).await
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageCapability for WortalAdapter {
    fn is_storage_supported(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => true,
            StorageType::PlatformInternal => self.supports("player.setDataAsync"),
        }
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => self.supports("player.setDataAsync"),
        }
    }

    /// Fetched values also refresh the snapshot used for later writes.
    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.core.ensure_initialized()?;
        let data = self
            .core
            .call("Wortal.player.getDataAsync", json!({ "keys": keys }))
            .await?;
        let snapshot = self.core.update_platform_snapshot(|snapshot| {
            for key in keys {
                snapshot.insert(key.clone(), data.get(key).cloned().unwrap_or(Value::Null));
            }
        });
        Ok(read_snapshot(&snapshot, keys, try_parse_json))
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        let merged = self.core.update_platform_snapshot(|snapshot| {
            for (key, value) in keys.iter().zip(values) {
                snapshot.insert(key.clone(), value.clone());
            }
        });
        self.core
            .call("Wortal.player.setDataAsync", json!({ "data": merged }))
            .await
            .map(|_| ())
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        let merged = self.core.update_platform_snapshot(|snapshot| {
            for key in keys {
                snapshot.remove(key);
            }
        });
        self.core
            .call("Wortal.player.setDataAsync", json!({ "data": merged }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AdvertisementCapability for WortalAdapter {
    fn is_banner_supported(&self) -> bool {
        self.supports("ads.showBanner")
    }

    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_banner(&self, options: Value) {
        let position = str_field(&options, "position").unwrap_or_else(|| "bottom".into());
        let shown = self
            .fire("Wortal.ads.showBanner", json!({ "shouldShow": true, "position": position }))
            .await;
        match shown {
            Ok(()) => {
                self.core.banner().set(BannerState::Shown);
            }
            Err(e) => {
                warn!(error = %e, "banner failed");
                self.core.banner().set(BannerState::Failed);
            }
        }
    }

    async fn hide_banner(&self) {
        let hidden = self.fire("Wortal.ads.showBanner", json!({ "shouldShow": false })).await;
        self.core
            .banner()
            .set(if hidden.is_ok() { BannerState::Hidden } else { BannerState::Failed });
    }

    async fn show_interstitial(&self, options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let placement = str_field(&options, "placement").unwrap_or_else(|| "next".into());
        let description = str_field(&options, "description").unwrap_or_else(|| "NextLevel".into());
        let shown = self
            .fire(
                "Wortal.ads.showInterstitial",
                json!({ "placement": placement, "description": description }),
            )
            .await;
        if let Err(e) = shown {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let description = str_field(&options, "description").unwrap_or_else(|| "Bonus".into());
        let shown = self
            .fire("Wortal.ads.showRewarded", json!({ "description": description }))
            .await;
        if let Err(e) = shown {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }

    async fn check_ad_block(&self) -> Result<bool> {
        self.core.ensure_initialized()?;
        let blocked = self.core.call("Wortal.ads.isAdBlocked", Value::Null).await?;
        Ok(blocked.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl SocialCapability for WortalAdapter {
    fn is_external_links_allowed(&self) -> bool {
        false
    }
}

impl LeaderboardCapability for WortalAdapter {}
impl PaymentsCapability for WortalAdapter {}
impl RemoteConfigCapability for WortalAdapter {}
impl ClipboardCapability for WortalAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    async fn wortal(apis: Value) -> (WortalAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        sdk.respond("Wortal.getSupportedAPIs", apis)
            .respond("Wortal.session.getDevice", json!("MOBILE"))
            .respond("Wortal.session.getLocale", json!("de-DE"));
        let adapter = WortalAdapter::new(core_with(
            PlatformId::Wortal,
            "https://html5.wortal.ai/game/",
            sdk.clone(),
            Value::Null,
        ));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn session_reports_device_language_and_apis() {
        let (adapter, _) = wortal(json!(["ads.showBanner"])).await;
        assert_eq!(adapter.device_type(), DeviceType::Mobile);
        assert_eq!(adapter.language(), "de");
        assert!(adapter.is_banner_supported());
        assert!(!adapter.is_storage_supported(StorageType::PlatformInternal));
        assert!(!adapter.is_external_links_allowed());

        adapter.handle_sdk_event(
            &SdkEvent::new("player.login").with_payload(json!({ "id": "w1", "name": "Lee" })),
        );
        assert_eq!(adapter.player().id.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn game_ready_starts_the_game() {
        let (adapter, sdk) = wortal(json!([])).await;
        adapter.send_message(PlatformMessage::GameReady, json!({})).await.unwrap();
        assert_eq!(sdk.last_args("Wortal.setLoadingProgress"), Some(json!({ "value": 100 })));
        assert_eq!(sdk.count("Wortal.startGameAsync"), 1);
        adapter.send_message(PlatformMessage::PlayerGotAchievement, json!({})).await.unwrap();
        assert_eq!(sdk.count("Wortal.session.happyTime"), 1);
    }

    #[tokio::test]
    async fn writes_send_the_merged_save() {
        let (adapter, sdk) = wortal(json!(["player.setDataAsync"])).await;
        sdk.respond("Wortal.player.getDataAsync", json!({ "coins": 5 }));
        let values = adapter
            .get_data(&["coins".to_string()], StorageType::PlatformInternal, true)
            .await
            .unwrap();
        assert_eq!(values, vec![json!(5)]);

        adapter
            .set_data(&["level".to_string()], &[json!(2)], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(
            sdk.last_args("Wortal.player.setDataAsync"),
            Some(json!({ "data": { "coins": 5, "level": 2 } }))
        );

        adapter
            .delete_data(&["coins".to_string()], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(
            sdk.last_args("Wortal.player.setDataAsync"),
            Some(json!({ "data": { "level": 2 } }))
        );
    }

    #[tokio::test]
    async fn rewarded_dismiss_closes() {
        let (adapter, sdk) = wortal(json!([])).await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(sdk.last_args("Wortal.ads.showRewarded"), Some(json!({ "description": "Bonus" })));
        adapter.handle_sdk_event(&SdkEvent::new("rewarded.open"));
        adapter.handle_sdk_event(&SdkEvent::new("rewarded.dismiss"));
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));
    }
}
