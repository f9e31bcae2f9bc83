// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Absolute Games (ag.ru) adapter.
//
// `AgRuSdk` callbacks take `(data, error)`; calls resolve to `data` and a
// non-null `error` surfaces as a host error. Campaign progress arrives as
// `ShowCampaign` SDK events with `{type, status, reward, error}`. Saves are
// one object per player, kept in the core's snapshot.

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{ActionKind, InterstitialState, PlayerInfo, RewardedState, SdkEvent, StorageType};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::{bool_field, str_field};
use crate::core::AdapterCore;
use crate::storage::read_snapshot;
use crate::traits::*;

pub const SDK_URL: &str = "https://unpkg.com/@agru/sdk/dist/umd/index.min.js";
const SDK_GLOBAL: &str = "AgRuSdk";

pub struct AbsoluteGamesAdapter {
    core: AdapterCore,
}

impl AbsoluteGamesAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }

    async fn load_player(&self) -> Result<()> {
        let options = self.core.call("AgRuSdk.options", Value::Null).await?;
        let id = str_field(&options, "player_id");
        // `guest` is the string "false" for signed-in players.
        let authorized = str_field(&options, "guest").as_deref() == Some("false");
        let mut player = PlayerInfo {
            authorized,
            id: id.clone(),
            ..PlayerInfo::default()
        };
        if let Some(id) = id {
            match self.core.call("AgRuSdk.getUsers", json!({ "ids": [id] })).await {
                Ok(Value::Array(users)) if users.len() == 1 => {
                    player.name = str_field(&users[0], "full_name");
                    player.photos = str_field(&users[0], "avatar").into_iter().collect();
                }
                Ok(_) => debug!("player profile not found"),
                Err(e) => warn!(error = %e, "player profile lookup failed"),
            }
        }
        self.core.set_player(player);
        Ok(())
    }

    fn require_authorized(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        if self.core.player().authorized {
            Ok(())
        } else {
            Err(BridgeError::Storage("player is not authorized".into()))
        }
    }

    async fn snapshot(&self) -> Result<Map<String, Value>> {
        if let Some(snapshot) = self.core.platform_snapshot() {
            return Ok(snapshot);
        }
        let data = match self.core.call("AgRuSdk.getSaveData", Value::Null).await? {
            Value::Object(data) => data,
            _ => Map::new(),
        };
        Ok(self.core.seed_platform_snapshot(data))
    }

    async fn write_snapshot(&self, edit: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        self.snapshot().await?;
        let merged = self.core.update_platform_snapshot(edit);
        self.core
            .call("AgRuSdk.setSaveData", Value::Object(merged))
            .await
            .map(|_| ())
    }

    fn apply_campaign(&self, payload: &Value) {
        let failed = payload.get("error").is_some_and(|e| !e.is_null());
        let opened = bool_field(payload, "status");
        if str_field(payload, "type").as_deref() == Some("rewarded") {
            let state = self.core.rewarded();
            if failed {
                state.set(RewardedState::Failed);
            } else if opened {
                state.set(RewardedState::Opened);
            } else {
                if bool_field(payload, "reward") {
                    state.set(RewardedState::Rewarded);
                }
                state.set(RewardedState::Closed);
            }
        } else {
            let state = self.core.interstitial();
            state.set(match (failed, opened) {
                (true, _) => InterstitialState::Failed,
                (false, true) => InterstitialState::Opened,
                (false, false) => InterstitialState::Closed,
            });
        }
    }
}

#[async_trait]
impl AdapterBase for AbsoluteGamesAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "absolute_games"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.load_player().await?;
                let authorized = self.core.player().authorized;
                if authorized {
                    self.core.set_default_storage_type(StorageType::PlatformInternal);
                }
                info!(authorized, "absolute games sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        match event.name.as_str() {
            "ShowCampaign" => self.apply_campaign(&event.payload),
            other => debug!(event = other, "ignored absolute games event"),
        }
    }
}

#[async_trait]
impl SessionCapability for AbsoluteGamesAdapter {
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
                self.core.call("AgRuSdk.authorize", Value::Null).await?;
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
impl StorageCapability for AbsoluteGamesAdapter {
    fn is_storage_supported(&self, _storage: StorageType) -> bool {
        true
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => self.core.player().authorized,
        }
    }

    /// Reads come from the cached save once it has been fetched.
    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.core.ensure_initialized()?;
        if let Some(snapshot) = self.core.platform_snapshot() {
            return Ok(read_snapshot(&snapshot, keys, try_parse_json));
        }
        self.require_authorized()?;
        let snapshot = self.snapshot().await?;
        Ok(read_snapshot(&snapshot, keys, try_parse_json))
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.require_authorized()?;
        self.write_snapshot(|save| {
            for (key, value) in keys.iter().zip(values) {
                save.insert(key.clone(), value.clone());
            }
        })
        .await
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.require_authorized()?;
        self.write_snapshot(|save| {
            for key in keys {
                save.remove(key);
            }
        })
        .await
    }
}

#[async_trait]
impl AdvertisementCapability for AbsoluteGamesAdapter {
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
            Ok(()) => self.core.call("AgRuSdk.showCampaign", json!({ "type": "default" })).await,
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
            Ok(()) => self.core.call("AgRuSdk.showCampaign", json!({ "type": "rewarded" })).await,
            Err(e) => Err(e),
        };
        if let Err(e) = shown {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }
}

#[async_trait]
impl SocialCapability for AbsoluteGamesAdapter {
    fn is_external_links_allowed(&self) -> bool {
        false
    }
}

impl LeaderboardCapability for AbsoluteGamesAdapter {}
impl PaymentsCapability for AbsoluteGamesAdapter {}
impl RemoteConfigCapability for AbsoluteGamesAdapter {}
impl ClipboardCapability for AbsoluteGamesAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    async fn absolute_games(guest: &str) -> (AbsoluteGamesAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        sdk.respond("AgRuSdk.options", json!({ "player_id": "ag-3", "guest": guest }))
            .respond(
                "AgRuSdk.getUsers",
                json!([{ "full_name": "Ann Lee", "avatar": "https://ag.ru/a.png" }]),
            );
        let adapter = AbsoluteGamesAdapter::new(core_with(
            PlatformId::AbsoluteGames,
            "https://ag.ru/games/x",
            sdk.clone(),
            Value::Null,
        ));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn signed_in_player_uses_platform_storage() {
        let (adapter, sdk) = absolute_games("false").await;
        assert_eq!(sdk.last_args("AgRuSdk.getUsers"), Some(json!({ "ids": ["ag-3"] })));
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.name.as_deref(), Some("Ann Lee"));
        assert_eq!(adapter.default_storage_type(), StorageType::PlatformInternal);
        assert!(!adapter.is_external_links_allowed());
    }

    #[tokio::test]
    async fn guests_cannot_use_platform_storage() {
        let (adapter, sdk) = absolute_games("true").await;
        assert!(!adapter.player().authorized);
        assert_eq!(adapter.player().id.as_deref(), Some("ag-3"));
        assert_eq!(adapter.default_storage_type(), StorageType::LocalStorage);
        assert!(matches!(
            adapter.get_data(&["a".to_string()], StorageType::PlatformInternal, true).await,
            Err(BridgeError::Storage(_))
        ));
        assert_eq!(sdk.count("AgRuSdk.getSaveData"), 0);
    }

    #[tokio::test]
    async fn save_is_fetched_once_and_written_whole() {
        let (adapter, sdk) = absolute_games("false").await;
        sdk.respond("AgRuSdk.getSaveData", json!({ "gold": 3 }));
        let keys = ["gold".to_string(), "level".to_string()];
        let values = adapter.get_data(&keys, StorageType::PlatformInternal, true).await.unwrap();
        assert_eq!(values, vec![json!(3), Value::Null]);
        adapter.get_data(&keys, StorageType::PlatformInternal, true).await.unwrap();
        assert_eq!(sdk.count("AgRuSdk.getSaveData"), 1);

        adapter
            .set_data(&["level".to_string()], &[json!(9)], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(sdk.last_args("AgRuSdk.setSaveData"), Some(json!({ "gold": 3, "level": 9 })));
    }

    #[tokio::test]
    async fn campaign_events_drive_rewarded() {
        let (adapter, sdk) = absolute_games("false").await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(sdk.last_args("AgRuSdk.showCampaign"), Some(json!({ "type": "rewarded" })));
        adapter.handle_sdk_event(
            &SdkEvent::new("ShowCampaign").with_payload(json!({ "type": "rewarded", "status": true, "error": null })),
        );
        adapter.handle_sdk_event(
            &SdkEvent::new("ShowCampaign").with_payload(json!({ "type": "rewarded", "status": false, "reward": true, "error": null })),
        );
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));

        adapter.show_interstitial(json!({})).await;
        adapter.handle_sdk_event(
            &SdkEvent::new("ShowCampaign").with_payload(json!({ "type": "default", "error": "no fill" })),
        );
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Failed));
    }
}
