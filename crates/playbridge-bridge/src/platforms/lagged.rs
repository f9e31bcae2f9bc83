// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lagged adapter.
//
// Needs `devId` and `publisherId`. Request/response SDK calls (`User.get`,
// `Scores.save`) return their callback argument directly; ad progress comes
// back as SDK events: `APIAds.closed` after an interstitial, and
// `GEvents.canShow` / `GEvents.reward` with `{success}` for rewarded ads.

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, InterstitialState, PlayerInfo, RewardedState, SdkEvent, StorageType,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{bool_field, str_field};
use crate::core::AdapterCore;
use crate::traits::*;

pub const SDK_URL: &str = "https://lagged.com/api/rev-share/lagged.js";
const SDK_GLOBAL: &str = "LaggedAPI";

pub struct LaggedAdapter {
    core: AdapterCore,
}

impl LaggedAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }

    async fn load_player(&self) -> Result<()> {
        let response = self.core.call("LaggedAPI.User.get", json!({})).await?;
        let user = response.get("user").cloned().unwrap_or(Value::Null);
        // Guests come back with id 0.
        let signed_in = user.get("id").and_then(Value::as_i64).is_some_and(|id| id > 0);
        if signed_in {
            self.core.set_player(PlayerInfo {
                authorized: true,
                id: str_field(&user, "id"),
                name: str_field(&user, "name"),
                photos: str_field(&user, "avatar").into_iter().collect(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AdapterBase for LaggedAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "lagged"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let dev_id = self.core.require_option("devId")?;
                let publisher_id = self.core.require_option("publisherId")?;
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                self.core
                    .call(
                        "LaggedAPI.init",
                        json!({ "devId": dev_id, "publisherId": publisher_id }),
                    )
                    .await?;
                self.load_player().await?;
                info!(authorized = self.core.player().authorized, "lagged sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let success = bool_field(&event.payload, "success");
        match event.name.as_str() {
            "APIAds.closed" => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            "GEvents.canShow" if !success => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            "GEvents.canShow" => debug!("rewarded ad available"),
            "GEvents.reward" if success => {
                self.core.rewarded().set(RewardedState::Rewarded);
                self.core.rewarded().set(RewardedState::Closed);
            }
            "GEvents.reward" => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            other => debug!(event = other, "ignored lagged event"),
        }
    }
}

impl SessionCapability for LaggedAdapter {}

#[async_trait]
impl StorageCapability for LaggedAdapter {
    fn is_storage_supported(&self, storage: StorageType) -> bool {
        matches!(storage, StorageType::LocalStorage)
    }
}

#[async_trait]
impl AdvertisementCapability for LaggedAdapter {
    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    /// Lagged reports no opening; the ad counts as open once requested.
    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
            return;
        }
        state.set(InterstitialState::Loading);
        state.set(InterstitialState::Opened);
        if let Err(e) = self.core.call("LaggedAPI.APIAds.show", json!({})).await {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        if let Err(e) = self.core.ensure_initialized() {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
            return;
        }
        state.set(RewardedState::Loading);
        state.set(RewardedState::Opened);
        if let Err(e) = self.core.call("LaggedAPI.GEvents.reward", json!({})).await {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }
}

impl SocialCapability for LaggedAdapter {}

#[async_trait]
impl LeaderboardCapability for LaggedAdapter {
    fn is_leaderboard_supported(&self) -> bool {
        true
    }

    fn is_leaderboard_set_score_supported(&self) -> bool {
        true
    }

    /// `leaderboard` is the Lagged board id.
    async fn set_leaderboard_score(&self, leaderboard: &str, score: i64) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.core.player().authorized {
            return Err(BridgeError::Sdk("player is not authorized".into()));
        }
        if leaderboard.is_empty() {
            return Err(BridgeError::InvalidArgument("board id is required".into()));
        }
        self.core
            .exclusive(ActionKind::SetLeaderboardScore, || async {
                let response = self
                    .core
                    .call("LaggedAPI.Scores.save", json!({ "score": score, "board": leaderboard }))
                    .await?;
                if bool_field(&response, "success") {
                    Ok(())
                } else {
                    let reason = str_field(&response, "errormsg").unwrap_or_else(|| "score rejected".into());
                    Err(BridgeError::Sdk(reason))
                }
            })
            .await
    }
}

impl PaymentsCapability for LaggedAdapter {}
impl RemoteConfigCapability for LaggedAdapter {}
impl ClipboardCapability for LaggedAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    const GAME_URL: &str = "https://lagged.com/play/123";

    fn options() -> Value {
        json!({ "devId": "dev-1", "publisherId": "pub-1" })
    }

    async fn lagged(user: Value) -> (LaggedAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        sdk.respond("LaggedAPI.User.get", json!({ "user": user }));
        let adapter = LaggedAdapter::new(core_with(PlatformId::Lagged, GAME_URL, sdk.clone(), options()));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn both_ids_are_required() {
        let sdk = ScriptedSdk::new();
        let adapter = LaggedAdapter::new(core_with(
            PlatformId::Lagged,
            GAME_URL,
            sdk.clone(),
            json!({ "devId": "dev-1" }),
        ));
        assert_eq!(
            adapter.initialize().await,
            Err(BridgeError::missing_config("lagged", "publisherId"))
        );
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn signed_in_user_is_authorized() {
        let (adapter, sdk) = lagged(json!({ "id": 42, "name": "Kit", "avatar": "https://lagged/a.png" })).await;
        assert_eq!(
            sdk.last_args("LaggedAPI.init"),
            Some(json!({ "devId": "dev-1", "publisherId": "pub-1" }))
        );
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("42"));
        assert_eq!(player.photos, vec!["https://lagged/a.png"]);
        assert!(!adapter.is_storage_supported(StorageType::PlatformInternal));
    }

    #[tokio::test]
    async fn guest_cannot_post_scores() {
        let (adapter, sdk) = lagged(json!({ "id": 0 })).await;
        assert!(!adapter.player().authorized);
        assert!(adapter.is_leaderboard_set_score_supported());
        assert!(!adapter.is_leaderboard_get_entries_supported());
        assert!(adapter.set_leaderboard_score("board-1", 10).await.is_err());
        assert_eq!(sdk.count("LaggedAPI.Scores.save"), 0);
    }

    #[tokio::test]
    async fn score_save_reports_error_message() {
        let (adapter, sdk) = lagged(json!({ "id": 7, "name": "Kit" })).await;
        sdk.respond("LaggedAPI.Scores.save", json!({ "success": false, "errormsg": "bad board" }));
        assert_eq!(
            adapter.set_leaderboard_score("board-1", 10).await,
            Err(BridgeError::Sdk("bad board".into()))
        );
        sdk.respond("LaggedAPI.Scores.save", json!({ "success": true }));
        adapter.set_leaderboard_score("board-1", 10).await.unwrap();
        assert_eq!(
            sdk.last_args("LaggedAPI.Scores.save"),
            Some(json!({ "score": 10, "board": "board-1" }))
        );
    }

    #[tokio::test]
    async fn rewarded_outcome_comes_from_events() {
        let (adapter, _) = lagged(json!({ "id": 0 })).await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Opened));
        adapter.handle_sdk_event(&SdkEvent::new("GEvents.canShow").with_payload(json!({ "success": true })));
        adapter.handle_sdk_event(&SdkEvent::new("GEvents.reward").with_payload(json!({ "success": true })));
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));

        adapter.show_interstitial(json!({})).await;
        adapter.handle_sdk_event(&SdkEvent::new("APIAds.closed"));
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Closed));
    }
}
