// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// VK Play adapter.
//
// The per-game `mailru.core.js` exposes `iframeApi`. Login status and profile
// lookups answer directly. Registration, inventory and payments answer
// through callbacks, reported as SDK events and settled via
// `AdapterCore::settle_callback`. Ad progress arrives as `ads` events
// carrying `{type, code}`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, CatalogItem, InterstitialState, PlayerInfo, PurchaseResult, RewardedState, SdkEvent,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{array, str_field};
use crate::core::AdapterCore;
use crate::traits::*;

const SDK_GLOBAL: &str = "iframeApi";

pub fn sdk_url(game_id: &str) -> String {
    format!("https://vkplay.ru/app/{game_id}/static/mailru.core.js")
}

pub struct VkPlayAdapter {
    core: AdapterCore,
    rewarded_showing: AtomicBool,
}

impl VkPlayAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            rewarded_showing: AtomicBool::new(false),
        }
    }

    async fn load_player(&self) -> Result<()> {
        let status = self.core.call("iframeApi.getLoginStatus", json!({})).await?;
        let logged_in = str_field(&status, "status").as_deref() == Some("ok")
            && matches!(status.get("loginStatus").and_then(Value::as_i64), Some(2 | 3));
        if !logged_in {
            return Ok(());
        }
        let profile = self.core.call("iframeApi.userProfile", json!({})).await?;
        let mut player = PlayerInfo {
            authorized: true,
            ..PlayerInfo::default()
        };
        if str_field(&profile, "status").as_deref() == Some("ok") {
            player.id = str_field(&profile, "uid");
            player.name = str_field(&profile, "nick");
            player.photos = str_field(&profile, "avatar").into_iter().collect();
        }
        self.core.set_player(player);
        Ok(())
    }

    fn apply_ad_event(&self, payload: &Value) {
        let not_found = str_field(payload, "code").as_deref() == Some("AdsNotFound");
        let kind = str_field(payload, "type");
        if self.rewarded_showing.load(Ordering::Acquire) {
            let rewarded = self.core.rewarded();
            match kind.as_deref() {
                Some("adCompleted") => {
                    rewarded.set(RewardedState::Rewarded);
                    rewarded.set(RewardedState::Closed);
                }
                Some("adError") => {
                    rewarded.set(RewardedState::Failed);
                }
                Some("adDismissed") => {
                    rewarded.set(if not_found { RewardedState::Failed } else { RewardedState::Closed });
                }
                other => debug!(kind = ?other, "ignored ad event"),
            }
        } else {
            let interstitial = self.core.interstitial();
            match kind.as_deref() {
                Some("adCompleted") => {
                    interstitial.set(InterstitialState::Closed);
                }
                Some("adError") => {
                    interstitial.set(InterstitialState::Failed);
                }
                Some("adDismissed") => {
                    interstitial.set(if not_found { InterstitialState::Failed } else { InterstitialState::Closed });
                }
                other => debug!(kind = ?other, "ignored ad event"),
            }
        }
    }

    fn settle_registration(&self, payload: &Value) {
        let outcome = if str_field(payload, "status").as_deref() == Some("ok") {
            Ok(Value::Null)
        } else {
            let reason = str_field(payload, "errmsg").unwrap_or_else(|| "registration failed".into());
            Err(BridgeError::Sdk(reason))
        };
        self.core.settle_callback(ActionKind::AuthorizePlayer, outcome);
    }

    fn settle_inventory(&self, payload: &Value) {
        let outcome = match payload.as_array() {
            Some(items) if items.is_empty() => Err(BridgeError::Sdk("inventory is empty".into())),
            _ => Ok(payload.clone()),
        };
        self.core.settle_callback(ActionKind::GetCatalog, outcome);
    }

    fn settle_payment(&self, payload: &Value) {
        let outcome = match str_field(payload, "uid") {
            Some(uid) => Ok(Value::String(uid)),
            None => Err(BridgeError::Sdk("payment was not received".into())),
        };
        self.core.settle_callback(ActionKind::Purchase, outcome);
    }
}

fn catalog_item(item: &Value) -> Result<CatalogItem> {
    let id = str_field(item, "id")
        .or_else(|| str_field(item, "item_id"))
        .ok_or_else(|| BridgeError::MalformedResponse("inventory item without id".into()))?;
    Ok(CatalogItem {
        id,
        title: str_field(item, "title"),
        description: str_field(item, "description"),
        image_uri: str_field(item, "picture"),
        price: str_field(item, "price"),
        price_currency_code: str_field(item, "currency"),
        price_value: str_field(item, "price"),
    })
}

#[async_trait]
impl AdapterBase for VkPlayAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "vk_play"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let game_id = self.core.require_option("gameId")?;
                self.core.load_sdk(&sdk_url(&game_id), SDK_GLOBAL).await?;
                self.core.call("iframeApi", json!({ "appid": game_id })).await?;
                self.load_player().await?;
                info!(authorized = self.core.player().authorized, "vk play sdk ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        match event.name.as_str() {
            "ads" => self.apply_ad_event(&event.payload),
            "registerUser" => self.settle_registration(&event.payload),
            "getGameInventoryItems" => self.settle_inventory(&event.payload),
            "paymentReceived" => self.settle_payment(&event.payload),
            other => debug!(event = other, "ignored vk play event"),
        }
    }
}

#[async_trait]
impl SessionCapability for VkPlayAdapter {
    fn is_player_authorization_supported(&self) -> bool {
        true
    }

    /// A successful registration reloads the game window.
    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        if self.core.player().authorized {
            return Ok(());
        }
        self.core
            .callback(ActionKind::AuthorizePlayer, || async {
                self.core.call("iframeApi.registerUser", json!({})).await.map(|_| ())
            })
            .await?;
        if let Err(e) = self.core.call("iframeApi.reloadWindow", json!({})).await {
            warn!(error = %e, "window reload failed");
        }
        Ok(())
    }
}

impl StorageCapability for VkPlayAdapter {}

#[async_trait]
impl AdvertisementCapability for VkPlayAdapter {
    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_interstitial(&self, _options: Value) {
        self.rewarded_showing.store(false, Ordering::Release);
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("iframeApi.showAds", json!({ "interstitial": true })).await,
            Err(e) => Err(e),
        };
        match shown {
            Ok(_) => {
                state.set(InterstitialState::Opened);
            }
            Err(e) => {
                warn!(error = %e, "interstitial failed");
                state.set(InterstitialState::Failed);
            }
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        self.rewarded_showing.store(true, Ordering::Release);
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        let shown = match self.core.ensure_initialized() {
            Ok(()) => self.core.call("iframeApi.showAds", json!({ "interstitial": false })).await,
            Err(e) => Err(e),
        };
        match shown {
            Ok(_) => {
                state.set(RewardedState::Opened);
            }
            Err(e) => {
                warn!(error = %e, "rewarded failed");
                state.set(RewardedState::Failed);
            }
        }
    }
}

impl SocialCapability for VkPlayAdapter {}
impl LeaderboardCapability for VkPlayAdapter {}

#[async_trait]
impl PaymentsCapability for VkPlayAdapter {
    fn is_payments_supported(&self) -> bool {
        true
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseResult> {
        self.core.ensure_initialized()?;
        if product_id.is_empty() {
            return Err(BridgeError::InvalidArgument("product id is required".into()));
        }
        let uid = self
            .core
            .callback(ActionKind::Purchase, || async {
                self.core
                    .call("iframeApi.paymentFrameItem", json!({ "merchant_param": { "item_id": product_id } }))
                    .await
                    .map(|_| ())
            })
            .await?;
        Ok(PurchaseResult {
            product_id: product_id.to_string(),
            token: uid.as_str().map(String::from),
            payload: None,
        })
    }

    async fn get_catalog(&self) -> Result<Vec<CatalogItem>> {
        self.core.ensure_initialized()?;
        let items = self
            .core
            .callback(ActionKind::GetCatalog, || async {
                self.core.call("iframeApi.getGameInventoryItems", json!({})).await.map(|_| ())
            })
            .await?;
        array(&items, "inventory")?.iter().map(catalog_item).collect()
    }
}

impl RemoteConfigCapability for VkPlayAdapter {}
impl ClipboardCapability for VkPlayAdapter {}
