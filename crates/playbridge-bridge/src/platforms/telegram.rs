// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Telegram Mini Apps adapter.
//
// Players are always signed in; identity and language come from the launch
// init data. Game data lives in Telegram CloudStorage. Ads are optional and
// served by Adsgram when an `adsgramBlockId` option is configured.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, DeviceType, InterstitialState, PlatformMessage, PlayerInfo, RewardedState,
    SdkEvent, StorageType,
};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::str_field;
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

pub const SDK_URL: &str = "https://telegram.org/js/telegram-web-app.js";
pub const ADS_SDK_URL: &str = "https://sad.adsgram.ai/js/sad.min.js";
const SDK_GLOBAL: &str = "Telegram.WebApp";
const SHARE_URL: &str = "https://t.me/share/url";

pub struct TelegramAdapter {
    core: AdapterCore,
    client: Mutex<Option<String>>,
    ads_ready: AtomicBool,
    rewarded_in_flight: AtomicBool,
}

impl TelegramAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            client: Mutex::new(None),
            ads_ready: AtomicBool::new(false),
            rewarded_in_flight: AtomicBool::new(false),
        }
    }

    fn read_init_data(&self, init: &Value) -> Result<()> {
        let user = init
            .get("user")
            .ok_or_else(|| BridgeError::MalformedResponse("init data without user".into()))?;
        let name = [str_field(user, "first_name"), str_field(user, "last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(user, "id"),
            name: (!name.is_empty()).then_some(name),
            photos: str_field(user, "photo_url").into_iter().collect(),
        });
        if let Some(language) = str_field(user, "language_code") {
            self.core.set_language(language);
        }
        Ok(())
    }

    async fn init_ads(&self, block_id: &str) -> Result<()> {
        self.core.load_sdk_script(ADS_SDK_URL).await?;
        self.core.call("Adsgram.init", json!({ "blockId": block_id })).await?;
        self.ads_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn show_ad(&self) -> Result<()> {
        self.core.ensure_initialized()?;
        if !self.ads_ready.load(Ordering::Acquire) {
            return Err(BridgeError::Unsupported);
        }
        self.core.call("Adsgram.show", Value::Null).await.map(|_| ())
    }
}

#[async_trait]
impl AdapterBase for TelegramAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "telegram"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                let init = self.core.call("Telegram.WebApp.initDataUnsafe", Value::Null).await?;
                self.read_init_data(&init)?;

                let client = self.core.call("Telegram.WebApp.platform", Value::Null).await?;
                *self.client.lock().unwrap_or_else(|e| e.into_inner()) = client.as_str().map(String::from);
                self.core.set_default_storage_type(StorageType::PlatformInternal);

                if let Some(block_id) = self.core.option_str("adsgramBlockId") {
                    // Games still start without ads.
                    if let Err(e) = self.init_ads(&block_id).await {
                        warn!(error = %e, "adsgram unavailable");
                    }
                }
                info!(client = ?client.as_str(), "telegram web app ready");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        let rewarded = self.rewarded_in_flight.load(Ordering::Acquire);
        match (event.name.as_str(), rewarded) {
            ("adsgram.onStart", false) => {
                self.core.interstitial().set(InterstitialState::Opened);
            }
            ("adsgram.onStart", true) => {
                self.core.rewarded().set(RewardedState::Opened);
            }
            ("adsgram.onSkip", false) => {
                self.core.interstitial().set(InterstitialState::Closed);
            }
            ("adsgram.onSkip", true) => {
                self.core.rewarded().set(RewardedState::Closed);
            }
            ("adsgram.onReward", _) => {
                self.core.rewarded().set(RewardedState::Rewarded);
                self.core.rewarded().set(RewardedState::Closed);
            }
            ("adsgram.onError" | "adsgram.onBannerNotFound", false) => {
                self.core.interstitial().set(InterstitialState::Failed);
            }
            ("adsgram.onError" | "adsgram.onBannerNotFound", true) => {
                self.core.rewarded().set(RewardedState::Failed);
            }
            (other, _) => debug!(event = other, "unhandled telegram event"),
        }
    }
}

#[async_trait]
impl SessionCapability for TelegramAdapter {
    fn device_type(&self) -> DeviceType {
        let client = self.client.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match client.as_deref() {
            Some("android" | "android_x" | "ios") => DeviceType::Mobile,
            Some("tdesktop" | "unigram" | "macos") => DeviceType::Desktop,
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

    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        match message {
            PlatformMessage::GameReady => self.core.call("Telegram.WebApp.ready", Value::Null).await.map(|_| ()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageCapability for TelegramAdapter {
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
        let items = self
            .core
            .call("CloudStorage.getItems", json!({ "keys": keys }))
            .await?;
        Ok(keys
            .iter()
            .map(|key| match items.get(key) {
                Some(Value::String(raw)) if !raw.is_empty() => decode_value(raw, try_parse_json),
                _ => Value::Null,
            })
            .collect())
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        for (key, value) in keys.iter().zip(values) {
            self.core
                .call("CloudStorage.setItem", json!({ "key": key, "value": encode_value(value) }))
                .await?;
        }
        Ok(())
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        self.core
            .call("CloudStorage.removeItems", json!({ "keys": keys }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AdvertisementCapability for TelegramAdapter {
    fn is_interstitial_supported(&self) -> bool {
        self.core.option_str("adsgramBlockId").is_some()
    }

    fn is_rewarded_supported(&self) -> bool {
        self.core.option_str("adsgramBlockId").is_some()
    }

    async fn show_interstitial(&self, _options: Value) {
        self.rewarded_in_flight.store(false, Ordering::Release);
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        if let Err(e) = self.show_ad().await {
            warn!(error = %e, "interstitial not shown");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        self.rewarded_in_flight.store(true, Ordering::Release);
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        if let Err(e) = self.show_ad().await {
            warn!(error = %e, "rewarded not shown");
            state.set(RewardedState::Failed);
        }
    }
}

#[async_trait]
impl SocialCapability for TelegramAdapter {
    fn is_share_supported(&self) -> bool {
        true
    }

    /// Opens Telegram's share sheet for `url` with an optional `text`.
    async fn share(&self, options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let target = str_field(&options, "url")
            .ok_or_else(|| BridgeError::InvalidArgument("share needs a url".into()))?;
        let mut params = vec![("url", target)];
        if let Some(text) = str_field(&options, "text") {
            params.push(("text", text));
        }
        let link = Url::parse_with_params(SHARE_URL, &params)
            .map_err(|e| BridgeError::InvalidArgument(format!("share link: {e}")))?;
        self.core
            .exclusive(ActionKind::Share, || async {
                self.core
                    .call("Telegram.WebApp.openTelegramLink", json!({ "url": link.as_str() }))
                    .await
                    .map(|_| ())
            })
            .await
    }
}

impl LeaderboardCapability for TelegramAdapter {}
impl PaymentsCapability for TelegramAdapter {}
impl RemoteConfigCapability for TelegramAdapter {}

#[async_trait]
impl ClipboardCapability for TelegramAdapter {
    fn is_clipboard_supported(&self) -> bool {
        true
    }

    async fn clipboard_read(&self) -> Result<String> {
        self.core.ensure_initialized()?;
        self.core
            .exclusive(ActionKind::ClipboardRead, || async {
                match self.core.call("Telegram.WebApp.readTextFromClipboard", Value::Null).await? {
                    Value::String(text) if !text.is_empty() => Ok(text),
                    _ => Err(BridgeError::Sdk("clipboard is empty or access was denied".into())),
                }
            })
            .await
    }
}
