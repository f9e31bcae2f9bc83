// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter driven by a QA harness in the parent frame.
//
// Every call is reported to the parent as `{type, action, options}`. Most
// calls settle locally right after posting; only the ones listed in `Reply`
// wait for the harness, which answers with the same `type` and `action` and
// puts its data in a top-level field (`player`, `time`, `purchase`, ...).
// Replies carry no request id, so one request per reply kind is outstanding
// and concurrent callers share it. Ad progress arrives as advertisement
// messages with `payload.status`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    BannerState, CatalogItem, FrameMessage, FrameModule, InterstitialState, LeaderboardEntry,
    LeaderboardQuery, PlatformMessage, PlayerInfo, PurchaseResult, RewardedState, StorageType,
};
use playbridge_runtime::DeferredRegistry;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{decode, str_field, string_map};
use crate::core::AdapterCore;
use crate::traits::*;

/// How long the harness gets to answer a server time query.
const SERVER_TIME_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests that wait for a harness reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Reply {
    AuthorizePlayer,
    ServerTime,
    StorageGet,
    Purchase,
    Purchases,
    Catalog,
    ConsumePurchase,
    RemoteConfig,
    ClipboardWrite,
    ClipboardRead,
    LeaderboardScore,
    LeaderboardEntries,
}

impl Reply {
    const ALL: [Reply; 12] = [
        Reply::AuthorizePlayer,
        Reply::ServerTime,
        Reply::StorageGet,
        Reply::Purchase,
        Reply::Purchases,
        Reply::Catalog,
        Reply::ConsumePurchase,
        Reply::RemoteConfig,
        Reply::ClipboardWrite,
        Reply::ClipboardRead,
        Reply::LeaderboardScore,
        Reply::LeaderboardEntries,
    ];

    fn module(self) -> FrameModule {
        match self {
            Reply::AuthorizePlayer => FrameModule::Player,
            Reply::ServerTime => FrameModule::Platform,
            Reply::StorageGet => FrameModule::Storage,
            Reply::Purchase | Reply::Purchases | Reply::Catalog | Reply::ConsumePurchase => {
                FrameModule::Payments
            }
            Reply::RemoteConfig => FrameModule::RemoteConfig,
            Reply::ClipboardWrite | Reply::ClipboardRead => FrameModule::Clipboard,
            Reply::LeaderboardScore | Reply::LeaderboardEntries => FrameModule::Leaderboard,
        }
    }

    fn action(self) -> &'static str {
        match self {
            Reply::AuthorizePlayer => "authorize_player",
            Reply::ServerTime => "get_server_time",
            Reply::StorageGet => "get_data_from_storage",
            Reply::Purchase => "purchase",
            Reply::Purchases => "get_purchases",
            Reply::Catalog => "get_catalog",
            Reply::ConsumePurchase => "consume_purchase",
            Reply::RemoteConfig => "get_remote_config",
            Reply::ClipboardWrite => "clipboard_write",
            Reply::ClipboardRead => "clipboard_read",
            Reply::LeaderboardScore => "get_leaderboard_score",
            Reply::LeaderboardEntries => "get_leaderboard_entries",
        }
    }

    /// Top-level reply field holding the data; `None` when the reply itself
    /// is the acknowledgement.
    fn field(self) -> Option<&'static str> {
        match self {
            Reply::AuthorizePlayer => Some("player"),
            Reply::ServerTime => Some("time"),
            Reply::StorageGet => Some("storage"),
            Reply::Purchase => Some("purchase"),
            Reply::Purchases => Some("purchases"),
            Reply::Catalog => Some("catalog"),
            Reply::ConsumePurchase | Reply::RemoteConfig => Some("result"),
            Reply::ClipboardWrite => None,
            Reply::ClipboardRead => Some("text"),
            Reply::LeaderboardScore => Some("score"),
            Reply::LeaderboardEntries => Some("entries"),
        }
    }

    fn from_message(message: &FrameMessage) -> Option<Reply> {
        Reply::ALL
            .into_iter()
            .find(|r| r.module() == message.module && r.action() == message.action)
    }
}

pub struct QaToolAdapter {
    core: AdapterCore,
    replies: DeferredRegistry<Reply>,
    interstitial_active: AtomicBool,
    rewarded_active: AtomicBool,
}

impl QaToolAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            replies: DeferredRegistry::new(),
            interstitial_active: AtomicBool::new(false),
            rewarded_active: AtomicBool::new(false),
        }
    }

    /// Post `reply`'s request and wait for the harness to answer.
    ///
    /// The caller that posts owns the entry: if it is dropped before the
    /// answer arrives the entry is rejected with `Cancelled`, so the next
    /// call posts again instead of joining a request nobody drives.
    async fn request(&self, reply: Reply, options: Option<Value>) -> Result<Value> {
        self.replies
            .run_exclusive(reply, || async move {
                let answer = self.replies.get(reply).ok_or(BridgeError::Cancelled)?;
                self.post(reply.module(), reply.action(), options)?;
                answer.await
            })
            .await
    }

    fn post(&self, module: FrameModule, action: &str, options: Option<Value>) -> Result<()> {
        let mut message = FrameMessage::new(module, action);
        if let Some(options) = options {
            message = message.with_options(options);
        }
        self.core.host().messenger.post(&message)
    }

    /// Report a call the harness only observes.
    fn report(&self, module: FrameModule, action: &str, options: Option<Value>) {
        if let Err(e) = self.post(module, action, options) {
            warn!(error = %e, action, "could not report to harness");
        }
    }

    fn apply_reply(&self, reply: Reply, message: &FrameMessage) {
        let data = match reply.field() {
            Some(name) => message.field(name).cloned().unwrap_or(Value::Null),
            None => Value::Bool(true),
        };
        if !self.replies.resolve(reply, data) {
            debug!(action = %message.action, "reply without outstanding request");
        }
    }

    fn apply_ad_status(&self, message: &FrameMessage) {
        let Some(status) = message
            .payload
            .as_ref()
            .and_then(|p| p.get("status"))
            .and_then(Value::as_str)
        else {
            debug!(action = %message.action, "advertisement message without status");
            return;
        };

        if self.interstitial_active.load(Ordering::SeqCst) {
            let state = match status {
                "start" => Some(InterstitialState::Loading),
                "open" => Some(InterstitialState::Opened),
                "close" => Some(InterstitialState::Closed),
                _ => None,
            };
            if let Some(state) = state {
                if state == InterstitialState::Closed {
                    self.interstitial_active.store(false, Ordering::SeqCst);
                }
                self.core.interstitial().set(state);
            }
        }

        if self.rewarded_active.load(Ordering::SeqCst) {
            let state = match status {
                "start" => Some(RewardedState::Loading),
                "open" => Some(RewardedState::Opened),
                "rewarded" => Some(RewardedState::Rewarded),
                "close" => Some(RewardedState::Closed),
                _ => None,
            };
            if let Some(state) = state {
                if state == RewardedState::Closed {
                    self.rewarded_active.store(false, Ordering::SeqCst);
                }
                self.core.rewarded().set(state);
            }
        }
    }

    async fn platform_get(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        let options = json!({
            "key": keys,
            "storageType": StorageType::PlatformInternal.as_str(),
            "tryParseJson": try_parse_json,
        });
        let storage = self.request(Reply::StorageGet, Some(options)).await?;
        match storage {
            Value::Object(values) => Ok(keys
                .iter()
                .map(|key| values.get(key).cloned().unwrap_or(Value::Null))
                .collect()),
            Value::Array(values) if values.len() == keys.len() => Ok(values),
            other => Err(BridgeError::MalformedResponse(format!(
                "storage reply for {} keys: {other}",
                keys.len()
            ))),
        }
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

#[async_trait]
impl AdapterBase for QaToolAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "qa_tool"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                self.core.set_default_storage_type(StorageType::PlatformInternal);
                self.report(
                    FrameModule::Liveness,
                    "ping",
                    Some(json!({ "version": env!("CARGO_PKG_VERSION") })),
                );
                Ok(())
            })
            .await
    }

    fn handle_frame_message(&self, message: &FrameMessage) {
        if message.module == FrameModule::Advertisement {
            self.apply_ad_status(message);
            return;
        }
        match Reply::from_message(message) {
            Some(reply) => self.apply_reply(reply, message),
            None => debug!(module = ?message.module, action = %message.action, "unrecognised frame message"),
        }
    }
}

#[async_trait]
impl SessionCapability for QaToolAdapter {
    fn is_player_authorization_supported(&self) -> bool {
        true
    }

    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let player = self.request(Reply::AuthorizePlayer, None).await?;
        if !player.is_object() {
            return Err(BridgeError::MalformedResponse("authorize reply without player".into()));
        }
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(&player, "userId"),
            name: str_field(&player, "name"),
            photos: str_field(&player, "profilePictureUrl").into_iter().collect(),
        });
        Ok(())
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        self.core.ensure_initialized()?;
        let time = tokio::time::timeout(SERVER_TIME_TIMEOUT, self.request(Reply::ServerTime, None))
            .await
            .map_err(|_| BridgeError::Timeout("server time request".into()))??;
        parse_time(&time).ok_or_else(|| BridgeError::MalformedResponse("invalid server time".into()))
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.post(FrameModule::Platform, message.as_str(), None)
    }
}

#[async_trait]
impl StorageCapability for QaToolAdapter {
    fn is_storage_supported(&self, storage: StorageType) -> bool {
        self.report(
            FrameModule::Storage,
            "is_storage_supported",
            Some(json!({ "storageType": storage.as_str() })),
        );
        true
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        self.report(
            FrameModule::Storage,
            "is_storage_available",
            Some(json!({ "storageType": storage.as_str() })),
        );
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => true,
        }
    }

    async fn get_data(
        &self,
        keys: &[String],
        storage: StorageType,
        try_parse_json: bool,
    ) -> Result<Vec<Value>> {
        match storage {
            StorageType::PlatformInternal => self.platform_get(keys, try_parse_json).await,
            StorageType::LocalStorage => {
                self.report(
                    FrameModule::Storage,
                    "get_data_from_storage",
                    Some(json!({ "key": keys, "storageType": storage.as_str(), "tryParseJson": try_parse_json })),
                );
                self.core.get_local(keys, try_parse_json)
            }
        }
    }

    async fn set_data(&self, keys: &[String], values: &[Value], storage: StorageType) -> Result<()> {
        crate::storage::ensure_aligned(keys, values)?;
        self.report(
            FrameModule::Storage,
            "set_data_to_storage",
            Some(json!({ "key": keys, "value": values, "storageType": storage.as_str() })),
        );
        match storage {
            StorageType::PlatformInternal => Ok(()),
            StorageType::LocalStorage => self.core.set_local(keys, values),
        }
    }

    async fn delete_data(&self, keys: &[String], storage: StorageType) -> Result<()> {
        self.report(
            FrameModule::Storage,
            "delete_data_from_storage",
            Some(json!({ "key": keys, "storageType": storage.as_str() })),
        );
        match storage {
            StorageType::PlatformInternal => Ok(()),
            StorageType::LocalStorage => self.core.delete_local(keys),
        }
    }

    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.platform_get(keys, try_parse_json).await
    }
}

#[async_trait]
impl AdvertisementCapability for QaToolAdapter {
    fn is_banner_supported(&self) -> bool {
        self.core.is_initialized()
    }

    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_banner(&self, _options: Value) {
        self.core.banner().set(BannerState::Shown);
        self.report(
            FrameModule::Advertisement,
            BannerState::Shown.as_str(),
            Some(json!({ "type": "banner" })),
        );
    }

    async fn hide_banner(&self) {
        self.core.banner().set(BannerState::Hidden);
        self.report(
            FrameModule::Advertisement,
            BannerState::Hidden.as_str(),
            Some(json!({ "type": "banner" })),
        );
    }

    async fn show_interstitial(&self, _options: Value) {
        self.interstitial_active.store(true, Ordering::SeqCst);
        if let Err(e) = self.post(FrameModule::Advertisement, "interstitial", None) {
            warn!(error = %e, "interstitial request not delivered");
            self.interstitial_active.store(false, Ordering::SeqCst);
            self.core.interstitial().set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        self.rewarded_active.store(true, Ordering::SeqCst);
        if let Err(e) = self.post(FrameModule::Advertisement, "reward", None) {
            warn!(error = %e, "rewarded request not delivered");
            self.rewarded_active.store(false, Ordering::SeqCst);
            self.core.rewarded().set(RewardedState::Failed);
        }
    }

    async fn check_ad_block(&self) -> Result<bool> {
        self.report(FrameModule::CheckAdblock, "adblock_detect", None);
        Ok(self.core.detect_ad_block().await)
    }
}

#[async_trait]
impl SocialCapability for QaToolAdapter {
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

    fn is_rate_supported(&self) -> bool {
        true
    }

    async fn share(&self, _options: Value) -> Result<()> {
        self.post(FrameModule::Social, "share", None)
    }

    async fn invite_friends(&self, _options: Value) -> Result<()> {
        self.post(FrameModule::Social, "invite_friends", None)
    }

    async fn join_community(&self, _options: Value) -> Result<()> {
        self.post(FrameModule::Social, "join_community", None)
    }

    async fn create_post(&self, _options: Value) -> Result<()> {
        self.post(FrameModule::Social, "create_post", None)
    }

    async fn add_to_home_screen(&self) -> Result<()> {
        self.post(FrameModule::Social, "add_to_home_screen", None)
    }

    async fn add_to_favorites(&self) -> Result<()> {
        self.post(FrameModule::Social, "add_to_favorites", None)
    }

    async fn rate(&self) -> Result<()> {
        self.post(FrameModule::Social, "rate", None)
    }
}

#[async_trait]
impl LeaderboardCapability for QaToolAdapter {
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

    fn is_leaderboard_native_popup_supported(&self) -> bool {
        true
    }

    async fn set_leaderboard_score(&self, leaderboard: &str, score: i64) -> Result<()> {
        self.post(
            FrameModule::Leaderboard,
            "set_leaderboard_score",
            Some(json!({ "leaderboardName": leaderboard, "score": score })),
        )
    }

    async fn get_leaderboard_score(&self, leaderboard: &str) -> Result<i64> {
        self.core.ensure_initialized()?;
        let score = self
            .request(Reply::LeaderboardScore, Some(json!({ "leaderboardName": leaderboard })))
            .await?;
        match &score {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| BridgeError::MalformedResponse(format!("leaderboard score {score}")))
    }

    async fn get_leaderboard_entries(&self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>> {
        self.core.ensure_initialized()?;
        let entries = self
            .request(Reply::LeaderboardEntries, Some(serde_json::to_value(query)?))
            .await?;
        decode("leaderboard entries", entries)
    }

    async fn show_leaderboard_native_popup(&self, options: Value) -> Result<()> {
        self.post(FrameModule::Leaderboard, "show_leaderboard_native_popup", Some(options))
    }
}

#[async_trait]
impl PaymentsCapability for QaToolAdapter {
    fn is_payments_supported(&self) -> bool {
        true
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseResult> {
        self.core.ensure_initialized()?;
        let purchase = self
            .request(Reply::Purchase, Some(json!({ "id": product_id })))
            .await?;
        if !purchase.is_object() {
            return Err(BridgeError::MalformedResponse("invalid purchase".into()));
        }
        decode("purchase", purchase)
    }

    async fn consume_purchase(&self, token: &str) -> Result<()> {
        self.core.ensure_initialized()?;
        self.request(Reply::ConsumePurchase, Some(json!({ "token": token })))
            .await
            .map(|_| ())
    }

    async fn get_catalog(&self) -> Result<Vec<CatalogItem>> {
        self.core.ensure_initialized()?;
        let catalog = self.request(Reply::Catalog, None).await?;
        decode("catalog", catalog)
    }

    async fn get_purchases(&self) -> Result<Vec<PurchaseResult>> {
        self.core.ensure_initialized()?;
        let purchases = self.request(Reply::Purchases, None).await?;
        decode("purchases", purchases)
    }
}

#[async_trait]
impl RemoteConfigCapability for QaToolAdapter {
    fn is_remote_config_supported(&self) -> bool {
        true
    }

    async fn get_remote_config(&self, options: Value) -> Result<HashMap<String, String>> {
        self.core.ensure_initialized()?;
        let result = self.request(Reply::RemoteConfig, Some(options)).await?;
        string_map(&result)
    }
}

#[async_trait]
impl ClipboardCapability for QaToolAdapter {
    fn is_clipboard_supported(&self) -> bool {
        true
    }

    async fn clipboard_read(&self) -> Result<String> {
        self.core.ensure_initialized()?;
        let text = self.request(Reply::ClipboardRead, Some(json!({}))).await?;
        decode("clipboard text", text)
    }

    async fn clipboard_write(&self, text: &str) -> Result<()> {
        self.core.ensure_initialized()?;
        self.request(Reply::ClipboardWrite, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }
}
