// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PlayDeck (Telegram) adapter.
//
// PlayDeck has no script. The game posts `{playdeck: {method, ...}}` to its
// parent, which the host exposes as `playdeck.<method>` SDK calls. Answers
// come back as `playdeck` SDK events carrying the inner object. Answers have
// no request id, so one request per `Reply` kind is outstanding at a time.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    InterstitialState, PlatformMessage, PlayerInfo, PurchaseResult, RewardedState, SdkEvent, StorageType,
};
use playbridge_runtime::DeferredRegistry;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::str_field;
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

/// Requests that wait for an answer from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Reply {
    UserProfile,
    Data,
    PaymentLink,
    Invoice,
}

/// Keys of the read in flight and the answers gathered so far.
#[derive(Default)]
struct ReadBatch {
    expected: Vec<String>,
    received: Map<String, Value>,
}

pub struct PlayDeckAdapter {
    core: AdapterCore,
    replies: DeferredRegistry<Reply>,
    reads: tokio::sync::Mutex<()>,
    batch: Mutex<ReadBatch>,
    share_params: Mutex<Value>,
    rewarded_showing: AtomicBool,
}

impl PlayDeckAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self {
            core,
            replies: DeferredRegistry::new(),
            reads: tokio::sync::Mutex::new(()),
            batch: Mutex::new(ReadBatch::default()),
            share_params: Mutex::new(Value::Null),
            rewarded_showing: AtomicBool::new(false),
        }
    }

    fn batch(&self) -> MutexGuard<'_, ReadBatch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn post(&self, method: &str, args: Value) -> Result<()> {
        self.core.call(&format!("playdeck.{method}"), args).await.map(|_| ())
    }

    /// Run `start` and wait for the parent to answer `reply`. A dropped
    /// caller rejects the entry with `Cancelled`.
    async fn await_reply<F, Fut>(&self, reply: Reply, start: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.replies
            .run_exclusive(reply, || async {
                let answer = self.replies.get(reply).ok_or(BridgeError::Cancelled)?;
                start().await?;
                answer.await
            })
            .await
    }

    fn settle(&self, reply: Reply, outcome: Result<Value>) {
        let settled = match outcome {
            Ok(value) => self.replies.resolve(reply, value),
            Err(e) => self.replies.reject(reply, e),
        };
        if !settled {
            debug!(?reply, "answer without outstanding request");
        }
    }

    fn apply_profile(&self, profile: &Value) {
        if let Some(locale) = str_field(profile, "locale") {
            self.core.set_language(locale);
        }
        *self.share_params.lock().unwrap_or_else(PoisonError::into_inner) =
            profile.get("params").cloned().unwrap_or(Value::Null);
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(profile, "telegramId"),
            name: str_field(profile, "username"),
            photos: str_field(profile, "avatar").into_iter().collect(),
        });
    }

    fn apply_data(&self, message: &Value) {
        let Some(key) = str_field(message, "key") else {
            debug!("data answer without key");
            return;
        };
        let value = message.pointer("/value/data").cloned().unwrap_or(Value::Null);
        let complete = {
            let mut batch = self.batch();
            batch.received.insert(key, value);
            let done = batch.expected.iter().all(|k| batch.received.contains_key(k));
            done.then(|| std::mem::take(&mut batch.received))
        };
        if let Some(values) = complete {
            self.settle(Reply::Data, Ok(Value::Object(values)));
        }
    }

    fn apply_invoice(&self, invoice: &Value) {
        match str_field(invoice, "status").as_deref() {
            Some("paid") => self.settle(Reply::Invoice, Ok(invoice.clone())),
            Some(status @ ("cancelled" | "failed")) => {
                self.settle(Reply::Invoice, Err(BridgeError::Sdk(format!("invoice {status}"))));
            }
            other => debug!(status = ?other, "invoice pending"),
        }
    }

    fn apply_ad(&self, method: &str) {
        if self.rewarded_showing.load(Ordering::Acquire) {
            let state = self.core.rewarded();
            match method {
                "startAd" => {
                    state.set(RewardedState::Opened);
                }
                "rewardedAd" => {
                    state.set(RewardedState::Rewarded);
                    state.set(RewardedState::Closed);
                }
                "skipAd" => {
                    state.set(RewardedState::Closed);
                }
                _ => {
                    state.set(RewardedState::Failed);
                }
            }
        } else {
            let state = self.core.interstitial();
            match method {
                "startAd" => {
                    state.set(InterstitialState::Opened);
                }
                "rewardedAd" | "skipAd" => {
                    state.set(InterstitialState::Closed);
                }
                _ => {
                    state.set(InterstitialState::Failed);
                }
            }
        }
    }

    fn apply_message(&self, message: &Value) {
        let value = message.get("value").cloned().unwrap_or(Value::Null);
        match str_field(message, "method").as_deref() {
            Some("getUserProfile") => self.settle(Reply::UserProfile, Ok(value)),
            Some("getData") => self.apply_data(message),
            Some("requestPayment") => self.settle(Reply::PaymentLink, Ok(value)),
            Some("invoiceClosed") => self.apply_invoice(&value),
            Some(ad @ ("startAd" | "rewardedAd" | "skipAd" | "errAd" | "notFoundAd")) => self.apply_ad(ad),
            other => debug!(method = ?other, "ignored playdeck message"),
        }
    }

    async fn show_ad(&self, rewarded: bool) -> Result<()> {
        self.core.ensure_initialized()?;
        self.rewarded_showing.store(rewarded, Ordering::Release);
        self.post("showAd", json!({})).await
    }
}

#[async_trait]
impl AdapterBase for PlayDeckAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "playdeck"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let profile = self
                    .await_reply(Reply::UserProfile, || self.post("getUserProfile", json!({})))
                    .await?;
                self.apply_profile(&profile);
                self.core.set_default_storage_type(StorageType::PlatformInternal);
                info!("playdeck profile received");
                Ok(())
            })
            .await
    }

    fn handle_sdk_event(&self, event: &SdkEvent) {
        match event.name.as_str() {
            "playdeck" => self.apply_message(&event.payload),
            other => debug!(event = other, "ignored playdeck event"),
        }
    }
}

#[async_trait]
impl SessionCapability for PlayDeckAdapter {
    fn is_player_authorization_supported(&self) -> bool {
        true
    }

    /// Telegram players are always signed in.
    async fn authorize_player(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()
    }

    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        match message {
            PlatformMessage::GameOver => self.post("gameEnd", json!({})).await,
            PlatformMessage::GameReady => self.post("loading", json!({ "value": 100 })).await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageCapability for PlayDeckAdapter {
    fn is_storage_supported(&self, _storage: StorageType) -> bool {
        true
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core.host().local_store.is_some(),
            StorageType::PlatformInternal => true,
        }
    }

    /// One `getData` per key; resolves once every key has answered.
    async fn get_platform_data(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        self.core.ensure_initialized()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let _read = self.reads.lock().await;
        *self.batch() = ReadBatch {
            expected: keys.to_vec(),
            received: Map::new(),
        };
        let answers = self
            .await_reply(Reply::Data, || async {
                for key in keys {
                    self.post("getData", json!({ "key": key })).await?;
                }
                Ok(())
            })
            .await?;
        Ok(keys
            .iter()
            .map(|key| match answers.get(key) {
                Some(Value::String(raw)) if !raw.is_empty() => decode_value(raw, try_parse_json),
                Some(Value::String(_)) | Some(Value::Null) | None => Value::Null,
                Some(other) => other.clone(),
            })
            .collect())
    }

    /// Writes are posted without confirmation.
    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        for (key, value) in keys.iter().zip(values) {
            self.post("setData", json!({ "key": key, "value": encode_value(value) }))
                .await?;
        }
        Ok(())
    }

    /// An empty string clears a key.
    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        for key in keys {
            self.post("setData", json!({ "key": key, "value": "" })).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AdvertisementCapability for PlayDeckAdapter {
    fn is_interstitial_supported(&self) -> bool {
        true
    }

    fn is_rewarded_supported(&self) -> bool {
        true
    }

    async fn show_interstitial(&self, _options: Value) {
        let state = self.core.interstitial();
        state.set(InterstitialState::Loading);
        if let Err(e) = self.show_ad(false).await {
            warn!(error = %e, "interstitial failed");
            state.set(InterstitialState::Failed);
        }
    }

    async fn show_rewarded(&self, _options: Value) {
        let state = self.core.rewarded();
        state.set(RewardedState::Loading);
        if let Err(e) = self.show_ad(true).await {
            warn!(error = %e, "rewarded failed");
            state.set(RewardedState::Failed);
        }
    }
}

#[async_trait]
impl SocialCapability for PlayDeckAdapter {
    fn is_share_supported(&self) -> bool {
        true
    }

    /// Shares the launch parameters from the profile.
    async fn share(&self, _options: Value) -> Result<()> {
        self.core.ensure_initialized()?;
        let params = self.share_params.lock().unwrap_or_else(PoisonError::into_inner).clone();
        self.post("customShare", json!({ "value": params })).await
    }
}

impl LeaderboardCapability for PlayDeckAdapter {}

#[async_trait]
impl PaymentsCapability for PlayDeckAdapter {
    fn is_payments_supported(&self) -> bool {
        true
    }

    /// Request an invoice link, open it in Telegram and wait for the invoice
    /// to close.
    async fn purchase(&self, product_id: &str) -> Result<PurchaseResult> {
        self.core.ensure_initialized()?;
        if product_id.is_empty() {
            return Err(BridgeError::InvalidArgument("product id is required".into()));
        }
        let link = self
            .await_reply(Reply::PaymentLink, || {
                self.post("requestPayment", json!({ "value": { "externalId": product_id } }))
            })
            .await?;
        let url = str_field(&link, "url")
            .ok_or_else(|| BridgeError::MalformedResponse("payment without invoice url".into()))?;
        let invoice = self
            .await_reply(Reply::Invoice, || self.post("openTelegramLink", json!({ "value": url })))
            .await?;
        Ok(PurchaseResult {
            product_id: product_id.to_string(),
            token: str_field(&invoice, "id"),
            payload: None,
        })
    }
}

impl RemoteConfigCapability for PlayDeckAdapter {}
impl ClipboardCapability for PlayDeckAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    fn answer(message: Value) -> SdkEvent {
        SdkEvent::new("playdeck").with_payload(message)
    }

    async fn until_pending(adapter: &PlayDeckAdapter, reply: Reply) {
        while !adapter.replies.is_pending(reply) {
            tokio::task::yield_now().await;
        }
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
    }

    async fn playdeck() -> (Arc<PlayDeckAdapter>, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        let adapter = Arc::new(PlayDeckAdapter::new(core_with(
            PlatformId::PlayDeck,
            "https://playdeck.io/game/1",
            sdk.clone(),
            Value::Null,
        )));
        let init = tokio::spawn({
            let adapter = Arc::clone(&adapter);
            async move { adapter.initialize().await }
        });
        until_pending(&adapter, Reply::UserProfile).await;
        adapter.handle_sdk_event(&answer(json!({
            "method": "getUserProfile",
            "value": {
                "telegramId": 1001,
                "username": "kit",
                "avatar": "https://t.me/a.png",
                "locale": "ru",
                "params": { "ref": "abc" }
            }
        })));
        init.await.unwrap().unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn profile_answer_completes_initialize() {
        let (adapter, sdk) = playdeck().await;
        assert_eq!(sdk.count("playdeck.getUserProfile"), 1);
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("1001"));
        assert_eq!(adapter.language(), "ru");
        assert_eq!(adapter.default_storage_type(), StorageType::PlatformInternal);

        adapter.share(json!({})).await.unwrap();
        assert_eq!(sdk.last_args("playdeck.customShare"), Some(json!({ "value": { "ref": "abc" } })));
    }

    #[tokio::test]
    async fn reads_wait_for_every_key() {
        let (adapter, sdk) = playdeck().await;
        let read = tokio::spawn({
            let adapter = Arc::clone(&adapter);
            async move {
                adapter
                    .get_data(&["a".to_string(), "b".to_string()], StorageType::PlatformInternal, true)
                    .await
            }
        });
        until_pending(&adapter, Reply::Data).await;
        assert_eq!(sdk.count("playdeck.getData"), 2);
        adapter.handle_sdk_event(&answer(json!({ "method": "getData", "key": "b", "value": { "data": "" } })));
        assert!(adapter.replies.is_pending(Reply::Data));
        adapter.handle_sdk_event(&answer(json!({ "method": "getData", "key": "a", "value": { "data": "[1,2]" } })));
        assert_eq!(read.await.unwrap().unwrap(), vec![json!([1, 2]), Value::Null]);
    }

    #[tokio::test]
    async fn writes_and_lifecycle_messages_are_posted() {
        let (adapter, sdk) = playdeck().await;
        adapter
            .delete_data(&["a".to_string()], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(sdk.last_args("playdeck.setData"), Some(json!({ "key": "a", "value": "" })));
        adapter.send_message(PlatformMessage::GameReady, json!({})).await.unwrap();
        assert_eq!(sdk.last_args("playdeck.loading"), Some(json!({ "value": 100 })));
        adapter.send_message(PlatformMessage::GameOver, json!({})).await.unwrap();
        assert_eq!(sdk.count("playdeck.gameEnd"), 1);
    }

    #[tokio::test]
    async fn cancelled_invoice_rejects_purchase() {
        let (adapter, sdk) = playdeck().await;
        let purchase = tokio::spawn({
            let adapter = Arc::clone(&adapter);
            async move { adapter.purchase("gems").await }
        });
        until_pending(&adapter, Reply::PaymentLink).await;
        adapter.handle_sdk_event(&answer(json!({
            "method": "requestPayment",
            "value": { "url": "https://t.me/invoice/1" }
        })));
        until_pending(&adapter, Reply::Invoice).await;
        assert_eq!(
            sdk.last_args("playdeck.openTelegramLink"),
            Some(json!({ "value": "https://t.me/invoice/1" }))
        );
        adapter.handle_sdk_event(&answer(json!({ "method": "invoiceClosed", "value": { "status": "pending" } })));
        adapter.handle_sdk_event(&answer(json!({ "method": "invoiceClosed", "value": { "status": "cancelled" } })));
        assert_eq!(
            purchase.await.unwrap(),
            Err(BridgeError::Sdk("invoice cancelled".into()))
        );
    }

    #[tokio::test]
    async fn ad_answers_follow_the_active_show() {
        let (adapter, sdk) = playdeck().await;
        adapter.show_rewarded(json!({})).await;
        assert_eq!(sdk.count("playdeck.showAd"), 1);
        adapter.handle_sdk_event(&answer(json!({ "method": "startAd" })));
        adapter.handle_sdk_event(&answer(json!({ "method": "rewardedAd" })));
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));

        adapter.show_interstitial(json!({})).await;
        adapter.handle_sdk_event(&answer(json!({ "method": "notFoundAd" })));
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Failed));
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Closed));
    }
}
