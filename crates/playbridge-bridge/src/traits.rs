// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The uniform capability surface.
//
// Each functional area is its own trait with safe defaults built on
// `AdapterCore`. A concrete adapter writes an empty `impl` for areas its
// platform lacks and overrides only what the platform actually supports.
// Defaults never touch the platform SDK.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, CatalogItem, DeviceType, FrameMessage, InterstitialState,
    LeaderboardEntry, LeaderboardQuery, PlatformId, PlatformMessage, PlayerInfo, PurchaseResult,
    RewardedState, SdkEvent, StorageType, VisibilityState,
};
use playbridge_runtime::ListenerId;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::AdapterCore;
use crate::storage;

/// Listener for ad state and visibility changes.
pub type StateListener<S> = Box<dyn Fn(&S) + Send + Sync>;

/// The complete adapter surface.
///
/// Implemented automatically for every type that implements all capability
/// traits.
pub trait PlatformAdapter:
    AdapterBase
    + SessionCapability
    + StorageCapability
    + AdvertisementCapability
    + SocialCapability
    + LeaderboardCapability
    + PaymentsCapability
    + RemoteConfigCapability
    + ClipboardCapability
{
}

impl<T> PlatformAdapter for T where
    T: AdapterBase
        + SessionCapability
        + StorageCapability
        + AdvertisementCapability
        + SocialCapability
        + LeaderboardCapability
        + PaymentsCapability
        + RemoteConfigCapability
        + ClipboardCapability
{
}

/// Lifecycle and inbound host traffic.
#[async_trait]
pub trait AdapterBase: Send + Sync {
    fn core(&self) -> &AdapterCore;

    fn platform_id(&self) -> PlatformId {
        self.core().platform_id()
    }

    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    /// Load and bootstrap the platform SDK. Idempotent; concurrent callers
    /// share one outcome.
    async fn initialize(&self) -> Result<()>;

    /// A callback raised by the platform SDK.
    fn handle_sdk_event(&self, event: &SdkEvent) {
        debug!(platform = %self.platform_id(), event = %event.name, "sdk event ignored");
    }

    /// A message from the parent frame.
    fn handle_frame_message(&self, message: &FrameMessage) {
        debug!(platform = %self.platform_id(), action = %message.action, "frame message ignored");
    }
}

/// Player identity, locale and platform lifecycle messages.
#[async_trait]
pub trait SessionCapability: AdapterBase {
    fn language(&self) -> String {
        self.core().language()
    }

    /// Regional domain of the platform (`com`, `ru`, ...), where it has one.
    fn platform_tld(&self) -> Option<String> {
        None
    }

    fn visibility_state(&self) -> VisibilityState {
        self.core().visibility_state()
    }

    fn subscribe_visibility(&self, listener: StateListener<VisibilityState>) -> ListenerId {
        self.core().subscribe_visibility(listener)
    }

    /// The `payload` URL parameter some platforms use for deep links.
    fn payload(&self) -> Option<String> {
        self.core().page().query_param("payload")
    }

    fn device_type(&self) -> DeviceType {
        self.core()
            .page()
            .user_agent()
            .map(DeviceType::from_user_agent)
            .unwrap_or(DeviceType::Desktop)
    }

    fn player(&self) -> PlayerInfo {
        self.core().player()
    }

    fn is_player_authorized(&self) -> bool {
        self.player().authorized
    }

    fn is_player_authorization_supported(&self) -> bool {
        false
    }

    async fn authorize_player(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    /// Platform server time. The default asks the host's time service.
    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        self.core().fetch_server_time().await
    }

    /// Notify the platform about a game lifecycle event. Platforms without a
    /// matching API accept and ignore it.
    async fn send_message(&self, message: PlatformMessage, _options: Value) -> Result<()> {
        debug!(platform = %self.platform_id(), message = message.as_str(), "message not forwarded");
        Ok(())
    }
}

/// Key/value storage over browser-local and platform-internal backends.
///
/// Operations take ordered key lists and return or accept positionally
/// aligned values. Missing keys read as `null`.
#[async_trait]
pub trait StorageCapability: AdapterBase {
    fn default_storage_type(&self) -> StorageType {
        self.core().default_storage_type()
    }

    fn is_storage_supported(&self, storage: StorageType) -> bool {
        matches!(storage, StorageType::LocalStorage)
    }

    fn is_storage_available(&self, storage: StorageType) -> bool {
        match storage {
            StorageType::LocalStorage => self.core().host().local_store.is_some(),
            StorageType::PlatformInternal => false,
        }
    }

    async fn get_data(
        &self,
        keys: &[String],
        storage: StorageType,
        try_parse_json: bool,
    ) -> Result<Vec<Value>> {
        match storage {
            StorageType::LocalStorage => self.core().get_local(keys, try_parse_json),
            StorageType::PlatformInternal => self.get_platform_data(keys, try_parse_json).await,
        }
    }

    async fn set_data(&self, keys: &[String], values: &[Value], storage: StorageType) -> Result<()> {
        storage::ensure_aligned(keys, values)?;
        match storage {
            StorageType::LocalStorage => self.core().set_local(keys, values),
            StorageType::PlatformInternal => self.set_platform_data(keys, values).await,
        }
    }

    async fn delete_data(&self, keys: &[String], storage: StorageType) -> Result<()> {
        match storage {
            StorageType::LocalStorage => self.core().delete_local(keys),
            StorageType::PlatformInternal => self.delete_platform_data(keys).await,
        }
    }

    async fn get_platform_data(&self, _keys: &[String], _try_parse_json: bool) -> Result<Vec<Value>> {
        Err(BridgeError::Unsupported)
    }

    /// Called with `keys` and `values` already length-checked.
    async fn set_platform_data(&self, _keys: &[String], _values: &[Value]) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn delete_platform_data(&self, _keys: &[String]) -> Result<()> {
        Err(BridgeError::Unsupported)
    }
}

/// Banner, interstitial and rewarded ads.
///
/// Show requests never return an error: the outcome is reported through the
/// surface's state machine, and the defaults go straight to `failed`.
#[async_trait]
pub trait AdvertisementCapability: AdapterBase {
    fn interstitial_state(&self) -> Option<InterstitialState> {
        self.core().interstitial().get()
    }

    fn rewarded_state(&self) -> Option<RewardedState> {
        self.core().rewarded().get()
    }

    fn banner_state(&self) -> Option<BannerState> {
        self.core().banner().get()
    }

    fn is_banner_supported(&self) -> bool {
        false
    }

    fn is_interstitial_supported(&self) -> bool {
        false
    }

    fn is_rewarded_supported(&self) -> bool {
        false
    }

    async fn show_banner(&self, _options: Value) {
        warn!(platform = %self.platform_id(), "banner not supported");
        self.core().banner().set(BannerState::Failed);
    }

    async fn hide_banner(&self) {
        self.core().banner().set(BannerState::Failed);
    }

    async fn show_interstitial(&self, _options: Value) {
        warn!(platform = %self.platform_id(), "interstitial not supported");
        self.core().interstitial().set(InterstitialState::Failed);
    }

    async fn show_rewarded(&self, _options: Value) {
        warn!(platform = %self.platform_id(), "rewarded not supported");
        self.core().rewarded().set(RewardedState::Failed);
    }

    async fn check_ad_block(&self) -> Result<bool> {
        let core = self.core();
        core.exclusive(ActionKind::CheckAdBlock, || async {
            Ok(core.detect_ad_block().await)
        })
        .await
    }

    fn subscribe_interstitial(&self, listener: StateListener<InterstitialState>) -> ListenerId {
        self.core().interstitial().subscribe(listener)
    }

    fn subscribe_rewarded(&self, listener: StateListener<RewardedState>) -> ListenerId {
        self.core().rewarded().subscribe(listener)
    }

    fn subscribe_banner(&self, listener: StateListener<BannerState>) -> ListenerId {
        self.core().banner().subscribe(listener)
    }
}

/// Sharing, invitations, communities and bookmarks.
#[async_trait]
pub trait SocialCapability: AdapterBase {
    fn is_share_supported(&self) -> bool {
        false
    }

    fn is_invite_friends_supported(&self) -> bool {
        false
    }

    fn is_join_community_supported(&self) -> bool {
        false
    }

    fn is_create_post_supported(&self) -> bool {
        false
    }

    fn is_add_to_home_screen_supported(&self) -> bool {
        false
    }

    fn is_add_to_favorites_supported(&self) -> bool {
        false
    }

    fn is_rate_supported(&self) -> bool {
        false
    }

    fn is_external_links_allowed(&self) -> bool {
        true
    }

    async fn share(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn invite_friends(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn join_community(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn create_post(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn add_to_home_screen(&self) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn add_to_favorites(&self) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn rate(&self) -> Result<()> {
        Err(BridgeError::Unsupported)
    }
}

#[async_trait]
pub trait LeaderboardCapability: AdapterBase {
    fn is_leaderboard_supported(&self) -> bool {
        false
    }

    fn is_leaderboard_native_popup_supported(&self) -> bool {
        false
    }

    fn is_leaderboard_multiple_boards_supported(&self) -> bool {
        false
    }

    fn is_leaderboard_set_score_supported(&self) -> bool {
        false
    }

    fn is_leaderboard_get_score_supported(&self) -> bool {
        false
    }

    fn is_leaderboard_get_entries_supported(&self) -> bool {
        false
    }

    async fn set_leaderboard_score(&self, _leaderboard: &str, _score: i64) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    /// The player's own score on `leaderboard`.
    async fn get_leaderboard_score(&self, _leaderboard: &str) -> Result<i64> {
        Err(BridgeError::Unsupported)
    }

    async fn get_leaderboard_entries(&self, _query: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>> {
        Err(BridgeError::Unsupported)
    }

    async fn show_leaderboard_native_popup(&self, _options: Value) -> Result<()> {
        Err(BridgeError::Unsupported)
    }
}

/// In-game purchases.
#[async_trait]
pub trait PaymentsCapability: AdapterBase {
    fn is_payments_supported(&self) -> bool {
        false
    }

    async fn purchase(&self, _product_id: &str) -> Result<PurchaseResult> {
        Err(BridgeError::Unsupported)
    }

    async fn consume_purchase(&self, _token: &str) -> Result<()> {
        Err(BridgeError::Unsupported)
    }

    async fn get_catalog(&self) -> Result<Vec<CatalogItem>> {
        Err(BridgeError::Unsupported)
    }

    /// Purchases not yet consumed.
    async fn get_purchases(&self) -> Result<Vec<PurchaseResult>> {
        Err(BridgeError::Unsupported)
    }
}

#[async_trait]
pub trait RemoteConfigCapability: AdapterBase {
    fn is_remote_config_supported(&self) -> bool {
        false
    }

    async fn get_remote_config(&self, _options: Value) -> Result<HashMap<String, String>> {
        Err(BridgeError::Unsupported)
    }
}

#[async_trait]
pub trait ClipboardCapability: AdapterBase {
    fn is_clipboard_supported(&self) -> bool {
        false
    }

    async fn clipboard_read(&self) -> Result<String> {
        Err(BridgeError::Unsupported)
    }

    async fn clipboard_write(&self, _text: &str) -> Result<()> {
        Err(BridgeError::Unsupported)
    }
}
