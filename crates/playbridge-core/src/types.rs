// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the runtime, the adapters and the host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::BridgeError;

/// Unique identifier for one bridge session (one page load).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of platforms the bridge knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformId {
    /// No platform detected; base behaviour only.
    Mock,
    /// Parent-frame QA harness speaking the cross-frame message protocol.
    QaTool,
    Vk,
    VkPlay,
    Ok,
    Yandex,
    CrazyGames,
    AbsoluteGames,
    GameDistribution,
    Playgama,
    Wortal,
    #[serde(rename = "playdeck")]
    PlayDeck,
    Telegram,
    Y8,
    Lagged,
    Facebook,
    Poki,
}

impl PlatformId {
    pub const ALL: [PlatformId; 17] = [
        Self::Mock,
        Self::QaTool,
        Self::Vk,
        Self::VkPlay,
        Self::Ok,
        Self::Yandex,
        Self::CrazyGames,
        Self::AbsoluteGames,
        Self::GameDistribution,
        Self::Playgama,
        Self::Wortal,
        Self::PlayDeck,
        Self::Telegram,
        Self::Y8,
        Self::Lagged,
        Self::Facebook,
        Self::Poki,
    ];

    /// Wire identifier, also the key used in per-platform option objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::QaTool => "qa_tool",
            Self::Vk => "vk",
            Self::VkPlay => "vk_play",
            Self::Ok => "ok",
            Self::Yandex => "yandex",
            Self::CrazyGames => "crazy_games",
            Self::AbsoluteGames => "absolute_games",
            Self::GameDistribution => "game_distribution",
            Self::Playgama => "playgama",
            Self::Wortal => "wortal",
            Self::PlayDeck => "playdeck",
            Self::Telegram => "telegram",
            Self::Y8 => "y8",
            Self::Lagged => "lagged",
            Self::Facebook => "facebook",
            Self::Poki => "poki",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: `"VK"` parses as [`PlatformId::Vk`].
impl FromStr for PlatformId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BridgeError::InvalidConfig(format!("unknown platform id '{s}'")))
    }
}

/// Asynchronous operations tracked by the deferred registry.
///
/// At most one operation of each kind is in flight per adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Initialize,
    AuthorizePlayer,
    Share,
    InviteFriends,
    JoinCommunity,
    CreatePost,
    AddToHomeScreen,
    AddToFavorites,
    Rate,
    SetLeaderboardScore,
    GetLeaderboardScore,
    GetLeaderboardEntries,
    ShowLeaderboardPopup,
    Purchase,
    GetCatalog,
    GetPurchases,
    ConsumePurchase,
    GetRemoteConfig,
    GetServerTime,
    GetStorageData,
    SetStorageData,
    DeleteStorageData,
    ClipboardRead,
    ClipboardWrite,
    CheckAdBlock,
}

impl ActionKind {
    pub const ALL: [ActionKind; 25] = [
        Self::Initialize,
        Self::AuthorizePlayer,
        Self::Share,
        Self::InviteFriends,
        Self::JoinCommunity,
        Self::CreatePost,
        Self::AddToHomeScreen,
        Self::AddToFavorites,
        Self::Rate,
        Self::SetLeaderboardScore,
        Self::GetLeaderboardScore,
        Self::GetLeaderboardEntries,
        Self::ShowLeaderboardPopup,
        Self::Purchase,
        Self::GetCatalog,
        Self::GetPurchases,
        Self::ConsumePurchase,
        Self::GetRemoteConfig,
        Self::GetServerTime,
        Self::GetStorageData,
        Self::SetStorageData,
        Self::DeleteStorageData,
        Self::ClipboardRead,
        Self::ClipboardWrite,
        Self::CheckAdBlock,
    ];

    /// Wire name, used as the `action` of cross-frame messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::AuthorizePlayer => "authorize_player",
            Self::Share => "share",
            Self::InviteFriends => "invite_friends",
            Self::JoinCommunity => "join_community",
            Self::CreatePost => "create_post",
            Self::AddToHomeScreen => "add_to_home_screen",
            Self::AddToFavorites => "add_to_favorites",
            Self::Rate => "rate",
            Self::SetLeaderboardScore => "set_leaderboard_score",
            Self::GetLeaderboardScore => "get_leaderboard_score",
            Self::GetLeaderboardEntries => "get_leaderboard_entries",
            Self::ShowLeaderboardPopup => "show_leaderboard_popup",
            Self::Purchase => "purchase",
            Self::GetCatalog => "get_catalog",
            Self::GetPurchases => "get_purchases",
            Self::ConsumePurchase => "consume_purchase",
            Self::GetRemoteConfig => "get_remote_config",
            Self::GetServerTime => "get_server_time",
            Self::GetStorageData => "get_storage_data",
            Self::SetStorageData => "set_storage_data",
            Self::DeleteStorageData => "delete_storage_data",
            Self::ClipboardRead => "clipboard_read",
            Self::ClipboardWrite => "clipboard_write",
            Self::CheckAdBlock => "check_ad_block",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BridgeError::InvalidArgument(format!("unknown action '{s}'")))
    }
}

/// Lifecycle of an interstitial ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterstitialState {
    Loading,
    Opened,
    Closed,
    Failed,
}

impl InterstitialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

/// Lifecycle of a rewarded ad. `Rewarded` precedes `Closed` when the player
/// earned the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardedState {
    Loading,
    Opened,
    Rewarded,
    Closed,
    Failed,
}

impl RewardedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Opened => "opened",
            Self::Rewarded => "rewarded",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

/// Lifecycle of a banner ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerState {
    Loading,
    Shown,
    Hidden,
    Failed,
}

impl BannerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Shown => "shown",
            Self::Hidden => "hidden",
            Self::Failed => "failed",
        }
    }
}

/// Whether the game page is currently visible to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityState {
    Visible,
    Hidden,
}

impl VisibilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

/// Storage backends an adapter may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Browser-resident key/value storage.
    LocalStorage,
    /// Storage provided by the hosting platform's SDK.
    PlatformInternal,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalStorage => "local_storage",
            Self::PlatformInternal => "platform_internal",
        }
    }
}

/// Coarse device class derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Tv,
}

impl DeviceType {
    /// Classify a user-agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ["smart-tv", "smarttv", "googletv", "appletv", "hbbtv", "crkey", "tizen"]
            .iter()
            .any(|marker| ua.contains(marker))
        {
            Self::Tv
        } else if ua.contains("ipad") || (ua.contains("android") && !ua.contains("mobile")) {
            Self::Tablet
        } else if ["iphone", "ipod", "android", "mobile", "windows phone"]
            .iter()
            .any(|marker| ua.contains(marker))
        {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

/// The player as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub authorized: bool,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Avatar URLs, smallest first.
    pub photos: Vec<String>,
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: Option<String>,
    pub score: i64,
    pub rank: u32,
    pub photo: Option<String>,
}

/// Parameters for a leaderboard entries query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub leaderboard: String,
    pub include_player: bool,
    pub quantity_around: u32,
    pub quantity_top: u32,
}

impl LeaderboardQuery {
    pub fn top(leaderboard: impl Into<String>, quantity_top: u32) -> Self {
        Self {
            leaderboard: leaderboard.into(),
            include_player: false,
            quantity_around: 0,
            quantity_top,
        }
    }
}

/// One purchasable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
    /// Display price including currency, as formatted by the platform.
    pub price: Option<String>,
    pub price_currency_code: Option<String>,
    pub price_value: Option<String>,
}

/// A completed (possibly not yet consumed) purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub product_id: String,
    pub token: Option<String>,
    pub payload: Option<String>,
}

/// Lifecycle notifications a game sends to its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformMessage {
    GameReady,
    InGameLoadingStarted,
    InGameLoadingStopped,
    GameplayStarted,
    GameplayStopped,
    PlayerGotAchievement,
    GameOver,
}

impl PlatformMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameReady => "game_ready",
            Self::InGameLoadingStarted => "in_game_loading_started",
            Self::InGameLoadingStopped => "in_game_loading_stopped",
            Self::GameplayStarted => "gameplay_started",
            Self::GameplayStopped => "gameplay_stopped",
            Self::PlayerGotAchievement => "player_got_achievement",
            Self::GameOver => "game_over",
        }
    }
}

/// Module namespace of a cross-frame message (`type` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameModule {
    /// Connection check sent once on startup.
    Liveness,
    Platform,
    Player,
    Storage,
    Advertisement,
    Social,
    Leaderboard,
    Payments,
    RemoteConfig,
    Clipboard,
    CheckAdblock,
}

/// Cross-frame message exchanged with a parent frame.
///
/// Replies are matched to requests by `(type, action)` only. Reply data
/// travels in top-level fields next to `type` and `action` (`player`,
/// `time`, `purchase`, ...), kept in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "type")]
    pub module: FrameModule,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// Event details such as `{"status": "open"}` for ad progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FrameMessage {
    pub fn new(module: FrameModule, action: impl Into<String>) -> Self {
        Self {
            module,
            action: action.into(),
            options: None,
            payload: None,
            fields: Map::new(),
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Add a top-level field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// A top-level field, treating `null` as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}

/// A callback raised by a platform SDK, forwarded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkEvent {
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

impl SdkEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_ids_parse_from_wire_names() {
        for id in PlatformId::ALL {
            assert_eq!(id.as_str().parse::<PlatformId>().unwrap(), id);
        }
        assert_eq!("VK_Play".parse::<PlatformId>().unwrap(), PlatformId::VkPlay);
        assert!("myspace".parse::<PlatformId>().is_err());
    }

    #[test]
    fn platform_ids_serialize_as_wire_names() {
        for id in PlatformId::ALL {
            assert_eq!(serde_json::to_value(id).unwrap(), Value::String(id.as_str().to_string()));
        }
    }

    #[test]
    fn action_kind_serde_matches_wire_name() {
        for kind in ActionKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn device_type_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
        let tablet = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 Safari/537.36";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/121.0";
        let tv = "Mozilla/5.0 (SMART-TV; Linux; Tizen 6.0) AppleWebKit/537.36";
        assert_eq!(DeviceType::from_user_agent(iphone), DeviceType::Mobile);
        assert_eq!(DeviceType::from_user_agent(tablet), DeviceType::Tablet);
        assert_eq!(DeviceType::from_user_agent(desktop), DeviceType::Desktop);
        assert_eq!(DeviceType::from_user_agent(tv), DeviceType::Tv);
    }

    #[test]
    fn frame_message_wire_shape() {
        let msg = FrameMessage::new(FrameModule::Advertisement, "interstitial_state")
            .with_options(json!({ "state": "opened" }));
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            wire,
            json!({ "type": "advertisement", "action": "interstitial_state", "options": { "state": "opened" } })
        );

        let bare: FrameMessage =
            serde_json::from_value(json!({ "type": "liveness", "action": "ping" })).unwrap();
        assert_eq!(bare.module, FrameModule::Liveness);
        assert_eq!(bare.options, None);
        assert!(bare.fields.is_empty());
    }

    #[test]
    fn frame_reply_keeps_top_level_fields() {
        let reply: FrameMessage = serde_json::from_value(json!({
            "type": "player",
            "action": "authorize_player",
            "player": { "userId": "u1", "name": "Ann" },
            "time": null
        }))
        .unwrap();
        assert_eq!(reply.field("player"), Some(&json!({ "userId": "u1", "name": "Ann" })));
        assert_eq!(reply.field("time"), None);

        let ping = FrameMessage::new(FrameModule::CheckAdblock, "adblock_detect");
        assert_eq!(
            serde_json::to_value(&ping).unwrap(),
            json!({ "type": "check_adblock", "action": "adblock_detect" })
        );

        let progress = FrameMessage::new(FrameModule::Advertisement, "interstitial")
            .with_payload(json!({ "status": "open" }))
            .with_field("extra", json!(1));
        let wire = serde_json::to_value(&progress).unwrap();
        assert_eq!(wire["payload"]["status"], "open");
        assert_eq!(wire["extra"], 1);
    }
}
