// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration, as passed to `initialize` or read from
// `playbridge-config.json`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::PlatformId;

/// Cooldown applied between interstitials when nothing else is configured.
pub const DEFAULT_INTERSTITIAL_DELAY_SECS: u64 = 60;

/// Upper bound on remote SDK script loading.
pub const DEFAULT_SCRIPT_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Options recognised by the initialization entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Skip detection and use this platform id.
    pub forcibly_set_platform_id: Option<String>,
    /// Game/app id shared by platforms that need one. Merged into each
    /// platform's options as `gameId` when they do not set their own.
    pub game_id: Option<String>,
    /// Per-platform option objects keyed by platform id.
    pub platforms: HashMap<String, Value>,
    pub advertisement: AdvertisementConfig,
    /// Remote script timeout; `None` waits forever.
    pub script_load_timeout_ms: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            forcibly_set_platform_id: None,
            game_id: None,
            platforms: HashMap::new(),
            advertisement: AdvertisementConfig::default(),
            script_load_timeout_ms: Some(DEFAULT_SCRIPT_LOAD_TIMEOUT_MS),
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "bridge configuration loaded");
        Ok(config)
    }

    /// Option object handed to the adapter for `platform`.
    ///
    /// Always an object. `gameId` is filled from [`BridgeConfig::game_id`]
    /// when the platform block does not carry its own.
    pub fn platform_options(&self, platform: PlatformId) -> Value {
        let mut options = match self.platforms.get(platform.as_str()) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        if let Some(game_id) = &self.game_id {
            if !options.contains_key("gameId") {
                options.insert("gameId".into(), Value::String(game_id.clone()));
            }
        }
        Value::Object(options)
    }

    pub fn script_load_timeout(&self) -> Option<Duration> {
        self.script_load_timeout_ms.map(Duration::from_millis)
    }

    /// Fill `game_id` from the page URL when the caller did not set it.
    pub fn merge_game_id(&mut self, from_url: Option<String>) {
        if self.game_id.is_none() {
            if let Some(game_id) = from_url {
                debug!(%game_id, "game id taken from page URL");
                self.game_id = Some(game_id);
            }
        }
    }
}

/// Advertisement settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvertisementConfig {
    pub minimum_delay_between_interstitial: Option<DelaySetting>,
}

impl AdvertisementConfig {
    /// Interstitial cooldown for `platform`.
    pub fn interstitial_delay(&self, platform: PlatformId) -> Duration {
        let secs = match &self.minimum_delay_between_interstitial {
            None => DEFAULT_INTERSTITIAL_DELAY_SECS,
            Some(setting) => setting.resolve(platform),
        };
        Duration::from_secs(secs)
    }
}

/// A delay given either globally or per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelaySetting {
    Seconds(u64),
    /// Keyed by platform id, with an optional `default` entry.
    PerPlatform(HashMap<String, u64>),
}

impl DelaySetting {
    pub fn resolve(&self, platform: PlatformId) -> u64 {
        match self {
            Self::Seconds(secs) => *secs,
            Self::PerPlatform(map) => map
                .get(platform.as_str())
                .or_else(|| map.get("default"))
                .copied()
                .unwrap_or(DEFAULT_INTERSTITIAL_DELAY_SECS),
        }
    }
}
