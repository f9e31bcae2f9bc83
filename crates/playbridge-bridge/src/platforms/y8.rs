// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Y8 adapter.
//
// Account and cloud saves through the `ID` SDK. Cloud storage goes through
// `ID.api(path, "POST", params)`, one request per key. Y8 ads are not
// exposed, so ad shows fail through the defaults.

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{ActionKind, PlayerInfo, StorageType};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::str_field;
use crate::core::AdapterCore;
use crate::storage::{decode_value, encode_value};
use crate::traits::*;

pub const SDK_URL: &str = "https://cdn.y8.com/api/sdk.js";
const SDK_GLOBAL: &str = "ID";

pub struct Y8Adapter {
    core: AdapterCore,
}

impl Y8Adapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }

    async fn api(&self, path: &str, params: Value) -> Result<Value> {
        self.core
            .call("ID.api", json!({ "path": path, "method": "POST", "params": params }))
            .await
    }

    /// Apply a login status response. Returns whether the player is signed in.
    fn apply_login(&self, response: &Value) -> bool {
        if str_field(response, "status").as_deref() != Some("ok") {
            return false;
        }
        let details = response
            .pointer("/authResponse/details")
            .cloned()
            .unwrap_or(Value::Null);
        let full_name = [str_field(&details, "first_name"), str_field(&details, "last_name")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let name = if full_name.is_empty() {
            str_field(&details, "nickname")
        } else {
            Some(full_name)
        };
        let avatars = details.get("avatars").cloned().unwrap_or(Value::Null);
        let photos = ["thumb_url", "medium_url", "large_url"]
            .iter()
            .filter_map(|key| str_field(&avatars, key))
            .collect();
        if let Some(locale) = str_field(&details, "locale") {
            self.core.set_language(locale);
        }
        self.core.set_player(PlayerInfo {
            authorized: true,
            id: str_field(&details, "pid"),
            name,
            photos,
        });
        self.core.set_default_storage_type(StorageType::PlatformInternal);
        true
    }
}

#[async_trait]
impl AdapterBase for Y8Adapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    #[instrument(skip(self), fields(platform = "y8"))]
    async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_once(|| async {
                let game_id = self.core.require_option("gameId")?;
                self.core.load_sdk(SDK_URL, SDK_GLOBAL).await?;
                // Resolves on the SDK's `id.init` event.
                self.core.call("ID.init", json!({ "appId": game_id })).await?;
                self.core.call("ID.ads.init", json!({ "gameId": game_id })).await?;
                let status = self.core.call("ID.getLoginStatus", json!({})).await?;
                let signed_in = self.apply_login(&status);
                info!(signed_in, "y8 sdk ready");
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SessionCapability for Y8Adapter {
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
                let response = self.core.call("ID.login", json!({})).await?;
                if self.apply_login(&response) {
                    Ok(())
                } else {
                    Err(BridgeError::Sdk("login was not completed".into()))
                }
            })
            .await
    }
}

#[async_trait]
impl StorageCapability for Y8Adapter {
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
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let response = self.api("user_data/retrieve", json!({ "key": key })).await?;
            let value = match response.get("jsondata") {
                Some(Value::String(raw)) if !raw.is_empty() => decode_value(raw, try_parse_json),
                Some(Value::Null) | None => {
                    return Err(BridgeError::Storage(format!("y8 has no data for {key}")));
                }
                Some(other) => other.clone(),
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn set_platform_data(&self, keys: &[String], values: &[Value]) -> Result<()> {
        self.core.ensure_initialized()?;
        for (key, value) in keys.iter().zip(values) {
            let response = self
                .api("user_data/submit", json!({ "key": key, "value": encode_value(value) }))
                .await?;
            if str_field(&response, "status").as_deref() != Some("ok") {
                return Err(BridgeError::Storage(format!("y8 rejected write of {key}")));
            }
        }
        Ok(())
    }

    async fn delete_platform_data(&self, keys: &[String]) -> Result<()> {
        self.core.ensure_initialized()?;
        for key in keys {
            self.api("user_data/remove", json!({ "key": key })).await?;
            debug!(key = %key, "y8 key removed");
        }
        Ok(())
    }
}

impl AdvertisementCapability for Y8Adapter {}
impl SocialCapability for Y8Adapter {}
impl LeaderboardCapability for Y8Adapter {}
impl PaymentsCapability for Y8Adapter {}
impl RemoteConfigCapability for Y8Adapter {}
impl ClipboardCapability for Y8Adapter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playbridge_core::types::PlatformId;

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    const GAME_URL: &str = "https://storage.y8.com/games/abc/";

    fn signed_in() -> Value {
        json!({
            "status": "ok",
            "authResponse": { "details": {
                "pid": "p-9",
                "locale": "fr",
                "nickname": "kit9",
                "avatars": { "thumb_url": "https://y8/t.png", "large_url": "https://y8/l.png" }
            } }
        })
    }

    async fn y8(status: Value) -> (Y8Adapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        sdk.respond("ID.getLoginStatus", status);
        let adapter = Y8Adapter::new(core_with(PlatformId::Y8, GAME_URL, sdk.clone(), json!({ "gameId": "g-1" })));
        adapter.initialize().await.unwrap();
        (adapter, sdk)
    }

    #[tokio::test]
    async fn signed_in_status_sets_player() {
        let (adapter, sdk) = y8(signed_in()).await;
        assert_eq!(sdk.last_args("ID.init"), Some(json!({ "appId": "g-1" })));
        let player = adapter.player();
        assert!(player.authorized);
        assert_eq!(player.id.as_deref(), Some("p-9"));
        assert_eq!(player.name.as_deref(), Some("kit9"));
        assert_eq!(player.photos, vec!["https://y8/t.png", "https://y8/l.png"]);
        assert_eq!(adapter.language(), "fr");
        assert_eq!(adapter.default_storage_type(), StorageType::PlatformInternal);
    }

    #[tokio::test]
    async fn failed_login_rejects() {
        let (adapter, sdk) = y8(json!({ "status": "not_connected" })).await;
        assert!(!adapter.player().authorized);
        sdk.respond("ID.login", json!({ "status": "cancelled" }));
        assert!(adapter.authorize_player(json!({})).await.is_err());
        sdk.respond("ID.login", signed_in());
        adapter.authorize_player(json!({})).await.unwrap();
        assert!(adapter.player().authorized);
    }

    #[tokio::test]
    async fn cloud_storage_goes_through_api_calls() {
        let (adapter, sdk) = y8(signed_in()).await;
        sdk.respond("ID.api", json!({ "jsondata": "{\"lvl\":3}", "status": "ok" }));
        let values = adapter
            .get_data(&["save".to_string()], StorageType::PlatformInternal, true)
            .await
            .unwrap();
        assert_eq!(values, vec![json!({ "lvl": 3 })]);

        adapter
            .set_data(&["save".to_string()], &[json!({ "lvl": 4 })], StorageType::PlatformInternal)
            .await
            .unwrap();
        assert_eq!(
            sdk.last_args("ID.api"),
            Some(json!({ "path": "user_data/submit", "method": "POST", "params": { "key": "save", "value": "{\"lvl\":4}" } }))
        );

        sdk.respond("ID.api", json!({}));
        assert!(matches!(
            adapter.get_data(&["missing".to_string()], StorageType::PlatformInternal, true).await,
            Err(BridgeError::Storage(_))
        ));
    }
}
