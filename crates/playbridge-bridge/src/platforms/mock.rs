// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter used when no platform is detected.
//
// Every capability keeps its base default, so games run locally with
// browser storage and failing ads.

use async_trait::async_trait;
use playbridge_core::error::Result;

use crate::core::AdapterCore;
use crate::traits::*;

pub struct MockAdapter {
    core: AdapterCore,
}

impl MockAdapter {
    pub fn new(core: AdapterCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl AdapterBase for MockAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize_once(|| async { Ok(()) }).await
    }
}

impl SessionCapability for MockAdapter {}
impl StorageCapability for MockAdapter {}
impl AdvertisementCapability for MockAdapter {}
impl SocialCapability for MockAdapter {}
impl LeaderboardCapability for MockAdapter {}
impl PaymentsCapability for MockAdapter {}
impl RemoteConfigCapability for MockAdapter {}
impl ClipboardCapability for MockAdapter {}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use playbridge_core::error::BridgeError;
    use playbridge_core::types::{InterstitialState, PlatformId, StorageType, VisibilityState};
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::{ScriptedSdk, core_with};

    fn adapter() -> (MockAdapter, Arc<ScriptedSdk>) {
        let sdk = ScriptedSdk::new();
        let core = core_with(PlatformId::Mock, "https://localhost/", sdk.clone(), Value::Null);
        (MockAdapter::new(core), sdk)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn initializes_without_sdk() {
        let (mock, sdk) = adapter();
        mock.initialize().await.unwrap();
        assert!(mock.is_initialized());
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn leaderboard_is_unsupported_and_never_calls_sdk() {
        let (mock, sdk) = adapter();
        mock.initialize().await.unwrap();

        assert!(!mock.is_leaderboard_supported());
        assert!(!mock.is_leaderboard_multiple_boards_supported());
        assert!(!mock.is_leaderboard_set_score_supported());
        assert!(!mock.is_leaderboard_get_score_supported());
        assert!(!mock.is_leaderboard_get_entries_supported());
        assert_eq!(
            mock.set_leaderboard_score("main", 100).await,
            Err(BridgeError::Unsupported)
        );
        assert_eq!(mock.get_leaderboard_score("main").await, Err(BridgeError::Unsupported));
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn every_optional_capability_defaults_to_unsupported() {
        let (mock, _) = adapter();
        assert!(!mock.is_player_authorization_supported());
        assert!(!mock.is_payments_supported());
        assert!(!mock.is_remote_config_supported());
        assert!(!mock.is_clipboard_supported());
        assert!(!mock.is_share_supported());
        assert!(mock.is_external_links_allowed());
        assert_eq!(mock.purchase("gems").await, Err(BridgeError::Unsupported));
        assert_eq!(mock.share(json!({})).await, Err(BridgeError::Unsupported));
        assert_eq!(mock.clipboard_read().await, Err(BridgeError::Unsupported));
        assert!(mock.get_server_time().await.is_err());
        assert_eq!(mock.platform_tld(), None);
        assert_eq!(mock.visibility_state(), VisibilityState::Visible);
    }

    #[tokio::test]
    async fn local_storage_batches_stay_aligned() {
        let (mock, _) = adapter();
        let local = StorageType::LocalStorage;
        mock.set_data(&keys(&["a", "b"]), &[json!(1), json!(2)], local).await.unwrap();
        assert_eq!(
            mock.get_data(&keys(&["a", "b"]), local, true).await.unwrap(),
            vec![json!(1), json!(2)]
        );

        mock.delete_data(&keys(&["a"]), local).await.unwrap();
        assert_eq!(
            mock.get_data(&keys(&["a", "b"]), local, true).await.unwrap(),
            vec![Value::Null, json!(2)]
        );
    }

    #[tokio::test]
    async fn json_parse_falls_back_to_raw_string() {
        let (mock, _) = adapter();
        let local = StorageType::LocalStorage;
        mock.set_data(&keys(&["s", "o"]), &[json!("not json"), json!({ "x": 1 })], local)
            .await
            .unwrap();
        assert_eq!(
            mock.get_data(&keys(&["s", "o"]), local, true).await.unwrap(),
            vec![json!("not json"), json!({ "x": 1 })]
        );
    }

    #[tokio::test]
    async fn platform_storage_is_unsupported() {
        let (mock, _) = adapter();
        let platform = StorageType::PlatformInternal;
        assert!(mock.is_storage_supported(StorageType::LocalStorage));
        assert!(mock.is_storage_available(StorageType::LocalStorage));
        assert!(!mock.is_storage_supported(platform));
        assert!(!mock.is_storage_available(platform));
        assert_eq!(
            mock.get_data(&keys(&["a"]), platform, true).await,
            Err(BridgeError::Unsupported)
        );
    }

    #[tokio::test]
    async fn ads_fail_and_failure_re_emits() {
        let (mock, _) = adapter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        mock.subscribe_interstitial(Box::new(move |s| sink.lock().unwrap().push(*s)));

        mock.show_interstitial(json!({})).await;
        mock.show_interstitial(json!({})).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![InterstitialState::Failed, InterstitialState::Failed]
        );
        assert_eq!(mock.interstitial_state(), Some(InterstitialState::Failed));
    }

    #[tokio::test]
    async fn language_and_payload_come_from_the_page() {
        let sdk = ScriptedSdk::new();
        let core = crate::core::AdapterCore::new(
            PlatformId::Mock,
            crate::testing::page("https://localhost/?payload=level-3").with_locale("pt-BR"),
            crate::testing::host_with(sdk),
        );
        let mock = MockAdapter::new(core);
        assert_eq!(mock.language(), "pt");
        assert_eq!(mock.payload().as_deref(), Some("level-3"));
    }
}
