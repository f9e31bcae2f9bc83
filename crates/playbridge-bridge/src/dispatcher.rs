// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entry point owned by the host.
//
// A `Bridge` selects its platform on the first `initialize` call and keeps
// that adapter for its whole lifetime. Later calls, concurrent or not, reuse
// it and share the adapter's single bootstrap.

use std::sync::{Arc, OnceLock};

use playbridge_core::config::BridgeConfig;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{FrameMessage, PlatformId, SdkEvent, SessionId, VisibilityState};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::advertisement::AdvertisementModule;
use crate::core::AdapterCore;
use crate::create_adapter;
use crate::detect::{detect, game_id_from_url};
use crate::host::{HostServices, PageContext};
use crate::traits::{AdapterBase, PlatformAdapter};

struct ActiveSession {
    adapter: Arc<dyn PlatformAdapter>,
    advertisement: AdvertisementModule,
}

pub struct Bridge {
    session: SessionId,
    page: PageContext,
    host: HostServices,
    active: OnceLock<ActiveSession>,
}

impl Bridge {
    pub fn new(page: PageContext, host: HostServices) -> Self {
        Self {
            session: SessionId::new(),
            page,
            host,
            active: OnceLock::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Detect the platform, build its adapter and run its bootstrap.
    ///
    /// Only the first call's `config` is used. Every call waits for the same
    /// bootstrap; after success further calls return `Ok` at once.
    #[instrument(skip_all, fields(session = %self.session))]
    pub async fn initialize(&self, config: BridgeConfig) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| BridgeError::InvalidConfig(format!("no tokio runtime: {e}")))?;
        let session = self.active.get_or_init(|| self.activate(config, runtime));
        session.adapter.initialize().await
    }

    fn activate(&self, mut config: BridgeConfig, runtime: Handle) -> ActiveSession {
        config.merge_game_id(game_id_from_url(self.page.url()));
        let platform = detect(self.page.url(), config.forcibly_set_platform_id.as_deref());
        info!(%platform, host = self.page.hostname(), "platform selected");

        let core = AdapterCore::new(platform, self.page.clone(), self.host.clone())
            .with_options(config.platform_options(platform))
            .with_script_timeout(config.script_load_timeout());
        let adapter = create_adapter(core);
        let delay = config.advertisement.interstitial_delay(platform);
        let advertisement = AdvertisementModule::new(Arc::clone(&adapter), delay, runtime);
        ActiveSession {
            adapter,
            advertisement,
        }
    }

    /// The selected platform, once `initialize` has been called.
    pub fn platform_id(&self) -> Option<PlatformId> {
        self.active.get().map(|s| s.adapter.platform_id())
    }

    pub fn adapter(&self) -> Option<&Arc<dyn PlatformAdapter>> {
        self.active.get().map(|s| &s.adapter)
    }

    pub fn advertisement(&self) -> Option<&AdvertisementModule> {
        self.active.get().map(|s| &s.advertisement)
    }

    pub fn is_initialized(&self) -> bool {
        self.adapter().is_some_and(|a| a.is_initialized())
    }

    /// Forward an SDK callback to the active adapter.
    pub fn dispatch_sdk_event(&self, event: &SdkEvent) {
        match self.adapter() {
            Some(adapter) => adapter.handle_sdk_event(event),
            None => debug!(session = %self.session, event = %event.name, "sdk event before initialize"),
        }
    }

    /// Forward a parent-frame message to the active adapter.
    pub fn dispatch_frame_message(&self, message: &FrameMessage) {
        match self.adapter() {
            Some(adapter) => adapter.handle_frame_message(message),
            None => debug!(session = %self.session, action = %message.action, "frame message before initialize"),
        }
    }

    /// Record a page visibility change reported by the host.
    pub fn dispatch_visibility_change(&self, state: VisibilityState) {
        match self.adapter() {
            Some(adapter) => {
                if adapter.core().set_visibility_state(state) {
                    debug!(session = %self.session, state = state.as_str(), "visibility changed");
                }
            }
            None => debug!(session = %self.session, state = state.as_str(), "visibility change before initialize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;
    use playbridge_core::config::DelaySetting;
    use playbridge_core::types::{FrameModule, InterstitialState, RewardedState};
    use serde_json::json;

    use super::*;
    use crate::testing::{RecordingMessenger, ScriptedSdk, host_with, page};
    use crate::traits::{AdvertisementCapability, SessionCapability};

    fn bridge(url: &str, sdk: Arc<ScriptedSdk>) -> Bridge {
        Bridge::new(page(url), host_with(sdk))
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_initialize_runs_one_bootstrap() {
        let sdk = ScriptedSdk::new();
        sdk.slow("YaGames.init", Duration::from_millis(500));
        let bridge = bridge("https://app-9.games.s3.yandex.net/9/index.html", sdk.clone());

        let outcomes = join_all((0..8).map(|_| bridge.initialize(BridgeConfig::default()))).await;
        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(sdk.count("YaGames.init"), 1);
        assert_eq!(bridge.platform_id(), Some(PlatformId::Yandex));
        assert!(bridge.is_initialized());

        bridge.initialize(BridgeConfig::default()).await.unwrap();
        assert_eq!(sdk.count("YaGames.init"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failures_are_shared_and_retryable() {
        let sdk = ScriptedSdk::new();
        sdk.fail("PokiSDK.init", BridgeError::Sdk("blocked".into()))
            .slow("PokiSDK.init", Duration::from_millis(100));
        let bridge = bridge("https://games.poki.com/1/game", sdk.clone());

        let (a, b) = tokio::join!(
            bridge.initialize(BridgeConfig::default()),
            bridge.initialize(BridgeConfig::default())
        );
        assert_eq!(a, Err(BridgeError::Sdk("blocked".into())));
        assert_eq!(a, b);
        assert_eq!(sdk.count("PokiSDK.init"), 1);

        sdk.respond("PokiSDK.init", json!(null));
        bridge.initialize(BridgeConfig::default()).await.unwrap();
        assert_eq!(sdk.count("PokiSDK.init"), 2);
    }

    #[tokio::test]
    async fn first_config_wins() {
        let bridge = bridge("https://app-9.games.s3.yandex.net/9/", ScriptedSdk::new());
        let forced = BridgeConfig {
            forcibly_set_platform_id: Some("mock".into()),
            ..BridgeConfig::default()
        };
        bridge.initialize(forced).await.unwrap();
        bridge.initialize(BridgeConfig::default()).await.unwrap();
        assert_eq!(bridge.platform_id(), Some(PlatformId::Mock));
    }

    #[tokio::test]
    async fn game_id_from_url_reaches_adapter() {
        let sdk = ScriptedSdk::new();
        let bridge = bridge("https://html5.gamedistribution.com/x/?game_id=f00d", sdk.clone());
        bridge.initialize(BridgeConfig::default()).await.unwrap();
        assert_eq!(bridge.platform_id(), Some(PlatformId::GameDistribution));
        assert_eq!(sdk.last_args("GD_OPTIONS.configure"), Some(json!({ "gameId": "f00d" })));
    }

    #[tokio::test]
    async fn missing_game_id_is_a_config_error() {
        let bridge = bridge("https://html5.gamedistribution.com/x/", ScriptedSdk::new());
        assert_eq!(
            bridge.initialize(BridgeConfig::default()).await,
            Err(BridgeError::missing_config("game_distribution", "gameId"))
        );
        assert!(!bridge.is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_cooldown_refuses_early_interstitial() {
        let sdk = ScriptedSdk::new();
        let bridge = bridge("https://games.poki.com/1/game", sdk.clone());
        let mut config = BridgeConfig::default();
        config.advertisement.minimum_delay_between_interstitial =
            Some(DelaySetting::PerPlatform([("poki".to_string(), 30)].into()));
        bridge.initialize(config).await.unwrap();

        let ads = bridge.advertisement().unwrap();
        assert_eq!(ads.minimum_delay_between_interstitial(), Duration::from_secs(30));
        ads.show_interstitial(json!({}), false).await;
        ads.show_interstitial(json!({}), false).await;
        assert_eq!(ads.interstitial_state(), Some(InterstitialState::Failed));
        assert_eq!(sdk.count("PokiSDK.commercialBreak"), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        ads.show_interstitial(json!({}), false).await;
        assert_eq!(sdk.count("PokiSDK.commercialBreak"), 2);
    }

    #[tokio::test]
    async fn sdk_events_reach_active_adapter() {
        let bridge = bridge("https://app-9.games.s3.yandex.net/9/", ScriptedSdk::new());
        bridge.dispatch_sdk_event(&SdkEvent::new("adv.fullscreen.open"));
        bridge.initialize(BridgeConfig::default()).await.unwrap();

        bridge.dispatch_sdk_event(&SdkEvent::new("adv.fullscreen.open"));
        let adapter = bridge.adapter().unwrap();
        assert_eq!(adapter.interstitial_state(), Some(InterstitialState::Opened));
    }

    #[tokio::test]
    async fn frame_messages_reach_qa_tool() {
        let messenger = Arc::new(RecordingMessenger::default());
        let host = host_with(ScriptedSdk::new()).with_messenger(messenger.clone());
        let bridge = Bridge::new(page("https://qa.example/?platform_id=qa_tool"), host);
        bridge.initialize(BridgeConfig::default()).await.unwrap();
        assert_eq!(bridge.platform_id(), Some(PlatformId::QaTool));
        assert_eq!(messenger.last().unwrap().module, FrameModule::Liveness);

        let adapter = bridge.adapter().unwrap();
        adapter.show_rewarded(json!({})).await;
        bridge.dispatch_frame_message(
            &FrameMessage::new(FrameModule::Advertisement, "reward").with_payload(json!({ "status": "open" })),
        );
        assert_eq!(adapter.rewarded_state(), Some(RewardedState::Opened));
    }

    #[tokio::test]
    async fn visibility_changes_reach_listeners_once() {
        let bridge = bridge("http://localhost/", ScriptedSdk::new());
        bridge.dispatch_visibility_change(VisibilityState::Hidden);
        bridge.initialize(BridgeConfig::default()).await.unwrap();

        let adapter = bridge.adapter().unwrap();
        assert_eq!(adapter.visibility_state(), VisibilityState::Visible);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        adapter.subscribe_visibility(Box::new({
            let seen = Arc::clone(&seen);
            move |state: &VisibilityState| seen.lock().unwrap().push(*state)
        }));

        bridge.dispatch_visibility_change(VisibilityState::Hidden);
        bridge.dispatch_visibility_change(VisibilityState::Hidden);
        bridge.dispatch_visibility_change(VisibilityState::Visible);
        assert_eq!(adapter.visibility_state(), VisibilityState::Visible);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![VisibilityState::Hidden, VisibilityState::Visible]
        );
    }
}
