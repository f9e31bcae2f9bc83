// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host collaborator traits.
//
// Adapters reach the embedding page only through these seams. A WASM host
// implements them over `web-sys`; tests implement them with doubles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::FrameMessage;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

// ---------------------------------------------------------------------------
// Page context
// ---------------------------------------------------------------------------

/// What the adapter knows about the page it runs in.
#[derive(Debug, Clone)]
pub struct PageContext {
    url: Url,
    locale: Option<String>,
    user_agent: Option<String>,
}

impl PageContext {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            locale: None,
            user_agent: None,
        }
    }

    /// Parse the page URL.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| BridgeError::InvalidArgument(format!("page url '{url}': {e}")))?;
        Ok(Self::new(parsed))
    }

    /// Browser locale, e.g. `navigator.language`.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn fragment(&self) -> &str {
        self.url.fragment().unwrap_or("")
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        self.url.query_pairs().any(|(key, _)| key == name)
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The platform's JavaScript SDK, addressed by dotted method names
/// (e.g. `ysdk.adv.showFullscreenAdv`). Arguments and results use the SDK's
/// own JSON shapes; adapters normalize them.
///
/// Callbacks the SDK raises later are delivered to the adapter as
/// [`SdkEvent`](playbridge_core::types::SdkEvent)s.
#[async_trait]
pub trait PlatformSdk: Send + Sync {
    /// Resolve once the SDK global `name` is defined.
    async fn wait_for_global(&self, name: &str) -> Result<()>;

    /// Invoke an SDK method.
    async fn call(&self, method: &str, args: Value) -> Result<Value>;
}

/// Injects a remote `<script>` and resolves on its load event.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load_script(&self, url: &str) -> Result<()>;
}

/// Browser-resident key/value storage (`window.localStorage`).
pub trait LocalStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Result of the ad-server reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request was redirected, so ads are being served.
    Redirected,
    /// The request completed without redirect.
    Completed,
    /// The request failed outright, typically blocked by an extension.
    Failed,
}

/// DOM bait element plus a cross-origin request.
#[async_trait]
pub trait AdBlockDetector: Send + Sync {
    /// Insert an element styled like an ad container.
    fn place_bait(&self);

    /// Whether the bait has been hidden (zero rendered height).
    fn bait_hidden(&self) -> bool;

    fn remove_bait(&self);

    /// HEAD request in `no-cors` mode.
    async fn request(&self, url: &str) -> RequestOutcome;
}

/// Posts messages to the parent frame.
pub trait FrameMessenger: Send + Sync {
    fn post(&self, message: &FrameMessage) -> Result<()>;
}

/// `document.visibilityState` at startup. Later changes are pushed through
/// [`Bridge::dispatch_visibility_change`](crate::Bridge::dispatch_visibility_change).
pub trait PageVisibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Fetches the current UTC unix time (seconds) from a JSON time service.
#[async_trait]
pub trait TimeService: Send + Sync {
    async fn unix_time(&self, url: &str) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// Detached defaults
// ---------------------------------------------------------------------------

/// SDK stand-in when no platform SDK is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSdk;

#[async_trait]
impl PlatformSdk for DetachedSdk {
    async fn wait_for_global(&self, name: &str) -> Result<()> {
        warn!(global = name, "no platform SDK attached");
        Err(BridgeError::Sdk(format!("SDK global '{name}' is not available")))
    }

    async fn call(&self, method: &str, _args: Value) -> Result<Value> {
        warn!(method, "SDK call on detached host");
        Err(BridgeError::Sdk(format!("no SDK attached for '{method}'")))
    }
}

/// Script loader that reports every script as loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreloadedScripts;

#[async_trait]
impl ScriptLoader for PreloadedScripts {
    async fn load_script(&self, url: &str) -> Result<()> {
        debug!(url, "script assumed preloaded");
        Ok(())
    }
}

/// Detector that never sees a blocker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAdBlock;

#[async_trait]
impl AdBlockDetector for NoAdBlock {
    fn place_bait(&self) {}

    fn bait_hidden(&self) -> bool {
        false
    }

    fn remove_bait(&self) {}

    async fn request(&self, _url: &str) -> RequestOutcome {
        RequestOutcome::Redirected
    }
}

/// Messenger for pages that are not embedded in a frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoParentFrame;

impl FrameMessenger for NoParentFrame {
    fn post(&self, message: &FrameMessage) -> Result<()> {
        debug!(module = ?message.module, action = %message.action, "no parent frame, message dropped");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysVisible;

impl PageVisibility for AlwaysVisible {
    fn is_visible(&self) -> bool {
        true
    }
}

/// Time service for hosts without network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTimeService;

#[async_trait]
impl TimeService for NoTimeService {
    async fn unix_time(&self, url: &str) -> Result<i64> {
        debug!(url, "no time service attached");
        Err(BridgeError::Sdk(format!("time service '{url}' is not reachable")))
    }
}

/// In-memory [`LocalStore`].
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All host collaborators, cheaply cloneable.
#[derive(Clone)]
pub struct HostServices {
    pub sdk: Arc<dyn PlatformSdk>,
    pub scripts: Arc<dyn ScriptLoader>,
    /// `None` when the browser exposes no storage at all.
    pub local_store: Option<Arc<dyn LocalStore>>,
    pub ad_block_detector: Arc<dyn AdBlockDetector>,
    pub messenger: Arc<dyn FrameMessenger>,
    pub visibility: Arc<dyn PageVisibility>,
    pub time_service: Arc<dyn TimeService>,
}

impl Default for HostServices {
    fn default() -> Self {
        Self::detached()
    }
}

impl HostServices {
    /// Host with no SDK, preloaded scripts, an in-memory local store and a
    /// page that is always visible.
    pub fn detached() -> Self {
        Self {
            sdk: Arc::new(DetachedSdk),
            scripts: Arc::new(PreloadedScripts),
            local_store: Some(Arc::new(MemoryLocalStore::new())),
            ad_block_detector: Arc::new(NoAdBlock),
            messenger: Arc::new(NoParentFrame),
            visibility: Arc::new(AlwaysVisible),
            time_service: Arc::new(NoTimeService),
        }
    }

    pub fn with_sdk(mut self, sdk: Arc<dyn PlatformSdk>) -> Self {
        self.sdk = sdk;
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptLoader>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_local_store(mut self, store: Option<Arc<dyn LocalStore>>) -> Self {
        self.local_store = store;
        self
    }

    pub fn with_ad_block_detector(mut self, detector: Arc<dyn AdBlockDetector>) -> Self {
        self.ad_block_detector = detector;
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn FrameMessenger>) -> Self {
        self.messenger = messenger;
        self
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn PageVisibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_time_service(mut self, time_service: Arc<dyn TimeService>) -> Self {
        self.time_service = time_service;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_context_reads_query_and_fragment() {
        let page = PageContext::parse(
            "https://games.example.com/play?platform_id=vk&payload=abc#tgWebAppData=x",
        )
        .unwrap();
        assert_eq!(page.hostname(), "games.example.com");
        assert_eq!(page.query_param("platform_id").as_deref(), Some("vk"));
        assert_eq!(page.query_param("payload").as_deref(), Some("abc"));
        assert!(!page.has_query_param("api_id"));
        assert!(page.fragment().contains("tgWebAppData"));
    }

    #[test]
    fn invalid_page_url_is_rejected() {
        assert!(matches!(
            PageContext::parse("not a url"),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryLocalStore::new();
        store.set_item("k", "v").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
        store.remove_item("k").unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
        assert!(store.is_empty());
    }
}
