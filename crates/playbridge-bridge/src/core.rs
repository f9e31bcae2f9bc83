// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session state shared by every adapter.
//
// Each concrete adapter owns exactly one `AdapterCore` and exposes it through
// `AdapterBase::core()`. The capability traits implement their defaults on
// top of it; adapters reach into it to record state changes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use playbridge_core::config::DEFAULT_SCRIPT_LOAD_TIMEOUT_MS;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{
    ActionKind, BannerState, InterstitialState, PlatformId, PlayerInfo, RewardedState, StorageType,
    VisibilityState,
};
use playbridge_runtime::{DeferredRegistry, EventEmitter, ListenerId, StateMachine};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::host::{HostServices, LocalStore, PageContext, RequestOutcome};
use crate::storage;

/// Well-known ad-serving host used by the default ad-block check.
pub const AD_CHECK_URL: &str = "https://www3.doubleclick.net";

/// Public UTC clock used when a platform has no server time of its own.
pub const TIME_SERVICE_URL: &str = "https://worldtimeapi.org/api/timezone/Etc/UTC";

/// Time the bait element gets to be hidden by a blocker.
const BAIT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Mutable session state plus host access for one adapter.
pub struct AdapterCore {
    platform_id: PlatformId,
    options: Map<String, Value>,
    page: PageContext,
    host: HostServices,
    script_timeout: Option<Duration>,

    initialized: AtomicBool,
    player: Mutex<PlayerInfo>,
    language: Mutex<Option<String>>,
    default_storage: Mutex<StorageType>,
    /// Last known copy of platform-internal storage, for platforms whose
    /// API reads and writes the whole blob at once.
    platform_storage: Mutex<Option<Map<String, Value>>>,
    visibility: Mutex<VisibilityState>,
    visibility_events: EventEmitter<VisibilityState>,

    interstitial: StateMachine<InterstitialState>,
    rewarded: StateMachine<RewardedState>,
    banner: StateMachine<BannerState>,
    deferreds: DeferredRegistry<ActionKind>,
}

impl AdapterCore {
    pub fn new(platform_id: PlatformId, page: PageContext, host: HostServices) -> Self {
        let visibility = if host.visibility.is_visible() {
            VisibilityState::Visible
        } else {
            VisibilityState::Hidden
        };
        Self {
            platform_id,
            options: Map::new(),
            page,
            host,
            script_timeout: Some(Duration::from_millis(DEFAULT_SCRIPT_LOAD_TIMEOUT_MS)),
            initialized: AtomicBool::new(false),
            player: Mutex::new(PlayerInfo::default()),
            language: Mutex::new(None),
            default_storage: Mutex::new(StorageType::LocalStorage),
            platform_storage: Mutex::new(None),
            visibility: Mutex::new(visibility),
            visibility_events: EventEmitter::new(),
            interstitial: StateMachine::new(),
            rewarded: StateMachine::new(),
            banner: StateMachine::new(),
            deferreds: DeferredRegistry::new(),
        }
    }

    /// Platform option object. Non-object values are ignored.
    pub fn with_options(mut self, options: Value) -> Self {
        match options {
            Value::Object(map) => self.options = map,
            Value::Null => {}
            other => warn!(platform = %self.platform_id, ?other, "platform options are not an object"),
        }
        self
    }

    /// Bound on remote script loading; `None` waits indefinitely.
    pub fn with_script_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.script_timeout = timeout;
        self
    }

    // -- Identity ------------------------------------------------------------

    pub fn platform_id(&self) -> PlatformId {
        self.platform_id
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// String option, ignoring empty values.
    pub fn option_str(&self, key: &str) -> Option<String> {
        match self.options.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A required string option, or [`BridgeError::MissingConfig`].
    pub fn require_option(&self, key: &str) -> Result<String> {
        self.option_str(key)
            .ok_or_else(|| BridgeError::missing_config(self.platform_id.as_str(), key))
    }

    // -- Initialization ------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Fail with [`BridgeError::NotInitialized`] until initialization has
    /// completed.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BridgeError::NotInitialized)
        }
    }

    /// Run `bootstrap` once, sharing its outcome with concurrent callers.
    ///
    /// Later calls after success return `Ok` immediately. A failed bootstrap
    /// leaves the adapter uninitialized so the caller may retry.
    #[instrument(skip_all, fields(platform = %self.platform_id))]
    pub async fn initialize_once<F, Fut>(&self, bootstrap: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.is_initialized() {
            debug!("already initialized");
            return Ok(());
        }
        self.deferreds
            .run_exclusive(ActionKind::Initialize, || async {
                bootstrap().await?;
                self.initialized.store(true, Ordering::Release);
                info!("adapter initialized");
                Ok(Value::Null)
            })
            .await
            .map(|_| ())
    }

    // -- Deferred operations -------------------------------------------------

    pub fn deferreds(&self) -> &DeferredRegistry<ActionKind> {
        &self.deferreds
    }

    /// Run `op` with at most one in flight per `kind`, converting the shared
    /// JSON outcome back into `T`.
    pub async fn exclusive<T, F, Fut>(&self, kind: ActionKind, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = self
            .deferreds
            .run_exclusive(kind, || async { Ok(serde_json::to_value(op().await?)?) })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run `start` and wait for an SDK callback to settle `kind`.
    ///
    /// The adapter settles the entry from `handle_sdk_event` with
    /// [`Self::settle_callback`]. At most one runs per `kind`; if the caller
    /// is dropped first the entry is rejected with `Cancelled`.
    pub async fn callback<F, Fut>(&self, kind: ActionKind, start: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.deferreds
            .run_exclusive(kind, || async {
                let answer = self.deferreds.get(kind).ok_or(BridgeError::Cancelled)?;
                start().await?;
                answer.await
            })
            .await
    }

    /// Settle a pending [`Self::callback`]. Returns `false` when nothing
    /// waits for `kind`.
    pub fn settle_callback(&self, kind: ActionKind, outcome: Result<Value>) -> bool {
        let settled = match outcome {
            Ok(value) => self.deferreds.resolve(kind, value),
            Err(e) => self.deferreds.reject(kind, e),
        };
        if !settled {
            debug!(platform = %self.platform_id, kind = kind.as_str(), "callback without waiter");
        }
        settled
    }

    // -- SDK access ----------------------------------------------------------

    /// Invoke a platform SDK method.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        debug!(platform = %self.platform_id, method, "sdk call");
        self.host.sdk.call(method, args).await
    }

    /// Inject the SDK script, bounded by the configured timeout.
    #[instrument(skip(self), fields(platform = %self.platform_id))]
    pub async fn load_sdk_script(&self, url: &str) -> Result<()> {
        let load = self.host.scripts.load_script(url);
        let loaded = match self.script_timeout {
            None => load.await,
            Some(limit) => match tokio::time::timeout(limit, load).await {
                Ok(loaded) => loaded,
                Err(_) => {
                    warn!(limit_ms = limit.as_millis() as u64, "SDK script load timed out");
                    return Err(BridgeError::ScriptTimeout(url.to_string()));
                }
            },
        };
        loaded.map_err(|e| match e {
            BridgeError::ScriptLoad { .. } => e,
            other => BridgeError::ScriptLoad {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;
        info!("SDK script loaded");
        Ok(())
    }

    /// Load the SDK script and wait for its global handle.
    pub async fn load_sdk(&self, url: &str, global: &str) -> Result<()> {
        self.load_sdk_script(url).await?;
        self.host.sdk.wait_for_global(global).await
    }

    // -- Session -------------------------------------------------------------

    pub fn player(&self) -> PlayerInfo {
        lock(&self.player).clone()
    }

    pub fn set_player(&self, player: PlayerInfo) {
        debug!(platform = %self.platform_id, authorized = player.authorized, "player updated");
        *lock(&self.player) = player;
    }

    /// Language override if the platform reported one, else the first two
    /// lowercase characters of the browser locale, else `"en"`.
    pub fn language(&self) -> String {
        if let Some(language) = lock(&self.language).clone() {
            return language;
        }
        self.page
            .locale()
            .and_then(|locale| locale.get(..2))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "en".to_string())
    }

    pub fn set_language(&self, language: impl Into<String>) {
        *lock(&self.language) = Some(language.into());
    }

    pub fn visibility_state(&self) -> VisibilityState {
        *lock(&self.visibility)
    }

    /// Record a page visibility change, notifying listeners only when the
    /// state actually changed.
    pub fn set_visibility_state(&self, state: VisibilityState) -> bool {
        {
            let mut current = lock(&self.visibility);
            if *current == state {
                return false;
            }
            *current = state;
        }
        debug!(platform = %self.platform_id, state = state.as_str(), "visibility changed");
        self.visibility_events.emit(&state);
        true
    }

    pub fn subscribe_visibility(
        &self,
        listener: impl Fn(&VisibilityState) + Send + Sync + 'static,
    ) -> ListenerId {
        self.visibility_events.subscribe(listener)
    }

    pub fn unsubscribe_visibility(&self, id: ListenerId) -> bool {
        self.visibility_events.unsubscribe(id)
    }

    /// UTC time from the host's time service.
    pub async fn fetch_server_time(&self) -> Result<DateTime<Utc>> {
        let seconds = self.host.time_service.unix_time(TIME_SERVICE_URL).await?;
        DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| BridgeError::MalformedResponse(format!("unix time {seconds} out of range")))
    }

    // -- Storage -------------------------------------------------------------

    pub fn default_storage_type(&self) -> StorageType {
        *lock(&self.default_storage)
    }

    pub fn set_default_storage_type(&self, storage: StorageType) {
        *lock(&self.default_storage) = storage;
    }

    pub fn local_store(&self) -> Result<&Arc<dyn LocalStore>> {
        self.host
            .local_store
            .as_ref()
            .ok_or_else(|| BridgeError::Storage("local storage is not available".into()))
    }

    pub fn get_local(&self, keys: &[String], try_parse_json: bool) -> Result<Vec<Value>> {
        storage::read_local(self.local_store()?.as_ref(), keys, try_parse_json)
    }

    pub fn set_local(&self, keys: &[String], values: &[Value]) -> Result<()> {
        storage::write_local(self.local_store()?.as_ref(), keys, values)
    }

    pub fn delete_local(&self, keys: &[String]) -> Result<()> {
        storage::delete_local(self.local_store()?.as_ref(), keys)
    }

    /// Cached platform storage, if it has been fetched.
    pub fn platform_snapshot(&self) -> Option<Map<String, Value>> {
        lock(&self.platform_storage).clone()
    }

    pub fn set_platform_snapshot(&self, snapshot: Map<String, Value>) {
        *lock(&self.platform_storage) = Some(snapshot);
    }

    /// Install `snapshot` unless one is already cached. Returns the cached
    /// copy either way.
    pub fn seed_platform_snapshot(&self, snapshot: Map<String, Value>) -> Map<String, Value> {
        lock(&self.platform_storage).get_or_insert(snapshot).clone()
    }

    /// Apply `edit` to the cached snapshot under its lock and return the
    /// result. Writers that edit here before awaiting the platform merge
    /// instead of overwriting each other.
    pub fn update_platform_snapshot(&self, edit: impl FnOnce(&mut Map<String, Value>)) -> Map<String, Value> {
        let mut cached = lock(&self.platform_storage);
        let snapshot = cached.get_or_insert_with(Map::new);
        edit(snapshot);
        snapshot.clone()
    }

    // -- Advertisement -------------------------------------------------------

    pub fn interstitial(&self) -> &StateMachine<InterstitialState> {
        &self.interstitial
    }

    pub fn rewarded(&self) -> &StateMachine<RewardedState> {
        &self.rewarded
    }

    pub fn banner(&self) -> &StateMachine<BannerState> {
        &self.banner
    }

    /// Bait element plus network request.
    ///
    /// A redirect proves ads are served; a failed request means something
    /// blocked it. Otherwise the bait decides after a short delay.
    #[instrument(skip(self), fields(platform = %self.platform_id))]
    pub async fn detect_ad_block(&self) -> bool {
        let detector = &self.host.ad_block_detector;
        detector.place_bait();
        let blocked = match detector.request(AD_CHECK_URL).await {
            RequestOutcome::Redirected => false,
            RequestOutcome::Failed => true,
            RequestOutcome::Completed => {
                tokio::time::sleep(BAIT_SETTLE_DELAY).await;
                detector.bait_hidden()
            }
        };
        detector.remove_bait();
        debug!(blocked, "ad-block check finished");
        blocked
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
