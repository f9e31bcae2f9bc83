// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host doubles for adapter tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{FrameMessage, PlatformId};
use serde_json::Value;

use crate::core::AdapterCore;
use crate::host::{FrameMessenger, HostServices, PageContext, PlatformSdk, ScriptLoader};

pub fn page(url: &str) -> PageContext {
    PageContext::parse(url).unwrap()
}

/// SDK double with canned per-method responses that records every call.
///
/// Methods without a canned response return `null`.
#[derive(Default)]
pub struct ScriptedSdk {
    responses: Mutex<HashMap<String, Result<Value>>>,
    delays: Mutex<HashMap<String, Duration>>,
    missing_globals: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: &str, value: Value) -> &Self {
        self.responses.lock().unwrap().insert(method.to_string(), Ok(value));
        self
    }

    pub fn fail(&self, method: &str, error: BridgeError) -> &Self {
        self.responses.lock().unwrap().insert(method.to_string(), Err(error));
        self
    }

    /// Make `method` take `delay` before answering.
    pub fn slow(&self, method: &str, delay: Duration) -> &Self {
        self.delays.lock().unwrap().insert(method.to_string(), delay);
        self
    }

    pub fn without_global(&self, name: &str) -> &Self {
        self.missing_globals.lock().unwrap().push(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    /// Arguments of the most recent call to `method`.
    pub fn last_args(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, args)| args.clone())
    }
}

#[async_trait]
impl PlatformSdk for ScriptedSdk {
    async fn wait_for_global(&self, name: &str) -> Result<()> {
        if self.missing_globals.lock().unwrap().iter().any(|g| g == name) {
            return Err(BridgeError::Sdk(format!("{name} is not defined")));
        }
        Ok(())
    }

    async fn call(&self, method: &str, args: Value) -> Result<Value> {
        self.calls.lock().unwrap().push((method.to_string(), args));
        let delay = self.delays.lock().unwrap().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }
}

/// Script loader that records requested URLs.
#[derive(Default)]
pub struct RecordingScripts {
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl ScriptLoader for RecordingScripts {
    async fn load_script(&self, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Script loader whose load event never fires.
pub struct HangingScripts;

#[async_trait]
impl ScriptLoader for HangingScripts {
    async fn load_script(&self, _url: &str) -> Result<()> {
        futures::future::pending().await
    }
}

/// Messenger that keeps every posted message.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<FrameMessage>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<FrameMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<FrameMessage> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl FrameMessenger for RecordingMessenger {
    fn post(&self, message: &FrameMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A detached host with `sdk` attached.
pub fn host_with(sdk: Arc<ScriptedSdk>) -> HostServices {
    HostServices::detached().with_sdk(sdk)
}

/// Core for `platform` on `url`, wired to `sdk`.
pub fn core_with(platform: PlatformId, url: &str, sdk: Arc<ScriptedSdk>, options: Value) -> AdapterCore {
    AdapterCore::new(platform, page(url), host_with(sdk)).with_options(options)
}
