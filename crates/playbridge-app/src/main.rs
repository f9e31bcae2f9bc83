// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Playbridge diagnostic CLI.
//
// Runs the bridge outside a browser against a detached host: platform
// detection for a page URL, a full initialize with the configured options,
// and the local storage path backed by a JSON file.

mod file_store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use playbridge_bridge::traits::*;
use playbridge_bridge::{Bridge, HostServices, PageContext, detect};
use playbridge_core::config::BridgeConfig;
use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{PlatformId, StorageType};
use serde_json::{Value, json};
use tracing::{error, info};

use file_store::JsonFileStore;

#[derive(Debug, Parser)]
#[command(name = "playbridge", version, about = "Inspect how Playbridge treats a game page")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the platform a page URL resolves to.
    Detect {
        url: String,
        /// Platform id that overrides detection.
        #[arg(long)]
        force: Option<String>,
    },
    /// Initialize a bridge for the page and print its capability report.
    Simulate {
        url: String,
        /// Bridge configuration file (JSON).
        config: Option<PathBuf>,
        /// Local storage file; defaults to the user data directory.
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Read or write local storage through the bridge.
    Storage {
        #[command(subcommand)]
        action: StorageAction,
        #[arg(long, global = true)]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum StorageAction {
    Get { keys: Vec<String> },
    Set { key: String, value: String },
    Delete { keys: Vec<String> },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "playbridge failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Detect { url, force } => {
            let page = PageContext::parse(&url)?;
            println!("{}", detect(page.url(), force.as_deref()));
            Ok(())
        }
        Command::Simulate { url, config, store } => {
            let config = match config {
                Some(path) => BridgeConfig::load(path)?,
                None => BridgeConfig::default(),
            };
            let bridge = Bridge::new(PageContext::parse(&url)?, host(store)?);
            let outcome = bridge.initialize(config).await;
            let report = report(&bridge, outcome.as_ref().err());
            println!("{}", serde_json::to_string_pretty(&report)?);
            outcome
        }
        Command::Storage { action, store } => storage(action, store).await,
    }
}

fn host(store: Option<PathBuf>) -> Result<HostServices> {
    let path = store.unwrap_or_else(file_store::default_path);
    let store = JsonFileStore::open(&path)?;
    info!(path = %store.path().display(), "using local storage file");
    Ok(HostServices::detached().with_local_store(Some(Arc::new(store))))
}

fn report(bridge: &Bridge, failure: Option<&BridgeError>) -> Value {
    let Some(adapter) = bridge.adapter() else {
        return json!({ "session": bridge.session_id().to_string(), "initialized": false });
    };
    json!({
        "session": bridge.session_id().to_string(),
        "platform": adapter.platform_id().as_str(),
        "initialized": adapter.is_initialized(),
        "error": failure.map(ToString::to_string),
        "language": adapter.language(),
        "platformTld": adapter.platform_tld(),
        "visibility": adapter.visibility_state(),
        "deviceType": adapter.device_type(),
        "player": adapter.player(),
        "storage": {
            "default": adapter.default_storage_type().as_str(),
            "platformInternalSupported": adapter.is_storage_supported(StorageType::PlatformInternal),
        },
        "advertisement": {
            "banner": adapter.is_banner_supported(),
            "interstitial": adapter.is_interstitial_supported(),
            "rewarded": adapter.is_rewarded_supported(),
            "minimumDelaySeconds": bridge
                .advertisement()
                .map(|ads| ads.minimum_delay_between_interstitial().as_secs()),
        },
        "social": {
            "share": adapter.is_share_supported(),
            "inviteFriends": adapter.is_invite_friends_supported(),
            "joinCommunity": adapter.is_join_community_supported(),
            "createPost": adapter.is_create_post_supported(),
            "addToHomeScreen": adapter.is_add_to_home_screen_supported(),
            "addToFavorites": adapter.is_add_to_favorites_supported(),
            "rate": adapter.is_rate_supported(),
            "externalLinksAllowed": adapter.is_external_links_allowed(),
        },
        "leaderboard": adapter.is_leaderboard_supported(),
        "leaderboardFeatures": {
            "nativePopup": adapter.is_leaderboard_native_popup_supported(),
            "multipleBoards": adapter.is_leaderboard_multiple_boards_supported(),
            "setScore": adapter.is_leaderboard_set_score_supported(),
            "getScore": adapter.is_leaderboard_get_score_supported(),
            "getEntries": adapter.is_leaderboard_get_entries_supported(),
        },
        "payments": adapter.is_payments_supported(),
        "remoteConfig": adapter.is_remote_config_supported(),
        "clipboard": adapter.is_clipboard_supported(),
        "authorization": adapter.is_player_authorization_supported(),
    })
}

async fn storage(action: StorageAction, store: Option<PathBuf>) -> Result<()> {
    let bridge = Bridge::new(PageContext::parse("http://localhost/")?, host(store)?);
    let config = BridgeConfig {
        forcibly_set_platform_id: Some(PlatformId::Mock.as_str().to_string()),
        ..BridgeConfig::default()
    };
    bridge.initialize(config).await?;
    let adapter = bridge.adapter().ok_or(BridgeError::NotInitialized)?;
    let local = StorageType::LocalStorage;

    match action {
        StorageAction::Get { keys } => {
            let values = adapter.get_data(&keys, local, true).await?;
            let pairs: serde_json::Map<String, Value> = keys.into_iter().zip(values).collect();
            println!("{}", serde_json::to_string_pretty(&pairs)?);
        }
        StorageAction::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            adapter.set_data(&[key], &[value], local).await?;
        }
        StorageAction::Delete { keys } => adapter.delete_data(&keys, local).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_detect_with_force() {
        let cli = Cli::try_parse_from(["playbridge", "detect", "https://x.example/", "--force", "poki"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Detect { ref url, force: Some(ref f) } if url == "https://x.example/" && f == "poki"
        ));
    }

    #[tokio::test]
    async fn mock_report_lists_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(Some(dir.path().join("s.json"))).unwrap();
        let bridge = Bridge::new(PageContext::parse("http://localhost/").unwrap(), host);
        bridge.initialize(BridgeConfig::default()).await.unwrap();

        let report = report(&bridge, None);
        assert_eq!(report["platform"], "mock");
        assert_eq!(report["initialized"], true);
        assert_eq!(report["storage"]["default"], "local_storage");
        assert_eq!(report["leaderboard"], false);
        assert_eq!(report["leaderboardFeatures"]["setScore"], false);
        assert_eq!(report["visibility"], "visible");
        assert!(report["platformTld"].is_null());
    }

    #[tokio::test]
    async fn storage_commands_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        storage(
            StorageAction::Set { key: "level".into(), value: "3".into() },
            Some(path.clone()),
        )
        .await
        .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let saved: serde_json::Map<String, Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved["level"], "3");

        storage(StorageAction::Delete { keys: vec!["level".into()] }, Some(path.clone()))
            .await
            .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), "{}");
    }
}
