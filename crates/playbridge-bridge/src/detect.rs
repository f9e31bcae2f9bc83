// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform detection from the page URL.

use playbridge_core::types::PlatformId;
use tracing::{debug, warn};
use url::Url;

/// Query parameter that names the platform explicitly.
pub const PLATFORM_ID_PARAM: &str = "platform_id";

/// Query parameter carrying the game id for platforms that need one.
pub const GAME_ID_PARAM: &str = "game_id";

/// Pick the platform for a page.
///
/// A non-empty forced id decides alone. Otherwise a `platform_id` query
/// parameter decides, and only without one are the portal fingerprints
/// consulted. Ids from either explicit source are compared case-insensitively;
/// an id that names no platform selects [`PlatformId::Mock`].
pub fn detect(url: &Url, forced: Option<&str>) -> PlatformId {
    if let Some(forced) = forced.filter(|f| !f.is_empty()) {
        return explicit(forced, "configuration");
    }

    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == PLATFORM_ID_PARAM) {
        return explicit(&value, "URL parameter");
    }

    fingerprint(url).unwrap_or(PlatformId::Mock)
}

fn explicit(id: &str, source: &str) -> PlatformId {
    match id.to_ascii_lowercase().parse() {
        Ok(platform) => {
            debug!(%platform, source, "platform named explicitly");
            platform
        }
        Err(_) => {
            warn!(id, source, "unknown platform id, using mock");
            PlatformId::Mock
        }
    }
}

/// `game_id` URL parameter, if present and non-empty.
pub fn game_id_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == GAME_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn fingerprint(url: &Url) -> Option<PlatformId> {
    let host = url.host_str().unwrap_or("");
    let fragment = url.fragment().unwrap_or("");
    let has_param = |name: &str| url.query_pairs().any(|(key, _)| key == name);

    let platform = if host.contains("yandex.net") || fragment.contains("yandex") {
        PlatformId::Yandex
    } else if host.contains("crazygames.") || host.contains("1001juegos.com") {
        PlatformId::CrazyGames
    } else if host.contains("gamedistribution.com") {
        PlatformId::GameDistribution
    } else if host.contains("lagged.") {
        PlatformId::Lagged
    } else if host.contains("wortal.ai") {
        PlatformId::Wortal
    } else if (has_param("api_id") && has_param("viewer_id") && has_param("auth_key"))
        || has_param("vk_app_id")
    {
        PlatformId::Vk
    } else if has_param("app_id") && has_param("player_id") && has_param("game_sid") && has_param("auth_key") {
        PlatformId::AbsoluteGames
    } else if has_param("playdeck") {
        PlatformId::PlayDeck
    } else if fragment.contains("tgWebAppData") {
        PlatformId::Telegram
    } else if host.contains("y8") {
        PlatformId::Y8
    } else if host.contains("poki-gdn.com") || host.contains("poki.com") {
        PlatformId::Poki
    } else if host.contains("fbsbx.com") || host.contains("facebook.com") {
        PlatformId::Facebook
    } else {
        return None;
    };
    debug!(%platform, host, "platform fingerprinted");
    Some(platform)
}
