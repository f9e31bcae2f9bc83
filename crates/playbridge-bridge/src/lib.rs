// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Playbridge Bridge: platform detection and adapter dispatch.
//
// The host supplies the page context and its SDK/storage/messaging services
// through the traits in `host`; the `Bridge` picks one platform adapter for
// the page and exposes the uniform capability surface in `traits`.

pub mod advertisement;
pub mod core;
pub mod detect;
pub mod dispatcher;
pub mod host;
pub mod options;
pub mod platforms;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use playbridge_core::types::PlatformId;

pub use advertisement::AdvertisementModule;
pub use crate::core::AdapterCore;
pub use detect::detect;
pub use dispatcher::Bridge;
pub use host::{HostServices, PageContext};
pub use traits::PlatformAdapter;

use platforms::absolute_games::AbsoluteGamesAdapter;
use platforms::crazy_games::CrazyGamesAdapter;
use platforms::facebook::FacebookAdapter;
use platforms::game_distribution::GameDistributionAdapter;
use platforms::lagged::LaggedAdapter;
use platforms::mock::MockAdapter;
use platforms::ok::OkAdapter;
use platforms::playdeck::PlayDeckAdapter;
use platforms::playgama::PlaygamaAdapter;
use platforms::poki::PokiAdapter;
use platforms::qa_tool::QaToolAdapter;
use platforms::telegram::TelegramAdapter;
use platforms::vk::VkAdapter;
use platforms::vk_play::VkPlayAdapter;
use platforms::wortal::WortalAdapter;
use platforms::y8::Y8Adapter;
use platforms::yandex::YandexAdapter;

/// Build the adapter for the platform `core` was created for.
pub fn create_adapter(core: AdapterCore) -> Arc<dyn PlatformAdapter> {
    match core.platform_id() {
        PlatformId::Mock => Arc::new(MockAdapter::new(core)),
        PlatformId::QaTool => Arc::new(QaToolAdapter::new(core)),
        PlatformId::Vk => Arc::new(VkAdapter::new(core)),
        PlatformId::VkPlay => Arc::new(VkPlayAdapter::new(core)),
        PlatformId::Ok => Arc::new(OkAdapter::new(core)),
        PlatformId::Yandex => Arc::new(YandexAdapter::new(core)),
        PlatformId::CrazyGames => Arc::new(CrazyGamesAdapter::new(core)),
        PlatformId::AbsoluteGames => Arc::new(AbsoluteGamesAdapter::new(core)),
        PlatformId::GameDistribution => Arc::new(GameDistributionAdapter::new(core)),
        PlatformId::Playgama => Arc::new(PlaygamaAdapter::new(core)),
        PlatformId::Wortal => Arc::new(WortalAdapter::new(core)),
        PlatformId::PlayDeck => Arc::new(PlayDeckAdapter::new(core)),
        PlatformId::Telegram => Arc::new(TelegramAdapter::new(core)),
        PlatformId::Y8 => Arc::new(Y8Adapter::new(core)),
        PlatformId::Lagged => Arc::new(LaggedAdapter::new(core)),
        PlatformId::Facebook => Arc::new(FacebookAdapter::new(core)),
        PlatformId::Poki => Arc::new(PokiAdapter::new(core)),
    }
}
