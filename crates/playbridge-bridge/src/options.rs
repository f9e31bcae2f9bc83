// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use playbridge_core::types::PlatformId;
use serde_json::Value;

/// Options for the active platform.
///
/// Callers may key an options object by platform id; when the object holds an
/// entry for `platform`, that entry replaces the whole object.
pub fn platform_options(options: &Value, platform: PlatformId) -> Value {
    match options.get(platform.as_str()) {
        Some(specific) => specific.clone(),
        None => options.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn substitutes_platform_entry() {
        let options = json!({ "vk": { "link": "https://vk.com/app" }, "yandex": { "id": 1 } });
        assert_eq!(
            platform_options(&options, PlatformId::Vk),
            json!({ "link": "https://vk.com/app" })
        );
    }

    #[test]
    fn leaves_plain_options_alone() {
        let options = json!({ "text": "hello" });
        assert_eq!(platform_options(&options, PlatformId::Poki), options);
        assert_eq!(platform_options(&Value::Null, PlatformId::Poki), Value::Null);
    }
}
