// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Concrete platform adapters and the response normalization they share.

pub mod absolute_games;
pub mod crazy_games;
pub mod facebook;
pub mod game_distribution;
pub mod lagged;
pub mod mock;
pub mod ok;
pub mod playdeck;
pub mod playgama;
pub mod poki;
pub mod qa_tool;
pub mod telegram;
pub mod vk;
pub mod vk_play;
pub mod wortal;
pub mod y8;
pub mod yandex;

use std::collections::HashMap;

use playbridge_core::error::{BridgeError, Result};
use playbridge_core::types::{CatalogItem, PurchaseResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// String or numeric field as a string. Empty strings count as absent.
pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Leaderboard rank, saturating at `u32::MAX`. Missing or negative ranks
/// read as 0.
pub(crate) fn rank_field(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map_or(0, |rank| u32::try_from(rank).unwrap_or(u32::MAX))
}

/// Deserialize an SDK response, reporting shape mismatches as
/// [`BridgeError::MalformedResponse`].
pub(crate) fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| BridgeError::MalformedResponse(format!("{what}: {e}")))
}

/// Purchase objects in the `{productID, purchaseToken, developerPayload}`
/// shape used by Yandex and Facebook.
pub(crate) fn purchase_from_sdk(value: &Value) -> Result<PurchaseResult> {
    let product_id = str_field(value, "productID")
        .ok_or_else(|| BridgeError::MalformedResponse("purchase without productID".into()))?;
    Ok(PurchaseResult {
        product_id,
        token: str_field(value, "purchaseToken"),
        payload: str_field(value, "developerPayload"),
    })
}

pub(crate) fn purchases_from_sdk(value: &Value) -> Result<Vec<PurchaseResult>> {
    array(value, "purchases")?.iter().map(purchase_from_sdk).collect()
}

/// Product lists keyed by `id` (Yandex) or `productID` (Facebook).
pub(crate) fn catalog_from_sdk(value: &Value) -> Result<Vec<CatalogItem>> {
    array(value, "catalog")?
        .iter()
        .map(|product| {
            let id = str_field(product, "id")
                .or_else(|| str_field(product, "productID"))
                .ok_or_else(|| BridgeError::MalformedResponse("product without id".into()))?;
            Ok(CatalogItem {
                id,
                title: str_field(product, "title"),
                description: str_field(product, "description"),
                image_uri: str_field(product, "imageURI"),
                price: str_field(product, "price"),
                price_currency_code: str_field(product, "priceCurrencyCode"),
                price_value: str_field(product, "priceValue").or_else(|| str_field(product, "priceAmount")),
            })
        })
        .collect()
}

/// Flat string map, stringifying non-string values.
pub(crate) fn string_map(value: &Value) -> Result<HashMap<String, String>> {
    let Some(object) = value.as_object() else {
        return Err(BridgeError::MalformedResponse("expected an object".into()));
    };
    Ok(object
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect())
}

pub(crate) fn array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| BridgeError::MalformedResponse(format!("{what}: expected an array")))
}
