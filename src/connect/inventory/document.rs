//! Parsing of inventory computer documents.
//!
//! The service answers `GET .../computers/name/{name}` with a JSON document
//! holding one `computer` object. Only the computer name and the list of
//! extension attributes are read. Anything that is not JSON is treated as an
//! error page: the first line mentioning `Error` (tags stripped) becomes the
//! failure reason.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::connect::error::InventoryError;
use crate::connect::types::{ExtensionAttribute, InventoryRecord};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

#[derive(Debug, Deserialize)]
struct ComputerDocument {
    #[serde(default)]
    computer: Option<Computer>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Computer {
    #[serde(default)]
    general: Option<General>,
    #[serde(default)]
    extension_attributes: Vec<RawAttribute>,
}

#[derive(Debug, Deserialize)]
struct General {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    name: String,
    #[serde(default)]
    value: Value,
}

/// Render an attribute value as a single string.
///
/// Multi-valued attributes contribute their first value only.
fn first_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.first().map(first_value).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Pull a human-readable reason out of an error page.
pub(crate) fn error_page_reason(body: &str) -> String {
    body.lines()
        .map(|line| TAG.replace_all(line, "").trim().to_string())
        .find(|text| text.contains("Error"))
        .unwrap_or_else(|| "Unknown Error".to_string())
}

/// Parse a computer document fetched for `name`.
pub(crate) fn parse_computer_document(
    name: &str,
    body: &str,
) -> Result<InventoryRecord, InventoryError> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return Err(InventoryError::LookupFailed(error_page_reason(body)));
    }

    let doc: ComputerDocument = serde_json::from_str(trimmed)
        .map_err(|e| InventoryError::LookupFailed(format!("malformed response: {}", e)))?;

    if let Some(error) = doc.error {
        return Err(InventoryError::LookupFailed(first_value(&error)));
    }

    let computer = doc
        .computer
        .ok_or_else(|| InventoryError::NotFound(name.to_string()))?;

    let computer_name = computer
        .general
        .and_then(|g| g.name)
        .unwrap_or_else(|| name.to_string());

    let extension_attributes = computer
        .extension_attributes
        .into_iter()
        .map(|raw| ExtensionAttribute {
            value: first_value(&raw.value),
            name: raw.name,
        })
        .collect();

    Ok(InventoryRecord {
        computer_name,
        extension_attributes,
    })
}
