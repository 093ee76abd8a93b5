//! Typed payloads for the documents the chrome reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wren_common::errors::StorageError;

use crate::store::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub favicon: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favicon {
    pub page_url: String,
    /// Encoded image data, as handed over by the rendering engine.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupTab {
    pub url: String,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub origin: String,
    pub name: String,
    pub granted: bool,
}

/// Decode a record's value into a typed payload.
pub fn decode<T: serde::de::DeserializeOwned>(record: &Record) -> Result<T, StorageError> {
    serde_json::from_value(record.value.clone())
        .map_err(|e| StorageError::Backend(format!("decode: {e}")))
}

/// Encode a typed payload into a record value.
pub fn encode<T: Serialize>(payload: &T) -> Result<Value, StorageError> {
    serde_json::to_value(payload).map_err(|e| StorageError::Backend(format!("encode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bookmark_round_trips_through_a_record() {
        let bookmark = Bookmark {
            url: "https://example.org".into(),
            title: "Example".into(),
            favicon: None,
            is_folder: false,
            parent: None,
        };

        let record = Record {
            id: "b1".into(),
            value: encode(&bookmark).unwrap(),
        };
        let back: Bookmark = decode(&record).unwrap();
        assert_eq!(back, bookmark);
    }

    #[test]
    fn history_item_date_serializes_as_rfc3339() {
        let item = HistoryItem {
            url: "u".into(),
            title: "t".into(),
            favicon: None,
            date: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let value = encode(&item).unwrap();
        assert!(value["date"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
    }

    #[test]
    fn decode_rejects_mismatched_shapes() {
        let record = Record {
            id: "x".into(),
            value: json!({ "not": "a bookmark" }),
        };
        assert!(decode::<Bookmark>(&record).is_err());
    }

    #[test]
    fn optional_fields_default() {
        let record = Record {
            id: "s".into(),
            value: json!({ "url": "https://example.org" }),
        };
        let tab: StartupTab = decode(&record).unwrap();
        assert!(!tab.pinned);
    }
}
