//! Wire shapes for the remote table API and their mapping to `DiagramRecord`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RemoteError;
use crate::models::{DiagramId, DiagramRecord, DEFAULT_TITLE};

/// Record as read from the remote. Field names follow the table's column
/// names; camelCase and snake_case spellings are accepted too.
#[derive(Debug, Default, Deserialize)]
pub(super) struct WireRecord {
    #[serde(rename = "Id", alias = "id", alias = "ID", default)]
    id: Option<Value>,
    #[serde(rename = "Title", alias = "title", default)]
    title: Option<String>,
    #[serde(
        rename = "MermaidCode",
        alias = "mermaidCode",
        alias = "mermaid_code",
        alias = "content",
        alias = "Content",
        default
    )]
    content: Option<String>,
    #[serde(
        rename = "CreatedAt",
        alias = "createdAt",
        alias = "created_at",
        default
    )]
    created_at: Option<Value>,
    #[serde(
        rename = "UpdatedAt",
        alias = "updatedAt",
        alias = "updated_at",
        default
    )]
    updated_at: Option<Value>,
}

impl WireRecord {
    /// Convert into a clean local record.
    ///
    /// A missing `UpdatedAt` falls back to `CreatedAt` (and vice versa) so
    /// timestamp comparisons are always defined.
    pub(super) fn into_record(self) -> Result<DiagramRecord, RemoteError> {
        let id = self
            .id
            .as_ref()
            .and_then(id_from_value)
            .ok_or_else(|| RemoteError::InvalidPayload("record is missing Id".to_string()))?;

        let created_at = self
            .created_at
            .as_ref()
            .map(timestamp_from_value)
            .transpose()?
            .flatten();
        let updated_at = self
            .updated_at
            .as_ref()
            .map(timestamp_from_value)
            .transpose()?
            .flatten();

        let (created_at, updated_at) = match (created_at, updated_at) {
            (Some(created), Some(updated)) => (created, updated),
            (Some(created), None) => (created, created),
            (None, Some(updated)) => (updated, updated),
            (None, None) => (0, 0),
        };

        Ok(DiagramRecord {
            id: DiagramId::canonical(id),
            title: self
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            content: self.content.unwrap_or_default(),
            created_at,
            updated_at,
            dirty: false,
            retry_count: 0,
        })
    }
}

/// Body sent on create and update.
#[derive(Debug, Serialize)]
pub(super) struct WireWrite<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "MermaidCode")]
    content: &'a str,
    #[serde(rename = "CreatedAt")]
    created_at: String,
    #[serde(rename = "UpdatedAt")]
    updated_at: String,
}

impl<'a> From<&'a DiagramRecord> for WireWrite<'a> {
    fn from(record: &'a DiagramRecord) -> Self {
        Self {
            title: &record.title,
            content: &record.content,
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

/// List endpoint payload: either `{ list, pageInfo }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum WireList {
    Page {
        list: Vec<WireRecord>,
        #[serde(rename = "pageInfo", default)]
        page_info: Option<WirePageInfo>,
    },
    Bare(Vec<WireRecord>),
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct WirePageInfo {
    #[serde(rename = "isLastPage", default)]
    pub(super) is_last_page: Option<bool>,
}

/// Extract the id assigned by a create call. Accepts `{ "Id": .. }`, a full
/// record, or a one-element array of either.
pub(super) fn created_id(payload: &Value) -> Option<String> {
    let object = match payload {
        Value::Array(items) => items.first()?,
        other => other,
    };
    ["Id", "id", "ID"]
        .iter()
        .find_map(|key| object.get(key))
        .and_then(id_from_value)
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

fn timestamp_from_value(value: &Value) -> Result<Option<i64>, RemoteError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| RemoteError::InvalidPayload(format!("invalid timestamp {number}"))),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => parse_timestamp(text)
            .map(Some)
            .ok_or_else(|| RemoteError::InvalidPayload(format!("invalid timestamp '{text}'"))),
        other => Err(RemoteError::InvalidPayload(format!(
            "invalid timestamp {other}"
        ))),
    }
}

/// Format Unix milliseconds as an RFC 3339 UTC string with millisecond precision.
pub(super) fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp into Unix milliseconds.
///
/// Accepts RFC 3339 and the space-separated `YYYY-MM-DD HH:MM:SS[.fff][+zz:zz]`
/// form many table backends emit. Offset-less values are taken as UTC.
pub(super) fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const T0: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

    #[test]
    fn parses_common_timestamp_shapes() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(T0));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.250Z"), Some(T0 + 250));
        assert_eq!(parse_timestamp("2024-01-01T08:00:00+08:00"), Some(T0));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00+00:00"), Some(T0));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(T0));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn format_then_parse_keeps_milliseconds() {
        let formatted = format_timestamp(T0 + 123);
        assert_eq!(formatted, "2024-01-01T00:00:00.123Z");
        assert_eq!(parse_timestamp(&formatted), Some(T0 + 123));
    }

    #[test]
    fn maps_table_columns_to_record_fields() {
        let wire: WireRecord = serde_json::from_value(json!({
            "Id": 12,
            "Title": "Flow",
            "MermaidCode": "graph TD",
            "CreatedAt": "2024-01-01T00:00:00Z",
            "UpdatedAt": "2024-01-01T00:00:01Z"
        }))
        .unwrap();

        let record = wire.into_record().unwrap();
        assert_eq!(record.id, DiagramId::canonical("12"));
        assert_eq!(record.title, "Flow");
        assert_eq!(record.content, "graph TD");
        assert_eq!(record.created_at, T0);
        assert_eq!(record.updated_at, T0 + 1_000);
        assert!(!record.dirty);
    }

    #[test]
    fn accepts_camel_case_aliases() {
        let wire: WireRecord = serde_json::from_value(json!({
            "id": "abc",
            "title": "Seq",
            "mermaidCode": "sequenceDiagram",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let record = wire.into_record().unwrap();
        assert_eq!(record.id.as_str(), "abc");
        assert_eq!(record.content, "sequenceDiagram");
    }

    #[test]
    fn missing_updated_at_falls_back_to_created_at() {
        let wire: WireRecord = serde_json::from_value(json!({
            "Id": 1,
            "CreatedAt": "2024-01-01T00:00:00Z",
            "UpdatedAt": null
        }))
        .unwrap();

        let record = wire.into_record().unwrap();
        assert_eq!(record.updated_at, record.created_at);
        assert_eq!(record.title, DEFAULT_TITLE);
    }

    #[test]
    fn missing_id_is_invalid_payload() {
        let wire: WireRecord = serde_json::from_value(json!({ "Title": "x" })).unwrap();
        assert!(matches!(
            wire.into_record(),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn garbage_timestamp_is_invalid_payload() {
        let wire: WireRecord =
            serde_json::from_value(json!({ "Id": 1, "UpdatedAt": "soon" })).unwrap();
        assert!(matches!(
            wire.into_record(),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn write_body_uses_table_column_names() {
        let record = DiagramRecord {
            id: DiagramId::canonical("3"),
            title: "Flow".to_string(),
            content: "graph TD".to_string(),
            created_at: T0,
            updated_at: T0 + 5,
            dirty: true,
            retry_count: 1,
        };

        let body = serde_json::to_value(WireWrite::from(&record)).unwrap();
        assert_eq!(
            body,
            json!({
                "Title": "Flow",
                "MermaidCode": "graph TD",
                "CreatedAt": "2024-01-01T00:00:00.000Z",
                "UpdatedAt": "2024-01-01T00:00:00.005Z"
            })
        );
    }

    #[test]
    fn created_id_accepts_several_shapes() {
        assert_eq!(created_id(&json!({ "Id": 7 })).as_deref(), Some("7"));
        assert_eq!(created_id(&json!([{ "id": "x1" }])).as_deref(), Some("x1"));
        assert_eq!(created_id(&json!({ "ok": true })), None);
    }

    #[test]
    fn list_payload_accepts_page_or_bare_array() {
        let page: WireList = serde_json::from_value(json!({
            "list": [{ "Id": 1 }],
            "pageInfo": { "isLastPage": true }
        }))
        .unwrap();
        assert!(matches!(
            page,
            WireList::Page { ref list, page_info: Some(WirePageInfo { is_last_page: Some(true) }) } if list.len() == 1
        ));

        let bare: WireList = serde_json::from_value(json!([{ "Id": 1 }, { "Id": 2 }])).unwrap();
        assert!(matches!(bare, WireList::Bare(ref list) if list.len() == 2));
    }
}
