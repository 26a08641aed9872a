//! Bidirectional transcoding between local records and remote properties.
//!
//! `encode` produces the wire payload for create/update calls. `decode` turns
//! a remote entity back into a map keyed by local field names so it can be
//! compared with [`candidate`] by the diff engine.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::mapping::{FieldMapping, WireType};
use crate::models::{FieldValue, LocalRecord, RemoteEntity};
use crate::normalize::is_blank;
use crate::{Error, Result};

/// Synthetic key carrying the cover-image URL in decoded and candidate maps.
pub const COVER_KEY: &str = "cover";

/// Maximum characters per rich-text run accepted by the remote API.
const RICH_TEXT_CHUNK_CHARS: usize = 2000;

/// Property values keyed by local field name.
pub type PropertyMap = BTreeMap<String, FieldValue>;

/// Encoded properties keyed by remote field name.
pub type PropertySet = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RichText {
    pub text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateValue {
    pub start: String,
}

/// One property in the remote store's request format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Title(Vec<RichText>),
    Number(Option<serde_json::Number>),
    Date(Option<DateValue>),
    Url(Option<String>),
    RichText(Vec<RichText>),
}

/// What to do with a mapped date field that has no local value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyDatePolicy {
    /// Leave the remote date alone and ignore it when diffing
    #[default]
    Preserve,
    /// Send an explicit null date and compare the empty value
    Clear,
}

impl FromStr for EmptyDatePolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "clear" => Ok(Self::Clear),
            other => Err(Error::Config(format!(
                "unknown empty-date policy '{other}' (expected 'preserve' or 'clear')"
            ))),
        }
    }
}

fn rich_text(content: &str) -> Vec<RichText> {
    if content.is_empty() {
        return Vec::new();
    }
    let chars = content.chars().collect::<Vec<_>>();
    chars
        .chunks(RICH_TEXT_CHUNK_CHARS)
        .map(|chunk| RichText {
            text: TextContent {
                content: chunk.iter().collect(),
            },
        })
        .collect()
}

fn encode_number(field: &str, raw: &FieldValue) -> Result<Option<serde_json::Number>> {
    match raw {
        FieldValue::Number(number) => Ok(Some(number.clone())),
        value if is_blank(value) => Ok(None),
        FieldValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Some)
            .ok_or_else(|| Error::InvalidValue {
                field: field.to_string(),
                message: format!("'{}' is not a number", text.trim()),
            }),
        other => Err(Error::InvalidValue {
            field: field.to_string(),
            message: format!("{other:?} is not a number"),
        }),
    }
}

/// Build the remote property payload for `record`.
pub fn encode(
    record: &LocalRecord,
    mapping: &FieldMapping,
    date_policy: EmptyDatePolicy,
) -> Result<PropertySet> {
    let mut properties = PropertySet::new();

    for field in mapping.resolve(record)? {
        let raw = &field.value;
        let value = match field.wire_type() {
            WireType::Title => PropertyValue::Title(rich_text(raw.to_text().trim())),
            WireType::Number => PropertyValue::Number(encode_number(field.local_field(), raw)?),
            WireType::Date => {
                if is_blank(raw) {
                    match date_policy {
                        EmptyDatePolicy::Preserve => continue,
                        EmptyDatePolicy::Clear => PropertyValue::Date(None),
                    }
                } else {
                    PropertyValue::Date(Some(DateValue {
                        start: raw.to_text().trim().to_string(),
                    }))
                }
            }
            WireType::Url => {
                PropertyValue::Url((!is_blank(raw)).then(|| raw.to_text().trim().to_string()))
            }
            WireType::Text => PropertyValue::RichText(rich_text(&raw.to_text())),
        };
        properties.insert(field.remote_field().to_string(), value);
    }

    Ok(properties)
}

/// Local-side view of `record` in the same shape `decode` produces.
///
/// Includes the synthetic [`COVER_KEY`] taken from `cover_field`.
pub fn candidate(
    record: &LocalRecord,
    mapping: &FieldMapping,
    cover_field: &str,
    date_policy: EmptyDatePolicy,
) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();
    for field in mapping.resolve(record)? {
        if field.wire_type() == WireType::Date
            && date_policy == EmptyDatePolicy::Preserve
            && is_blank(&field.value)
        {
            continue;
        }
        map.insert(field.local_field().to_string(), field.value);
    }
    map.insert(
        COVER_KEY.to_string(),
        FieldValue::Text(cover_reference(record, cover_field).unwrap_or_default()),
    );
    Ok(map)
}

/// Trimmed cover-image URL of `record`, if it has one.
pub fn cover_reference(record: &LocalRecord, cover_field: &str) -> Option<String> {
    record
        .get(cover_field)
        .filter(|value| !is_blank(value))
        .map(|value| value.to_text().trim().to_string())
}

fn plain_text(runs: Option<&Value>) -> String {
    runs.and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|run| {
                    run.get("plain_text")
                        .or_else(|| run.pointer("/text/content"))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn decode_property(property: &Value, wire_type: WireType) -> FieldValue {
    match wire_type {
        WireType::Title => FieldValue::Text(plain_text(property.get("title"))),
        WireType::Text => FieldValue::Text(plain_text(property.get("rich_text"))),
        WireType::Number => match property.get("number") {
            Some(Value::Number(number)) => FieldValue::Number(number.clone()),
            _ => FieldValue::Null,
        },
        WireType::Date => property
            .pointer("/date/start")
            .and_then(Value::as_str)
            .map_or(FieldValue::Null, FieldValue::from),
        WireType::Url => property
            .get("url")
            .and_then(Value::as_str)
            .map_or(FieldValue::Null, |url| FieldValue::from(url.trim())),
    }
}

/// Read `entity` back into local field names.
///
/// Remote fields missing from the property bag are left out of the result.
pub fn decode(entity: &RemoteEntity, mapping: &FieldMapping) -> PropertyMap {
    let mut map = PropertyMap::new();
    for entry in mapping.entries() {
        if let Some(property) = entity.properties.get(&entry.remote_field) {
            map.insert(
                entry.local_field.clone(),
                decode_property(property, entry.wire_type),
            );
        }
    }
    let cover = entity
        .cover
        .as_ref()
        .map(|cover| cover.url().to_string())
        .unwrap_or_default();
    map.insert(COVER_KEY.to_string(), FieldValue::Text(cover));
    map
}

/// Plain title text of a remote property, used for matching by name.
pub fn title_text(property: &Value) -> String {
    plain_text(property.get("title"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingEntry;
    use crate::models::CoverImage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mapping() -> FieldMapping {
        FieldMapping::new(vec![
            MappingEntry::new("Game Name", "Name", WireType::Title),
            MappingEntry::new("Playtime Hours", "Playtime", WireType::Number),
            MappingEntry::new("Last Played", "Last Played", WireType::Date),
            MappingEntry::new("Banner", "Banner", WireType::Url),
            MappingEntry::new("Progress", "Achievements", WireType::Text)
                .with_format("{Achievements Unlocked}/{Achievements Total}")
                .unwrap(),
        ])
        .unwrap()
    }

    fn record() -> LocalRecord {
        LocalRecord::new()
            .with("Game Name", "Portal 2")
            .with("Playtime Hours", 21.3)
            .with("Last Played", "2024-01-01T10:00:00")
            .with("Banner", "https://cdn.example.com/620/header.jpg")
            .with("Achievements Unlocked", 51_u64)
            .with("Achievements Total", 51_u64)
    }

    #[test]
    fn encode_builds_wire_payload() {
        let properties = encode(&record(), &mapping(), EmptyDatePolicy::Preserve).unwrap();
        let payload = serde_json::to_value(&properties).unwrap();

        assert_eq!(
            payload,
            json!({
                "Name": { "title": [{ "text": { "content": "Portal 2" } }] },
                "Playtime": { "number": 21.3 },
                "Last Played": { "date": { "start": "2024-01-01T10:00:00" } },
                "Banner": { "url": "https://cdn.example.com/620/header.jpg" },
                "Achievements": { "rich_text": [{ "text": { "content": "51/51" } }] }
            })
        );
    }

    #[test]
    fn encode_omits_empty_date_when_preserving() {
        let record = record().with("Last Played", FieldValue::Null);
        let properties = encode(&record, &mapping(), EmptyDatePolicy::Preserve).unwrap();
        assert!(!properties.contains_key("Last Played"));
    }

    #[test]
    fn encode_sends_null_date_when_clearing() {
        let record = record().with("Last Played", "none");
        let properties = encode(&record, &mapping(), EmptyDatePolicy::Clear).unwrap();
        assert_eq!(properties.get("Last Played"), Some(&PropertyValue::Date(None)));
        let payload = serde_json::to_value(&properties).unwrap();
        assert_eq!(payload["Last Played"], json!({ "date": null }));
    }

    #[test]
    fn encode_parses_numeric_text_and_rejects_garbage() {
        let properties = encode(
            &record().with("Playtime Hours", "4.5"),
            &mapping(),
            EmptyDatePolicy::Preserve,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&properties).unwrap()["Playtime"],
            json!({ "number": 4.5 })
        );

        let err = encode(
            &record().with("Playtime Hours", "lots"),
            &mapping(),
            EmptyDatePolicy::Preserve,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { field, .. } if field == "Playtime Hours"));
    }

    #[test]
    fn encode_uses_zero_values_for_missing_fields() {
        let record = LocalRecord::new()
            .with("Game Name", "Celeste")
            .with("Achievements Unlocked", FieldValue::Null)
            .with("Achievements Total", FieldValue::Null);
        let payload =
            serde_json::to_value(encode(&record, &mapping(), EmptyDatePolicy::Preserve).unwrap())
                .unwrap();

        assert_eq!(payload["Playtime"], json!({ "number": 0 }));
        assert_eq!(payload["Banner"], json!({ "url": null }));
        assert!(payload.get("Last Played").is_none());
    }

    #[test]
    fn long_text_is_split_into_runs() {
        let runs = rich_text(&"a".repeat(RICH_TEXT_CHUNK_CHARS + 5));
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].text.content, "aaaaa");
    }

    #[test]
    fn decode_reads_notion_page_properties() {
        let entity = RemoteEntity {
            id: "page-1".to_string(),
            properties: json!({
                "Name": { "id": "title", "type": "title", "title": [
                    { "type": "text", "text": { "content": "Portal " }, "plain_text": "Portal " },
                    { "type": "text", "text": { "content": "2" }, "plain_text": "2" }
                ]},
                "Playtime": { "id": "a", "type": "number", "number": 21.3 },
                "Last Played": { "id": "b", "type": "date", "date": { "start": "2024-01-01T10:00:00.000+00:00", "end": null } },
                "Banner": { "id": "c", "type": "url", "url": null },
                "Unmapped": { "id": "d", "type": "checkbox", "checkbox": true }
            })
            .as_object()
            .cloned()
            .unwrap(),
            cover: Some(CoverImage {
                external_url: None,
                file_url: Some("https://files.example.com/x.png".to_string()),
            }),
        };

        let decoded = decode(&entity, &mapping());
        let expected = PropertyMap::from([
            ("Game Name".to_string(), FieldValue::from("Portal 2")),
            ("Playtime Hours".to_string(), FieldValue::from(21.3)),
            (
                "Last Played".to_string(),
                FieldValue::from("2024-01-01T10:00:00.000+00:00"),
            ),
            ("Banner".to_string(), FieldValue::Null),
            (
                COVER_KEY.to_string(),
                FieldValue::from("https://files.example.com/x.png"),
            ),
        ]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn decode_without_cover_yields_empty_cover() {
        let entity = RemoteEntity {
            id: "page-2".to_string(),
            properties: serde_json::Map::new(),
            cover: None,
        };
        let decoded = decode(&entity, &mapping());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get(COVER_KEY), Some(&FieldValue::from("")));
    }

    #[test]
    fn candidate_includes_cover_and_respects_date_policy() {
        let record = record().with("Last Played", FieldValue::Null);

        let preserved = candidate(&record, &mapping(), "Banner", EmptyDatePolicy::Preserve).unwrap();
        assert!(!preserved.contains_key("Last Played"));
        assert_eq!(
            preserved.get(COVER_KEY),
            Some(&FieldValue::from("https://cdn.example.com/620/header.jpg"))
        );
        assert_eq!(preserved.get("Progress"), Some(&FieldValue::from("51/51")));

        let cleared = candidate(&record, &mapping(), "Banner", EmptyDatePolicy::Clear).unwrap();
        assert_eq!(cleared.get("Last Played"), Some(&FieldValue::Null));
    }

    #[test]
    fn empty_date_policy_parses() {
        assert_eq!("Clear".parse::<EmptyDatePolicy>().unwrap(), EmptyDatePolicy::Clear);
        assert_eq!(
            " preserve ".parse::<EmptyDatePolicy>().unwrap(),
            EmptyDatePolicy::Preserve
        );
        assert!("drop".parse::<EmptyDatePolicy>().is_err());
    }
}
