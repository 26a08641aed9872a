//! Declarative field mapping from local record fields to remote properties.
//!
//! A mapping file is a JSON object kept in file order:
//!
//! ```json
//! {
//!   "Game Name":      { "notion_field": "Name",     "type": "title" },
//!   "Playtime Hours": { "notion_field": "Playtime", "type": "number" },
//!   "Achievements":   { "notion_field": "Progress", "type": "rich_text",
//!                       "format": "{Achievements Unlocked}/{Achievements Total}" }
//! }
//! ```

mod template;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::COVER_KEY;
use crate::models::{FieldValue, LocalRecord};
use crate::{Error, Result};

pub use template::FormatTemplate;

/// Structural kind of a property in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Title,
    Number,
    Date,
    Url,
    #[serde(alias = "rich_text")]
    Text,
}

impl WireType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Number => "number",
            Self::Date => "date",
            Self::Url => "url",
            Self::Text => "rich_text",
        }
    }

    /// Value used when the mapped local field is absent from a record.
    pub fn zero_value(self) -> FieldValue {
        match self {
            Self::Number => FieldValue::from(0_i64),
            Self::Date => FieldValue::Null,
            Self::Title | Self::Url | Self::Text => FieldValue::Text(String::new()),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub local_field: String,
    pub remote_field: String,
    pub wire_type: WireType,
    /// Takes precedence over reading `local_field` when set
    pub format: Option<FormatTemplate>,
}

impl MappingEntry {
    pub fn new(
        local_field: impl Into<String>,
        remote_field: impl Into<String>,
        wire_type: WireType,
    ) -> Self {
        Self {
            local_field: local_field.into(),
            remote_field: remote_field.into(),
            wire_type,
            format: None,
        }
    }

    pub fn with_format(mut self, template: &str) -> Result<Self> {
        self.format = Some(FormatTemplate::parse(template)?);
        Ok(self)
    }

    /// Raw value for this entry from `record`, before any normalization.
    pub fn raw_value(&self, record: &LocalRecord) -> Result<FieldValue> {
        if let Some(template) = &self.format {
            return template.expand(record).map(FieldValue::Text);
        }
        Ok(record
            .get(&self.local_field)
            .cloned()
            .unwrap_or_else(|| self.wire_type.zero_value()))
    }
}

/// A mapping entry paired with the raw value it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField<'a> {
    pub entry: &'a MappingEntry,
    pub value: FieldValue,
}

impl ResolvedField<'_> {
    pub fn remote_field(&self) -> &str {
        &self.entry.remote_field
    }

    pub fn local_field(&self) -> &str {
        &self.entry.local_field
    }

    pub const fn wire_type(&self) -> WireType {
        self.entry.wire_type
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingFileEntry {
    notion_field: String,
    #[serde(rename = "type")]
    wire_type: WireType,
    #[serde(default)]
    format: Option<String>,
}

/// Validated, read-only mapping table. Holds exactly one title entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
    title_index: usize,
}

impl FieldMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self> {
        let mut local_fields = HashSet::new();
        let mut remote_fields = HashSet::new();
        for entry in &entries {
            if entry.local_field.trim().is_empty() || entry.remote_field.trim().is_empty() {
                return Err(Error::Mapping(
                    "field names must not be empty".to_string(),
                ));
            }
            if entry.local_field == COVER_KEY {
                return Err(Error::Mapping(format!(
                    "local field '{COVER_KEY}' is reserved for the cover image"
                )));
            }
            if !local_fields.insert(entry.local_field.as_str()) {
                return Err(Error::Mapping(format!(
                    "local field '{}' is mapped more than once",
                    entry.local_field
                )));
            }
            if !remote_fields.insert(entry.remote_field.as_str()) {
                return Err(Error::Mapping(format!(
                    "remote field '{}' is targeted more than once",
                    entry.remote_field
                )));
            }
        }

        let titles = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.wire_type == WireType::Title)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        let title_index = match titles.as_slice() {
            [index] => *index,
            [] => {
                return Err(Error::Mapping(
                    "no entry has type 'title'; exactly one is required".to_string(),
                ))
            }
            _ => {
                return Err(Error::Mapping(format!(
                    "{} entries have type 'title'; exactly one is required",
                    titles.len()
                )))
            }
        };

        Ok(Self {
            entries,
            title_index,
        })
    }

    /// Parse a mapping definition, keeping entries in document order.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
            .map_err(|error| Error::Mapping(format!("mapping is not a JSON object: {error}")))?;

        let mut entries = Vec::with_capacity(document.len());
        for (local_field, value) in document {
            let file_entry = serde_json::from_value::<MappingFileEntry>(value).map_err(|error| {
                Error::Mapping(format!("entry '{local_field}': {error}"))
            })?;
            let mut entry =
                MappingEntry::new(local_field, file_entry.notion_field, file_entry.wire_type);
            if let Some(template) = file_entry.format {
                entry = entry.with_format(&template)?;
            }
            entries.push(entry);
        }

        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "failed to read mapping file {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// The single identity entry.
    pub fn title(&self) -> &MappingEntry {
        &self.entries[self.title_index]
    }

    pub fn entry_for_local(&self, local_field: &str) -> Option<&MappingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.local_field == local_field)
    }

    /// Wire type used to compare `local_field`; unmapped keys compare as text.
    pub fn wire_type_of(&self, local_field: &str) -> WireType {
        self.entry_for_local(local_field)
            .map_or(WireType::Text, |entry| entry.wire_type)
    }

    /// Resolve every entry against `record`, in mapping order.
    pub fn resolve<'a>(&'a self, record: &LocalRecord) -> Result<Vec<ResolvedField<'a>>> {
        self.entries
            .iter()
            .map(|entry| {
                Ok(ResolvedField {
                    entry,
                    value: entry.raw_value(record)?,
                })
            })
            .collect()
    }

    /// Trimmed identity value of `record`; empty means "not syncable".
    pub fn record_name(&self, record: &LocalRecord) -> Result<String> {
        Ok(self.title().raw_value(record)?.to_text().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAPPING: &str = r#"
    {
      "Game Name": { "notion_field": "名称", "type": "title" },
      "Playtime Hours": { "notion_field": "游玩时长", "type": "number" },
      "Last Played": { "notion_field": "上一次游玩时间", "type": "date" },
      "Banner": { "notion_field": "Banner", "type": "url" },
      "成就数": {
        "notion_field": "成就数",
        "type": "rich_text",
        "format": "{Achievements Unlocked}/{Achievements Total}"
      }
    }
    "#;

    #[test]
    fn parses_entries_in_file_order() {
        let mapping = FieldMapping::from_json_str(MAPPING).unwrap();
        let locals = mapping
            .entries()
            .iter()
            .map(|entry| entry.local_field.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            locals,
            vec!["Game Name", "Playtime Hours", "Last Played", "Banner", "成就数"]
        );
        assert_eq!(mapping.title().remote_field, "名称");
        assert_eq!(mapping.wire_type_of("成就数"), WireType::Text);
        assert_eq!(mapping.wire_type_of("cover"), WireType::Text);
        assert_eq!(mapping.wire_type_of("Last Played"), WireType::Date);
    }

    #[test]
    fn missing_title_is_fatal() {
        let err = FieldMapping::from_json_str(
            r#"{ "Banner": { "notion_field": "Banner", "type": "url" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Mapping(message) if message.contains("title")));
    }

    #[test]
    fn two_titles_are_fatal() {
        let result = FieldMapping::new(vec![
            MappingEntry::new("a", "A", WireType::Title),
            MappingEntry::new("b", "B", WireType::Title),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_wire_type_is_fatal() {
        let err = FieldMapping::from_json_str(
            r#"{ "Game Name": { "notion_field": "Name", "type": "select" } }"#,
        )
        .unwrap_err();
        match err {
            Error::Mapping(message) => {
                assert!(message.contains("Game Name"));
                assert!(message.contains("select"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_entry_keys_are_fatal() {
        let result = FieldMapping::from_json_str(
            r#"{ "Game Name": { "notion_field": "Name", "type": "title", "fmt": "x" } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_remote_targets_are_fatal() {
        let result = FieldMapping::new(vec![
            MappingEntry::new("Game Name", "Name", WireType::Title),
            MappingEntry::new("Alias", "Name", WireType::Text),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cover_local_field_is_reserved() {
        let err = FieldMapping::from_json_str(
            r#"{
                "Game Name": { "notion_field": "Name", "type": "title" },
                "cover": { "notion_field": "Cover Note", "type": "rich_text" }
            }"#,
        )
        .unwrap_err();
        match err {
            Error::Mapping(message) => assert!(message.contains("reserved"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }

        // Only the exact synthetic key collides.
        assert!(FieldMapping::new(vec![
            MappingEntry::new("Game Name", "Name", WireType::Title),
            MappingEntry::new("Cover", "Cover Note", WireType::Text),
        ])
        .is_ok());
    }

    #[test]
    fn resolve_uses_templates_and_zero_values() {
        let mapping = FieldMapping::from_json_str(MAPPING).unwrap();
        let record = LocalRecord::new()
            .with("Game Name", "Portal 2")
            .with("Achievements Unlocked", 51_u64)
            .with("Achievements Total", 51_u64);

        let resolved = mapping.resolve(&record).unwrap();
        let values = resolved
            .iter()
            .map(|field| (field.remote_field(), field.value.clone()))
            .collect::<Vec<_>>();

        assert_eq!(
            values,
            vec![
                ("名称", FieldValue::from("Portal 2")),
                ("游玩时长", FieldValue::from(0_i64)),
                ("上一次游玩时间", FieldValue::Null),
                ("Banner", FieldValue::from("")),
                ("成就数", FieldValue::from("51/51")),
            ]
        );
    }

    #[test]
    fn resolve_fails_when_template_field_is_absent() {
        let mapping = FieldMapping::from_json_str(MAPPING).unwrap();
        let record = LocalRecord::new().with("Game Name", "Portal 2");
        let err = mapping.resolve(&record).unwrap_err();
        assert!(matches!(err, Error::MissingTemplateField { .. }));
    }

    #[test]
    fn record_name_is_trimmed() {
        let mapping = FieldMapping::from_json_str(MAPPING).unwrap();
        let record = LocalRecord::new().with("Game Name", "  Hades  ");
        assert_eq!(mapping.record_name(&record).unwrap(), "Hades");
        assert_eq!(mapping.record_name(&LocalRecord::new()).unwrap(), "");
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FieldMapping::load(&dir.path().join("mapping.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
