//! Compare a decoded remote entity with a local candidate.

use crate::codec::PropertyMap;
use crate::mapping::FieldMapping;
use crate::models::FieldValue;
use crate::normalize::{normalize, NormalizedValue};

/// First difference found between existing and candidate values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub key: String,
    pub existing: NormalizedValue,
    pub candidate: NormalizedValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    Equal,
    Changed(Mismatch),
}

impl DiffResult {
    pub const fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }
}

/// Compare every key of `candidate` against `existing`.
///
/// Keys only present in `existing` are ignored. A key missing from `existing`
/// compares as empty. Stops at the first mismatch.
pub fn compare(existing: &PropertyMap, candidate: &PropertyMap, mapping: &FieldMapping) -> DiffResult {
    for (key, candidate_value) in candidate {
        let wire_type = mapping.wire_type_of(key);
        let existing_value = existing.get(key).unwrap_or(&FieldValue::Null);

        let existing_normalized = normalize(existing_value, wire_type);
        let candidate_normalized = normalize(candidate_value, wire_type);
        if existing_normalized != candidate_normalized {
            tracing::debug!(
                key = key.as_str(),
                existing = existing_normalized.as_str(),
                candidate = candidate_normalized.as_str(),
                "Property differs"
            );
            return DiffResult::Changed(Mismatch {
                key: key.clone(),
                existing: existing_normalized,
                candidate: candidate_normalized,
            });
        }
    }
    DiffResult::Equal
}

/// Convenience wrapper over [`compare`].
pub fn equal(existing: &PropertyMap, candidate: &PropertyMap, mapping: &FieldMapping) -> bool {
    compare(existing, candidate, mapping).is_equal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::COVER_KEY;
    use crate::mapping::{MappingEntry, WireType};
    use pretty_assertions::assert_eq;

    fn mapping() -> FieldMapping {
        FieldMapping::new(vec![
            MappingEntry::new("Game Name", "Name", WireType::Title),
            MappingEntry::new("Playtime Hours", "Playtime", WireType::Number),
            MappingEntry::new("Last Played", "Last Played", WireType::Date),
        ])
        .unwrap()
    }

    fn map(entries: &[(&str, FieldValue)]) -> PropertyMap {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn equal_after_normalization() {
        let existing = map(&[
            ("Game Name", "Portal 2 ".into()),
            ("Playtime Hours", 21.3.into()),
            ("Last Played", "2024-01-01T00:00:00.000Z".into()),
            (COVER_KEY, "https://a/b.jpg".into()),
        ]);
        let candidate = map(&[
            ("Game Name", "Portal 2".into()),
            ("Playtime Hours", "21.30".into()),
            ("Last Played", "2024-01-01T00:00:00Z".into()),
            (COVER_KEY, " https://a/b.jpg".into()),
        ]);
        assert!(equal(&existing, &candidate, &mapping()));
    }

    #[test]
    fn reports_first_mismatch_with_normalized_values() {
        let existing = map(&[
            ("Game Name", "Portal 2".into()),
            ("Last Played", "2024-01-01T00:00".into()),
        ]);
        let candidate = map(&[
            ("Game Name", "Portal 2".into()),
            ("Last Played", "2024-01-02T00:00".into()),
        ]);

        match compare(&existing, &candidate, &mapping()) {
            DiffResult::Changed(mismatch) => {
                assert_eq!(mismatch.key, "Last Played");
                assert_eq!(mismatch.existing.as_str(), "2024-01-01T00:00");
                assert_eq!(mismatch.candidate.as_str(), "2024-01-02T00:00");
            }
            DiffResult::Equal => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn keys_only_in_existing_are_ignored() {
        let existing = map(&[
            ("Game Name", "Hades".into()),
            ("Notes", "remote-only".into()),
        ]);
        let candidate = map(&[("Game Name", "Hades".into())]);
        assert!(equal(&existing, &candidate, &mapping()));
    }

    #[test]
    fn keys_missing_from_existing_compare_as_empty() {
        let existing = map(&[("Game Name", "Hades".into())]);
        assert!(equal(
            &existing,
            &map(&[("Game Name", "Hades".into()), (COVER_KEY, "".into())]),
            &mapping()
        ));
        assert!(!equal(
            &existing,
            &map(&[("Game Name", "Hades".into()), (COVER_KEY, "https://x".into())]),
            &mapping()
        ));
    }
}
