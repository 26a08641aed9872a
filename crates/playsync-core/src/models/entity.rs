//! Remote entity model

use serde::{Deserialize, Serialize};

/// Raw property bag keyed by remote field name, in the store's wire format.
pub type PropertyBag = serde_json::Map<String, serde_json::Value>;

/// A page in the remote store as returned by lookup, create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    /// Store-assigned identifier
    pub id: String,
    /// Property values exactly as the store reported them
    #[serde(default)]
    pub properties: PropertyBag,
    /// Display image, held outside the property bag
    #[serde(default)]
    pub cover: Option<CoverImage>,
}

/// Cover-image reference of a remote entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverImage {
    /// URL of an externally hosted image
    pub external_url: Option<String>,
    /// URL of an image file uploaded to the store
    pub file_url: Option<String>,
}

impl CoverImage {
    pub fn external(url: impl Into<String>) -> Self {
        Self {
            external_url: Some(url.into()),
            file_url: None,
        }
    }

    /// Effective URL: external first, then stored file, else empty.
    pub fn url(&self) -> &str {
        self.external_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.file_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
            })
            .unwrap_or("")
    }
}
