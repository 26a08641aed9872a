//! Notion REST API client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::codec::PropertySet;
use crate::config::NotionConfig;
use crate::models::{CoverImage, PropertyBag, RemoteEntity};
use crate::remote::RemoteStore;
use crate::util::compact_text;
use crate::{Error, Result};

const QUERY_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct NotionClient {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| Error::Config("NOTION_TOKEN contains invalid characters".to_string()))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&config.version).map_err(|_| {
                Error::Config("NOTION_VERSION contains invalid characters".to_string())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::api(status.as_u16(), parse_api_error(status, &body)))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| {
            Error::Decode(format!("{error}; body: {}", compact_text(&body)))
        })
    }

    async fn query_page(
        &self,
        collection_id: &str,
        title_field: &str,
        name: &str,
        cursor: Option<&str>,
    ) -> Result<QueryResponse> {
        let mut body = json!({
            "filter": {
                "property": title_field,
                "title": { "equals": name }
            },
            "page_size": QUERY_PAGE_SIZE,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        let request = self
            .client
            .post(self.url(&format!("databases/{collection_id}/query")))
            .json(&body);
        Self::read_json(self.send(request).await?).await
    }
}

#[async_trait]
impl RemoteStore for NotionClient {
    async fn resolve_collection_id(&self, database_id: &str) -> Result<String> {
        let request = self.client.get(self.url(&format!("databases/{database_id}")));
        let database: DatabaseObject = Self::read_json(self.send(request).await?).await?;
        tracing::debug!(database_id, collection_id = %database.id, "Resolved database");
        Ok(database.id)
    }

    async fn lookup(
        &self,
        collection_id: &str,
        title_field: &str,
        name: &str,
    ) -> Result<Vec<RemoteEntity>> {
        let mut entities = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .query_page(collection_id, title_field, name, cursor.as_deref())
                .await?;
            entities.extend(page.results.into_iter().map(RemoteEntity::from));
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(entities)
    }

    async fn create(
        &self,
        collection_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity> {
        let body = CreatePageRequest {
            parent: DatabaseParent {
                database_id: collection_id,
            },
            properties,
            cover: cover.map(ExternalCover::new),
        };
        let request = self.client.post(self.url("pages")).json(&body);
        let page: PageObject = Self::read_json(self.send(request).await?).await?;
        Ok(page.into())
    }

    async fn update(
        &self,
        entity_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity> {
        let body = UpdatePageRequest {
            properties,
            cover: cover.map(ExternalCover::new),
        };
        let request = self
            .client
            .patch(self.url(&format!("pages/{entity_id}")))
            .json(&body);
        let page: PageObject = Self::read_json(self.send(request).await?).await?;
        Ok(page.into())
    }
}

#[derive(Debug, Serialize)]
struct DatabaseParent<'a> {
    database_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ExternalCover<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    external: UrlRef<'a>,
}

impl<'a> ExternalCover<'a> {
    const fn new(url: &'a str) -> Self {
        Self {
            kind: "external",
            external: UrlRef { url },
        }
    }
}

#[derive(Debug, Serialize)]
struct UrlRef<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePageRequest<'a> {
    parent: DatabaseParent<'a>,
    properties: &'a PropertySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<ExternalCover<'a>>,
}

/// `cover: null` removes the current cover.
#[derive(Debug, Serialize)]
struct UpdatePageRequest<'a> {
    properties: &'a PropertySet,
    cover: Option<ExternalCover<'a>>,
}

#[derive(Debug, Deserialize)]
struct DatabaseObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<PageObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    #[serde(default)]
    properties: PropertyBag,
    #[serde(default)]
    cover: Option<FileObject>,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    #[serde(default)]
    external: Option<FileUrl>,
    #[serde(default)]
    file: Option<FileUrl>,
}

#[derive(Debug, Deserialize)]
struct FileUrl {
    url: String,
}

impl From<PageObject> for RemoteEntity {
    fn from(page: PageObject) -> Self {
        Self {
            id: page.id,
            properties: page.properties,
            cover: page.cover.map(|cover| CoverImage {
                external_url: cover.external.map(|external| external.url),
                file_url: cover.file.map(|file| file.url),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<NotionErrorBody>(body) {
        match (payload.code, payload.message) {
            (Some(code), Some(message)) => return format!("{code}: {}", message.trim()),
            (None, Some(message)) => return message.trim().to_string(),
            (Some(code), None) => return code,
            (None, None) => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(trimmed)
    }
}
