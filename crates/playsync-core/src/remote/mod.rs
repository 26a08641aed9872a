//! Remote structured-data store seam.

pub mod memory;
pub mod notion;

use async_trait::async_trait;

use crate::codec::PropertySet;
use crate::models::RemoteEntity;
use crate::Result;

pub use memory::InMemoryStore;
pub use notion::NotionClient;

/// Operations the sync engine needs from the remote store.
///
/// Implementations report connection-level failures as
/// [`crate::Error::Transport`] and non-2xx responses as [`crate::Error::Api`]
/// so the engine can tell retryable failures apart.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Map a configured database identifier to the collection used for
    /// queries and creates.
    async fn resolve_collection_id(&self, database_id: &str) -> Result<String>;

    /// Every entity whose title property equals `name` exactly, in store order.
    async fn lookup(
        &self,
        collection_id: &str,
        title_field: &str,
        name: &str,
    ) -> Result<Vec<RemoteEntity>>;

    /// Create an entity. A `None` cover leaves the new entity without one.
    async fn create(
        &self,
        collection_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity>;

    /// Replace the given properties of an entity and reset its cover.
    /// A `None` cover clears it.
    async fn update(
        &self,
        entity_id: &str,
        properties: &PropertySet,
        cover: Option<&str>,
    ) -> Result<RemoteEntity>;
}
