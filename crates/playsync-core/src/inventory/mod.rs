//! Sources of local game records.

pub mod json_file;
pub mod steam;

use async_trait::async_trait;

use crate::models::LocalRecord;
use crate::Result;

pub use json_file::JsonFileInventory;
pub use steam::SteamClient;

/// Produces the local side of a sync run.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<LocalRecord>>;
}
