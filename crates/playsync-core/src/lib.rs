//! playsync-core - Core library for playsync
//!
//! Mapping-driven reconciliation of a local game inventory against a Notion
//! database: field mapping, value normalization, property transcoding, diffing
//! and the sync engine, plus the inventory sources and remote store clients
//! the CLI wires together.

pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod mapping;
pub mod models;
pub mod normalize;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use mapping::FieldMapping;
pub use models::{LocalRecord, SyncOutcome, SyncSummary};
pub use sync::{CancellationFlag, SyncEngine, SyncOptions};
