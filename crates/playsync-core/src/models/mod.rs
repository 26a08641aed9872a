//! Data models for playsync

mod entity;
mod outcome;
mod record;

pub use entity::{CoverImage, PropertyBag, RemoteEntity};
pub use outcome::{RecordReport, SyncOutcome, SyncSummary};
pub use record::{FieldValue, LocalRecord};
