pub mod common;
pub mod completions;
pub mod fetch;
pub mod mapping;
pub mod sync;
