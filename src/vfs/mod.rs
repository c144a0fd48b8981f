//! In-memory document layer
//! - line_index.rs: position <-> byte offset translation
//! - store.rs: tracked documents and their mutations
//! - error.rs: store errors

pub mod error;
pub mod line_index;
pub mod store;

pub use error::StoreError;
pub use line_index::LineIndex;
pub use store::{DocumentChange, DocumentStore, TrackedDocument};
