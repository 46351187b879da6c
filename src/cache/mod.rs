//! Durable cache for dataset views.
//!
//! One entry per dataset key, holding the last good payload and when it was
//! written. Entries are overwritten wholesale, never merged:
//! - written on every successful refresh and every optimistic edit
//! - read to paint a page before the network answers
//! - considered fresh for `VALIDITY_WINDOW` after the write

mod entry;
mod storage;
mod traits;

pub use entry::{CacheEntry, Dataset, Payload, VALIDITY_WINDOW};
pub use storage::{MemoryStore, NoopStore, SqliteStore};
pub use traits::{CacheSource, CacheStore};
