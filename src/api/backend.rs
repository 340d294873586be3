//! Purpose: Contracts for the two backing stores behind the write path.
//! Exports: `MetadataStore`, `MirrorStore`.
//! Role: Seam between coordination logic and transport; test doubles land here.
//! Invariants: The metadata service assigns identity; the mirror only follows.
//! Invariants: Implementations surface `RateLimited` only after retries run dry.

use crate::core::error::Error;
use crate::core::record::{Draft, Record};

/// System of record for descriptive fields and identity assignment.
pub trait MetadataStore {
    /// Create a record; the service assigns and returns the identity.
    fn create(&self, draft: &Draft) -> Result<Record, Error>;

    /// Full-record replacement keyed by id.
    fn update(&self, id: &str, record: &Record) -> Result<(), Error>;

    fn delete(&self, id: &str) -> Result<(), Error>;

    /// Fetch one fixed-size page, 1-based. An empty page marks the end.
    fn fetch_page(&self, page: u32) -> Result<Vec<Record>, Error>;
}

/// Secondary persistence mirroring records keyed by the metadata-service id.
pub trait MirrorStore {
    fn insert(&self, record: &Record) -> Result<(), Error>;

    fn update(&self, id: &str, record: &Record) -> Result<(), Error>;

    fn delete(&self, id: &str) -> Result<(), Error>;

    fn fetch_all(&self) -> Result<Vec<Record>, Error>;

    fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, Error>;
}
