//! Purpose: Aggregate every page of records from the metadata service.
//! Exports: `FetchOptions`, `fetch_all`, `fetch_all_with_sleep`.
//! Role: The initial-load path feeding the in-memory record store.
//! Invariants: Exactly one empty page terminates the loop.
//! Invariants: A rate-limited page is retried at the same page number; the
//! retry contract lives in the HTTP layer, so pagination never skips.

use super::backend::MetadataStore;
use crate::core::error::Error;
use crate::core::record::Record;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct FetchOptions {
    /// Pause between page requests, respecting upstream rate limits.
    pub page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(1000),
        }
    }
}

pub fn fetch_all<M: MetadataStore>(
    metadata: &M,
    options: FetchOptions,
) -> Result<Vec<Record>, Error> {
    let mut sleep = |delay: Duration| std::thread::sleep(delay);
    fetch_all_with_sleep(metadata, options, &mut sleep)
}

pub fn fetch_all_with_sleep<M: MetadataStore>(
    metadata: &M,
    options: FetchOptions,
    sleep: &mut dyn FnMut(Duration),
) -> Result<Vec<Record>, Error> {
    let mut records = Vec::new();
    let mut page = 1u32;
    loop {
        let items = metadata.fetch_page(page)?;
        if items.is_empty() {
            break;
        }
        tracing::debug!(page, count = items.len(), "fetched page");
        records.extend(items);
        page += 1;
        sleep(options.page_delay);
    }
    tracing::debug!(total = records.len(), "fetch complete");
    Ok(records)
}
