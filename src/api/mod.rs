//! Purpose: Define the stable public Rust API boundary for Leafsync.
//! Exports: Record model, store, views, clients, coordinator, and facade.
//! Role: Public, additive-only surface over the `core` building blocks.
//! Invariants: Everything a caller needs is re-exported from here.

mod backend;
mod coordinator;
mod facade;
mod fetch;
mod http;
mod metadata;
mod mirror;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::record::{Draft, Record, now_rfc3339, text_of_html};
pub use crate::core::retry::RetryPolicy;
pub use crate::core::store::RecordStore;
pub use crate::core::view::{PAGE_SIZE, PageView, page_view};
pub use backend::{MetadataStore, MirrorStore};
pub use coordinator::DualWriter;
pub use facade::{Dashboard, NOTICE_TTL, OpKind, PendingOp};
pub use fetch::{FetchOptions, fetch_all, fetch_all_with_sleep};
pub use http::HttpClient;
pub use metadata::{DEFAULT_FETCH_PAGE_SIZE, MetadataClient};
pub use mirror::MirrorClient;
