//! Purpose: Orchestrate CRUD, search, and pagination over the record store.
//! Exports: `Dashboard`, `PendingOp`, `OpKind`, `NOTICE_TTL`.
//! Role: The only writer of the in-memory store; the rendering layer reads
//! snapshots and asks for mutations here.
//! Invariants: The store is mutated only after both backing writes succeed.
//! Invariants: Deletes are two-step; only a confirmed stage reaches the wire.

use super::backend::{MetadataStore, MirrorStore};
use super::coordinator::DualWriter;
use super::fetch::{FetchOptions, fetch_all_with_sleep};
use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Draft, Record};
use crate::core::store::RecordStore;
use crate::core::view::{PAGE_SIZE, PageView, page_view};
use std::time::{Duration, Instant};

/// How long a completed operation keeps its transient feedback visible.
pub const NOTICE_TTL: Duration = Duration::from_millis(3000);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

/// Transient feedback for the most recent completed operation.
#[derive(Clone, Debug)]
pub struct PendingOp {
    pub kind: OpKind,
    pub id: String,
    pub message: String,
    expires_at: Instant,
}

pub struct Dashboard<M, D> {
    writer: DualWriter<M, D>,
    store: RecordStore,
    query: String,
    page: usize,
    page_size: usize,
    staged_delete: Option<String>,
    notice: Option<PendingOp>,
    notice_ttl: Duration,
    fetch_options: FetchOptions,
}

impl<M: MetadataStore, D: MirrorStore> Dashboard<M, D> {
    pub fn new(metadata: M, mirror: D) -> Self {
        Self {
            writer: DualWriter::new(metadata, mirror),
            store: RecordStore::new(),
            query: String::new(),
            page: 1,
            page_size: PAGE_SIZE,
            staged_delete: None,
            notice: None,
            notice_ttl: NOTICE_TTL,
            fetch_options: FetchOptions::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn writer(&self) -> &DualWriter<M, D> {
        &self.writer
    }

    /// Load every page from the metadata service into the store.
    pub fn refresh(&mut self) -> Result<usize, Error> {
        let mut sleep = |delay: Duration| std::thread::sleep(delay);
        let records =
            fetch_all_with_sleep(self.writer.metadata(), self.fetch_options, &mut sleep)?;
        let count = records.len();
        self.store.replace_all(records);
        Ok(count)
    }

    pub fn search(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    pub fn go_to_page(&mut self, page: usize) {
        let total = page_view(self.store.all(), &self.query, 1, self.page_size).total_pages;
        self.page = page.clamp(1, total);
    }

    pub fn page(&self) -> PageView {
        page_view(self.store.all(), &self.query, self.page, self.page_size)
    }

    pub fn submit_create(&mut self, draft: Draft) -> Result<Record, Error> {
        let record = self.writer.create(&draft)?;
        self.store.insert_front(record.clone());
        self.set_notice(OpKind::Create, &record.id, "record created");
        Ok(record)
    }

    pub fn submit_update(&mut self, id: &str, draft: Draft) -> Result<Record, Error> {
        let current = self.store.get(id).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("no record with this id")
                .with_id(id.to_string())
        })?;
        let updated = current.apply_draft(draft);
        self.writer.update(id, &updated)?;
        self.store.replace_by_id(id, updated.clone());
        self.set_notice(OpKind::Update, id, "record updated");
        Ok(updated)
    }

    /// Stage a candidate; nothing is sent until `confirm_delete`.
    pub fn request_delete(&mut self, id: impl Into<String>) {
        self.staged_delete = Some(id.into());
    }

    pub fn staged_delete(&self) -> Option<&str> {
        self.staged_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.staged_delete = None;
    }

    /// Delete the staged candidate from both stores, then from memory. The
    /// stage survives a failed attempt so the caller can confirm again.
    pub fn confirm_delete(&mut self) -> Result<String, Error> {
        let id = self.staged_delete.clone().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("no delete is staged")
                .with_hint("Call request_delete first.")
        })?;
        self.writer.delete(&id)?;
        self.staged_delete = None;
        self.store.remove_by_id(&id);
        self.set_notice(OpKind::Delete, &id, "record deleted");
        Ok(id)
    }

    /// Transient feedback for the last operation; `None` once expired.
    pub fn notice(&self) -> Option<&PendingOp> {
        self.notice
            .as_ref()
            .filter(|op| Instant::now() < op.expires_at)
    }

    fn set_notice(&mut self, kind: OpKind, id: &str, message: &str) {
        self.notice = Some(PendingOp {
            kind,
            id: id.to_string(),
            message: message.to_string(),
            expires_at: Instant::now() + self.notice_ttl,
        });
    }
}
