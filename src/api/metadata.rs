//! Purpose: HTTP client for the metadata service's record endpoints.
//! Exports: `MetadataClient`, `DEFAULT_FETCH_PAGE_SIZE`.
//! Role: Translate the `MetadataStore` contract onto `/records` REST calls.
//! Invariants: Pages are requested via `page_number`/`offset` query params.
//! Invariants: Page responses arrive wrapped in an `items` envelope.

use super::backend::MetadataStore;
use super::http::HttpClient;
use crate::core::error::Error;
use crate::core::record::{Draft, Record};
use serde::Deserialize;

pub const DEFAULT_FETCH_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct MetadataClient {
    http: HttpClient,
    page_size: u32,
}

#[derive(Deserialize)]
struct ItemsEnvelope {
    items: Vec<Record>,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
            page_size: DEFAULT_FETCH_PAGE_SIZE,
        })
    }

    pub fn from_http(http: HttpClient) -> Self {
        Self {
            http,
            page_size: DEFAULT_FETCH_PAGE_SIZE,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.http = self.http.with_token(token);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl MetadataStore for MetadataClient {
    fn create(&self, draft: &Draft) -> Result<Record, Error> {
        let url = self.http.url(&["records"], &[])?;
        self.http.send_json("POST", &url, draft)
    }

    fn update(&self, id: &str, record: &Record) -> Result<(), Error> {
        let url = self.http.url(&["records", id], &[])?;
        self.http
            .send_ok("PATCH", &url, Some(record))
            .map_err(|err| err.with_id(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        let url = self.http.url(&["records", id], &[])?;
        self.http
            .send_ok::<()>("DELETE", &url, None)
            .map_err(|err| err.with_id(id.to_string()))
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<Record>, Error> {
        let url = self.http.url(
            &["records"],
            &[
                ("page_number", page.to_string()),
                ("offset", self.page_size.to_string()),
            ],
        )?;
        let envelope: ItemsEnvelope = self.http.get_json(&url)?;
        Ok(envelope.items)
    }
}
