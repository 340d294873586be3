//! Purpose: HTTP client for the document-store proxy routes.
//! Exports: `MirrorClient`.
//! Role: Translate the `MirrorStore` contract onto the `/api/*` proxy.
//! Invariants: Records are keyed by the metadata-service `id` string.
//! Invariants: Envelopes are `{"records": []}`, `{"record": {}}`, `{"ok": true}`.

use super::backend::MirrorStore;
use super::http::HttpClient;
use crate::core::error::{Error, ErrorKind};
use crate::core::record::Record;
use serde::Deserialize;

#[derive(Clone)]
pub struct MirrorClient {
    http: HttpClient,
}

#[derive(Deserialize)]
struct RecordsEnvelope {
    records: Vec<Record>,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    record: Record,
}

impl MirrorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
        })
    }

    pub fn from_http(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.http = self.http.with_token(token);
        self
    }
}

impl MirrorStore for MirrorClient {
    fn insert(&self, record: &Record) -> Result<(), Error> {
        let url = self.http.url(&["api", "addRecord"], &[])?;
        self.http
            .send_ok("POST", &url, Some(record))
            .map_err(|err| err.with_id(record.id.clone()))
    }

    fn update(&self, id: &str, record: &Record) -> Result<(), Error> {
        let url = self.http.url(&["api", "updateRecord", id], &[])?;
        self.http
            .send_ok("PATCH", &url, Some(record))
            .map_err(|err| err.with_id(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        let url = self.http.url(&["api", "deleteRecord", id], &[])?;
        self.http
            .send_ok::<()>("DELETE", &url, None)
            .map_err(|err| err.with_id(id.to_string()))
    }

    fn fetch_all(&self) -> Result<Vec<Record>, Error> {
        let url = self.http.url(&["api", "fetchData"], &[])?;
        let envelope: RecordsEnvelope = self.http.get_json(&url)?;
        Ok(envelope.records)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, Error> {
        let url = self
            .http
            .url(&["api", "fetchData"], &[("id", id.to_string())])?;
        match self.http.get_json::<RecordEnvelope>(&url) {
            Ok(envelope) => Ok(Some(envelope.record)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}
