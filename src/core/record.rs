//! Purpose: Define the leaf record model shared by both backing stores.
//! Exports: `Record`, `Draft`, `now_rfc3339`, `text_of_html`.
//! Role: Canonical record shape; validation gate for create/update input.
//! Invariants: `id` is the metadata-service identity and joins both stores.
//! Invariants: `title` and `domain_name` are non-empty for accepted writes.

use crate::core::error::{Error, ErrorKind};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub domain_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub preview_picture: Option<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub http_status: u16,
    #[serde(default)]
    pub published_by: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub wallabag_created_at: String,
    #[serde(default)]
    pub wallabag_updated_at: String,
    #[serde(default)]
    pub last_sourced: String,
}

/// Create/update input: everything the caller supplies before the metadata
/// service assigns identity and stamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub domain_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub preview_picture: Option<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub http_status: u16,
    #[serde(default)]
    pub published_by: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub mimetype: String,
}

impl Draft {
    pub fn new(title: impl Into<String>, domain_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            domain_name: domain_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("title must not be empty")
                .with_hint("Provide a non-empty title."));
        }
        if self.domain_name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("domain_name must not be empty")
                .with_hint("Provide a non-empty domain name."));
        }
        Ok(())
    }

    /// Materialize a record from this draft under a service-assigned id.
    /// Both stamps start equal; updates refresh `updated_at` only.
    pub fn into_record(self, id: impl Into<String>) -> Record {
        let stamp = now_rfc3339();
        Record {
            id: id.into(),
            title: self.title,
            domain_name: self.domain_name,
            content: self.content,
            url: self.url,
            preview_picture: self.preview_picture,
            language: self.language,
            tags: self.tags,
            http_status: self.http_status,
            published_by: self.published_by,
            user_email: self.user_email,
            user_name: self.user_name,
            mimetype: self.mimetype,
            created_at: stamp.clone(),
            updated_at: stamp,
            wallabag_created_at: String::new(),
            wallabag_updated_at: String::new(),
            last_sourced: String::new(),
        }
    }
}

impl Record {
    /// The editable fields of this record, as a draft.
    pub fn to_draft(&self) -> Draft {
        Draft {
            title: self.title.clone(),
            domain_name: self.domain_name.clone(),
            content: self.content.clone(),
            url: self.url.clone(),
            preview_picture: self.preview_picture.clone(),
            language: self.language.clone(),
            tags: self.tags.clone(),
            http_status: self.http_status,
            published_by: self.published_by.clone(),
            user_email: self.user_email.clone(),
            user_name: self.user_name.clone(),
            mimetype: self.mimetype.clone(),
        }
    }

    /// Full-record replacement from a draft, keeping identity and creation
    /// stamps and refreshing `updated_at`.
    pub fn apply_draft(&self, draft: Draft) -> Record {
        Record {
            id: self.id.clone(),
            title: draft.title,
            domain_name: draft.domain_name,
            content: draft.content,
            url: draft.url,
            preview_picture: draft.preview_picture,
            language: draft.language,
            tags: draft.tags,
            http_status: draft.http_status,
            published_by: draft.published_by,
            user_email: draft.user_email,
            user_name: draft.user_name,
            mimetype: draft.mimetype,
            created_at: self.created_at.clone(),
            updated_at: now_rfc3339(),
            wallabag_created_at: self.wallabag_created_at.clone(),
            wallabag_updated_at: self.wallabag_updated_at.clone(),
            last_sourced: self.last_sourced.clone(),
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Upstream systems are inconsistent about id types; the document store keys
/// on the string form, so everything is normalized to a string on the way in.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl de::Visitor<'_> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer id")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Extract readable text from an HTML fragment: tags dropped, common
/// entities decoded, whitespace collapsed. Mirrors what the sync pipeline
/// stores as the document-store body.
pub fn text_of_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                for inner in chars.by_ref() {
                    if inner == '>' {
                        break;
                    }
                }
                out.push(' ');
            }
            '&' => {
                let mut entity = String::new();
                while let Some(&next) = chars.peek() {
                    if next == ';' {
                        chars.next();
                        break;
                    }
                    if entity.len() >= 8 || next == '<' || next == '&' {
                        break;
                    }
                    entity.push(next);
                    chars.next();
                }
                match entity.as_str() {
                    "amp" => out.push('&'),
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "quot" => out.push('"'),
                    "apos" => out.push('\''),
                    "nbsp" => out.push(' '),
                    _ => {
                        out.push('&');
                        out.push_str(&entity);
                    }
                }
            }
            _ => out.push(ch),
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut last_was_space = true;
    for ch in out.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(ch);
            last_was_space = false;
        }
    }
    collapsed.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::{Draft, Record, now_rfc3339, text_of_html};
    use crate::core::error::ErrorKind;

    #[test]
    fn draft_requires_title() {
        let draft = Draft::new("  ", "example.com");
        let err = draft.validate().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn draft_requires_domain_name() {
        let draft = Draft::new("Test", "");
        let err = draft.validate().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn valid_draft_passes() {
        let draft = Draft::new("Test", "example.com");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn into_record_stamps_both_timestamps() {
        let record = Draft::new("Test", "example.com").into_record("abc123");
        assert_eq!(record.id, "abc123");
        assert!(!record.created_at.is_empty());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn apply_draft_keeps_identity_and_created_at() {
        let mut original = Draft::new("Old", "example.com").into_record("abc123");
        original.created_at = "2024-12-01T00:00:00Z".to_string();
        let updated = original.apply_draft(Draft::new("New", "example.org"));
        assert_eq!(updated.id, "abc123");
        assert_eq!(updated.title, "New");
        assert_eq!(updated.domain_name, "example.org");
        assert_eq!(updated.created_at, "2024-12-01T00:00:00Z");
        assert_ne!(updated.updated_at, "2024-12-01T00:00:00Z");
    }

    #[test]
    fn record_id_accepts_number_or_string() {
        let from_number: Record =
            serde_json::from_str(r#"{"id": 42, "title": "t", "domain_name": "d"}"#).expect("record");
        assert_eq!(from_number.id, "42");

        let from_string: Record =
            serde_json::from_str(r#"{"id": "abc123", "title": "t", "domain_name": "d"}"#)
                .expect("record");
        assert_eq!(from_string.id, "abc123");
    }

    #[test]
    fn record_tolerates_missing_optional_fields() {
        let record: Record =
            serde_json::from_str(r#"{"id": "x", "title": "t", "domain_name": "d"}"#).expect("record");
        assert!(record.tags.is_empty());
        assert_eq!(record.preview_picture, None);
        assert_eq!(record.http_status, 0);
    }

    #[test]
    fn now_rfc3339_is_parseable() {
        let stamp = now_rfc3339();
        assert!(stamp.ends_with('Z'));
        assert!(time::OffsetDateTime::parse(
            &stamp,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }

    #[test]
    fn text_of_html_strips_tags_and_entities() {
        let html = "<p>Ship &amp; <b>deliver</b>   fast</p>";
        assert_eq!(text_of_html(html), "Ship & deliver fast");
    }

    #[test]
    fn text_of_html_handles_plain_text() {
        assert_eq!(text_of_html("already plain"), "already plain");
    }
}
