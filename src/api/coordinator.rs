//! Purpose: Sequence each write against the metadata service, then the mirror.
//! Exports: `DualWriter`.
//! Role: The dual-store write coordinator; owns no in-memory state.
//! Invariants: The metadata call completes before the mirror call begins.
//! Invariants: A mirror failure after metadata success surfaces `Inconsistent`.
//! Invariants: Partial writes are not rolled back; retry is the recovery path.

use super::backend::{MetadataStore, MirrorStore};
use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Draft, Record};

pub struct DualWriter<M, D> {
    metadata: M,
    mirror: D,
}

impl<M: MetadataStore, D: MirrorStore> DualWriter<M, D> {
    pub fn new(metadata: M, mirror: D) -> Self {
        Self { metadata, mirror }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn mirror(&self) -> &D {
        &self.mirror
    }

    /// Validate, create in the metadata service, then mirror under the
    /// returned identity. The mirror is never called if the metadata
    /// create fails.
    pub fn create(&self, draft: &Draft) -> Result<Record, Error> {
        draft.validate()?;
        let record = self.metadata.create(draft)?;
        if let Err(err) = self.mirror.insert(&record) {
            return Err(inconsistent(
                "mirror insert failed after metadata create",
                &record.id,
                err,
            ));
        }
        Ok(record)
    }

    pub fn update(&self, id: &str, record: &Record) -> Result<(), Error> {
        record.to_draft().validate()?;
        self.metadata.update(id, record)?;
        if let Err(err) = self.mirror.update(id, record) {
            return Err(inconsistent(
                "mirror update failed after metadata update",
                id,
                err,
            ));
        }
        Ok(())
    }

    /// Both stores acknowledging, or reporting the id already gone, counts
    /// as success.
    pub fn delete(&self, id: &str) -> Result<(), Error> {
        match self.metadata.delete(id) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        match self.mirror.delete(id) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(inconsistent(
                "mirror delete failed after metadata delete",
                id,
                err,
            )),
        }
    }
}

fn inconsistent(message: &str, id: &str, source: Error) -> Error {
    tracing::warn!(id, error = %source, "partial dual-store write");
    let mut err = Error::new(ErrorKind::Inconsistent)
        .with_message(message)
        .with_id(id.to_string())
        .with_hint("The stores have diverged for this id; retry the operation.");
    if let Some(status) = source.status() {
        err = err.with_status(status);
    }
    err.with_source(source)
}

#[cfg(test)]
mod tests {
    use super::DualWriter;
    use crate::api::backend::{MetadataStore, MirrorStore};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::record::{Draft, Record};
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeMetadata {
        records: RefCell<Vec<Record>>,
        calls: RefCell<Vec<String>>,
        fail_create: bool,
        fail_delete_not_found: bool,
    }

    impl MetadataStore for FakeMetadata {
        fn create(&self, draft: &Draft) -> Result<Record, Error> {
            self.calls.borrow_mut().push("create".to_string());
            if self.fail_create {
                return Err(Error::new(ErrorKind::Internal).with_status(500));
            }
            let record = draft.clone().into_record("abc123");
            self.records.borrow_mut().push(record.clone());
            Ok(record)
        }

        fn update(&self, id: &str, record: &Record) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("update {id}"));
            let mut records = self.records.borrow_mut();
            match records.iter_mut().find(|r| r.id == id) {
                Some(slot) => {
                    *slot = record.clone();
                    Ok(())
                }
                None => Err(Error::new(ErrorKind::NotFound)),
            }
        }

        fn delete(&self, id: &str) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("delete {id}"));
            if self.fail_delete_not_found {
                return Err(Error::new(ErrorKind::NotFound));
            }
            self.records.borrow_mut().retain(|r| r.id != id);
            Ok(())
        }

        fn fetch_page(&self, _page: u32) -> Result<Vec<Record>, Error> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeMirror {
        records: RefCell<Vec<Record>>,
        calls: RefCell<Vec<String>>,
        fail_insert: bool,
        fail_delete_not_found: bool,
    }

    impl MirrorStore for FakeMirror {
        fn insert(&self, record: &Record) -> Result<(), Error> {
            self.calls.borrow_mut().push("insert".to_string());
            if self.fail_insert {
                return Err(Error::new(ErrorKind::Internal).with_status(500));
            }
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }

        fn update(&self, id: &str, record: &Record) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("update {id}"));
            let mut records = self.records.borrow_mut();
            match records.iter_mut().find(|r| r.id == id) {
                Some(slot) => {
                    *slot = record.clone();
                    Ok(())
                }
                None => Err(Error::new(ErrorKind::NotFound)),
            }
        }

        fn delete(&self, id: &str) -> Result<(), Error> {
            self.calls.borrow_mut().push(format!("delete {id}"));
            if self.fail_delete_not_found {
                return Err(Error::new(ErrorKind::NotFound));
            }
            self.records.borrow_mut().retain(|r| r.id != id);
            Ok(())
        }

        fn fetch_all(&self) -> Result<Vec<Record>, Error> {
            Ok(self.records.borrow().clone())
        }

        fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, Error> {
            Ok(self.records.borrow().iter().find(|r| r.id == id).cloned())
        }
    }

    #[test]
    fn create_writes_metadata_then_mirror() {
        let writer = DualWriter::new(FakeMetadata::default(), FakeMirror::default());
        let record = writer
            .create(&Draft::new("Test", "example.com"))
            .expect("create");
        assert_eq!(record.id, "abc123");
        assert_eq!(writer.metadata().records.borrow().len(), 1);
        assert_eq!(writer.mirror().records.borrow().len(), 1);
    }

    #[test]
    fn invalid_draft_never_reaches_the_network() {
        let writer = DualWriter::new(FakeMetadata::default(), FakeMirror::default());
        let err = writer
            .create(&Draft::new("", "example.com"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(writer.metadata().calls.borrow().is_empty());
        assert!(writer.mirror().calls.borrow().is_empty());
    }

    #[test]
    fn metadata_failure_skips_mirror() {
        let metadata = FakeMetadata {
            fail_create: true,
            ..FakeMetadata::default()
        };
        let writer = DualWriter::new(metadata, FakeMirror::default());
        let err = writer
            .create(&Draft::new("Test", "example.com"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(writer.mirror().calls.borrow().is_empty());
    }

    #[test]
    fn mirror_failure_surfaces_inconsistent_with_orphan_id() {
        let mirror = FakeMirror {
            fail_insert: true,
            ..FakeMirror::default()
        };
        let writer = DualWriter::new(FakeMetadata::default(), mirror);
        let err = writer
            .create(&Draft::new("Test", "example.com"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
        assert_eq!(err.id(), Some("abc123"));
        // The metadata record exists without a mirror twin; no rollback.
        assert_eq!(writer.metadata().records.borrow().len(), 1);
        assert!(writer.mirror().records.borrow().is_empty());
    }

    #[test]
    fn update_sequences_metadata_before_mirror() {
        let writer = DualWriter::new(FakeMetadata::default(), FakeMirror::default());
        let record = writer
            .create(&Draft::new("Test", "example.com"))
            .expect("create");
        let updated = record.apply_draft(Draft::new("Renamed", "example.com"));
        writer.update(&record.id, &updated).expect("update");
        assert_eq!(writer.metadata().records.borrow()[0].title, "Renamed");
        assert_eq!(writer.mirror().records.borrow()[0].title, "Renamed");
        let calls = writer.metadata().calls.borrow();
        assert_eq!(calls.last().map(String::as_str), Some("update abc123"));
    }

    #[test]
    fn delete_treats_both_not_found_as_success() {
        let metadata = FakeMetadata {
            fail_delete_not_found: true,
            ..FakeMetadata::default()
        };
        let mirror = FakeMirror {
            fail_delete_not_found: true,
            ..FakeMirror::default()
        };
        let writer = DualWriter::new(metadata, mirror);
        writer.delete("missing").expect("idempotent delete");
    }
}
