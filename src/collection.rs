//! Purpose: File-backed record collection serving the mirror proxy.
//! Exports: `FileCollection`, `CollectionLock`.
//! Role: The document store behind `serve`; one JSON array on disk.
//! Invariants: Records are keyed by the metadata-service `id` field.
//! Invariants: Saves are atomic (temp file + rename) under an exclusive lock.

use fs2::FileExt;
use leafsync::api::{Error, ErrorKind, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct FileCollection {
    path: PathBuf,
    records: Vec<Record>,
}

/// Exclusive advisory lock over the collection file, held for the duration
/// of a load-mutate-save cycle. Released on drop.
pub struct CollectionLock {
    _file: File,
}

pub fn lock(path: &Path) -> Result<CollectionLock, Error> {
    let lock_path = lock_path_for(path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(err, "failed to create data directory"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|err| io_error(err, "failed to open collection lock"))?;
    file.lock_exclusive()
        .map_err(|err| io_error(err, "failed to lock collection"))?;
    Ok(CollectionLock { _file: file })
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "leaves.json".to_string());
    name.push_str(".lock");
    path.with_file_name(name)
}

impl FileCollection {
    /// Open the collection; a missing file is an empty collection.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(body) if body.trim().is_empty() => Vec::new(),
            Ok(body) => serde_json::from_str(&body).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("invalid collection json in {}", path.display()))
                    .with_source(err)
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(io_error(err, "failed to read collection")),
        };
        Ok(Self { path, records })
    }

    pub fn save(&self) -> Result<(), Error> {
        let body = serde_json::to_string_pretty(&self.records).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode collection json")
                .with_source(err)
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| io_error(err, "failed to create data directory"))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = File::create(&tmp_path)
            .map_err(|err| io_error(err, "failed to create collection temp file"))?;
        tmp.write_all(body.as_bytes())
            .map_err(|err| io_error(err, "failed to write collection"))?;
        tmp.sync_all()
            .map_err(|err| io_error(err, "failed to flush collection"))?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)
            .map_err(|err| io_error(err, "failed to replace collection file"))
    }

    pub fn all(&self) -> &[Record] {
        &self.records
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn insert_front(&mut self, record: Record) -> Result<(), Error> {
        if self.find(&record.id).is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("a record with this id already exists")
                .with_id(record.id));
        }
        self.records.insert(0, record);
        Ok(())
    }

    pub fn update(&mut self, id: &str, record: Record) -> Result<(), Error> {
        match self.records.iter_mut().find(|existing| existing.id == id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(not_found(id)),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<(), Error> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        if self.records.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn not_found(id: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message("record not found")
        .with_id(id.to_string())
}

fn io_error(err: std::io::Error, message: &str) -> Error {
    let kind = match err.kind() {
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    };
    Error::new(kind).with_message(message).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{FileCollection, lock};
    use leafsync::api::{Draft, ErrorKind};

    fn record(id: &str, title: &str) -> leafsync::api::Record {
        Draft::new(title, "example.com").into_record(id)
    }

    #[test]
    fn missing_file_opens_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let collection =
            FileCollection::open(temp.path().join("leaves.json")).expect("open");
        assert!(collection.all().is_empty());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("leaves.json");
        let mut collection = FileCollection::open(&path).expect("open");
        collection.insert_front(record("1", "first")).expect("insert");
        collection.insert_front(record("2", "second")).expect("insert");
        collection.save().expect("save");

        let reloaded = FileCollection::open(&path).expect("reopen");
        assert_eq!(reloaded.all().len(), 2);
        assert_eq!(reloaded.all()[0].id, "2");
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut collection =
            FileCollection::open(temp.path().join("leaves.json")).expect("open");
        collection.insert_front(record("1", "first")).expect("insert");
        let err = collection
            .insert_front(record("1", "again"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn update_and_remove_require_existing_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut collection =
            FileCollection::open(temp.path().join("leaves.json")).expect("open");
        let err = collection
            .update("ghost", record("ghost", "x"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = collection.remove("ghost").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        collection.insert_front(record("1", "first")).expect("insert");
        collection.update("1", record("1", "renamed")).expect("update");
        assert_eq!(collection.find("1").map(|r| r.title.as_str()), Some("renamed"));
        collection.remove("1").expect("remove");
        assert!(collection.all().is_empty());
    }

    #[test]
    fn lock_creates_sibling_lock_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("leaves.json");
        let guard = lock(&path).expect("lock");
        assert!(temp.path().join("leaves.json.lock").exists());
        drop(guard);
    }
}
