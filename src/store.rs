//! File-backed record store for a single collection.
//!
//! The whole collection lives in memory as an ordered `Vec<Record>` and is
//! rewritten to its backing file after every mutation. There is no locking:
//! callers sharing a store across threads wrap it in a mutex (see
//! [`SharedStore`]).

use crate::error::{Result, StoreError};
use crate::types::{json_kind, FieldValue, Record, ID_FIELD};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A store handle shared between callers; every operation holds the lock
/// for its full read-modify-write.
pub type SharedStore = Arc<Mutex<RecordStore>>;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Backing file for the collection.
    pub path: PathBuf,

    /// Whether to create the file (holding `[]`) if it doesn't exist.
    pub create_if_missing: bool,

    /// Write to a temporary file and rename it over the target, instead of
    /// truncating the target in place.
    pub atomic_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data.json"),
            create_if_missing: true,
            atomic_writes: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration for the given backing file.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Ordered, durable CRUD over the records of one collection.
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    records: Vec<Record>,
}

impl RecordStore {
    /// Open the store at `path` with default settings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::for_path(path.as_ref()))
    }

    /// Open the store described by `config`.
    ///
    /// A missing file is created holding an empty sequence when
    /// `create_if_missing` is set.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("collection file not found: {}", config.path.display()),
                )));
            }
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            write_records(&config.path, &[], config.atomic_writes)?;
            info!(path = %config.path.display(), "created empty collection file");
        }

        let records = read_records(&config.path)?;
        check_ids(&config.path, &records);
        info!(
            path = %config.path.display(),
            records = records.len(),
            "loaded collection"
        );

        Ok(Self { config, records })
    }

    /// Wrap this store for shared use.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Re-read the backing file, discarding the in-memory sequence.
    pub fn reload(&mut self) -> Result<()> {
        let records = read_records(&self.config.path)?;
        check_ids(&self.config.path, &records);
        self.records = records;
        Ok(())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Collection name, taken from the backing file's stem.
    pub fn name(&self) -> String {
        collection_name(&self.config.path)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // --- Reads ---

    /// All records, in insertion order.
    pub fn list_all(&self) -> &[Record] {
        &self.records
    }

    /// First record whose `field` stringifies equal to `value`.
    pub fn get_by_field(&self, field: &str, value: impl fmt::Display) -> Option<&Record> {
        let value = value.to_string();
        self.records.iter().find(|r| r.matches(field, &value))
    }

    /// Every record whose `field` stringifies equal to `value`.
    pub fn find_all_by_field(&self, field: &str, value: impl fmt::Display) -> Vec<&Record> {
        let value = value.to_string();
        self.records
            .iter()
            .filter(|r| r.matches(field, &value))
            .collect()
    }

    // --- Writes ---

    /// Append a record, assigning a fresh id if it has none.
    ///
    /// Returns the stored record. An explicit id that already exists in
    /// the collection is rejected.
    pub fn add(&mut self, mut record: Record) -> Result<Record> {
        match record.id_key() {
            Some(key) => {
                if self.records.iter().any(|r| r.id_key().as_deref() == Some(&key)) {
                    return Err(StoreError::Conflict(format!(
                        "id '{}' already exists in {}",
                        key,
                        self.name()
                    )));
                }
            }
            None => record.set_id(FieldValue::String(uuid::Uuid::new_v4().to_string())),
        }

        self.records.push(record.clone());
        debug!(collection = %self.name(), id = ?record.id_key(), "added record");
        self.persist()?;

        Ok(record)
    }

    /// Merge `patch` into the first record matching `field`/`value`.
    ///
    /// Returns the updated record, or `None` when nothing matches. A patch
    /// may repeat the record's id but not change it.
    pub fn update_by_field(
        &mut self,
        field: &str,
        value: impl fmt::Display,
        patch: &Record,
    ) -> Result<Option<Record>> {
        let value = value.to_string();
        let idx = match self.position(field, &value) {
            Some(idx) => idx,
            None => {
                debug!(collection = %self.name(), field, value = %value, "update matched nothing");
                return Ok(None);
            }
        };

        let current_id = self.records[idx].id_key();
        if patch.contains(ID_FIELD) && patch.id_key() != current_id {
            return Err(StoreError::Conflict(format!(
                "cannot change id of record {}",
                current_id.as_deref().unwrap_or("<none>")
            )));
        }

        self.records[idx].merge(patch);
        let updated = self.records[idx].clone();
        debug!(collection = %self.name(), field, value = %value, "updated record");
        self.persist()?;

        Ok(Some(updated))
    }

    /// Remove the first record matching `field`/`value`.
    ///
    /// Returns the removed record, or `None` when nothing matches; a miss
    /// leaves the file untouched.
    pub fn delete_by_field(
        &mut self,
        field: &str,
        value: impl fmt::Display,
    ) -> Result<Option<Record>> {
        let value = value.to_string();
        let idx = match self.position(field, &value) {
            Some(idx) => idx,
            None => {
                debug!(collection = %self.name(), field, value = %value, "delete matched nothing");
                return Ok(None);
            }
        };

        let removed = self.records.remove(idx);
        debug!(collection = %self.name(), field, value = %value, "deleted record");
        self.persist()?;

        Ok(Some(removed))
    }

    fn position(&self, field: &str, value: &str) -> Option<usize> {
        self.records.iter().position(|r| r.matches(field, value))
    }

    /// Rewrite the backing file from the in-memory sequence.
    ///
    /// On failure the file and memory may disagree; nothing is rolled back.
    fn persist(&self) -> Result<()> {
        write_records(&self.config.path, &self.records, self.config.atomic_writes)
    }
}

/// Collection name for a backing file: its stem.
pub fn collection_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse a collection from JSON text.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(StoreError::InvalidFormat(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Record::from_json(item)
                .map_err(|e| StoreError::InvalidFormat(format!("record {}: {}", i, e)))
        })
        .collect()
}

/// Read and parse a collection file.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_records(&text)
}

/// Serialize a collection as pretty-printed JSON.
pub fn render_records(records: &[Record]) -> Result<String> {
    let mut text = serde_json::to_string_pretty(records)?;
    text.push('\n');
    Ok(text)
}

/// Write a collection file in full.
pub fn write_records(path: impl AsRef<Path>, records: &[Record], atomic: bool) -> Result<()> {
    let path = path.as_ref();
    let text = render_records(records)?;

    if atomic {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
    } else {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
    }

    Ok(())
}

/// Warn about records without ids and ids shared by several records.
fn check_ids(path: &Path, records: &[Record]) {
    let mut seen = HashSet::new();
    for (i, record) in records.iter().enumerate() {
        match record.id_key() {
            Some(key) => {
                if !seen.insert(key.clone()) {
                    warn!(path = %path.display(), index = i, id = %key, "duplicate id in collection");
                }
            }
            None => warn!(path = %path.display(), index = i, "record has no id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    fn seeded_store(dir: &TempDir, contents: serde_json::Value) -> RecordStore {
        let path = dir.path().join("users.json");
        fs::write(&path, serde_json::to_string_pretty(&contents).unwrap()).unwrap();
        RecordStore::load(&path).unwrap()
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("items.json");

        let store = RecordStore::load(&path).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.name(), "items");
        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!([]));
    }

    #[test]
    fn test_open_without_create() {
        let dir = TempDir::new().unwrap();
        let result = RecordStore::open(StoreConfig {
            path: dir.path().join("missing.json"),
            create_if_missing: false,
            atomic_writes: true,
        });

        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{\"id\": ").unwrap();

        let result = RecordStore::load(&path);
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_load_rejects_non_sequence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("object.json");
        fs::write(&path, r#"{"users": []}"#).unwrap();

        let result = RecordStore::load(&path);
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));

        fs::write(&path, r#"[{"id": "1"}, 7]"#).unwrap();
        let result = RecordStore::load(&path);
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
    }

    #[test]
    fn test_get_by_field_is_loose() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, json!([{"id": 1, "name": "Alice"}]));

        assert!(store.get_by_field("id", "1").is_some());
        assert!(store.get_by_field("id", 1).is_some());
        assert!(store.get_by_field("id", "2").is_none());
        assert!(store.get_by_field("missing", "null").is_none());
    }

    #[test]
    fn test_large_integers_survive_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"[{"id":"1","big":18446744073709551615}]"#).unwrap();
        let mut store = RecordStore::load(&path).unwrap();

        assert!(store.get_by_field("big", "18446744073709551615").is_some());

        store.add(record(json!({"name": "x"}))).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"big\": 18446744073709551615"), "{}", text);
        let reopened = RecordStore::load(&path).unwrap();
        assert_eq!(reopened.list_all(), store.list_all());
    }

    #[test]
    fn test_find_all_by_field() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(
            &dir,
            json!([
                {"id": "1", "status": "open"},
                {"id": "2", "status": "closed"},
                {"id": "3", "status": "open"}
            ]),
        );

        let open = store.find_all_by_field("status", "open");
        assert_eq!(open.len(), 2);
        assert_eq!(open[1].id_key().as_deref(), Some("3"));
    }

    #[test]
    fn test_add_assigns_id_first() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::load(dir.path().join("items.json")).unwrap();

        let added = store.add(record(json!({"name": "Bob"}))).unwrap();

        let fields: Vec<_> = added.fields().collect();
        assert_eq!(fields, vec!["id", "name"]);
        assert!(added.id().unwrap().as_str().is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_replaces_null_id() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::load(dir.path().join("items.json")).unwrap();

        let added = store.add(record(json!({"id": null, "name": "Bob"}))).unwrap();
        assert!(added.id().is_some());
    }

    #[test]
    fn test_add_duplicate_id_conflicts() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1"}]));

        let result = store.add(record(json!({"id": 1, "name": "dup"})));

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_preserves_untouched_fields() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1", "name": "a", "value": 10}]));

        let updated = store
            .update_by_field("id", "1", &record(json!({"name": "b"})))
            .unwrap()
            .unwrap();

        assert_eq!(updated.to_json(), json!({"id": "1", "name": "b", "value": 10}));
    }

    #[test]
    fn test_update_cannot_change_id() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1", "name": "a"}]));

        let result = store.update_by_field("id", "1", &record(json!({"id": "2"})));
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // Repeating the same id is fine
        let updated = store
            .update_by_field("id", "1", &record(json!({"id": "1", "name": "z"})))
            .unwrap();
        assert!(updated.is_some());
    }

    #[test]
    fn test_update_miss() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1"}]));

        let result = store
            .update_by_field("id", "404", &record(json!({"name": "x"})))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_miss_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1", "name": "a"}]));
        let before = fs::read(store.path()).unwrap();

        let removed = store.delete_by_field("id", "nope").unwrap();

        assert!(removed.is_none());
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_keeps_order() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(
            &dir,
            json!([{"id": "1"}, {"id": "2"}, {"id": "3"}]),
        );

        let removed = store.delete_by_field("id", "2").unwrap().unwrap();
        assert_eq!(removed.id_key().as_deref(), Some("2"));

        let ids: Vec<_> = store.list_all().iter().filter_map(|r| r.id_key()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_in_place_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inplace.json");
        let mut store = RecordStore::open(StoreConfig {
            path: path.clone(),
            create_if_missing: true,
            atomic_writes: false,
        })
        .unwrap();

        store.add(record(json!({"id": "a", "n": 1}))).unwrap();

        let reloaded = RecordStore::load(&path).unwrap();
        assert_eq!(reloaded.list_all(), store.list_all());
    }

    #[test]
    fn test_file_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::load(dir.path().join("pretty.json")).unwrap();
        store.add(record(json!({"id": "1", "name": "a"}))).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "[\n  {\n    \"id\": \"1\",\n    \"name\": \"a\"\n  }\n]\n");
    }

    #[test]
    fn test_reload_picks_up_external_changes() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir, json!([{"id": "1"}]));

        fs::write(store.path(), r#"[{"id": "1"}, {"id": "2"}]"#).unwrap();
        store.reload().unwrap();

        assert_eq!(store.len(), 2);
    }
}
