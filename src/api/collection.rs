//! CRUD contract over one collection.

use crate::api::schema::InferredSchema;
use crate::error::{ApiError, ApiResult};
use crate::store::SharedStore;
use crate::types::{Record, ID_FIELD};
use tracing::info;

/// A store together with the schema inferred when it was attached.
///
/// Candidates are validated before the store is touched. The schema is
/// fixed at attach time and never re-inferred.
pub struct CollectionApi {
    name: String,
    schema: InferredSchema,
    store: SharedStore,
}

impl CollectionApi {
    /// Attach to a store, naming the collection after its backing file.
    pub fn attach(store: SharedStore) -> Self {
        let name = store.lock().name();
        Self::attach_as(name, store)
    }

    /// Attach to a store under an explicit collection name.
    pub fn attach_as(name: impl Into<String>, store: SharedStore) -> Self {
        let name = name.into();
        let schema = InferredSchema::infer(store.lock().list_all());
        info!(collection = %name, fields = schema.len(), "inferred collection schema");

        Self {
            name,
            schema,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &InferredSchema {
        &self.schema
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn list_items(&self) -> Vec<Record> {
        self.store.lock().list_all().to_vec()
    }

    pub fn get_item(&self, id: &str) -> ApiResult<Record> {
        self.store
            .lock()
            .get_by_field(ID_FIELD, id)
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    /// Every record whose `field` matches `value`; an empty result is
    /// reported as not found.
    pub fn search_items(&self, field: &str, value: &str) -> ApiResult<Vec<Record>> {
        let matches: Vec<Record> = self
            .store
            .lock()
            .find_all_by_field(field, value)
            .into_iter()
            .cloned()
            .collect();

        if matches.is_empty() {
            Err(self.not_found(format!("{}={}", field, value)))
        } else {
            Ok(matches)
        }
    }

    pub fn create_item(&self, candidate: Record) -> ApiResult<Record> {
        self.schema.validate(&candidate)?;
        Ok(self.store.lock().add(candidate)?)
    }

    pub fn update_item(&self, id: &str, candidate: Record) -> ApiResult<Record> {
        self.update_where(ID_FIELD, id, candidate)
    }

    pub fn delete_item(&self, id: &str) -> ApiResult<Record> {
        self.delete_where(ID_FIELD, id)
    }

    /// Update the first record whose `field` matches `value`.
    pub fn update_where(&self, field: &str, value: &str, candidate: Record) -> ApiResult<Record> {
        self.schema.validate(&candidate)?;
        self.store
            .lock()
            .update_by_field(field, value, &candidate)?
            .ok_or_else(|| self.not_found(lookup_label(field, value)))
    }

    /// Delete the first record whose `field` matches `value`.
    pub fn delete_where(&self, field: &str, value: &str) -> ApiResult<Record> {
        self.store
            .lock()
            .delete_by_field(field, value)?
            .ok_or_else(|| self.not_found(lookup_label(field, value)))
    }

    fn not_found(&self, id: impl Into<String>) -> ApiError {
        ApiError::NotFound {
            collection: self.name.clone(),
            id: id.into(),
        }
    }
}

fn lookup_label(field: &str, value: &str) -> String {
    if field == ID_FIELD {
        value.to_string()
    } else {
        format!("{}={}", field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ValidationError};
    use crate::store::RecordStore;
    use crate::types::FieldType;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    fn test_api(dir: &TempDir, contents: serde_json::Value) -> CollectionApi {
        let path = dir.path().join("people.json");
        fs::write(&path, contents.to_string()).unwrap();
        CollectionApi::attach(RecordStore::load(&path).unwrap().into_shared())
    }

    #[test]
    fn test_attach_infers_once() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([]));

        assert_eq!(api.name(), "people");
        assert_eq!(api.schema(), &InferredSchema::default());

        // Schema stays fixed after the first write
        api.create_item(record(json!({"name": "Ann", "age": 3})))
            .unwrap();
        assert_eq!(api.schema().field_type("age"), None);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([{"id": "1"}]));

        let err = api.get_item("2").unwrap_err();
        assert!(matches!(err, ApiError::NotFound { ref id, .. } if id == "2"));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_create_validates_before_store() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([{"id": "1", "age": 30}]));

        let err = api
            .create_item(record(json!({"age": "old"})))
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::TypeMismatch {
                expected: FieldType::Integer,
                ..
            })
        ));
        assert_eq!(api.list_items().len(), 1);
    }

    #[test]
    fn test_create_with_null_id_assigns_one() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([{"id": "1", "name": "a"}]));

        let created = api
            .create_item(record(json!({"id": null, "name": "b"})))
            .unwrap();

        let id = created.id_key().unwrap();
        assert_ne!(id, "1");
        assert_eq!(api.get_item(&id).unwrap(), created);
    }

    #[test]
    fn test_update_and_delete_missing() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([{"id": "1", "name": "a"}]));

        let err = api
            .update_item("9", record(json!({"name": "b"})))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));

        let err = api.delete_item("9").unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[test]
    fn test_create_duplicate_conflicts() {
        let dir = TempDir::new().unwrap();
        let api = test_api(&dir, json!([{"id": "1", "name": "a"}]));

        let err = api
            .create_item(record(json!({"id": "1", "name": "b"})))
            .unwrap_err();
        assert!(matches!(err, ApiError::Storage(StoreError::Conflict(_))));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_search_and_field_routes() {
        let dir = TempDir::new().unwrap();
        let api = test_api(
            &dir,
            json!([
                {"id": "1", "status": "open"},
                {"id": "2", "status": "open"}
            ]),
        );

        assert_eq!(api.search_items("status", "open").unwrap().len(), 2);
        assert!(api.search_items("status", "closed").is_err());

        let updated = api
            .update_where("status", "open", record(json!({"status": "done"})))
            .unwrap();
        assert_eq!(updated.id_key().as_deref(), Some("1"));

        let removed = api.delete_where("status", "open").unwrap();
        assert_eq!(removed.id_key().as_deref(), Some("2"));
    }
}
