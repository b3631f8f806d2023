//! Schema inference from a sample record.

use crate::error::ValidationError;
use crate::store::RecordStore;
use crate::types::{FieldType, Record, ID_FIELD};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field types sampled from the first record of a collection.
///
/// This is advisory: records written before or after inference may have a
/// different shape, and nothing re-checks them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferredSchema {
    fields: Vec<(String, FieldType)>,
}

impl Default for InferredSchema {
    /// The schema of an empty collection: `{id: string}`.
    fn default() -> Self {
        Self {
            fields: vec![(ID_FIELD.to_string(), FieldType::String)],
        }
    }
}

impl InferredSchema {
    /// Infer from the first record, or fall back to the default schema.
    pub fn infer(records: &[Record]) -> Self {
        records.first().map(Self::from_sample).unwrap_or_default()
    }

    /// Schema describing every field of `sample`.
    pub fn from_sample(sample: &Record) -> Self {
        Self {
            fields: sample
                .iter()
                .map(|(name, value)| (name.clone(), FieldType::of(value)))
                .collect(),
        }
    }

    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| *ty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every field of `candidate` that the schema knows about.
    ///
    /// Unknown fields pass through; missing fields are not an error. A null
    /// `id` counts as absent, as it does in the store.
    pub fn validate(&self, candidate: &Record) -> Result<(), ValidationError> {
        for (name, value) in candidate {
            if name == ID_FIELD && value.is_null() {
                continue;
            }
            if let Some(expected) = self.field_type(name) {
                if !expected.accepts(value) {
                    return Err(ValidationError::TypeMismatch {
                        field: name.clone(),
                        expected,
                        found: value.kind(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Serialize for InferredSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, ty) in &self.fields {
            map.serialize_entry(name, ty)?;
        }
        map.end()
    }
}

/// Infer the schema of a store's current contents.
pub fn infer_schema(store: &RecordStore) -> InferredSchema {
    InferredSchema::infer(store.list_all())
}

/// Validate `candidate` against `schema`.
pub fn validate(schema: &InferredSchema, candidate: &Record) -> Result<(), ValidationError> {
    schema.validate(candidate)
}
