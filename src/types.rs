//! Core types for records and their field values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the identifier field every record carries.
pub const ID_FIELD: &str = "id";

/// A scalar field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`, kept exact.
    Unsigned(u64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// String form used when matching a field against a lookup value.
    ///
    /// Numbers and strings compare by their text, so `1` matches `"1"`.
    pub fn match_key(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Unsigned(u) => u.to_string(),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(|n| n.to_string())
                .unwrap_or_else(|| f.to_string()),
            FieldValue::String(s) => s.clone(),
        }
    }

    /// Short name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) | FieldValue::Unsigned(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.match_key())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl TryFrom<serde_json::Value> for FieldValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(FieldValue::Unsigned(u))
                } else {
                    n.as_f64()
                        .map(FieldValue::Float)
                        .ok_or_else(|| format!("unrepresentable number {}", n))
                }
            }
            Value::String(s) => Ok(FieldValue::String(s)),
            Value::Array(_) => Err("arrays are not scalar values".to_string()),
            Value::Object(_) => Err("objects are not scalar values".to_string()),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(b),
            FieldValue::Integer(i) => serde_json::Value::from(i),
            FieldValue::Unsigned(u) => serde_json::Value::from(u),
            FieldValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::String(s) => serde_json::Value::String(s),
        }
    }
}

/// Primitive type tag recorded in an inferred schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// Sampled from a `null`; accepts any value.
    Untyped,
}

impl FieldType {
    /// Type tag of a sample value.
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => FieldType::Untyped,
            FieldValue::Bool(_) => FieldType::Boolean,
            FieldValue::Integer(_) | FieldValue::Unsigned(_) => FieldType::Integer,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::String(_) => FieldType::String,
        }
    }

    /// Whether `value` is acceptable for a field of this type.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (FieldType::Untyped, _) => true,
            (FieldType::String, FieldValue::String(_)) => true,
            (FieldType::Boolean, FieldValue::Bool(_)) => true,
            (FieldType::Integer, FieldValue::Integer(_) | FieldValue::Unsigned(_)) => true,
            (FieldType::Integer, FieldValue::Float(f)) => f.is_finite() && f.fract() == 0.0,
            (
                FieldType::Float,
                FieldValue::Float(_) | FieldValue::Integer(_) | FieldValue::Unsigned(_),
            ) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Untyped => "untyped",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flat record: field name to scalar value, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a parsed JSON value, rejecting anything but a
    /// flat object of scalars.
    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        let object = match value {
            serde_json::Value::Object(object) => object,
            other => return Err(format!("expected an object, got {}", json_kind(&other))),
        };

        let mut fields = IndexMap::with_capacity(object.len());
        for (name, value) in object {
            let value =
                FieldValue::try_from(value).map_err(|e| format!("field '{}': {}", name, e))?;
            fields.insert(name, value);
        }
        Ok(Record(fields))
    }

    /// Convert to a JSON object value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
        )
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Set a field, keeping its position if it already exists.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// Remove a field, preserving the order of the rest.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.0.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The record's id, if present and not null.
    pub fn id(&self) -> Option<&FieldValue> {
        self.0.get(ID_FIELD).filter(|v| !v.is_null())
    }

    /// Set the id, placing it first when the record has none yet.
    pub fn set_id(&mut self, value: FieldValue) {
        match self.0.get_mut(ID_FIELD) {
            Some(slot) => *slot = value,
            None => {
                self.0.shift_insert(0, ID_FIELD.to_string(), value);
            }
        }
    }

    /// Match key of the record's id.
    pub fn id_key(&self) -> Option<String> {
        self.id().map(FieldValue::match_key)
    }

    /// Whether `field` stringifies equal to `value`.
    ///
    /// A record without the field never matches.
    pub fn matches(&self, field: &str, value: &str) -> bool {
        self.0
            .get(field)
            .map(|v| v.match_key() == value)
            .unwrap_or(false)
    }

    /// Overwrite fields with those of `patch`; fields absent from the
    /// patch are left alone.
    pub fn merge(&mut self, patch: &Record) {
        for (k, v) in patch.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = indexmap::map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = indexmap::map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Describe a JSON value's kind for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
