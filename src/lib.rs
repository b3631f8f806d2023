//! # autocrud
//!
//! CRUD endpoints generated from JSON collection files.
//!
//! ## Core Concepts
//!
//! - **Records**: flat maps of field name to scalar value, each with a unique `id`
//! - **Store**: one collection held in memory and rewritten to its file on every change
//! - **Inferred schema**: field types sampled once from a collection's first record
//! - **Collection API**: list/get/create/update/delete with validation against that schema
//!
//! ## Example
//!
//! ```ignore
//! use autocrud::{CollectionApi, Record, RecordStore};
//!
//! let store = RecordStore::load("users.json")?.into_shared();
//! let api = CollectionApi::attach(store);
//!
//! let created = api.create_item(Record::from_json(json!({"name": "Bob"}))?)?;
//! let fetched = api.get_item(&created.id_key().unwrap())?;
//! ```

pub mod api;
pub mod error;
pub mod store;
pub mod tools;
pub mod types;

// Re-exports
pub use api::{infer_schema, validate, CollectionApi, InferredSchema, Response, Route, Router};
pub use error::{ApiError, ApiResult, Result, StoreError, ValidationError};
pub use store::{
    collection_name, parse_records, read_records, render_records, write_records, RecordStore,
    SharedStore, StoreConfig,
};
pub use types::*;
