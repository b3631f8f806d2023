//! Collection API: schema inference, validation, and the CRUD contract.
//!
//! A [`CollectionApi`] wraps one shared [`RecordStore`](crate::store::RecordStore)
//! and exposes list/get/create/update/delete as plain method calls. The
//! [`Router`] maps HTTP-shaped requests onto those calls for any transport.

mod collection;
mod routes;
mod schema;

pub use collection::CollectionApi;
pub use routes::{Response, Route, Router};
pub use schema::{infer_schema, validate, InferredSchema};
