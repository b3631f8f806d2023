//! Transport-agnostic routing of CRUD requests to collections.
//!
//! Route shape per collection `C`:
//!
//! | Method   | Path                | Action                          |
//! |----------|---------------------|---------------------------------|
//! | `GET`    | `/`                 | welcome message, collections    |
//! | `GET`    | `/C`                | list                            |
//! | `POST`   | `/C`                | create (201)                    |
//! | `GET`    | `/C/{id}`           | get one                         |
//! | `PUT`    | `/C/{id}`           | update                          |
//! | `DELETE` | `/C/{id}`           | delete                          |
//! | `GET`    | `/C/{field}/{value}`| every record with field = value |
//! | `PUT`    | `/C/{field}/{value}`| update first match              |
//! | `DELETE` | `/C/{field}/{value}`| delete first match              |

use crate::api::collection::CollectionApi;
use crate::error::{ApiError, ApiResult, ValidationError};
use crate::store::{RecordStore, StoreConfig};
use crate::types::Record;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// A parsed request target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Root,
    List { collection: String },
    Create { collection: String },
    Get { collection: String, id: String },
    Update { collection: String, id: String },
    Delete { collection: String, id: String },
    Search { collection: String, field: String, value: String },
    UpdateWhere { collection: String, field: String, value: String },
    DeleteWhere { collection: String, field: String, value: String },
}

impl Route {
    /// Resolve a method and path to a route.
    pub fn parse(method: &str, path: &str) -> ApiResult<Route> {
        let path = path.split('?').next().unwrap_or_default();
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect();
        let method = method.to_ascii_uppercase();
        let not_allowed = || ApiError::MethodNotAllowed(format!("{} {}", method, path));

        let route = match segments.as_slice() {
            [] => match method.as_str() {
                "GET" => Route::Root,
                _ => return Err(not_allowed()),
            },
            [collection] => {
                let collection = collection.clone();
                match method.as_str() {
                    "GET" => Route::List { collection },
                    "POST" => Route::Create { collection },
                    _ => return Err(not_allowed()),
                }
            }
            [collection, id] => {
                let (collection, id) = (collection.clone(), id.clone());
                match method.as_str() {
                    "GET" => Route::Get { collection, id },
                    "PUT" => Route::Update { collection, id },
                    "DELETE" => Route::Delete { collection, id },
                    _ => return Err(not_allowed()),
                }
            }
            [collection, field, value] => {
                let (collection, field, value) = (collection.clone(), field.clone(), value.clone());
                match method.as_str() {
                    "GET" => Route::Search { collection, field, value },
                    "PUT" => Route::UpdateWhere { collection, field, value },
                    "DELETE" => Route::DeleteWhere { collection, field, value },
                    _ => return Err(not_allowed()),
                }
            }
            _ => return Err(ApiError::UnknownRoute(path.to_string())),
        };

        Ok(route)
    }
}

/// Decode `%XX` escapes in a path segment. Malformed escapes are kept
/// verbatim.
fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Status code and JSON body produced for a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: serde_json::Value,
}

impl Response {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    fn created(body: serde_json::Value) -> Self {
        Self { status: 201, body }
    }

    fn from_error(err: &ApiError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "detail": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Dispatches requests to a set of named collections.
#[derive(Default)]
pub struct Router {
    collections: IndexMap<String, CollectionApi>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open each file as a collection and mount it under its file stem.
    pub fn from_paths<I, P>(paths: I) -> crate::error::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut router = Self::new();
        for path in paths {
            let store = RecordStore::open(StoreConfig::for_path(path))?;
            router.mount(CollectionApi::attach(store.into_shared()));
        }
        Ok(router)
    }

    /// Mount a collection. Returns false, leaving the existing one in
    /// place, if the name is already taken.
    pub fn mount(&mut self, api: CollectionApi) -> bool {
        if self.collections.contains_key(api.name()) {
            warn!(collection = api.name(), "collection name already mounted; skipping");
            return false;
        }
        self.collections.insert(api.name().to_string(), api);
        true
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionApi> {
        self.collections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Handle one request. Never fails: errors become error responses.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> Response {
        let result = Route::parse(method, path).and_then(|route| self.dispatch(&route, body));

        match result {
            Ok(response) => {
                debug!(method, path, status = response.status, "handled request");
                response
            }
            Err(err) => {
                let response = Response::from_error(&err);
                if response.status >= 500 {
                    error!(method, path, error = %err, "request failed");
                } else {
                    debug!(method, path, status = response.status, error = %err, "request rejected");
                }
                response
            }
        }
    }

    /// Run a parsed route.
    pub fn dispatch(&self, route: &Route, body: &[u8]) -> ApiResult<Response> {
        let response = match route {
            Route::Root => {
                let names: Vec<&str> = self.names().collect();
                Response::ok(json!({
                    "message": "autocrud is running",
                    "collections": names,
                }))
            }
            Route::List { collection } => {
                Response::ok(records_json(&self.api(collection)?.list_items()))
            }
            Route::Create { collection } => {
                let api = self.api(collection)?;
                Response::created(api.create_item(parse_body(body)?)?.to_json())
            }
            Route::Get { collection, id } => Response::ok(self.api(collection)?.get_item(id)?.to_json()),
            Route::Update { collection, id } => {
                let api = self.api(collection)?;
                Response::ok(api.update_item(id, parse_body(body)?)?.to_json())
            }
            Route::Delete { collection, id } => {
                Response::ok(self.api(collection)?.delete_item(id)?.to_json())
            }
            Route::Search { collection, field, value } => {
                Response::ok(records_json(&self.api(collection)?.search_items(field, value)?))
            }
            Route::UpdateWhere { collection, field, value } => {
                let api = self.api(collection)?;
                Response::ok(api.update_where(field, value, parse_body(body)?)?.to_json())
            }
            Route::DeleteWhere { collection, field, value } => {
                Response::ok(self.api(collection)?.delete_where(field, value)?.to_json())
            }
        };

        Ok(response)
    }

    fn api(&self, name: &str) -> ApiResult<&CollectionApi> {
        self.collections
            .get(name)
            .ok_or_else(|| ApiError::UnknownCollection(name.to_string()))
    }
}

fn records_json(records: &[Record]) -> serde_json::Value {
    serde_json::Value::Array(records.iter().map(Record::to_json).collect())
}

/// Parse a request body into a candidate record.
fn parse_body(body: &[u8]) -> ApiResult<Record> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !value.is_object() {
        return Err(ValidationError::NotAnObject.into());
    }

    Record::from_json(value).map_err(ApiError::BadRequest)
}
