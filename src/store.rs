pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

/// Collection names used by the service.
pub mod collections {
    pub const USERS: &str = "users";
    pub const COURSES: &str = "courses";
    pub const LESSONS: &str = "lessons";
    pub const USER_COURSES: &str = "userCourses";
}

/// A stored document: its key plus the JSON body (the body never contains
/// the key).
#[derive(Debug, Clone)]
pub struct Document {
    pub key: String,
    pub data: Value,
}

/// The external document database, reduced to the operations the service
/// needs: field-equality queries, key lookups, creates (with generated or
/// caller-chosen keys), full replaces, merge updates with an add-to-set
/// field operation, and deletes.
///
/// `create_if_absent` is the conditional create used by enrollment: it only
/// writes when the key is free, so concurrent duplicate requests cannot both
/// succeed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection` whose fields equal every `(field, value)`
    /// pair in `filters`.
    async fn query(&self, collection: &str, filters: &[(&str, Value)])
    -> Result<Vec<Document>, Error>;

    async fn count(&self, collection: &str, filters: &[(&str, Value)]) -> Result<usize, Error>;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, Error>;

    /// Insert `data` under a generated key; returns the key.
    async fn create(&self, collection: &str, data: Value) -> Result<String, Error>;

    /// Insert `data` under `key` only if no document with that key exists.
    /// Returns whether the write happened.
    async fn create_if_absent(
        &self,
        collection: &str,
        key: &str,
        data: Value,
    ) -> Result<bool, Error>;

    /// Full replace, creating the document if absent.
    async fn upsert(&self, collection: &str, key: &str, data: Value) -> Result<(), Error>;

    /// Merge the top-level fields of `fields` into an existing document.
    /// Fails with `NotFound` when the document is absent.
    async fn merge(&self, collection: &str, key: &str, fields: Value) -> Result<(), Error>;

    /// Append `value` to the array field `field` unless it is already
    /// present. The whole operation is one atomic document update.
    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<(), Error>;

    async fn delete(&self, collection: &str, key: &str) -> Result<(), Error>;
}

pub(crate) fn matches_filters(data: &Value, filters: &[(&str, Value)]) -> bool {
    filters
        .iter()
        .all(|(field, value)| data.get(*field) == Some(value))
}

/// In-place add-to-set on a JSON array field. Creates the field as a
/// one-element array when missing; returns an error when the field holds a
/// non-array value.
pub(crate) fn union_into_field(data: &mut Value, field: &str, value: Value) -> Result<(), Error> {
    let Some(obj) = data.as_object_mut() else {
        return Err(Error::Persistence(anyhow::anyhow!(
            "document body is not an object"
        )));
    };
    match obj.get_mut(field) {
        None => {
            obj.insert(field.to_string(), Value::Array(vec![value]));
            Ok(())
        }
        Some(Value::Array(items)) => {
            if !items.contains(&value) {
                items.push(value);
            }
            Ok(())
        }
        Some(_) => Err(Error::Persistence(anyhow::anyhow!(
            "field {field} is not an array"
        ))),
    }
}
