use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::Error;
use crate::utils::generate_key;

use super::{Document, DocumentStore, matches_filters, union_into_field};

/// In-process store used by tests. One `DashMap` entry per collection; the
/// shard lock makes every single-document operation atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<Document>, Error> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .iter()
            .filter(|(_, data)| matches_filters(data, filters))
            .map(|(key, data)| Document {
                key: key.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filters: &[(&str, Value)]) -> Result<usize, Error> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(0);
        };
        Ok(coll
            .values()
            .filter(|data| matches_filters(data, filters))
            .count())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|coll| coll.get(key).cloned()))
    }

    async fn create(&self, collection: &str, data: Value) -> Result<String, Error> {
        let key = generate_key();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.clone(), data);
        Ok(key)
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        key: &str,
        data: Value,
    ) -> Result<bool, Error> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        if coll.contains_key(key) {
            return Ok(false);
        }
        coll.insert(key.to_string(), data);
        Ok(true)
    }

    async fn upsert(&self, collection: &str, key: &str, data: Value) -> Result<(), Error> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn merge(&self, collection: &str, key: &str, fields: Value) -> Result<(), Error> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        let Some(doc) = coll.get_mut(key) else {
            return Err(Error::NotFound("document"));
        };
        let (Some(obj), Some(new)) = (doc.as_object_mut(), fields.as_object()) else {
            return Err(Error::Persistence(anyhow::anyhow!(
                "merge requires object documents"
            )));
        };
        for (field, value) in new {
            obj.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<(), Error> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        let Some(doc) = coll.get_mut(key) else {
            return Err(Error::NotFound("document"));
        };
        union_into_field(doc, field, value)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), Error> {
        if let Some(mut coll) = self.collections.get_mut(collection) {
            coll.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn query_filters_by_field_equality() {
        let store = MemoryStore::new();
        store
            .create("lessons", json!({ "courseId": "c1", "order": 0 }))
            .await
            .unwrap();
        store
            .create("lessons", json!({ "courseId": "c2", "order": 0 }))
            .await
            .unwrap();

        let docs = store
            .query("lessons", &[("courseId", json!("c1"))])
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["courseId"], json!("c1"));
    }

    #[tokio::test]
    async fn conditional_create_only_writes_once() {
        let store = MemoryStore::new();
        assert!(
            store
                .create_if_absent("userCourses", "u_c", json!({ "userId": "u" }))
                .await
                .unwrap()
        );
        assert!(
            !store
                .create_if_absent("userCourses", "u_c", json!({ "userId": "other" }))
                .await
                .unwrap()
        );
        let doc = store.get("userCourses", "u_c").await.unwrap().unwrap();
        assert_eq!(doc["userId"], json!("u"));
    }

    #[tokio::test]
    async fn merge_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .merge("users", "missing", json!({ "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
