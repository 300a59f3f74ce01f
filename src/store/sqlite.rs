use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::error::Error;
use crate::utils::generate_key;

use super::{Document, DocumentStore, union_into_field};

/// Production store: one `documents` table keyed by `(collection, key)`,
/// bodies stored as JSON text. Merge and add-to-set run inside a transaction
/// so each document update stays atomic.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::init(pool).await
    }

    pub async fn in_memory() -> Result<Self, Error> {
        // a pooled ":memory:" database is private per connection; a second
        // connection would see an empty database, so cap the pool at one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::query(
            "create table if not exists documents (
                collection text not null,
                key text not null,
                data text not null,
                primary key (collection, key)
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// `where` clause for field-equality filters, pushed down with
    /// `json_extract`. Paths and values are bound parameters.
    fn filter_sql(base: &str, filters: &[(&str, Value)]) -> String {
        let mut sql = format!("{base} where collection = ?");
        for _ in filters {
            sql.push_str(" and json_extract(data, ?) = ?");
        }
        sql
    }
}

fn bind_filters<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filters: &[(&str, Value)],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for (field, value) in filters {
        query = query.bind(format!("$.{field}"));
        query = match value {
            Value::String(s) => query.bind(s.clone()),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Number(n) => query.bind(n.as_f64()),
            Value::Bool(b) => query.bind(*b),
            other => query.bind(other.to_string()),
        };
    }
    query
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<Document>, Error> {
        let sql = format!(
            "{} order by key",
            Self::filter_sql("select key, data from documents", filters)
        );
        let query = bind_filters(sqlx::query(&sql).bind(collection), filters);
        let rows = query.fetch_all(&self.pool).await?;
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let data: String = row.try_get("data")?;
            docs.push(Document {
                key,
                data: serde_json::from_str(&data)?,
            });
        }
        Ok(docs)
    }

    async fn count(&self, collection: &str, filters: &[(&str, Value)]) -> Result<usize, Error> {
        let sql = Self::filter_sql("select count(*) from documents", filters);
        let row = bind_filters(sqlx::query(&sql).bind(collection), filters)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as usize)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, Error> {
        let row = sqlx::query("select data from documents where collection = ? and key = ?")
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, collection: &str, data: Value) -> Result<String, Error> {
        let key = generate_key();
        sqlx::query("insert into documents (collection, key, data) values (?, ?, ?)")
            .bind(collection)
            .bind(&key)
            .bind(data.to_string())
            .execute(&self.pool)
            .await?;
        Ok(key)
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        key: &str,
        data: Value,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "insert into documents (collection, key, data) values (?, ?, ?)
             on conflict (collection, key) do nothing",
        )
        .bind(collection)
        .bind(key)
        .bind(data.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert(&self, collection: &str, key: &str, data: Value) -> Result<(), Error> {
        sqlx::query(
            "insert into documents (collection, key, data) values (?, ?, ?)
             on conflict (collection, key) do update set data = excluded.data",
        )
        .bind(collection)
        .bind(key)
        .bind(data.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn merge(&self, collection: &str, key: &str, fields: Value) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("select data from documents where collection = ? and key = ?")
            .bind(collection)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound("document"));
        };
        let data: String = row.try_get("data")?;
        let mut doc: Value = serde_json::from_str(&data)?;
        let (Some(obj), Some(new)) = (doc.as_object_mut(), fields.as_object()) else {
            return Err(Error::Persistence(anyhow::anyhow!(
                "merge requires object documents"
            )));
        };
        for (field, value) in new {
            obj.insert(field.clone(), value.clone());
        }
        sqlx::query("update documents set data = ? where collection = ? and key = ?")
            .bind(doc.to_string())
            .bind(collection)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("select data from documents where collection = ? and key = ?")
            .bind(collection)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(Error::NotFound("document"));
        };
        let data: String = row.try_get("data")?;
        let mut doc: Value = serde_json::from_str(&data)?;
        union_into_field(&mut doc, field, value)?;
        sqlx::query("update documents set data = ? where collection = ? and key = ?")
            .bind(doc.to_string())
            .bind(collection)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), Error> {
        sqlx::query("delete from documents where collection = ? and key = ?")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrip_and_union() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert("userCourses", "u_c", json!({ "completedLessons": [] }))
            .await
            .unwrap();
        store
            .array_union("userCourses", "u_c", "completedLessons", json!("a"))
            .await
            .unwrap();
        store
            .array_union("userCourses", "u_c", "completedLessons", json!("a"))
            .await
            .unwrap();
        let doc = store.get("userCourses", "u_c").await.unwrap().unwrap();
        assert_eq!(doc["completedLessons"], json!(["a"]));
    }

    #[tokio::test]
    async fn conditional_create_reports_collision() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(
            store
                .create_if_absent("userCourses", "u_c", json!({}))
                .await
                .unwrap()
        );
        assert!(
            !store
                .create_if_absent("userCourses", "u_c", json!({}))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn query_filters_by_field_equality() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create("lessons", json!({ "courseId": "c1", "order": 0 }))
            .await
            .unwrap();
        store
            .create("lessons", json!({ "courseId": "c1", "order": 1 }))
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
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.data["courseId"] == json!("c1")));

        let one = store
            .query("lessons", &[("courseId", json!("c1")), ("order", json!(1))])
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(
            store
                .count("lessons", &[("courseId", json!("c2"))])
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count("lessons", &[("courseId", json!("ghost"))])
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn in_memory_data_survives_concurrent_access() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert("courses", "c1", json!({ "title": "Rust" }))
            .await
            .unwrap();
        // concurrent reads would each get a private empty database if the
        // pool opened more than one ":memory:" connection
        let (a, b, c) = tokio::join!(
            store.get("courses", "c1"),
            store.get("courses", "c1"),
            store.count("courses", &[]),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(c.unwrap(), 1);
    }

    #[tokio::test]
    async fn persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");
        {
            let store = SqliteStore::connect(&path).await.unwrap();
            store
                .upsert("courses", "c1", json!({ "title": "Rust" }))
                .await
                .unwrap();
        }
        let store = SqliteStore::connect(&path).await.unwrap();
        let doc = store.get("courses", "c1").await.unwrap().unwrap();
        assert_eq!(doc["title"], json!("Rust"));
    }
}
