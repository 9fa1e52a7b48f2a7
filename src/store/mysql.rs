use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::{MySqlPool, types::Json};
use uuid::Uuid;

use super::{
    Collection, Direction, Filter, Query, Record, RecordStore, StoreError, check_guard, render,
};
use crate::model::timestamp;

/// Records are JSON documents in the `records` table, one row per record.
/// See `db::init_db` for the DDL.
#[derive(Clone)]
pub struct MySqlRecordStore {
    pool: MySqlPool,
}

impl MySqlRecordStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[inline]
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

fn escape_like(prefix: &str) -> String {
    let mut escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    escaped.push('%');
    escaped
}

/// Appends `WHERE` predicates for `filters`, pushing bind values in
/// placeholder order.
fn push_filters(sql: &mut String, args: &mut Vec<String>, filters: &[Filter]) {
    for filter in filters {
        args.push(json_path(filter.field()));
        match filter {
            Filter::Eq(_, value) => {
                sql.push_str(" AND JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) = ?");
                args.push(render(value));
            }
            Filter::Ne(_, value) => {
                sql.push_str(" AND JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) <> ?");
                args.push(render(value));
            }
            Filter::Gte(_, value) => {
                sql.push_str(" AND JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) >= ?");
                args.push(render(value));
            }
            Filter::Contains(field, value) => {
                // JSON_CONTAINS also matches an equal scalar, so require an array
                sql.push_str(
                    " AND JSON_TYPE(JSON_EXTRACT(doc, ?)) = 'ARRAY' AND JSON_CONTAINS(JSON_EXTRACT(doc, ?), ?)",
                );
                args.push(json_path(field));
                args.push(value.to_string());
            }
            Filter::StartsWith(_, prefix) => {
                sql.push_str(" AND JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) LIKE ?");
                args.push(escape_like(prefix));
            }
            Filter::Missing(field) => {
                sql.push_str(
                    " AND (JSON_EXTRACT(doc, ?) IS NULL OR JSON_TYPE(JSON_EXTRACT(doc, ?)) = 'NULL')",
                );
                args.push(json_path(field));
            }
        }
    }
}

fn store_error(collection: Collection, key: Option<&str>, e: sqlx::Error) -> StoreError {
    // Duplicate unique key
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") {
            return StoreError::Conflict {
                collection,
                key: key.unwrap_or_default().to_string(),
            };
        }
    }

    tracing::error!(error = %e, %collection, "Record store call failed");
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn find(&self, collection: Collection, query: Query) -> Result<Vec<Record>, StoreError> {
        let mut sql = String::from("SELECT doc FROM records WHERE collection = ?");
        let mut args = vec![collection.as_ref().to_string()];

        push_filters(&mut sql, &mut args, &query.filters);

        match &query.order {
            Some(order) => {
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) {}, created_at ASC, id ASC",
                    direction
                ));
                args.push(json_path(order.field));
            }
            None => sql.push_str(" ORDER BY created_at ASC, id ASC"),
        }

        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        tracing::debug!(sql = %sql, args = ?args, "Finding records");

        let mut q = sqlx::query_scalar::<_, Json<Record>>(&sql);
        for arg in args {
            q = q.bind(arg);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as u64);
        }

        q.fetch(&self.pool)
            .map_ok(|Json(doc)| doc)
            .try_collect()
            .await
            .map_err(|e| store_error(collection, None, e))
    }

    async fn count(&self, collection: Collection, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let mut sql = String::from("SELECT COUNT(*) FROM records WHERE collection = ?");
        let mut args = vec![collection.as_ref().to_string()];
        push_filters(&mut sql, &mut args, &filters);

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for arg in args {
            q = q.bind(arg);
        }

        let total = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error(collection, None, e))?;

        Ok(total.max(0) as u64)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        let doc = sqlx::query_scalar::<_, Json<Record>>(
            "SELECT doc FROM records WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_ref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(collection, None, e))?;

        match doc {
            Some(Json(doc)) => Ok(doc),
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<Record, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        record.insert("id".into(), Value::String(id.clone()));
        record.insert(
            "created_at".into(),
            Value::String(timestamp::format(created_at)),
        );
        let unique_key = collection.unique_key(&record);

        sqlx::query(
            r#"
            INSERT INTO records (id, collection, unique_key, doc, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(collection.as_ref())
        .bind(unique_key.as_deref())
        .bind(Json(&record))
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(collection, unique_key.as_deref(), e))?;

        Ok(record)
    }

    async fn update_where(
        &self,
        collection: Collection,
        id: &str,
        guard: Vec<Filter>,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error(collection, None, e))?;

        let current = sqlx::query_scalar::<_, Json<Record>>(
            "SELECT doc FROM records WHERE collection = ? AND id = ? FOR UPDATE",
        )
        .bind(collection.as_ref())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error(collection, None, e))?;

        // dropping `tx` rolls back
        let Some(Json(mut doc)) = current else {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        };

        // row is locked until commit, so the guard cannot go stale
        check_guard(collection, id, &guard, &doc)?;

        for (field, value) in patch {
            if field == "id" || field == "created_at" {
                continue;
            }
            doc.insert(field, value);
        }
        let unique_key = collection.unique_key(&doc);

        sqlx::query(
            "UPDATE records SET doc = ?, unique_key = ? WHERE collection = ? AND id = ?",
        )
        .bind(Json(&doc))
        .bind(unique_key.as_deref())
        .bind(collection.as_ref())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error(collection, unique_key.as_deref(), e))?;

        tx.commit()
            .await
            .map_err(|e| store_error(collection, None, e))?;

        Ok(doc)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection.as_ref())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(collection, None, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
