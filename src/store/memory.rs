use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{
    Collection, Direction, Filter, Query, Record, RecordStore, StoreError, check_guard, render,
};
use crate::model::timestamp;

#[derive(Default)]
struct State {
    collections: HashMap<Collection, Vec<Record>>,
    last_created: Option<DateTime<Utc>>,
}

impl State {
    /// `created_at` strictly increases so "most recent" ordering is total.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_created {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(next);
        next
    }
}

/// Process-local store with the same semantics as the MySQL backend.
/// Used for `RECORD_STORE=memory` runs and as the fake store in tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<State>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

fn not_found(collection: Collection, id: &str) -> StoreError {
    StoreError::NotFound {
        collection,
        id: id.to_string(),
    }
}

fn same_id(record: &Record, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}

fn sort_key(record: &Record, field: &str) -> Option<String> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(v) => Some(render(v)),
    }
}

fn check_unique(
    collection: Collection,
    records: &[Record],
    candidate: &Record,
    skip_id: Option<&str>,
) -> Result<(), StoreError> {
    let Some(key) = collection.unique_key(candidate) else {
        return Ok(());
    };

    let taken = records.iter().any(|r| {
        let is_self = skip_id.map(|id| same_id(r, id)).unwrap_or(false);
        !is_self && collection.unique_key(r).as_deref() == Some(key.as_str())
    });

    if taken {
        return Err(StoreError::Conflict { collection, key });
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: Collection, query: Query) -> Result<Vec<Record>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;

        let mut records: Vec<Record> = state
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            // stable: ties keep insertion order
            records.sort_by(|a, b| {
                let ordering = sort_key(a, order.field).cmp(&sort_key(b, order.field));
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn count(&self, collection: Collection, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let state = self.state.read().map_err(poisoned)?;

        let total = state
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .count()
            })
            .unwrap_or(0);

        Ok(total as u64)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        let state = self.state.read().map_err(poisoned)?;

        state
            .collections
            .get(&collection)
            .and_then(|records| records.iter().find(|r| same_id(r, id)))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<Record, StoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let created_at = state.next_created_at();

        record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        record.insert(
            "created_at".into(),
            Value::String(timestamp::format(created_at)),
        );

        let records = state.collections.entry(collection).or_default();
        check_unique(collection, records, &record, None)?;
        records.push(record.clone());

        Ok(record)
    }

    async fn update_where(
        &self,
        collection: Collection,
        id: &str,
        guard: Vec<Filter>,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let records = state
            .collections
            .get_mut(&collection)
            .ok_or_else(|| not_found(collection, id))?;

        let position = records
            .iter()
            .position(|r| same_id(r, id))
            .ok_or_else(|| not_found(collection, id))?;

        check_guard(collection, id, &guard, &records[position])?;

        let mut merged = records[position].clone();
        for (field, value) in patch {
            if field == "id" || field == "created_at" {
                continue;
            }
            merged.insert(field, value);
        }

        check_unique(collection, records, &merged, Some(id))?;
        records[position] = merged.clone();

        Ok(merged)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let records = state
            .collections
            .get_mut(&collection)
            .ok_or_else(|| not_found(collection, id))?;

        let before = records.len();
        records.retain(|r| !same_id(r, id));

        if records.len() == before {
            return Err(not_found(collection, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Order;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[actix_web::test]
    async fn insert_assigns_id_and_increasing_created_at() {
        let store = MemoryRecordStore::new();

        let first = store
            .insert(Collection::Projects, record(json!({"name": "a", "id": "forged"})))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Projects, record(json!({"name": "b"})))
            .await
            .unwrap();

        assert_ne!(first["id"], json!("forged"));
        assert!(first["created_at"].as_str().unwrap() < second["created_at"].as_str().unwrap());
    }

    #[actix_web::test]
    async fn find_sorts_before_truncating() {
        let store = MemoryRecordStore::new();
        for start in ["2024-01-03", "2024-01-01", "2024-01-02"] {
            store
                .insert(Collection::Meetings, record(json!({"start_time": start})))
                .await
                .unwrap();
        }

        let found = store
            .find(
                Collection::Meetings,
                Query::new().order(Order::asc("start_time")).limit(2),
            )
            .await
            .unwrap();

        let starts: Vec<_> = found.iter().map(|r| r["start_time"].clone()).collect();
        assert_eq!(starts, vec![json!("2024-01-01"), json!("2024-01-02")]);
    }

    #[actix_web::test]
    async fn duplicate_unique_key_is_a_conflict() {
        let store = MemoryRecordStore::new();
        let row = json!({"user_id": "u1", "date": "2024-01-01"});

        store.insert(Collection::Attendance, record(row.clone())).await.unwrap();
        let err = store
            .insert(Collection::Attendance, record(row))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[actix_web::test]
    async fn update_and_delete_unknown_id_are_not_found() {
        let store = MemoryRecordStore::new();

        let err = store
            .update(Collection::Tasks, "nope", record(json!({"status": "done"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store.delete(Collection::Tasks, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[actix_web::test]
    async fn guarded_update_only_applies_while_the_guard_holds() {
        let store = MemoryRecordStore::new();
        let leave = store
            .insert(Collection::LeaveRequests, record(json!({"status": "pending"})))
            .await
            .unwrap();
        let id = leave["id"].as_str().unwrap();
        let pending = || vec![Filter::eq("status", "pending")];

        let approved = store
            .update_where(Collection::LeaveRequests, id, pending(), record(json!({"status": "approved"})))
            .await
            .unwrap();
        assert_eq!(approved["status"], json!("approved"));

        let err = store
            .update_where(Collection::LeaveRequests, id, pending(), record(json!({"status": "rejected"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let stored = store.get(Collection::LeaveRequests, id).await.unwrap();
        assert_eq!(stored["status"], json!("approved"));
    }

    #[actix_web::test]
    async fn update_merges_patch_and_keeps_identity() {
        let store = MemoryRecordStore::new();
        let task = store
            .insert(Collection::Tasks, record(json!({"title": "t", "status": "todo"})))
            .await
            .unwrap();
        let id = task["id"].as_str().unwrap();

        let updated = store
            .update(
                Collection::Tasks,
                id,
                record(json!({"status": "done", "id": "other", "created_at": "x"})),
            )
            .await
            .unwrap();

        assert_eq!(updated["status"], json!("done"));
        assert_eq!(updated["title"], json!("t"));
        assert_eq!(updated["id"], task["id"]);
        assert_eq!(updated["created_at"], task["created_at"]);
        assert_eq!(
            store
                .count(Collection::Tasks, vec![Filter::eq("status", "done")])
                .await
                .unwrap(),
            1
        );
    }
}
