//! Record store adapter.
//!
//! Every entity lives in a named [`Collection`] as a flat JSON object. The
//! [`RecordStore`] trait is what handlers and the aggregation layer talk to;
//! the concrete backend is picked at startup and injected as
//! `web::Data<dyn RecordStore>`.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub mod memory;
pub mod mysql;

pub use memory::MemoryRecordStore;
pub use mysql::MySqlRecordStore;

/// A stored record: flat field → value mapping.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Users,
    Projects,
    Tasks,
    LeaveRequests,
    KudosTransactions,
    Meetings,
    MeetingAttendance,
    FinanceTransactions,
    SalaryRecords,
    Attendance,
    TrainingCourses,
    TrainingProgress,
}

impl Collection {
    /// Fields that together must be unique within the collection.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            Collection::Attendance => &["user_id", "date"],
            Collection::TrainingProgress => &["user_id", "course_id"],
            Collection::MeetingAttendance => &["meeting_id", "user_id"],
            Collection::KudosTransactions => &["source_ref"],
            _ => &[],
        }
    }

    /// Unique key of `record`, or `None` when the collection has no unique
    /// fields or one of them is missing/null (nulls never collide).
    pub fn unique_key(&self, record: &Record) -> Option<String> {
        let fields = self.unique_fields();
        if fields.is_empty() {
            return None;
        }

        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            match record.get(*field) {
                None | Some(Value::Null) => return None,
                Some(value) => parts.push(render(value)),
            }
        }
        Some(parts.join("|"))
    }
}

/// Conjunctive predicate on a single field.
///
/// Field names are `&'static str` so they can only come from code, never
/// from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    /// Matches only records where the field is present and differs.
    Ne(&'static str, Value),
    /// Array field contains the value.
    Contains(&'static str, Value),
    /// Lexical `>=`; timestamps are stored fixed-width so this is chronological.
    Gte(&'static str, Value),
    StartsWith(&'static str, String),
    /// Field is absent or null.
    Missing(&'static str),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn ne(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Ne(field, value.into())
    }

    pub fn contains(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Contains(field, value.into())
    }

    pub fn gte(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Gte(field, value.into())
    }

    pub fn starts_with(field: &'static str, prefix: impl Into<String>) -> Self {
        Filter::StartsWith(field, prefix.into())
    }

    pub fn missing(field: &'static str) -> Self {
        Filter::Missing(field)
    }

    pub fn field(&self) -> &'static str {
        match self {
            Filter::Eq(f, _)
            | Filter::Ne(f, _)
            | Filter::Contains(f, _)
            | Filter::Gte(f, _)
            | Filter::StartsWith(f, _)
            | Filter::Missing(f) => f,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let field = match record.get(self.field()) {
            None | Some(Value::Null) => return matches!(self, Filter::Missing(_)),
            Some(v) => v,
        };

        match self {
            Filter::Eq(_, value) => render(field) == render(value),
            Filter::Ne(_, value) => render(field) != render(value),
            Filter::Contains(_, value) => field
                .as_array()
                .map(|items| items.iter().any(|item| render(item) == render(value)))
                .unwrap_or(false),
            Filter::Gte(_, value) => render(field) >= render(value),
            Filter::StartsWith(_, prefix) => render(field).starts_with(prefix.as_str()),
            Filter::Missing(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: &'static str,
    pub direction: Direction,
}

impl Order {
    pub fn asc(field: &'static str) -> Self {
        Self { field, direction: Direction::Asc }
    }

    pub fn desc(field: &'static str) -> Self {
        Self { field, direction: Direction::Desc }
    }
}

/// Filters, optional sort and optional limit. Without an order records come
/// back in insertion order; the limit is applied after sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: String },

    /// Unique key already taken, or a guarded update found the record changed.
    #[error("{collection} record conflict ({key})")]
    Conflict { collection: Collection, key: String },

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed {collection} record: {source}")]
    Malformed {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    async fn find(&self, collection: Collection, query: Query) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, collection: Collection, filters: Vec<Filter>) -> Result<u64, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Record, StoreError>;

    /// Stores `record` with a generated `id` and `created_at`, overwriting
    /// any caller-supplied values for those two fields.
    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, StoreError>;

    /// Merges `patch` into the record and returns the result. `id` and
    /// `created_at` cannot be patched.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Record, StoreError> {
        self.update_where(collection, id, Vec::new(), patch).await
    }

    /// Like [`RecordStore::update`], but only while the stored record still
    /// matches every filter in `guard`; otherwise `Conflict`. Checking the
    /// guard and writing the patch happen atomically.
    async fn update_where(
        &self,
        collection: Collection,
        id: &str,
        guard: Vec<Filter>,
        patch: Record,
    ) -> Result<Record, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

/// Typed helpers over any [`RecordStore`].
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn find_as<T>(&self, collection: Collection, query: Query) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let records = self.find(collection, query).await?;
        decode_all(collection, records)
    }

    async fn get_as<T>(&self, collection: Collection, id: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let record = self.get(collection, id).await?;
        decode(collection, record)
    }

    async fn insert_as<N, T>(&self, collection: Collection, value: &N) -> Result<T, StoreError>
    where
        N: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let record = encode(collection, value)?;
        let stored = self.insert(collection, record).await?;
        decode(collection, stored)
    }

    async fn update_as<P, T>(&self, collection: Collection, id: &str, patch: &P) -> Result<T, StoreError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let patch = encode(collection, patch)?;
        let stored = self.update(collection, id, patch).await?;
        decode(collection, stored)
    }

    async fn update_where_as<P, T>(
        &self,
        collection: Collection,
        id: &str,
        guard: Vec<Filter>,
        patch: &P,
    ) -> Result<T, StoreError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let patch = encode(collection, patch)?;
        let stored = self.update_where(collection, id, guard, patch).await?;
        decode(collection, stored)
    }
}

/// Checks `guard` against the current state of a record about to be patched.
pub(crate) fn check_guard(
    collection: Collection,
    id: &str,
    guard: &[Filter],
    current: &Record,
) -> Result<(), StoreError> {
    match guard.iter().find(|f| !f.matches(current)) {
        None => Ok(()),
        Some(failed) => Err(StoreError::Conflict {
            collection,
            key: format!("{id}: {} changed", failed.field()),
        }),
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

pub fn decode<T: DeserializeOwned>(collection: Collection, record: Record) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|source| StoreError::Malformed { collection, source })
}

pub fn decode_all<T: DeserializeOwned>(
    collection: Collection,
    records: Vec<Record>,
) -> Result<Vec<T>, StoreError> {
    records.into_iter().map(|r| decode(collection, r)).collect()
}

pub fn encode<T: Serialize + ?Sized>(collection: Collection, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Malformed {
            collection,
            source: <serde_json::Error as serde::ser::Error>::custom("expected a JSON object"),
        }),
        Err(source) => Err(StoreError::Malformed { collection, source }),
    }
}

/// Comparable text form of a value: strings unquoted, everything else as JSON.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
