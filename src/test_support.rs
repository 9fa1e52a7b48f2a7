//! Shared fixtures for handler and aggregation tests.

use std::net::SocketAddr;

use actix_web::rt::task::yield_now;
use actix_web::test::TestRequest;
use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{auth::AuthUser, jwt::generate_access_token};
use crate::config::{Config, StoreBackend};
use crate::model::role::Role;
use crate::store::{Collection, Filter, Query, Record, RecordStore, StoreError};

pub const TEST_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        access_token_ttl: 3600,
        record_store: StoreBackend::Memory,
        database_url: None,
        db_max_connections: 1,
        db_acquire_timeout_secs: 1,
        rate_login_per_min: 1000,
        rate_protected_per_min: 1000,
        api_prefix: "/api".to_string(),
        authorized_users_file: None,
        seed_temp_password: None,
        missed_meeting_penalty: 5,
    }
}

/// Store whose every call fails as if the database were down.
pub struct FailingStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl RecordStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn find(&self, _: Collection, _: Query) -> Result<Vec<Record>, StoreError> {
        Err(down())
    }

    async fn count(&self, _: Collection, _: Vec<Filter>) -> Result<u64, StoreError> {
        Err(down())
    }

    async fn get(&self, _: Collection, _: &str) -> Result<Record, StoreError> {
        Err(down())
    }

    async fn insert(&self, _: Collection, _: Record) -> Result<Record, StoreError> {
        Err(down())
    }

    async fn update_where(
        &self,
        _: Collection,
        _: &str,
        _: Vec<Filter>,
        _: Record,
    ) -> Result<Record, StoreError> {
        Err(down())
    }

    async fn delete(&self, _: Collection, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
}

/// Store that hands control back to the runtime before every call, so two
/// requests joined on one task interleave between their read and write.
pub struct YieldingStore<S>(pub S);

#[async_trait]
impl<S: RecordStore> RecordStore for YieldingStore<S> {
    fn backend(&self) -> &'static str {
        self.0.backend()
    }

    async fn find(&self, collection: Collection, query: Query) -> Result<Vec<Record>, StoreError> {
        yield_now().await;
        self.0.find(collection, query).await
    }

    async fn count(&self, collection: Collection, filters: Vec<Filter>) -> Result<u64, StoreError> {
        yield_now().await;
        self.0.count(collection, filters).await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        yield_now().await;
        self.0.get(collection, id).await
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        yield_now().await;
        self.0.insert(collection, record).await
    }

    async fn update_where(
        &self,
        collection: Collection,
        id: &str,
        guard: Vec<Filter>,
        patch: Record,
    ) -> Result<Record, StoreError> {
        yield_now().await;
        self.0.update_where(collection, id, guard, patch).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        yield_now().await;
        self.0.delete(collection, id).await
    }
}

/// Inserts a raw JSON object and returns the stored record.
pub async fn insert(store: &dyn RecordStore, collection: Collection, value: Value) -> Record {
    match value {
        Value::Object(record) => store.insert(collection, record).await.unwrap(),
        other => panic!("expected an object, got {other}"),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: "admin-1".to_string(),
        email: "admin@example.com".to_string(),
        name: "Admin".to_string(),
        role: Role::Admin,
    }
}

pub fn member(user_id: &str, name: &str) -> AuthUser {
    AuthUser {
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        name: name.to_string(),
        role: Role::Member,
    }
}

/// Adds the peer address the rate limiter keys on and a bearer token for
/// `user`.
pub fn as_user(req: TestRequest, user: &AuthUser) -> TestRequest {
    let token = generate_access_token(
        &user.user_id,
        &user.email,
        &user.name,
        user.role,
        TEST_SECRET,
        3600,
    )
    .unwrap();
    anonymous(req).insert_header(("Authorization", format!("Bearer {token}")))
}

pub fn anonymous(req: TestRequest) -> TestRequest {
    let peer: SocketAddr = "127.0.0.1:12345".parse().unwrap();
    req.peer_addr(peer)
}

/// Builds the full application around `$store` (an `Arc<dyn RecordStore>`).
macro_rules! test_app {
    ($store:expr) => {{
        let config = $crate::test_support::test_config();
        let store: std::sync::Arc<dyn $crate::store::RecordStore> = $store;
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::from(store))
                .app_data(actix_web::web::Data::new(config.clone()))
                .configure(|cfg| $crate::routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

pub(crate) use test_app;
