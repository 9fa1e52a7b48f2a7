use std::path::Path;
use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use serde_json::json;

mod aggregate;
mod api;
mod auth;
mod config;
mod db;
mod derived;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod store;
#[cfg(test)]
mod test_support;

use config::{Config, StoreBackend};
use db::init_db;
use store::{MemoryRecordStore, MySqlRecordStore, RecordStore};

use crate::auth::roster::{load_roster, seed_roster};
use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "Team Dashboard API",
        "status": "running"
    }))
}

#[get("/health")]
async fn health(store: Data<dyn RecordStore>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "record_store": store.backend(),
        "timestamp": model::timestamp::format(chrono::Utc::now()),
    }))
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.record_store {
        StoreBackend::Mysql => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when RECORD_STORE=mysql")?;
            let pool = init_db(config, database_url).await?;
            Ok(Arc::new(MySqlRecordStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory record store; data is lost on restart");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}

async fn seed_users(config: &Config, store: &dyn RecordStore) -> anyhow::Result<()> {
    let (Some(file), Some(temp_password)) =
        (&config.authorized_users_file, &config.seed_temp_password)
    else {
        return Ok(());
    };

    let roster = load_roster(Path::new(file))?;
    let created = seed_roster(store, &roster, temp_password).await?;
    info!(file = %file, listed = roster.len(), created, "Roster seeded");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(record_store = %config.record_store, "Server starting...");

    let store = build_store(&config).await?;
    seed_users(&config, store.as_ref()).await?;

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let store_data: Data<dyn RecordStore> = Data::from(store);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store_data.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            .service(health)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
