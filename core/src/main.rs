mod cors;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use api_keys::{
    KeyManager,
    service::generator::KeyGenerator,
    store::backend::BackendHandle,
};
use common::env_config::Config;
use db::postgres::PgDocumentStore;

/// Picks the key backend: the document store when `DATABASE_URL` is set,
/// the in-memory index otherwise. The document store is still probed before
/// every operation, so a database that is down here only costs durability.
async fn key_backend(config: &Config) -> BackendHandle {
    let Some(database_url) = config.database_url.as_deref() else {
        log::warn!("DATABASE_URL not set, API keys are kept in memory only");
        return BackendHandle::memory_only();
    };

    let timeout = config.document_store_timeout;
    let pool = match db::connect(database_url, config.is_production(), timeout) {
        Ok(pool) => pool,
        Err(error) => {
            log::error!("Invalid DATABASE_URL, falling back to memory: {}", error);
            return BackendHandle::memory_only();
        }
    };

    if let Err(error) = db::setup(&pool, database_url, config.is_production()).await {
        log::warn!("Document store setup failed, will retry lazily: {}", error);
    }

    BackendHandle::with_document_store(Arc::new(PgDocumentStore::new(pool, timeout)), timeout)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file).map_err(std::io::Error::other)?;
    }

    let generator = KeyGenerator::new(config.api_key_config.prefix.clone())
        .with_default_length(config.api_key_config.length);
    let manager = web::Data::new(KeyManager::new(key_backend(&config).await, generator));
    let jwt_config = web::Data::new(config.jwt_config.clone());

    let origin = config.cors_allowed_origin.clone();
    let max_key_length = config.api_key_config.max_header_length;

    log::info!(
        "Starting server on {}:{} ({} backend)",
        config.server_host,
        config.server_port,
        manager.backend_name().await
    );

    HttpServer::new(move || {
        App::new()
            .app_data(manager.clone())
            .app_data(jwt_config.clone())
            .wrap(logger::middleware()) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(api_keys::routes::key::get_status)
            .service(
                web::scope("/api")
                    .service(api_keys::mount_keys())
                    .service(api_keys::mount_gated().wrap(api_keys::middleware(max_key_length))),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
