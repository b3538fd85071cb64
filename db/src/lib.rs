use common::error::Res;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use std::{str::FromStr, time::Duration};

pub mod document;
pub mod postgres;

/// Builds a pool without touching the network, so the server can start while
/// the database is down. Connections are opened on first use.
pub fn connect(database_url: &str, require_ssl: bool, acquire_timeout: Duration) -> Res<PgPool> {
    let mut options = PgConnectOptions::from_str(database_url)?;
    if require_ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }

    Ok(PgPoolOptions::new()
        .acquire_timeout(acquire_timeout)
        .connect_lazy_with(options))
}

/// Creates the target database if it does not exist yet, then runs migrations.
pub async fn setup(
    pool: &PgPool,
    database_url: &str,
    require_ssl: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(database_url)?;
    let db_name = url.path().trim_start_matches('/');
    let username = url.username();
    let password = url.password().unwrap_or("");
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(5432);

    let admin_url = format!(
        "postgresql://{}:{}@{}:{}/postgres",
        username, password, host, port
    );

    let mut admin_options = PgConnectOptions::from_str(&admin_url)?;
    if require_ssl {
        admin_options = admin_options.ssl_mode(PgSslMode::Require);
    }

    let admin_pool = PgPool::connect_with(admin_options).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&admin_pool)
            .await?;
        log::info!("Created database {}", db_name);
    }

    admin_pool.close().await;

    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}
