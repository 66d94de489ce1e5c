use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::ConnectOptions;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::error::{DbError, DbResult};
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgStore;
use crate::database::session::Store;

/// Open the store selected by configuration: Postgres when a URL is set,
/// otherwise the in-process store.
pub async fn connect(config: &DatabaseConfig) -> DbResult<Arc<dyn Store>> {
    match &config.url {
        Some(url) => {
            let store = connect_postgres(url, config).await?;
            if config.run_migrations {
                store.migrate().await?;
            }
            Ok(Arc::new(store))
        }
        None => {
            info!("No DATABASE_URL configured, using in-process store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn connect_postgres(url: &str, config: &DatabaseConfig) -> DbResult<PgStore> {
    let url = validate_database_url(url)?;

    let mut options = PgConnectOptions::from_str(&url)?;
    if !config.enable_query_logging {
        options = options.disable_statement_logging();
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(options)
        .await?;

    info!(
        "Created database pool (max {} connections)",
        config.max_connections
    );
    Ok(PgStore::from_pool(pool))
}

/// Accept only postgres URLs that name a database
fn validate_database_url(raw: &str) -> DbResult<String> {
    let url = url::Url::parse(raw).map_err(|_| DbError::InvalidDatabaseUrl)?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(DbError::InvalidDatabaseUrl);
    }
    let database = url.path().trim_start_matches('/');
    if database.is_empty() || database.contains('/') {
        return Err(DbError::InvalidDatabaseUrl);
    }
    Ok(url.into())
}
