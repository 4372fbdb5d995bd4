pub mod channel_repository;
pub mod error;
pub mod session_repository;
pub mod user_repository;

pub use channel_repository::{PaymentChannel, PaymentChannelRepository};
pub use error::DatabaseError;
pub use session_repository::{CheckoutSession, CheckoutSessionRepository, SessionStatus};
pub use user_repository::UserRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error as log_error, info, warn};

use crate::config::DatabaseConfig;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool.
///
/// Every connection pins its search path to the configured schema, so the
/// repositories can use unqualified table names.
pub async fn init_pool(
    database_url: &str,
    schema: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        "Initializing database pool: max_connections={}, min_connections={}, connection_timeout={:?}",
        config.max_connections, config.min_connections, config.connection_timeout
    );

    let schema = schema.to_string();
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .after_connect(move |conn, _meta| {
            let schema = schema.clone();
            Box::pin(async move {
                let sql = format!("SET search_path TO {}, public", schema);
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    // Test the connection
    pool.acquire().await.map_err(|e| {
        log_error!("Failed to acquire test connection: {}", e);
        DatabaseError::from_sqlx(e)
    })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Initialize the database pool from application configuration
pub async fn init_pool_from_config(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool_config = PoolConfig {
        max_connections: config.max_connections,
        min_connections: config.min_connections,
        connection_timeout: Duration::from_secs(config.connection_timeout),
        ..PoolConfig::default()
    };

    init_pool(&config.url, &config.schema, Some(pool_config)).await
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    let _result = sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!("Health check failed: {}", e);
        DatabaseError::from_sqlx(e)
    })?;

    Ok(())
}

const PROVISION_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS checkout_sessions (
        id UUID PRIMARY KEY,
        trace_id TEXT,
        invoice_reference TEXT,
        invoice_id TEXT,
        billed_entity_name TEXT,
        space_id TEXT,
        space_name TEXT,
        amount NUMERIC(18,2) NOT NULL,
        raw_payload TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        selected_channel_code TEXT,
        payment_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_checkout_sessions_created_at
        ON checkout_sessions (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_checkout_sessions_status
        ON checkout_sessions (status)",
    "CREATE TABLE IF NOT EXISTS payment_channels (
        id BIGSERIAL PRIMARY KEY,
        code TEXT NOT NULL,
        display_name TEXT NOT NULL,
        country TEXT NOT NULL,
        currency TEXT NOT NULL,
        min_amount NUMERIC(18,2) NOT NULL,
        max_amount NUMERIC(18,2),
        is_refundable BOOLEAN NOT NULL DEFAULT FALSE,
        supports_save BOOLEAN NOT NULL DEFAULT FALSE,
        supports_reusable_code BOOLEAN NOT NULL DEFAULT FALSE,
        supports_mit BOOLEAN NOT NULL DEFAULT FALSE,
        channel_type TEXT NOT NULL,
        UNIQUE (code, country, currency)
    )",
    "CREATE TABLE IF NOT EXISTS admin_users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        display_name TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS password_reset_tokens (
        token TEXT PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES admin_users (id),
        expires_at TIMESTAMPTZ NOT NULL,
        used_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

static BOOTSTRAP: OnceCell<()> = OnceCell::const_new();

/// One-time, process-wide provisioning: schema, tables, indexes and the
/// channel seed catalog.
///
/// Concurrent first callers serialize on the cell and the work runs exactly
/// once; after the first success the readiness is never re-verified against
/// the database.
pub async fn ensure_ready(pool: &PgPool, schema: &str) -> Result<(), DatabaseError> {
    BOOTSTRAP
        .get_or_try_init(|| async { provision(pool, schema).await })
        .await?;
    Ok(())
}

async fn provision(pool: &PgPool, schema: &str) -> Result<(), DatabaseError> {
    info!(schema = %schema, "provisioning database schema");

    let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
    sqlx::query(&create_schema)
        .execute(pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

    for ddl in PROVISION_DDL {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
    }

    PaymentChannelRepository::new(pool.clone())
        .seed_catalog()
        .await?;

    info!("database provisioning complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_covers_all_tables() {
        let joined = PROVISION_DDL.join("\n");
        for table in [
            "checkout_sessions",
            "payment_channels",
            "admin_users",
            "password_reset_tokens",
        ] {
            assert!(joined.contains(table), "missing DDL for {}", table);
        }
    }

    #[test]
    fn default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
    }
}
