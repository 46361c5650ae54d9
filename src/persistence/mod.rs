//! PostgreSQL persistence.
//!
//! One `PgStore` implements every storage seam (ledger, OTP challenges,
//! pending transfers, audit log) over a shared connection pool.

pub mod audit;
pub mod ledger;
pub mod otp;
pub mod pending;
pub mod schema;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

pub use schema::ensure_schema;

/// Connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Storage backend over PostgreSQL. Implements [`crate::ledger::LedgerStore`],
/// [`crate::otp::OtpStore`], [`crate::flow::PendingStore`] and
/// [`crate::audit::AuditLog`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
