//! TAU Ledger service entry point.
//!
//! Wiring order:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│  Stores  │───▶│ Orchestrator │───▶│ Gateway  │
//! │  (YAML)  │    │ (PG/mem) │    │  + Admin     │    │  (axum)  │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! With `postgres_url` set every storage seam runs on PostgreSQL; without it
//! the service runs fully in memory (dev/test mode).

use std::sync::Arc;

use tracing::info;

use tau_ledger::audit::{AuditLog, MemoryAuditLog};
use tau_ledger::config::AppConfig;
use tau_ledger::flow::{AdminService, MemoryPendingStore, PendingStore, TransferOrchestrator};
use tau_ledger::gateway::{self, AppState};
use tau_ledger::ledger::{LedgerStore, MemoryLedger};
use tau_ledger::logging::init_logging;
use tau_ledger::notify::{LogSink, MemoryDirectory, NotificationSink, UserDirectory};
use tau_ledger::otp::{MemoryOtpStore, OtpManager, OtpStore};
use tau_ledger::persistence::{Database, PgStore, ensure_schema};

struct Stores {
    ledger: Arc<dyn LedgerStore>,
    otp: Arc<dyn OtpStore>,
    pending: Arc<dyn PendingStore>,
    audit: Arc<dyn AuditLog>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url).await?;
            ensure_schema(db.pool()).await?;
            db.health_check().await?;
            let store = Arc::new(PgStore::new(db.pool().clone()));
            info!("Storage: PostgreSQL");
            Ok(Stores {
                ledger: store.clone(),
                otp: store.clone(),
                pending: store.clone(),
                audit: store,
            })
        }
        None => {
            info!("Storage: in-memory (no postgres_url configured)");
            Ok(Stores {
                ledger: Arc::new(MemoryLedger::new()),
                otp: Arc::new(MemoryOtpStore::new()),
                pending: Arc::new(MemoryPendingStore::new()),
                audit: Arc::new(MemoryAuditLog::new()),
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("TAU_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);

    info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        "Starting TAU ledger service"
    );

    let stores = build_stores(&config).await?;

    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
    let directory: Arc<dyn UserDirectory> = Arc::new(MemoryDirectory::new());

    let otp = OtpManager::new(
        stores.otp,
        sink.clone(),
        config.ledger.otp_ttl_secs,
        config.ledger.otp_max_attempts,
    );
    let orchestrator = Arc::new(TransferOrchestrator::new(
        stores.ledger.clone(),
        otp,
        stores.pending,
        sink.clone(),
        directory.clone(),
        config.ledger.clone(),
    ));
    let admin = Arc::new(AdminService::new(
        stores.ledger.clone(),
        stores.audit,
        sink,
        directory,
    ));

    let state = Arc::new(AppState {
        orchestrator,
        admin,
        ledger: stores.ledger,
    });

    gateway::serve(state, &config.gateway.host, config.gateway.port).await
}
