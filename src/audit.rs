//! Administrative audit log.
//!
//! Every administrative mutation (balance adjustment, account freeze) appends
//! one record here. Administrative changes bypass user consent, so the audit
//! record is a correctness requirement of the operation, not telemetry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core_types::UserId;

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    /// Acting administrator.
    pub actor_user: UserId,
    /// Machine-readable action name, e.g. `balance_adjustment`.
    pub action: String,
    /// What was acted on, e.g. `wallet:42`.
    pub target: String,
    /// Structured action detail.
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(
        &self,
        actor_user: UserId,
        action: &str,
        target: &str,
        detail: serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Most recent records first.
    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<AuditRecord>>;
}

/// In-memory audit log for dev/test mode.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    next_id: AtomicU64,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(
        &self,
        actor_user: UserId,
        action: &str,
        target: &str,
        detail: serde_json::Value,
    ) -> anyhow::Result<()> {
        let record = AuditRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            actor_user,
            action: action.to_string(),
            target: target.to_string(),
            detail,
            created_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<AuditRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_recent() {
        let log = MemoryAuditLog::new();
        log.append(1, "balance_adjustment", "wallet:42", json!({"amount": "5.00"}))
            .await
            .unwrap();
        log.append(1, "account_freeze", "wallet:42", json!({"active": false}))
            .await
            .unwrap();

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].action, "account_freeze");
        assert_eq!(recent[1].action, "balance_adjustment");
        assert!(recent[1].id < recent[0].id);
    }
}
