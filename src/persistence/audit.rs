//! PostgreSQL audit log.

use async_trait::async_trait;
use sqlx::Row;

use crate::audit::{AuditLog, AuditRecord};
use crate::core_types::UserId;

use super::PgStore;

#[async_trait]
impl AuditLog for PgStore {
    async fn append(
        &self,
        actor_user: UserId,
        action: &str,
        target: &str,
        detail: serde_json::Value,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO audit_log_tb (actor_user, action, target, detail) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(actor_user as i64)
        .bind(action)
        .bind(target)
        .bind(detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            "SELECT id, actor_user, action, target, detail, created_at \
             FROM audit_log_tb ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AuditRecord {
                id: row.get::<i64, _>("id") as u64,
                actor_user: row.get::<i64, _>("actor_user") as UserId,
                action: row.get("action"),
                target: row.get("target"),
                detail: row.get("detail"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
