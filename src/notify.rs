//! Notification Sink
//!
//! Outbound email is an external collaborator: the ledger hands it a message
//! after the fact and never waits on it. Delivery failure is a degraded mode
//! that gets logged, not an error the protocol surfaces. Nothing here sits
//! inside a transactional boundary.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::core_types::UserId;

/// Fire-and-forget message delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Resolves a user id to a deliverable email address.
///
/// Profiles live outside the ledger core; this is the interface boundary to
/// them. A `None` means the notification is skipped (and logged), never that
/// the operation fails.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn email_of(&self, user: UserId) -> Option<String>;
}

/// Deliver a message, swallowing (but logging) any failure.
pub async fn deliver(sink: &dyn NotificationSink, to: &str, subject: &str, body: &str) {
    if let Err(e) = sink.send(to, subject, body).await {
        warn!(to = %to, subject = %subject, error = %e, "Notification delivery failed (degraded mode)");
    }
}

/// Resolve a user's email and deliver, skipping silently-but-logged when the
/// directory has no address for them.
pub async fn deliver_to_user(
    sink: &dyn NotificationSink,
    directory: &dyn UserDirectory,
    user: UserId,
    subject: &str,
    body: &str,
) {
    match directory.email_of(user).await {
        Some(email) => deliver(sink, &email, subject, body).await,
        None => warn!(user_id = user, subject = %subject, "No email on file, notification skipped"),
    }
}

/// Log-only sink: the fallback delivery mode when no mail provider is wired.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body = %body, "MAIL (log delivery)");
        Ok(())
    }
}

/// A sent message captured by [`MemorySink`].
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory sink that records every message. Used by tests and by the
/// mock-delivery mode of the dev server.
#[derive(Default)]
pub struct MemorySink {
    sent: Mutex<Vec<SentMail>>,
    fail: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Make subsequent sends fail, to exercise the degraded mode.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("mail provider unavailable");
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// In-memory user directory for tests and dev mode.
#[derive(Default)]
pub struct MemoryDirectory {
    emails: dashmap::DashMap<UserId, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserId, email: impl Into<String>) {
        self.emails.insert(user, email.into());
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn email_of(&self, user: UserId) -> Option<String> {
        self.emails.get(&user).map(|e| e.clone())
    }
}
