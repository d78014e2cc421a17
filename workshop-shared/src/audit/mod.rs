/// Audit logger
///
/// Writes the append-only audit trail. [`AuditLogger::append`] is the hook
/// account operations call after each successful mutation: it stamps the
/// entry with the current time and never fails the caller. Store errors are
/// reported through `tracing` and dropped.
///
/// [`AuditLogger::record`] is the explicit manual-entry operation; its errors
/// do surface, since recording is the whole point of the call.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use workshop_shared::audit::AuditLogger;
/// use workshop_shared::auth::identity::ActingIdentity;
/// use workshop_shared::models::audit::AuditAction;
/// use workshop_shared::pagination::PageRequest;
/// use workshop_shared::store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let logger = AuditLogger::new(Arc::new(MemoryStore::new()));
/// logger
///     .append(AuditAction::DeleteUser, "bob", &ActingIdentity::named("alice"), "")
///     .await;
///
/// let page = logger.list(Some("bob"), None, &PageRequest::default()).await?;
/// assert_eq!(page.total, 1);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::identity::ActingIdentity;
use crate::error::{AccountError, AccountResult};
use crate::models::audit::{AuditAction, AuditQuery, AuditRecord, NewAuditRecord};
use crate::pagination::{normalize_filter, Page, PageRequest};
use crate::store::AuditStore;

/// A manually recorded entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualEntry {
    /// Free-form tag, required non-empty
    pub action: String,

    #[serde(default)]
    pub affected_user: String,

    #[serde(default)]
    pub detail: String,

    /// Backdated timestamp; defaults to now
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends one entry, best effort
    ///
    /// Returns nothing: a failed write is logged at error level and
    /// otherwise ignored.
    pub async fn append(
        &self,
        action: AuditAction,
        affected_user: &str,
        actor: &ActingIdentity,
        detail: impl Into<String>,
    ) {
        let record = NewAuditRecord {
            created_at: Utc::now(),
            action: action.as_str().to_string(),
            affected_user: affected_user.to_string(),
            actor: actor.display(),
            detail: detail.into(),
        };

        if let Err(e) = self.store.insert_audit(record).await {
            tracing::error!(
                error = %e,
                action = action.as_str(),
                affected_user = affected_user,
                "failed to write audit record"
            );
        }
    }

    /// Lists entries newest first
    ///
    /// `text` is a case-insensitive substring of action, affected user,
    /// actor or detail. `user` matches the affected user or the actor
    /// exactly (case-insensitive). Both may be combined.
    pub async fn list(
        &self,
        text: Option<&str>,
        user: Option<&str>,
        paging: &PageRequest,
    ) -> AccountResult<Page<AuditRecord>> {
        let paging = paging.resolve();
        let query = AuditQuery {
            text: normalize_filter(text),
            user: normalize_filter(user),
        };

        let (items, total) = self
            .store
            .list_audit(&query, paging.limit, paging.offset)
            .await?;

        Ok(Page::new(items, total, paging))
    }

    /// Records a manual entry attributed to `actor`
    pub async fn record(
        &self,
        actor: &ActingIdentity,
        entry: ManualEntry,
    ) -> AccountResult<AuditRecord> {
        let action = entry.action.trim();
        if action.is_empty() {
            return Err(AccountError::validation("action is required"));
        }

        let record = NewAuditRecord {
            created_at: entry.created_at.unwrap_or_else(Utc::now),
            action: action.to_string(),
            affected_user: entry.affected_user.trim().to_string(),
            actor: actor.display(),
            detail: entry.detail,
        };

        let stored = self.store.insert_audit(record).await?;
        tracing::info!(id = stored.id, action = %stored.action, actor = %stored.actor, "manual audit entry recorded");

        Ok(stored)
    }
}
