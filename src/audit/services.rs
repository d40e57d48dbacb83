use sqlx::PgPool;
use tracing::{debug, error};

use super::dto::NewAuditEntry;
use super::repo;

/// Writes an audit entry. Never fails: when the insert errors, a
/// `system.error` entry describing the lost one is attempted, then the
/// failure is only logged.
pub async fn record(db: &PgPool, entry: NewAuditEntry) {
    match repo::insert(db, &entry).await {
        Ok(id) => debug!(%id, action = entry.action.as_str(), user_id = %entry.user_id, "audit entry written"),
        Err(e) => {
            error!(error = %e, action = entry.action.as_str(), user_id = %entry.user_id, "audit insert failed");
            if let Err(e) = repo::insert(db, &entry.system_error_for()).await {
                error!(error = %e, "failed to write system.error audit entry");
            }
        }
    }
}
