//! Append-only audit trail of user and admin actions.

pub mod dto;
pub mod repo;
pub mod services;

pub use dto::{AuditAction, AuditSeverity, NewAuditEntry};
pub use services::record;
