//! Audit entry shape, matching §6's wire format:
//! `{ts, tenant, actor, event, resource, outcome, details}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub tenant: String,
    pub actor: String,
    pub event: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    pub correlation_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        tenant: impl Into<String>,
        actor: impl Into<String>,
        event: impl Into<String>,
        resource: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tenant: tenant.into(),
            actor: actor.into(),
            event: event.into(),
            resource: resource.into(),
            outcome,
            correlation_id: Uuid::new_v4(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Canonical bytes fed into the Merkle chain (C15's tamper-evidence
    /// layer): id and timestamp are excluded so the digest only reflects
    /// what happened, not when it was recorded.
    pub fn content_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{:?}|{}",
            self.tenant, self.actor, self.event, self.resource, self.outcome, self.details
        )
        .into_bytes()
    }
}
