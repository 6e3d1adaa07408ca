//! RefreshTokenRotator (C11): version-based rotation, theft detection and
//! family revocation, sharded per client (§4.11, §5).

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use audit_engine::{AuditEntry, AuditOutcome, AuditSink};
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use crate::code_store::random_code as random_opaque_string;
use crate::models::{RotationOutcome, TokenFamily};

/// One shard's worth of families, keyed by subject. §4.11: "map
/// `user_id -> TokenFamily`"; the outer [`RefreshTokenRotator`] keys by
/// `client_id` to get per-client single-writer shards (§5 Cross-shard:
/// "Client shard (C5) and family shard (C11) are independent").
struct Shard {
    families: HashMap<String, TokenFamily>,
}

impl Shard {
    fn new() -> Self {
        Self { families: HashMap::new() }
    }
}

/// Sharded, single-writer refresh-token family store. Each `(client_id,
/// user_id)` pair is structurally isolated from every other client's
/// shard, so a lookup can never cross a tenant boundary (§4.11 "Tenant
/// boundary").
pub struct RefreshTokenRotator {
    shards: Mutex<HashMap<String, Shard>>,
    audit: Arc<AuditSink>,
}

impl RefreshTokenRotator {
    pub fn new(audit: Arc<AuditSink>) -> Self {
        Self {
            shards: Mutex::new(HashMap::new()),
            audit,
        }
    }

    /// Creates a new refresh family at `version=1` (§4.11).
    pub fn create(&self, user_id: &str, client_id: &str, scope: Vec<String>, ttl: Duration) -> (u64, String) {
        let jti = random_opaque_string();
        let now = Utc::now();
        let family = TokenFamily {
            client_id: client_id.to_string(),
            sub: user_id.to_string(),
            version: 1,
            last_jti: jti.clone(),
            last_used_at: now,
            expires_at: now + ttl,
            allowed_scope: scope,
            revoked: false,
            revoked_reason: None,
        };

        let mut shards = self.shards.lock();
        let shard = shards.entry(client_id.to_string()).or_insert_with(Shard::new);
        shard.families.insert(user_id.to_string(), family);

        (1, jti)
    }

    /// Rotates a family from `(incoming_version, incoming_jti)`. Reuse of a
    /// superseded token (lower version, or a stale `jti` at the current
    /// version) revokes the family irreversibly and emits synchronous
    /// audit events *before returning*, matching §7's "logged
    /// synchronously before the response is written".
    pub async fn rotate(
        &self,
        incoming_version: u64,
        incoming_jti: &str,
        user_id: &str,
        client_id: &str,
        requested_scope: Option<&[String]>,
    ) -> RotationOutcome {
        let theft_signal = {
            let mut shards = self.shards.lock();
            let Some(shard) = shards.get_mut(client_id) else {
                return RotationOutcome::NotFound;
            };
            let Some(family) = shard.families.get_mut(user_id) else {
                return RotationOutcome::NotFound;
            };

            if family.revoked {
                return RotationOutcome::NotFound;
            }
            if family.expires_at <= Utc::now() {
                return RotationOutcome::Expired;
            }

            if incoming_version < family.version || incoming_jti != family.last_jti {
                family.revoked = true;
                family.revoked_reason = Some("refresh_token_reuse".to_string());
                Some(family.clone())
            } else {
                None
            }
        };

        if let Some(family) = theft_signal {
            self.emit_theft_audit(&family).await;
            return RotationOutcome::TheftDetected;
        }

        // Scope-amplification check happens outside the lock above but
        // before mutation below, so a rejected request leaves `version`
        // and `last_jti` untouched (§8 property 8, S4).
        let allowed: HashSet<&str> = {
            let shards = self.shards.lock();
            let family = shards
                .get(client_id)
                .and_then(|s| s.families.get(user_id))
                .expect("presence re-checked under the same lock above");
            family.allowed_scope.iter().map(String::as_str).collect::<HashSet<_>>()
        };

        if let Some(requested) = requested_scope {
            if !requested.iter().all(|s| allowed.contains(s.as_str())) {
                return RotationOutcome::ScopeAmplification;
            }
        }

        let new_jti = random_opaque_string();
        let mut shards = self.shards.lock();
        let shard = shards.get_mut(client_id).expect("shard presence re-checked above");
        let family = shard.families.get_mut(user_id).expect("family presence re-checked above");

        family.version += 1;
        family.last_jti = new_jti.clone();
        family.last_used_at = Utc::now();

        RotationOutcome::Rotated {
            new_version: family.version,
            new_jti,
            expires_in: family.expires_at - Utc::now(),
            allowed_scope: family.allowed_scope.clone(),
        }
    }

    /// Idempotent, reason-recording revocation, used both by theft
    /// detection and by authorization-code reuse (§4.9, §4.11).
    pub async fn revoke_family(&self, user_id: &str, client_id: &str, reason: &str) {
        let already_revoked = {
            let mut shards = self.shards.lock();
            let Some(shard) = shards.get_mut(client_id) else { return };
            let Some(family) = shard.families.get_mut(user_id) else { return };
            let was_revoked = family.revoked;
            family.revoked = true;
            family.revoked_reason = Some(reason.to_string());
            was_revoked
        };

        if !already_revoked {
            self.audit
                .emit_sync(
                    AuditEntry::new(client_id, user_id, "family_revoked", format!("family:{client_id}:{user_id}"), AuditOutcome::Failure)
                        .with_details(serde_json::json!({ "reason": reason })),
                )
                .await
                .ok();
        }
    }

    /// Read-only introspection of a family's state; never rotates
    /// (§4.11).
    pub fn validate(&self, user_id: &str, client_id: &str) -> Option<(bool, u64, Vec<String>, chrono::DateTime<Utc>)> {
        let shards = self.shards.lock();
        let family = shards.get(client_id)?.families.get(user_id)?;
        Some((
            !family.revoked && family.expires_at > Utc::now(),
            family.version,
            family.allowed_scope.clone(),
            family.expires_at,
        ))
    }

    async fn emit_theft_audit(&self, family: &TokenFamily) {
        let resource = format!("family:{}:{}", family.client_id, family.sub);
        self.audit
            .emit_sync(AuditEntry::new(
                &family.client_id,
                &family.sub,
                "theft_detected",
                resource.clone(),
                AuditOutcome::Failure,
            ))
            .await
            .ok();
        self.audit
            .emit_sync(AuditEntry::new(
                &family.client_id,
                &family.sub,
                "family_revoked",
                resource,
                AuditOutcome::Failure,
            ))
            .await
            .ok();
    }
}
