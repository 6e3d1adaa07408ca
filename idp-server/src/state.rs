//! Shared process state: one instance per component contract in §4,
//! wired together behind `Arc` and handed to every handler via
//! `axum::extract::State`.

use std::sync::Arc;

use audit_engine::AuditSink;
use auth_identity::{IdentityConfig, IdentityService, InMemorySessionRepository};
use auth_oauth::{AuthorizationCodeStore, ClientRegistry, DPoPVerifier, ParStore, RefreshTokenRotator, RevocationTable};
use config_engine::ProfileEngine;
use crypto::KeyManager;
use metrics_exporter_prometheus::PrometheusHandle;
use telemetry::HealthMonitor;

use crate::config::ServerConfig;

/// Process-wide state. Cloning is cheap: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub profile_engine: Arc<ProfileEngine>,
    pub key_manager: Arc<KeyManager>,
    pub client_registry: Arc<ClientRegistry>,
    pub par_store: Arc<ParStore>,
    pub code_store: Arc<AuthorizationCodeStore>,
    pub dpop: Arc<DPoPVerifier>,
    pub refresh_rotator: Arc<RefreshTokenRotator>,
    pub revocation: Arc<RevocationTable>,
    pub identity: Arc<IdentityService>,
    pub audit: Arc<AuditSink>,
    pub health: Arc<HealthMonitor>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Boots every component at its default/profile-derived configuration.
    /// Registration of clients and persistence of state across restarts are
    /// out of scope (§1); this is a single-process in-memory core.
    pub fn bootstrap(config: ServerConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let profile = config_engine::SettingsProfile::by_name(&config.profile, config.issuer.clone())?;
        let profile_engine = Arc::new(ProfileEngine::new(profile));
        let current = profile_engine.current();

        let key_manager = Arc::new(KeyManager::bootstrap(
            config.default_signing_alg,
            chrono::Duration::days(config.key_rotation_interval_days),
            chrono::Duration::days(config.key_retention_days),
        )?);

        let audit = Arc::new(AuditSink::start());

        Ok(Self {
            client_registry: Arc::new(ClientRegistry::new(format!("{}/token", current.issuer.trim_end_matches('/')))),
            par_store: Arc::new(ParStore::new(current.par_ttl)),
            code_store: Arc::new(AuthorizationCodeStore::new(current.code_ttl)),
            dpop: Arc::new(DPoPVerifier::new(current.dpop_proof_window, Self::all_signing_algs())),
            refresh_rotator: Arc::new(RefreshTokenRotator::new(audit.clone())),
            revocation: Arc::new(RevocationTable::new()),
            identity: Arc::new(IdentityService::new(
                Arc::new(InMemorySessionRepository::new()),
                IdentityConfig::default(),
            )),
            key_manager,
            profile_engine,
            audit,
            health: Arc::new(HealthMonitor::start()),
            metrics_handle,
            config,
        })
    }

    /// Every algorithm this deployment will verify signatures under,
    /// independent of `default_signing_alg` (which only governs freshly
    /// minted keys). Shared by the DPoP verifier and every handler that
    /// verifies a bearer/DPoP/refresh token against the key manager's JWKS.
    pub(crate) fn all_signing_algs() -> Vec<crypto::KeyAlgorithm> {
        vec![
            crypto::KeyAlgorithm::Rs256,
            crypto::KeyAlgorithm::Rs384,
            crypto::KeyAlgorithm::Rs512,
            crypto::KeyAlgorithm::Es256,
            crypto::KeyAlgorithm::Es384,
            crypto::KeyAlgorithm::Es512,
        ]
    }
}
