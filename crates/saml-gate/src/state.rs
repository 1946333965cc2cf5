use crate::config::Config;
use crate::idp::{IdpConfig, IdpRegistry};
use crate::replay::MemoryReplayGuard;
use crate::saml::{SamaelVerifier, SamlEngine, SignatureVerifier};
use crate::session::SessionCodec;
use crate::session::envelope::SigningKey;
use anyhow::{Context, Result};
use chrono::Duration;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub codec: SessionCodec,
    pub registry: IdpRegistry,
    pub engine: SamlEngine,
    pub replay: MemoryReplayGuard,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_verifier(config, Arc::new(SamaelVerifier::new()?))
    }

    /// Builds state with a caller-supplied signature verifier.
    pub fn with_verifier(config: Config, verifier: Arc<dyn SignatureVerifier>) -> Result<Self> {
        let key = match &config.secret_key {
            Some(secret) => SigningKey::from_secret(secret),
            None => {
                tracing::error!(
                    "SECRET_KEY is not set, using a random key; sessions will not survive a restart"
                );
                SigningKey::generate()
            }
        };
        let codec = SessionCodec::new(
            key,
            Duration::seconds(config.session_lifetime_secs),
            Duration::seconds(config.relay_state_ttl_secs),
        );

        let default_idp = config
            .default_idp
            .as_ref()
            .map(|idp| {
                IdpConfig::new(
                    idp.entity_id.clone(),
                    idp.sso_url.clone(),
                    &idp.certificate,
                    idp.id_attribute.clone(),
                )
            })
            .transpose()
            .context("invalid default IdP configuration")?;
        let mut registry = IdpRegistry::new(default_idp);
        if let Some(path) = &config.idp_registry_path {
            let loaded = registry.load_file(path)?;
            tracing::info!(loaded, path, "loaded IdP registry");
        }

        let replay = MemoryReplayGuard::new();
        let engine = SamlEngine::new(
            verifier,
            Arc::new(replay.clone()),
            config.authn_context_levels.clone(),
            config.groups_attribute.clone(),
            Duration::seconds(config.clock_skew_secs),
        );

        Ok(Self {
            config,
            codec,
            registry,
            engine,
            replay,
        })
    }
}
