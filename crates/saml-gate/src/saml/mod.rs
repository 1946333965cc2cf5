//! SAML protocol engine: AuthnRequest construction and Response validation.

pub mod attributes;
pub mod authn;
pub mod response;
pub mod verify;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::error::Error;
use crate::idp::IdpConfig;
use crate::replay::ReplayGuard;
use crate::session::{AuthLevel, RelayState, SessionCodec, SessionInvalid, SessionToken};
use crate::sp::SpIdentity;
pub use authn::LoginRedirect;
use chrono::{DateTime, Duration, Utc};
use response::Expectations;
use std::str::FromStr;
use std::sync::Arc;
pub use verify::{SamaelVerifier, SignatureVerifier, VerifyContext};

/// Why a login was rejected. Logged, never shown to the client.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("relay state rejected: {0}")]
    RelayState(SessionInvalid),
    #[error("missing RelayState")]
    MissingRelayState,
    #[error("relay state names IdP {relayed}, request resolved {resolved}")]
    IdpMismatch { relayed: String, resolved: String },
    #[error("malformed Response: {0}")]
    Malformed(String),
    #[error("signature verification failed: {0}")]
    Signature(String),
    #[error("IdP returned status {0}")]
    Status(String),
    #[error("Destination {found:?} does not match ACS {expected}")]
    Destination {
        expected: String,
        found: Option<String>,
    },
    #[error("Issuer {found:?} does not match IdP {expected}")]
    Issuer {
        expected: String,
        found: Option<String>,
    },
    #[error("InResponseTo {found:?} does not match request {expected}")]
    InResponseTo {
        expected: String,
        found: Option<String>,
    },
    #[error("IssueInstant outside the login window")]
    IssueInstant,
    #[error("assertion carries no Conditions")]
    MissingConditions,
    #[error("audience does not include this SP")]
    Audience,
    #[error("assertion is not yet valid")]
    NotYetValid,
    #[error("assertion has expired")]
    Expired,
    #[error("no subject in assertion")]
    MissingSubject,
    #[error("request ID already consumed")]
    Replay,
}

/// Ordered `context=level` pairs mapping asserted AuthnContextClassRefs to
/// session auth levels. Several contexts may map to one level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthnContextLevels(Vec<(String, String)>);

impl AuthnContextLevels {
    pub fn levels_for(&self, contexts: &[&str]) -> AuthLevel {
        self.0
            .iter()
            .filter(|(context, _)| contexts.contains(&context.as_str()))
            .map(|(_, level)| level.clone())
            .collect()
    }

    /// Contexts to request from the IdP when stepping up to `level`.
    pub fn contexts_for(&self, level: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, l)| l == level)
            .map(|(context, _)| context.clone())
            .collect()
    }
}

impl FromStr for AuthnContextLevels {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pairs = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            // Context URIs may contain '=', levels may not.
            let (context, level) = entry
                .rsplit_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected context=level, got {entry:?}"))?;
            let (context, level) = (context.trim(), level.trim());
            if context.is_empty() || level.is_empty() {
                anyhow::bail!("empty context or level in {entry:?}");
            }
            pairs.push((context.to_string(), level.to_string()));
        }
        Ok(Self(pairs))
    }
}

pub struct SamlEngine {
    verifier: Arc<dyn SignatureVerifier>,
    replay: Arc<dyn ReplayGuard>,
    levels: AuthnContextLevels,
    groups_attribute: String,
    clock_skew: Duration,
}

impl SamlEngine {
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        replay: Arc<dyn ReplayGuard>,
        levels: AuthnContextLevels,
        groups_attribute: String,
        clock_skew: Duration,
    ) -> Self {
        Self {
            verifier,
            replay,
            levels,
            groups_attribute,
            clock_skew,
        }
    }

    /// Starts a login. `step_up` names the auth level to request, if any.
    pub fn begin_login(
        &self,
        codec: &SessionCodec,
        sp: &SpIdentity,
        idp: &IdpConfig,
        return_to: String,
        step_up: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LoginRedirect, Error> {
        let contexts = step_up
            .map(|level| self.levels.contexts_for(level))
            .unwrap_or_default();
        authn::build_login_redirect(codec, sp, idp, return_to, &contexts, now)
    }

    /// Validates an ACS postback and mints the session it authorizes. The
    /// request ID is consumed only once every other check has passed.
    pub async fn complete_login(
        &self,
        codec: &SessionCodec,
        sp: &SpIdentity,
        idp: &IdpConfig,
        saml_response: &str,
        relay_state: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(SessionToken, RelayState), RejectReason> {
        let relay_value = relay_state.ok_or(RejectReason::MissingRelayState)?;
        let relay = codec
            .decode_relay_at(relay_value, now)
            .map_err(RejectReason::RelayState)?;
        if relay.idp != idp.label {
            return Err(RejectReason::IdpMismatch {
                relayed: relay.idp,
                resolved: idp.label.clone(),
            });
        }

        let xml = response::decode_base64(saml_response)?;
        let ctx = VerifyContext {
            sp,
            idp,
            request_id: &relay.request_id,
        };
        let assertion = self
            .verifier
            .verify(saml_response, &ctx)
            .map_err(RejectReason::Signature)?;

        let parsed = response::parse(&xml)?;
        let validated = response::validate(
            &parsed,
            &assertion,
            &Expectations {
                sp,
                idp_label: &idp.label,
                relay: &relay,
                subject_attribute: idp.name_id_attribute.as_deref(),
                groups_attribute: &self.groups_attribute,
                levels: &self.levels,
                clock_skew: self.clock_skew,
            },
            now,
        )?;

        let retention = codec.relay_ttl() + self.clock_skew;
        if !self.replay.consume(&validated.request_id, retention).await {
            return Err(RejectReason::Replay);
        }

        tracing::info!(
            subject = validated.subject,
            request_id = validated.request_id,
            idp = idp.label,
            auth_level = ?validated.auth_level,
            "login validated"
        );

        let token = codec.mint(validated.subject, validated.auth_level, validated.groups, now);
        Ok((token, relay))
    }
}
