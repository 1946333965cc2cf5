//! Signed, stateless session and relay-state tokens.

pub mod envelope;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use envelope::{OpenError, Purpose, SealError, SigningKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tolerance applied to `expires_at` when decoding, for clock drift between
/// gateway instances sharing a key.
pub const SESSION_CLOCK_SKEW: Duration = Duration::seconds(30);

pub type AuthLevel = BTreeSet<String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub subject: String,
    pub auth_level: AuthLevel,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// State carried through the IdP during one login round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayState {
    pub return_to: String,
    pub request_id: String,
    /// Label of the IdP the AuthnRequest was sent to.
    pub idp: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionInvalid {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

impl From<OpenError> for SessionInvalid {
    fn from(err: OpenError) -> Self {
        match err {
            OpenError::Malformed => SessionInvalid::Malformed,
            OpenError::BadSignature => SessionInvalid::BadSignature,
        }
    }
}

/// Encodes and decodes tokens under the active signing key. Rotating the key
/// invalidates every outstanding session and relay-state token at once.
pub struct SessionCodec {
    key: RwLock<Arc<SigningKey>>,
    lifetime: Duration,
    relay_ttl: Duration,
}

impl SessionCodec {
    pub fn new(key: SigningKey, lifetime: Duration, relay_ttl: Duration) -> Self {
        Self {
            key: RwLock::new(Arc::new(key)),
            lifetime,
            relay_ttl,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn relay_ttl(&self) -> Duration {
        self.relay_ttl
    }

    pub fn rotate(&self, key: SigningKey) {
        *self.key.write() = Arc::new(key);
        tracing::warn!("signing key rotated, outstanding sessions invalidated");
    }

    fn active_key(&self) -> Arc<SigningKey> {
        self.key.read().clone()
    }

    pub fn mint(
        &self,
        subject: String,
        auth_level: AuthLevel,
        groups: Vec<String>,
        now: DateTime<Utc>,
    ) -> SessionToken {
        let issued_at = now.trunc_subsecs(0);
        SessionToken {
            subject,
            auth_level,
            groups,
            issued_at,
            expires_at: issued_at + self.lifetime,
        }
    }

    /// Extends a still-valid session for another lifetime from `now`.
    pub fn refresh(&self, token: &SessionToken, now: DateTime<Utc>) -> SessionToken {
        SessionToken {
            expires_at: now.trunc_subsecs(0) + self.lifetime,
            ..token.clone()
        }
    }

    pub fn encode(&self, token: &SessionToken) -> Result<String, SealError> {
        envelope::seal(&self.active_key(), Purpose::Session, token)
    }

    pub fn decode(&self, cookie: &str) -> Result<SessionToken, SessionInvalid> {
        self.decode_at(cookie, Utc::now())
    }

    pub fn decode_at(
        &self,
        cookie: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, SessionInvalid> {
        let token: SessionToken = envelope::open(&self.active_key(), Purpose::Session, cookie)?;
        if now >= token.expires_at + SESSION_CLOCK_SKEW {
            return Err(SessionInvalid::Expired);
        }
        Ok(token)
    }

    pub fn relay_state(
        &self,
        return_to: String,
        request_id: String,
        idp: String,
        now: DateTime<Utc>,
    ) -> RelayState {
        let issued_at = now.trunc_subsecs(0);
        RelayState {
            return_to,
            request_id,
            idp,
            issued_at,
            expires_at: issued_at + self.relay_ttl,
        }
    }

    pub fn encode_relay(&self, relay: &RelayState) -> Result<String, SealError> {
        envelope::seal(&self.active_key(), Purpose::RelayState, relay)
    }

    pub fn decode_relay_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<RelayState, SessionInvalid> {
        let relay: RelayState = envelope::open(&self.active_key(), Purpose::RelayState, value)?;
        if now >= relay.expires_at + SESSION_CLOCK_SKEW {
            return Err(SessionInvalid::Expired);
        }
        Ok(relay)
    }
}
