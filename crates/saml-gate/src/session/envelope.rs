//! MAC envelope shared by session cookies and relay state.
//!
//! Format: `base64url(json) "." base64url(HMAC-SHA256(key, purpose "." base64url(json)))`.
//! The purpose tag is part of the MAC input, so a token minted for one
//! purpose never verifies as another.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    Session,
    RelayState,
}

impl Purpose {
    fn tag(self) -> &'static str {
        match self {
            Purpose::Session => "session",
            Purpose::RelayState => "relay-state",
        }
    }
}

pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn from_secret(secret: &str) -> Self {
        Self(secret.as_bytes().to_vec())
    }

    /// Random process-local key. Tokens minted under it do not survive a
    /// restart and are not accepted by other instances.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn mac(&self, purpose: Purpose, payload: &str) -> Result<HmacSha256, InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(&self.0)?;
        mac.update(purpose.tag().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signing key rejected by HMAC")]
    Key,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OpenError {
    Malformed,
    BadSignature,
}

pub fn seal<T: Serialize>(
    key: &SigningKey,
    purpose: Purpose,
    value: &T,
) -> Result<String, SealError> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?);
    let mac = key.mac(purpose, &payload).map_err(|_| SealError::Key)?;
    let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{tag}"))
}

pub fn open<T: DeserializeOwned>(
    key: &SigningKey,
    purpose: Purpose,
    token: &str,
) -> Result<T, OpenError> {
    let (payload, tag) = token.split_once('.').ok_or(OpenError::Malformed)?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag)
        .map_err(|_| OpenError::Malformed)?;

    key.mac(purpose, payload)
        .map_err(|_| OpenError::BadSignature)?
        .verify_slice(&tag)
        .map_err(|_| OpenError::BadSignature)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OpenError::Malformed)?;
    serde_json::from_slice(&json).map_err(|_| OpenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        subject: String,
    }

    fn payload() -> Payload {
        Payload {
            subject: "alice".into(),
        }
    }

    #[test]
    fn opens_what_it_seals() {
        let key = SigningKey::from_secret("test-secret");
        let token = seal(&key, Purpose::Session, &payload()).unwrap();
        let opened: Payload = open(&key, Purpose::Session, &token).unwrap();
        assert_eq!(opened, payload());
    }

    #[test]
    fn purpose_is_bound_into_the_mac() {
        let key = SigningKey::from_secret("test-secret");
        let token = seal(&key, Purpose::RelayState, &payload()).unwrap();
        assert_eq!(
            open::<Payload>(&key, Purpose::Session, &token),
            Err(OpenError::BadSignature)
        );
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let key = SigningKey::from_secret("test-secret");
        let token = seal(&key, Purpose::Session, &payload()).unwrap();
        let (_, tag) = token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"subject":"mallory"}"#);
        assert_eq!(
            open::<Payload>(&key, Purpose::Session, &format!("{forged}.{tag}")),
            Err(OpenError::BadSignature)
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let key = SigningKey::from_secret("test-secret");
        for token in ["", "no-dot", "abc.!!!", "."] {
            assert!(open::<Payload>(&key, Purpose::Session, token).is_err());
        }
    }

    #[test]
    fn empty_secret_still_seals_and_opens() {
        let key = SigningKey::from_secret("");
        let token = seal(&key, Purpose::Session, &payload()).unwrap();
        let opened: Payload = open(&key, Purpose::Session, &token).unwrap();
        assert_eq!(opened, payload());
    }

    #[test]
    fn generated_keys_differ() {
        let a = SigningKey::generate();
        let b = SigningKey::generate();
        let token = seal(&a, Purpose::Session, &payload()).unwrap();
        assert!(open::<Payload>(&b, Purpose::Session, &token).is_err());
    }
}
