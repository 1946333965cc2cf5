//! Identity-provider connection parameters and where they come from.

pub mod metadata;
pub mod registry;

use crate::error::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
pub use registry::{IdpOverrides, IdpRegistry};
use serde::Deserialize;

/// Connection parameters for one IdP. `label` is the IdP's entity ID and is
/// what Response issuers are compared against.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdpConfig {
    pub label: String,
    pub sso_url: String,
    /// Base64 DER of the IdP signing certificate, without PEM armour.
    pub certificate: String,
    #[serde(default)]
    pub name_id_attribute: Option<String>,
}

impl IdpConfig {
    pub fn new(
        label: impl Into<String>,
        sso_url: impl Into<String>,
        certificate: &str,
        name_id_attribute: Option<String>,
    ) -> Result<Self, Error> {
        let label = label.into();
        let sso_url = sso_url.into();
        if label.is_empty() {
            return Err(Error::IdpConfiguration("IdP entity ID is empty".into()));
        }
        match url::Url::parse(&sso_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(Error::IdpConfiguration(format!(
                    "invalid SSO URL for {label}: {sso_url}"
                )));
            }
        }
        let certificate = normalize_certificate(certificate)?;

        Ok(Self {
            label,
            sso_url,
            certificate,
            name_id_attribute: name_id_attribute.filter(|a| !a.is_empty()),
        })
    }

    /// Re-runs validation on a config that was deserialized rather than built.
    pub fn validated(self) -> Result<Self, Error> {
        Self::new(
            self.label,
            self.sso_url,
            &self.certificate,
            self.name_id_attribute,
        )
    }
}

/// Accepts a PEM certificate (possibly flattened onto one line, as it must be
/// inside a header) or bare base64 DER, and returns the base64 DER after
/// checking that it parses as X.509.
pub fn normalize_certificate(raw: &str) -> Result<String, Error> {
    let body: String = raw
        .replace("-----BEGIN CERTIFICATE-----", "")
        .replace("-----END CERTIFICATE-----", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let der = STANDARD
        .decode(&body)
        .map_err(|e| Error::IdpConfiguration(format!("certificate is not base64: {e}")))?;
    openssl::x509::X509::from_der(&der)
        .map_err(|e| Error::IdpConfiguration(format!("certificate is not X.509: {e}")))?;

    Ok(STANDARD.encode(der))
}
