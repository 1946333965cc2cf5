use super::{IdpConfig, normalize_certificate};
use crate::error::Error;
use crate::sp::SpIdentity;
use crate::sp::forwarded::header_value;
use anyhow::{Context, Result};
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::path::Path;

pub const X_SAML_IDP: &str = "x-saml-idp";
pub const X_SAML_IDP_URL: &str = "x-saml-idp-url";
pub const X_SAML_IDP_CERT: &str = "x-saml-idp-cert";
pub const X_SAML_IDP_ID_ATTR: &str = "x-saml-idp-id-attr";

/// Per-request IdP parameters set by the proxy for multi-tenant deployments.
#[derive(Clone, Debug, Default)]
pub struct IdpOverrides {
    pub label: Option<String>,
    pub sso_url: Option<String>,
    pub certificate: Option<String>,
    pub id_attribute: Option<String>,
}

impl IdpOverrides {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            label: header_value(headers, X_SAML_IDP),
            sso_url: header_value(headers, X_SAML_IDP_URL),
            certificate: header_value(headers, X_SAML_IDP_CERT),
            id_attribute: header_value(headers, X_SAML_IDP_ID_ATTR),
        }
    }

    fn selects_idp(&self) -> bool {
        self.label.is_some() || self.sso_url.is_some() || self.certificate.is_some()
    }
}

/// Static IdP configuration: a process-wide default plus entries keyed by SP
/// entity ID.
#[derive(Clone, Debug, Default)]
pub struct IdpRegistry {
    default: Option<IdpConfig>,
    by_sp: HashMap<String, IdpConfig>,
}

impl IdpRegistry {
    pub fn new(default: Option<IdpConfig>) -> Self {
        Self {
            default,
            by_sp: HashMap::new(),
        }
    }

    pub fn register(&mut self, sp_entity_id: impl Into<String>, idp: IdpConfig) {
        self.by_sp.insert(sp_entity_id.into(), idp);
    }

    /// Loads a JSON object mapping SP entity IDs to IdP configs.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read IdP registry {}", path.display()))?;
        let entries: HashMap<String, IdpConfig> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse IdP registry {}", path.display()))?;

        let count = entries.len();
        for (sp_entity_id, idp) in entries {
            let idp = idp
                .validated()
                .map_err(|e| anyhow::anyhow!("IdP registry entry {sp_entity_id}: {e}"))?;
            self.register(sp_entity_id, idp);
        }
        Ok(count)
    }

    fn configured_for(&self, sp: &SpIdentity) -> Option<&IdpConfig> {
        self.by_sp.get(&sp.entity_id).or(self.default.as_ref())
    }

    /// Picks the IdP for a request. Override headers win; any fields they
    /// leave out are taken from the statically configured IdP for the SP,
    /// provided it is the same IdP.
    pub fn resolve(&self, sp: &SpIdentity, overrides: &IdpOverrides) -> Result<IdpConfig, Error> {
        let configured = self.configured_for(sp);

        if !overrides.selects_idp() {
            let mut idp = configured.cloned().ok_or_else(|| {
                Error::Configuration(format!("no IdP configured for {}", sp.entity_id))
            })?;
            if let Some(attr) = &overrides.id_attribute {
                idp.name_id_attribute = Some(attr.clone());
            }
            return Ok(idp);
        }

        let base = configured.filter(|c| {
            overrides
                .label
                .as_ref()
                .is_none_or(|label| *label == c.label)
        });

        let label = overrides
            .label
            .clone()
            .or_else(|| base.map(|b| b.label.clone()))
            .ok_or_else(|| Error::Configuration("IdP override without an IdP label".into()))?;
        let sso_url = overrides
            .sso_url
            .clone()
            .or_else(|| base.map(|b| b.sso_url.clone()))
            .ok_or_else(|| Error::Configuration(format!("no SSO URL for IdP {label}")))?;
        let certificate = match &overrides.certificate {
            Some(raw) => normalize_certificate(raw)?,
            None => base
                .map(|b| b.certificate.clone())
                .ok_or_else(|| Error::Configuration(format!("no certificate for IdP {label}")))?,
        };
        let id_attribute = overrides
            .id_attribute
            .clone()
            .or_else(|| base.and_then(|b| b.name_id_attribute.clone()));

        IdpConfig::new(label, sso_url, &certificate, id_attribute)
    }
}
